//! Parse raw NMEA 0183 AIS sentences into structured fragments.
//!
//! Responsibilities:
//! - Split `!AIVDM,...*hh` into its fields
//! - Validate the XOR checksum
//! - Accept only VDM/VDO sentence types
//! - Keep fragment count/number signed so the reassembler sees them as sent
//!
//! Payload bits are not touched here; see `decode`.

use crate::types::DecodeError;

/// Sentence start marker for encapsulated (AIS) sentences.
pub const SENTENCE_START: char = '!';

/// Sentence types carrying AIS payloads (own-ship VDO and other-ship VDM).
const SUPPORTED_TYPES: &[&str] = &["VDM", "VDO"];

/// Fields in a VDM/VDO sentence, header included.
const FIELD_COUNT: usize = 7;

// ---------------------------------------------------------------------------
// Sentence
// ---------------------------------------------------------------------------

/// One parsed AIS sentence (a whole message or one fragment of it).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sentence {
    /// Two-letter talker id, usually `AI`
    pub talker: String,
    /// `VDM` or `VDO`
    pub sentence_type: String,
    /// Total fragments in the message
    pub fragment_count: i32,
    /// 1-based index of this fragment
    pub fragment_number: i32,
    /// Sequential message id linking fragments; empty for single sentences
    pub sequence_id: String,
    /// Radio channel code as sent (`A`, `B`, `1`, `2`, or empty)
    pub channel: String,
    /// Six-bit armored payload
    pub payload: String,
    /// Number of padding bits at the end of the payload (0-5)
    pub fill_bits: u8,
}

impl Sentence {
    /// True if this sentence is the whole message.
    pub fn is_single(&self) -> bool {
        self.fragment_count == 1
    }
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// XOR of every byte in the sentence body (between `!` and `*`).
pub fn checksum(body: &str) -> u8 {
    body.bytes().fold(0u8, |acc, b| acc ^ b)
}

/// Parse one line into a `Sentence`.
pub fn parse_sentence(line: &str) -> Result<Sentence, DecodeError> {
    let line = line.trim();

    let rest = line
        .strip_prefix(SENTENCE_START)
        .ok_or_else(|| DecodeError::parse("missing sentence start marker"))?;

    let (body, sum) = rest
        .rsplit_once('*')
        .ok_or_else(|| DecodeError::parse("missing checksum delimiter"))?;

    if sum.len() != 2 {
        return Err(DecodeError::parse(format!("malformed checksum {sum:?}")));
    }
    let expected = u8::from_str_radix(sum, 16)
        .map_err(|_| DecodeError::parse(format!("malformed checksum {sum:?}")))?;

    let fields: Vec<&str> = body.split(',').collect();
    if fields.len() < FIELD_COUNT {
        return Err(DecodeError::parse(format!(
            "expected {FIELD_COUNT} fields, got {}",
            fields.len()
        )));
    }

    let header = fields[0];
    if header.len() != 5 || !header.is_ascii() {
        return Err(DecodeError::parse(format!("malformed header {header:?}")));
    }

    let fragment_count = parse_int(fields[1], "fragment count")?;
    let fragment_number = parse_int(fields[2], "fragment number")?;
    let fill_bits: u8 = fields[6]
        .parse()
        .map_err(|_| DecodeError::parse(format!("malformed fill bits {:?}", fields[6])))?;

    let actual = checksum(body);
    if actual != expected {
        return Err(DecodeError::invalid(format!(
            "checksum mismatch: expected {expected:02X}, computed {actual:02X}"
        )));
    }

    if fill_bits > 5 {
        return Err(DecodeError::invalid(format!("fill bits {fill_bits} out of range")));
    }

    let (talker, sentence_type) = header.split_at(2);
    if !SUPPORTED_TYPES.contains(&sentence_type) {
        return Err(DecodeError::unsupported(format!(
            "sentence type {sentence_type}"
        )));
    }

    Ok(Sentence {
        talker: talker.to_string(),
        sentence_type: sentence_type.to_string(),
        fragment_count,
        fragment_number,
        sequence_id: fields[3].to_string(),
        channel: fields[4].to_string(),
        payload: fields[5].to_string(),
        fill_bits,
    })
}

fn parse_int(field: &str, what: &str) -> Result<i32, DecodeError> {
    field
        .trim()
        .parse()
        .map_err(|_| DecodeError::parse(format!("malformed {what} {field:?}")))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DecodeErrorKind;

    fn with_checksum(body: &str) -> String {
        format!("!{body}*{:02X}", checksum(body))
    }

    #[test]
    fn test_parse_single_fragment() {
        let line = "!AIVDM,1,1,,B,177KQJ5000G?tO`K>RA1wUbN0TKH,0*5C";
        let s = parse_sentence(line).unwrap();
        assert_eq!(s.talker, "AI");
        assert_eq!(s.sentence_type, "VDM");
        assert_eq!(s.fragment_count, 1);
        assert_eq!(s.fragment_number, 1);
        assert_eq!(s.sequence_id, "");
        assert_eq!(s.channel, "B");
        assert_eq!(s.payload, "177KQJ5000G?tO`K>RA1wUbN0TKH");
        assert_eq!(s.fill_bits, 0);
        assert!(s.is_single());
    }

    #[test]
    fn test_parse_fragment_fields() {
        let line = with_checksum("AIVDM,2,1,3,A,55P5TL01VIaAL@7WKO@mBplU@<PDhh000000001S;AJ::4A80?4i@E53,0");
        let s = parse_sentence(&line).unwrap();
        assert_eq!(s.fragment_count, 2);
        assert_eq!(s.fragment_number, 1);
        assert_eq!(s.sequence_id, "3");
        assert_eq!(s.channel, "A");
        assert!(!s.is_single());
    }

    #[test]
    fn test_trailing_whitespace_ignored() {
        let line = format!("{}\r\n", with_checksum("AIVDM,1,1,,A,15M67FC000G?ufbE`FepT@3n00Sa,0"));
        assert!(parse_sentence(&line).is_ok());
    }

    #[test]
    fn test_vdo_accepted() {
        let line = with_checksum("AIVDO,1,1,,A,15M67FC000G?ufbE`FepT@3n00Sa,0");
        assert_eq!(parse_sentence(&line).unwrap().sentence_type, "VDO");
    }

    #[test]
    fn test_checksum_mismatch_is_invalid() {
        let line = "!AIVDM,1,1,,B,177KQJ5000G?tO`K>RA1wUbN0TKH,0*00";
        let err = parse_sentence(line).unwrap_err();
        assert_eq!(err.kind, DecodeErrorKind::InvalidMessage);
    }

    #[test]
    fn test_missing_checksum_is_parse_error() {
        let err = parse_sentence("!AIVDM,1,1,,B,177KQJ5000G?tO`K>RA1wUbN0TKH,0").unwrap_err();
        assert_eq!(err.kind, DecodeErrorKind::Parse);
    }

    #[test]
    fn test_too_few_fields_is_parse_error() {
        let err = parse_sentence(&with_checksum("AIVDM,1,1,,B")).unwrap_err();
        assert_eq!(err.kind, DecodeErrorKind::Parse);
    }

    #[test]
    fn test_non_numeric_count_is_parse_error() {
        let err =
            parse_sentence(&with_checksum("AIVDM,x,1,,B,177KQJ5000G?tO`K>RA1wUbN0TKH,0")).unwrap_err();
        assert_eq!(err.kind, DecodeErrorKind::Parse);
    }

    #[test]
    fn test_negative_count_parses() {
        let s = parse_sentence(&with_checksum("AIVDM,-1,1,,B,177KQJ5000G?tO`K>RA1wUbN0TKH,0")).unwrap();
        assert_eq!(s.fragment_count, -1);
    }

    #[test]
    fn test_unsupported_sentence_type() {
        let err = parse_sentence(&with_checksum("GPGGA,1,1,,B,x,0")).unwrap_err();
        assert_eq!(err.kind, DecodeErrorKind::UnsupportedType);
    }

    #[test]
    fn test_missing_start_marker() {
        let err = parse_sentence("$AIVDM,1,1,,B,x,0*00").unwrap_err();
        assert_eq!(err.kind, DecodeErrorKind::Parse);
    }
}
