//! Decode six-bit armored AIS payloads into typed vessel reports.
//!
//! Handles the message types that carry vessel position or identity:
//! - Type 1-3:  Class A position report (lat/lon, SOG, COG)
//! - Type 5:    Static and voyage data (callsign, name)
//! - Type 18:   Class B position report
//! - Type 19:   Extended class B position report (position + name)
//! - Type 24:   Class B static data (part A name, part B callsign)
//! - Type 27:   Long-range broadcast (coarse position)
//!
//! Everything else is reported as unsupported.

use crate::sentence::Sentence;
use crate::types::{
    DecodeError, DynamicReport, IdentityReport, MessageType, Mmsi, VesselReport, SIXBIT_CHARSET,
};

// ---------------------------------------------------------------------------
// Not-available sentinels
// ---------------------------------------------------------------------------

/// Longitude 181 degrees in 1/10000 minute (types 1-3, 18, 19).
const LON_NOT_AVAILABLE: i64 = 181 * 600_000;
/// Latitude 91 degrees in 1/10000 minute.
const LAT_NOT_AVAILABLE: i64 = 91 * 600_000;
/// Longitude 181 degrees in 1/10 minute (type 27).
const LON_NOT_AVAILABLE_COARSE: i64 = 181 * 600;
/// Latitude 91 degrees in 1/10 minute (type 27).
const LAT_NOT_AVAILABLE_COARSE: i64 = 91 * 600;
/// SOG 102.3 knots in 1/10 knot.
const SOG_NOT_AVAILABLE: u64 = 1023;
/// COG 360 degrees in 1/10 degree.
const COG_NOT_AVAILABLE: u64 = 3600;

// ---------------------------------------------------------------------------
// Payload bits
// ---------------------------------------------------------------------------

/// De-armored payload, one six-bit value per character.
#[derive(Debug, Clone)]
pub struct PayloadBits {
    sextets: Vec<u8>,
    len: usize,
}

impl PayloadBits {
    /// Number of usable bits (fill bits excluded).
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn bit(&self, i: usize) -> u64 {
        ((self.sextets[i / 6] >> (5 - i % 6)) & 1) as u64
    }

    fn require(&self, end: usize, what: &str) -> Result<(), DecodeError> {
        if self.len < end {
            return Err(DecodeError::invalid(format!(
                "{what}: need {end} bits, got {}",
                self.len
            )));
        }
        Ok(())
    }

    /// Unsigned field of `width` bits starting at `start`. Caller checks bounds.
    pub fn uint(&self, start: usize, width: usize) -> u64 {
        (start..start + width).fold(0u64, |acc, i| (acc << 1) | self.bit(i))
    }

    /// Two's-complement signed field.
    pub fn int(&self, start: usize, width: usize) -> i64 {
        let raw = self.uint(start, width);
        let shift = 64 - width as u32;
        ((raw << shift) as i64) >> shift
    }

    /// Six-bit text field of `chars` characters. `@` padding and surrounding
    /// spaces are stripped; an empty result is `None`.
    pub fn text(&self, start: usize, chars: usize) -> Option<String> {
        let mut s = String::with_capacity(chars);
        for c in 0..chars {
            let idx = self.uint(start + c * 6, 6) as usize;
            s.push(SIXBIT_CHARSET[idx] as char);
        }
        let cleaned = match s.find('@') {
            Some(end) => &s[..end],
            None => s.as_str(),
        };
        let cleaned = cleaned.trim();
        if cleaned.is_empty() {
            None
        } else {
            Some(cleaned.to_string())
        }
    }
}

/// Convert one armor character to its six-bit value.
fn sextet(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'W' | b'`'..=b'w' => {
            let v = c - 48;
            Some(if v > 40 { v - 8 } else { v })
        }
        _ => None,
    }
}

/// De-armor a payload string, dropping `fill_bits` trailing bits.
pub fn unarmor(payload: &str, fill_bits: u8) -> Result<PayloadBits, DecodeError> {
    if payload.is_empty() {
        return Err(DecodeError::invalid("empty payload"));
    }

    let mut sextets = Vec::with_capacity(payload.len());
    for c in payload.bytes() {
        let v = sextet(c).ok_or_else(|| {
            DecodeError::invalid(format!("invalid payload character {:?}", c as char))
        })?;
        sextets.push(v);
    }

    let total = sextets.len() * 6;
    let len = total.saturating_sub(fill_bits as usize);
    Ok(PayloadBits { sextets, len })
}

// ---------------------------------------------------------------------------
// Field helpers
// ---------------------------------------------------------------------------

fn coordinate(raw: i64, not_available: i64, per_degree: f64, limit: f64) -> Option<f64> {
    if raw == not_available {
        return None;
    }
    let deg = raw as f64 / per_degree;
    if deg.abs() > limit {
        None
    } else {
        Some(deg)
    }
}

fn speed_tenths(raw: u64) -> Option<f64> {
    if raw == SOG_NOT_AVAILABLE {
        None
    } else {
        Some(raw as f64 / 10.0)
    }
}

fn course_tenths(raw: u64) -> Option<f64> {
    if raw >= COG_NOT_AVAILABLE {
        None
    } else {
        Some(raw as f64 / 10.0)
    }
}

fn mmsi(bits: &PayloadBits) -> Mmsi {
    bits.uint(8, 30) as Mmsi
}

// ---------------------------------------------------------------------------
// Per-type decoders
// ---------------------------------------------------------------------------

/// Types 1, 2, 3: Class A position report.
pub fn decode_class_a_position(
    bits: &PayloadBits,
    message_type: MessageType,
) -> Result<DynamicReport, DecodeError> {
    bits.require(128, "class A position report")?;

    Ok(DynamicReport {
        mmsi: mmsi(bits),
        message_type,
        speed_kts: speed_tenths(bits.uint(50, 10)),
        longitude: coordinate(bits.int(61, 28), LON_NOT_AVAILABLE, 600_000.0, 180.0),
        latitude: coordinate(bits.int(89, 27), LAT_NOT_AVAILABLE, 600_000.0, 90.0),
        course_deg: course_tenths(bits.uint(116, 12)),
        name: None,
    })
}

/// Types 18 and 19: Class B position report. Type 19 also carries the name.
pub fn decode_class_b_position(
    bits: &PayloadBits,
    message_type: MessageType,
) -> Result<DynamicReport, DecodeError> {
    let extended = message_type == MessageType::ExtendedClassBCSPositionReport;
    if extended {
        bits.require(263, "extended class B position report")?;
    } else {
        bits.require(124, "class B position report")?;
    }

    Ok(DynamicReport {
        mmsi: mmsi(bits),
        message_type,
        speed_kts: speed_tenths(bits.uint(46, 10)),
        longitude: coordinate(bits.int(57, 28), LON_NOT_AVAILABLE, 600_000.0, 180.0),
        latitude: coordinate(bits.int(85, 27), LAT_NOT_AVAILABLE, 600_000.0, 90.0),
        course_deg: course_tenths(bits.uint(112, 12)),
        name: if extended { bits.text(143, 20) } else { None },
    })
}

/// Type 27: long-range broadcast. Coarse 1/10 minute position, whole knots/degrees.
pub fn decode_long_range(bits: &PayloadBits) -> Result<DynamicReport, DecodeError> {
    bits.require(94, "long-range broadcast")?;

    let speed = bits.uint(79, 6);
    let course = bits.uint(85, 9);

    Ok(DynamicReport {
        mmsi: mmsi(bits),
        message_type: MessageType::LongRangeBroadcastMessage,
        longitude: coordinate(bits.int(44, 18), LON_NOT_AVAILABLE_COARSE, 600.0, 180.0),
        latitude: coordinate(bits.int(62, 17), LAT_NOT_AVAILABLE_COARSE, 600.0, 90.0),
        speed_kts: if speed == 63 { None } else { Some(speed as f64) },
        course_deg: if course >= 360 { None } else { Some(course as f64) },
        name: None,
    })
}

/// Type 5: static and voyage related data.
pub fn decode_ship_and_voyage(bits: &PayloadBits) -> Result<IdentityReport, DecodeError> {
    bits.require(232, "ship and voyage data")?;

    Ok(IdentityReport {
        mmsi: mmsi(bits),
        message_type: MessageType::ShipAndVoyageData,
        callsign: bits.text(70, 7),
        name: bits.text(112, 20),
    })
}

/// Type 24: class B static data. Part A carries the name, part B the callsign.
pub fn decode_class_b_static(bits: &PayloadBits) -> Result<IdentityReport, DecodeError> {
    bits.require(40, "class B static data")?;

    let part = bits.uint(38, 2);
    let (name, callsign) = match part {
        0 => {
            bits.require(160, "class B static data part A")?;
            (bits.text(40, 20), None)
        }
        1 => {
            bits.require(132, "class B static data part B")?;
            (None, bits.text(90, 7))
        }
        other => {
            return Err(DecodeError::invalid(format!(
                "class B static data part number {other}"
            )))
        }
    };

    Ok(IdentityReport {
        mmsi: mmsi(bits),
        message_type: MessageType::ClassBCSStaticDataReport,
        name,
        callsign,
    })
}

// ---------------------------------------------------------------------------
// Main decode functions
// ---------------------------------------------------------------------------

/// Decode an already de-armored payload.
///
/// Routes to the correct decoder based on the 6-bit message type.
pub fn decode_bits(bits: &PayloadBits) -> Result<VesselReport, DecodeError> {
    bits.require(38, "message header")?;

    let number = bits.uint(0, 6) as u8;
    let message_type = MessageType::from_number(number)
        .ok_or_else(|| DecodeError::unsupported(format!("message type {number}")))?;

    match number {
        1..=3 => decode_class_a_position(bits, message_type).map(VesselReport::Dynamic),
        5 => decode_ship_and_voyage(bits).map(VesselReport::Identity),
        18 | 19 => decode_class_b_position(bits, message_type).map(VesselReport::Dynamic),
        24 => decode_class_b_static(bits).map(VesselReport::Identity),
        27 => decode_long_range(bits).map(VesselReport::Dynamic),
        _ => Err(DecodeError::unsupported(format!("message type {number}"))),
    }
}

/// Decode a complete message from its ordered fragments.
///
/// Payloads are concatenated in order; fill bits come from the last fragment.
pub fn decode(fragments: &[Sentence]) -> Result<VesselReport, DecodeError> {
    let last = fragments
        .last()
        .ok_or_else(|| DecodeError::invalid("no fragments"))?;

    let payload: String = fragments.iter().map(|s| s.payload.as_str()).collect();
    let bits = unarmor(&payload, last.fill_bits)?;
    decode_bits(&bits)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
