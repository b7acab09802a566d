//! Test vector builders: pack fields into six-bit armored payloads and wrap
//! them in checksummed sentences.
//!
//! Compiled for this crate's tests and, with the `test-helpers` feature, for
//! downstream crates' tests.

use crate::sentence::checksum;
use crate::types::Mmsi;

/// Bit-level payload builder, the inverse of `decode::unarmor`.
#[derive(Debug, Default)]
pub struct PayloadWriter {
    bits: Vec<bool>,
}

impl PayloadWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// `width` low bits of `value`, most significant first. At most 64 bits;
    /// use `zeros` for wider spare fields.
    pub fn uint(&mut self, value: u64, width: usize) -> &mut Self {
        assert!(width <= 64, "uint field of {width} bits; use zeros()");
        for i in (0..width).rev() {
            self.bits.push((value >> i) & 1 == 1);
        }
        self
    }

    /// `width` zero bits.
    pub fn zeros(&mut self, width: usize) -> &mut Self {
        self.bits.resize(self.bits.len() + width, false);
        self
    }

    pub fn int(&mut self, value: i64, width: usize) -> &mut Self {
        let mask = if width == 64 { u64::MAX } else { (1u64 << width) - 1 };
        self.uint(value as u64 & mask, width)
    }

    /// Six-bit text, padded with `@` to `chars` characters.
    pub fn text(&mut self, s: &str, chars: usize) -> &mut Self {
        let mut bytes: Vec<u8> = s.bytes().take(chars).collect();
        bytes.resize(chars, b'@');
        for b in bytes {
            let b = b.to_ascii_uppercase();
            let v = if b >= 64 { b - 64 } else { b };
            self.uint((v & 0x3F) as u64, 6);
        }
        self
    }

    /// Armor the payload. Returns the payload string and its fill-bit count.
    pub fn finish(&self) -> (String, u8) {
        let fill = (6 - self.bits.len() % 6) % 6;
        let mut bits = self.bits.clone();
        bits.extend(std::iter::repeat(false).take(fill));

        let payload = bits
            .chunks(6)
            .map(|chunk| {
                let v = chunk.iter().fold(0u8, |acc, &b| (acc << 1) | b as u8);
                (if v < 40 { v + 48 } else { v + 56 }) as char
            })
            .collect();
        (payload, fill as u8)
    }

    /// Type 1 position report.
    pub fn position_report(mmsi: Mmsi, lat: f64, lon: f64, sog: f64, cog: f64) -> (String, u8) {
        let mut w = PayloadWriter::new();
        w.uint(1, 6)
            .uint(0, 2)
            .uint(mmsi as u64, 30)
            .uint(0, 4)
            .int(-128, 8)
            .uint((sog * 10.0).round() as u64, 10)
            .uint(1, 1)
            .int((lon * 600_000.0).round() as i64, 28)
            .int((lat * 600_000.0).round() as i64, 27)
            .uint((cog * 10.0).round() as u64, 12)
            .uint(511, 9)
            .uint(60, 6)
            .uint(0, 25);
        w.finish()
    }

    /// Type 19 extended class B position report with a name.
    pub fn extended_class_b_position(
        mmsi: Mmsi,
        lat: f64,
        lon: f64,
        sog: f64,
        cog: f64,
        name: &str,
    ) -> (String, u8) {
        let mut w = PayloadWriter::new();
        w.uint(19, 6)
            .uint(0, 2)
            .uint(mmsi as u64, 30)
            .uint(0, 8)
            .uint((sog * 10.0).round() as u64, 10)
            .uint(0, 1)
            .int((lon * 600_000.0).round() as i64, 28)
            .int((lat * 600_000.0).round() as i64, 27)
            .uint((cog * 10.0).round() as u64, 12)
            .uint(511, 9)
            .uint(60, 6)
            .uint(0, 4)
            .text(name, 20)
            .uint(37, 8)
            .uint(0, 30)
            .uint(1, 4)
            .uint(0, 1)
            .uint(1, 1)
            .uint(0, 1)
            .uint(0, 4);
        w.finish()
    }

    /// Type 5 static and voyage data (424 bits).
    pub fn ship_and_voyage(mmsi: Mmsi, callsign: &str, name: &str) -> (String, u8) {
        let mut w = PayloadWriter::new();
        w.uint(5, 6)
            .uint(0, 2)
            .uint(mmsi as u64, 30)
            .uint(0, 2)
            .uint(9_000_001, 30)
            .text(callsign, 7)
            .text(name, 20)
            .uint(70, 8)
            .uint(0, 30)
            .uint(1, 4)
            .uint(0, 20)
            .uint(0, 8)
            .text("", 20)
            .uint(0, 1)
            .uint(0, 1);
        w.finish()
    }

    /// Type 24 part A (name).
    pub fn class_b_static_name(mmsi: Mmsi, name: &str) -> (String, u8) {
        let mut w = PayloadWriter::new();
        w.uint(24, 6)
            .uint(0, 2)
            .uint(mmsi as u64, 30)
            .uint(0, 2)
            .text(name, 20);
        w.finish()
    }

    /// Type 24 part B (callsign).
    pub fn class_b_static_callsign(mmsi: Mmsi, callsign: &str) -> (String, u8) {
        let mut w = PayloadWriter::new();
        w.uint(24, 6)
            .uint(0, 2)
            .uint(mmsi as u64, 30)
            .uint(1, 2)
            .uint(37, 8)
            .text("ACME", 3)
            .uint(0, 4)
            .uint(0, 20)
            .text(callsign, 7)
            .uint(0, 30)
            .uint(0, 6);
        w.finish()
    }

    /// Single-sentence type 1 position report.
    pub fn position_sentence(
        mmsi: Mmsi,
        lat: f64,
        lon: f64,
        sog: f64,
        cog: f64,
        channel: &str,
    ) -> String {
        let (payload, fill) = Self::position_report(mmsi, lat, lon, sog, cog);
        format_sentence(1, 1, "", channel, &payload, fill)
    }

    /// Type 5 split across two sentences, as transmitters send it.
    pub fn ship_and_voyage_sentences(
        mmsi: Mmsi,
        callsign: &str,
        name: &str,
        channel: &str,
    ) -> Vec<String> {
        let (payload, fill) = Self::ship_and_voyage(mmsi, callsign, name);
        let (first, second) = payload.split_at(60);
        vec![
            format_sentence(2, 1, "1", channel, first, 0),
            format_sentence(2, 2, "1", channel, second, fill),
        ]
    }
}

/// Wrap a payload in a checksummed `!AIVDM` sentence.
pub fn format_sentence(
    count: i32,
    number: i32,
    sequence_id: &str,
    channel: &str,
    payload: &str,
    fill_bits: u8,
) -> String {
    let body = format!("AIVDM,{count},{number},{sequence_id},{channel},{payload},{fill_bits}");
    format!("!{body}*{:02X}", checksum(&body))
}
