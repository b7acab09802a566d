//! KML 2.2 rendering of a registry snapshot.
//!
//! One `<Placemark>` per vessel with a known position. The description is
//! text with literal `<br>` separators, escaped like any other character
//! data; map clients unescape and render it as HTML.

use std::fmt::Write;

use crate::registry::VesselRecord;
use crate::types::mmsi_to_string;

pub const KML_NAMESPACE: &str = "http://www.opengis.net/kml/2.2";

/// Placeholder for any field the vessel has not reported.
pub const UNKNOWN: &str = "(unknown)";

/// Render a complete KML document.
pub fn render_kml(records: &[VesselRecord]) -> String {
    let mut out = String::with_capacity(256 + records.len() * 512);
    out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    let _ = writeln!(out, "<kml xmlns=\"{KML_NAMESPACE}\">");
    out.push_str("<Document>\n");
    for record in records {
        write_placemark(&mut out, record);
    }
    out.push_str("</Document>\n");
    out.push_str("</kml>\n");
    out
}

/// Append one placemark. Vessels without a position are skipped.
fn write_placemark(out: &mut String, record: &VesselRecord) {
    let (Some(lat), Some(lon)) = (record.latitude, record.longitude) else {
        return;
    };
    let mmsi = mmsi_to_string(record.mmsi);

    let label = record.name.as_deref().unwrap_or(&mmsi);

    let mut desc = String::new();
    let _ = write!(desc, "Name: {}<br>", record.name.as_deref().unwrap_or(UNKNOWN));
    let _ = write!(desc, "MMSI: {mmsi}<br>");
    let _ = write!(desc, "Callsign: {}<br>", record.callsign.as_deref().unwrap_or(UNKNOWN));
    let _ = write!(desc, "Latitude: {lat:.6}<br>");
    let _ = write!(desc, "Longitude: {lon:.6}<br>");
    let _ = write!(desc, "Speed: {}<br>", with_unit(record.speed_kts, " kn"));
    let _ = write!(desc, "Heading: {}<br>", with_unit(record.course_deg, "˚"));
    let _ = write!(desc, "Updated: {}<br>", record.updated.format("%H:%M:%SZ"));

    out.push_str("<Placemark>\n");
    let _ = writeln!(out, "<name>{}</name>", escape(label));
    let _ = writeln!(
        out,
        "<Point><coordinates>{lon:.6},{lat:.6},0</coordinates></Point>"
    );
    let _ = writeln!(out, "<description>{}</description>", escape(&desc));
    out.push_str("</Placemark>\n");
}

fn with_unit(value: Option<f64>, unit: &str) -> String {
    match value {
        Some(v) => format!("{v:.1}{unit}"),
        None => UNKNOWN.to_string(),
    }
}

/// Escape XML character data.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn record(mmsi: u32) -> VesselRecord {
        let mut r = VesselRecord::new(mmsi, Utc.with_ymd_and_hms(2024, 5, 1, 8, 15, 30).unwrap());
        r.latitude = Some(47.582833);
        r.longitude = Some(-122.345833);
        r
    }

    #[test]
    fn test_empty_document() {
        let doc = render_kml(&[]);
        assert!(doc.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(doc.contains("<kml xmlns=\"http://www.opengis.net/kml/2.2\">"));
        assert!(doc.contains("<Document>\n</Document>"));
        assert!(!doc.contains("<Placemark>"));
    }

    #[test]
    fn test_placemark_fields() {
        let mut r = record(123456789);
        r.name = Some("NORDIC STAR".into());
        r.callsign = Some("LAXY3".into());
        r.speed_kts = Some(12.3);
        r.course_deg = Some(271.0);

        let doc = render_kml(&[r]);
        assert_eq!(doc.matches("<Placemark>").count(), 1);
        assert!(doc.contains("<name>NORDIC STAR</name>"));
        assert!(doc.contains("<coordinates>-122.345833,47.582833,0</coordinates>"));
        assert!(doc.contains("Name: NORDIC STAR&lt;br&gt;"));
        assert!(doc.contains("MMSI: 123456789&lt;br&gt;"));
        assert!(doc.contains("Callsign: LAXY3&lt;br&gt;"));
        assert!(doc.contains("Latitude: 47.582833&lt;br&gt;"));
        assert!(doc.contains("Longitude: -122.345833&lt;br&gt;"));
        assert!(doc.contains("Speed: 12.3 kn&lt;br&gt;"));
        assert!(doc.contains("Heading: 271.0˚&lt;br&gt;"));
        assert!(doc.contains("Updated: 08:15:30Z&lt;br&gt;"));
    }

    #[test]
    fn test_unknown_fields() {
        let doc = render_kml(&[record(2579999)]);
        assert!(doc.contains("<name>002579999</name>"));
        assert!(doc.contains("Name: (unknown)"));
        assert!(doc.contains("Callsign: (unknown)"));
        assert!(doc.contains("Speed: (unknown)"));
        assert!(doc.contains("Heading: (unknown)"));
    }

    #[test]
    fn test_vessel_without_position_omitted() {
        let mut no_lon = record(1);
        no_lon.longitude = None;
        let mut no_lat = record(2);
        no_lat.latitude = None;
        let doc = render_kml(&[no_lon, no_lat, record(3)]);
        assert_eq!(doc.matches("<Placemark>").count(), 1);
        assert!(doc.contains("<name>000000003</name>"));
    }

    #[test]
    fn test_name_escaped() {
        let mut r = record(1);
        r.name = Some("R&D <TEST>".into());
        let doc = render_kml(&[r]);
        assert!(doc.contains("<name>R&amp;D &lt;TEST&gt;</name>"));
    }
}
