//! Ingestion loop: one sentence per line from an input stream into the
//! vessel registry and identity caches, with a line-oriented activity log.
//!
//! Runs on a single blocking thread. Lines are handled in arrival order:
//! parse, reassemble per channel, decode, merge, persist identity fields,
//! log. Any per-line failure is logged and skipped.

use std::fmt::Display;
use std::io::{self, BufRead, Write};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;

use ais_core::decode::decode;
use ais_core::reassembly::{FragmentReassembler, Reassembly};
use ais_core::registry::VesselRegistry;
use ais_core::sentence::{parse_sentence, Sentence, SENTENCE_START};
use ais_core::types::{mmsi_to_string, Channel, DecodeError, MessageType, Mmsi, VesselReport};

use crate::store::{PersistentCache, StoreError};

/// Indent of detail lines under a header or error line.
pub const INDENT: &str = "      ";

/// Activity log timestamp format (UTC).
pub const TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("activity log: {0}")]
    Io(#[from] io::Error),
}

/// Counters reported when ingestion ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStats {
    /// Lines read, including ignored ones
    pub lines: u64,
    /// Lines starting with the sentence marker
    pub sentences: u64,
    /// Complete reports applied to the registry
    pub reports: u64,
    /// Error entries written to the activity log
    pub errors: u64,
}

// ---------------------------------------------------------------------------
// Activity log
// ---------------------------------------------------------------------------

/// Writer for the activity log format.
pub struct ActivityLog<W: Write> {
    out: W,
}

impl<W: Write> ActivityLog<W> {
    pub fn new(out: W) -> Self {
        ActivityLog { out }
    }

    /// `<now> <MessageType> <mmsi>`
    pub fn header(&mut self, now: DateTime<Utc>, message_type: MessageType, mmsi: Mmsi) -> io::Result<()> {
        writeln!(
            self.out,
            "{} {} {}",
            now.format(TIME_FORMAT),
            message_type,
            mmsi_to_string(mmsi)
        )
    }

    /// Indented detail line under the previous header.
    pub fn detail(&mut self, text: &str) -> io::Result<()> {
        writeln!(self.out, "{INDENT}{text}")
    }

    /// `<now> *Error* <reason>`, then the offending line indented.
    pub fn error(&mut self, now: DateTime<Utc>, reason: &dyn Display, line: &str) -> io::Result<()> {
        writeln!(self.out, "{} *Error* {}", now.format(TIME_FORMAT), reason)?;
        if !line.is_empty() {
            self.detail(line)?;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out
    }
}

fn format_coordinate(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{v:.6}"),
        None => "(unknown)".to_string(),
    }
}

// ---------------------------------------------------------------------------
// Ingestor
// ---------------------------------------------------------------------------

/// Per-run ingestion state: fragment buffers, caches, and counters.
pub struct Ingestor {
    registry: Arc<VesselRegistry>,
    names: PersistentCache,
    calls: PersistentCache,
    reassembler: FragmentReassembler<Sentence>,
    stats: IngestStats,
}

impl Ingestor {
    pub fn new(registry: Arc<VesselRegistry>, names: PersistentCache, calls: PersistentCache) -> Self {
        Ingestor {
            registry,
            names,
            calls,
            reassembler: FragmentReassembler::new(),
            stats: IngestStats::default(),
        }
    }

    pub fn stats(&self) -> IngestStats {
        self.stats
    }

    /// Read `input` to end of stream, stamping each line with the current time.
    pub fn run<R: BufRead, W: Write>(
        &mut self,
        mut input: R,
        log: &mut ActivityLog<W>,
    ) -> Result<IngestStats, IngestError> {
        let mut buf = Vec::new();
        loop {
            buf.clear();
            if input.read_until(b'\n', &mut buf)? == 0 {
                break;
            }
            let line = String::from_utf8_lossy(&buf);
            let line = line.trim_end_matches(['\r', '\n']);
            self.process_line(line, Utc::now(), log)?;
        }
        log.flush()?;
        Ok(self.stats)
    }

    /// Handle one input line received at `now`.
    pub fn process_line<W: Write>(
        &mut self,
        line: &str,
        now: DateTime<Utc>,
        log: &mut ActivityLog<W>,
    ) -> Result<(), IngestError> {
        self.stats.lines += 1;
        if !line.starts_with(SENTENCE_START) {
            return Ok(());
        }
        self.stats.sentences += 1;

        self.handle_sentence(line, now, log)?;

        let purged = self.registry.purge_stale(now);
        if purged > 0 {
            tracing::debug!(purged, "purged stale vessels");
        }
        Ok(())
    }

    fn handle_sentence<W: Write>(
        &mut self,
        line: &str,
        now: DateTime<Utc>,
        log: &mut ActivityLog<W>,
    ) -> Result<(), IngestError> {
        let sentence = match parse_sentence(line) {
            Ok(s) => s,
            Err(e) => return self.reject_decode(&e, line, now, log),
        };

        let Some(channel) = Channel::from_code(&sentence.channel) else {
            let reason = format!("Invalid channel code {}", sentence.channel);
            return self.reject(&reason, line, now, log);
        };

        let number = sentence.fragment_number;
        let count = sentence.fragment_count;
        let fragments = match self.reassembler.submit(channel, number, count, sentence) {
            Reassembly::Incomplete => return Ok(()),
            Reassembly::Rejected(e) => return self.reject(&e, line, now, log),
            Reassembly::Complete(fragments) => fragments,
        };

        match decode(&fragments) {
            Ok(report) => self.apply(&report, now, log),
            Err(e) => self.reject_decode(&e, line, now, log),
        }
    }

    fn apply<W: Write>(
        &mut self,
        report: &VesselReport,
        now: DateTime<Utc>,
        log: &mut ActivityLog<W>,
    ) -> Result<(), IngestError> {
        let mmsi = report.mmsi();
        let key = mmsi_to_string(mmsi);
        self.stats.reports += 1;
        log.header(now, report.message_type(), mmsi)?;

        if self.registry.merge(report, now) {
            let name = self.names.get(&key)?;
            let callsign = self.calls.get(&key)?;
            self.registry
                .remember_identity(mmsi, name.as_deref(), callsign.as_deref());
        }

        match report {
            VesselReport::Identity(r) => {
                let mut parts = Vec::new();
                if let Some(name) = &r.name {
                    self.names.put(&key, name)?;
                    parts.push(format!("Name = {name}"));
                }
                if let Some(callsign) = &r.callsign {
                    self.calls.put(&key, callsign)?;
                    parts.push(format!("Callsign = {callsign}"));
                }
                if !parts.is_empty() {
                    log.detail(&parts.join(", "))?;
                }
            }
            VesselReport::Dynamic(r) => {
                let name = self.registry.ship_name(mmsi);
                let prefix = name.map(|n| format!("{n} ")).unwrap_or_default();
                log.detail(&format!(
                    "{prefix}@ {}, {}",
                    format_coordinate(r.latitude),
                    format_coordinate(r.longitude)
                ))?;
            }
        }
        Ok(())
    }

    fn reject_decode<W: Write>(
        &mut self,
        err: &DecodeError,
        line: &str,
        now: DateTime<Utc>,
        log: &mut ActivityLog<W>,
    ) -> Result<(), IngestError> {
        tracing::debug!(error = %err, "decode failed");
        self.reject(&err.kind, line, now, log)
    }

    fn reject<W: Write>(
        &mut self,
        reason: &dyn Display,
        line: &str,
        now: DateTime<Utc>,
        log: &mut ActivityLog<W>,
    ) -> Result<(), IngestError> {
        self.stats.errors += 1;
        log.error(now, reason, line)?;
        Ok(())
    }

    /// Release both caches. Returns the total write count.
    pub fn close(self) -> u64 {
        self.names.close() + self.calls.close()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use ais_core::testing::{format_sentence, PayloadWriter};
    use chrono::TimeZone;

    use crate::store::StoreEnv;

    struct Harness {
        ingestor: Ingestor,
        registry: Arc<VesselRegistry>,
        log: ActivityLog<Vec<u8>>,
        env: StoreEnv,
        _dir: tempfile::TempDir,
    }

    impl Harness {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            Self::in_dir(dir)
        }

        fn in_dir(dir: tempfile::TempDir) -> Self {
            let env = StoreEnv::open(dir.path()).unwrap();
            let registry = Arc::new(VesselRegistry::new());
            let ingestor = Ingestor::new(
                Arc::clone(&registry),
                env.cache("names").unwrap(),
                env.cache("calls").unwrap(),
            );
            Harness {
                ingestor,
                registry,
                log: ActivityLog::new(Vec::new()),
                env,
                _dir: dir,
            }
        }

        fn feed(&mut self, line: &str) {
            self.ingestor.process_line(line, t0(), &mut self.log).unwrap();
        }

        fn output(&self) -> String {
            String::from_utf8(self.log.out.clone()).unwrap()
        }
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn static_name_sentence(mmsi: Mmsi, name: &str) -> String {
        let (payload, fill) = PayloadWriter::class_b_static_name(mmsi, name);
        format_sentence(1, 1, "", "A", &payload, fill)
    }

    #[test]
    fn test_identity_then_position() {
        let mut h = Harness::new();
        h.feed(&static_name_sentence(123456789, "NORDIC STAR"));
        h.feed(&PayloadWriter::position_sentence(123456789, 47.5, -122.25, 10.0, 90.0, "A"));

        assert_eq!(
            h.output(),
            "2024-05-01T12:00:00Z ClassBCSStaticDataReport 123456789\n\
             \x20     Name = NORDIC STAR\n\
             2024-05-01T12:00:00Z PositionReportClassAScheduled 123456789\n\
             \x20     NORDIC STAR @ 47.500000, -122.250000\n"
        );

        let rec = h.registry.get(123456789).unwrap();
        assert_eq!(rec.name.as_deref(), Some("NORDIC STAR"));
        assert_eq!(rec.latitude, Some(47.5));
        assert_eq!(h.ingestor.stats().reports, 2);
    }

    #[test]
    fn test_position_without_name() {
        let mut h = Harness::new();
        h.feed(&PayloadWriter::position_sentence(2579999, -33.9, 18.4, 0.0, 0.0, "B"));
        assert_eq!(
            h.output(),
            "2024-05-01T12:00:00Z PositionReportClassAScheduled 002579999\n\
             \x20     @ -33.900000, 18.400000\n"
        );
    }

    #[test]
    fn test_real_sentence() {
        let mut h = Harness::new();
        h.feed("!AIVDM,1,1,,B,177KQJ5000G?tO`K>RA1wUbN0TKH,0*5C");
        let out = h.output();
        assert!(out.starts_with("2024-05-01T12:00:00Z PositionReportClassAScheduled 477553000\n"));
        assert!(out.contains("@ 47.582833, -122.345833"));
    }

    #[test]
    fn test_fragmented_identity_persisted() {
        let mut h = Harness::new();
        for line in PayloadWriter::ship_and_voyage_sentences(235000001, "GBXY", "ISLAND QUEEN", "B") {
            h.feed(&line);
        }
        assert_eq!(
            h.output(),
            "2024-05-01T12:00:00Z ShipAndVoyageData 235000001\n\
             \x20     Name = ISLAND QUEEN, Callsign = GBXY\n"
        );

        let names = h.env.cache("names").unwrap();
        let calls = h.env.cache("calls").unwrap();
        assert_eq!(names.get("235000001").unwrap().as_deref(), Some("ISLAND QUEEN"));
        assert_eq!(calls.get("235000001").unwrap().as_deref(), Some("GBXY"));
    }

    #[test]
    fn test_cached_identity_seeds_new_vessel() {
        let dir = tempfile::tempdir().unwrap();
        {
            let env = StoreEnv::open(dir.path()).unwrap();
            env.cache("names").unwrap().put("123456789", "REMEMBERED").unwrap();
            env.cache("calls").unwrap().put("123456789", "CALL9").unwrap();
            env.close().unwrap();
        }

        let mut h = Harness::in_dir(dir);
        h.feed(&PayloadWriter::position_sentence(123456789, 1.0, 2.0, 3.0, 4.0, "A"));

        assert!(h.output().contains("      REMEMBERED @ 1.000000, 2.000000\n"));
        let rec = h.registry.get(123456789).unwrap();
        assert_eq!(rec.callsign.as_deref(), Some("CALL9"));
    }

    #[test]
    fn test_non_sentence_lines_ignored() {
        let mut h = Harness::new();
        h.feed("");
        h.feed("# comment");
        h.feed("$GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,*47");
        assert_eq!(h.output(), "");
        let stats = h.ingestor.stats();
        assert_eq!(stats.lines, 3);
        assert_eq!(stats.sentences, 0);
        assert_eq!(stats.errors, 0);
    }

    #[test]
    fn test_decode_errors_logged_with_line() {
        let mut h = Harness::new();
        let bad_sum = "!AIVDM,1,1,,B,177KQJ5000G?tO`K>RA1wUbN0TKH,0*00";
        let truncated = "!AIVDM,1,1,,B";
        h.feed(bad_sum);
        h.feed(truncated);

        let expected = format!(
            "2024-05-01T12:00:00Z *Error* Invalid message\n      {bad_sum}\n\
             2024-05-01T12:00:00Z *Error* Unable to parse\n      {truncated}\n"
        );
        assert_eq!(h.output(), expected);
        assert_eq!(h.ingestor.stats().errors, 2);
    }

    #[test]
    fn test_unsupported_message_type() {
        let mut h = Harness::new();
        let mut w = PayloadWriter::new();
        w.uint(4, 6).uint(0, 2).uint(3669702, 30).zeros(130);
        let (payload, fill) = w.finish();
        let line = format_sentence(1, 1, "", "A", &payload, fill);
        h.feed(&line);
        assert!(h.output().starts_with("2024-05-01T12:00:00Z *Error* Unsupported message\n"));
        assert!(h.registry.is_empty());
    }

    #[test]
    fn test_invalid_channel() {
        let mut h = Harness::new();
        let (payload, fill) = PayloadWriter::position_report(1, 1.0, 1.0, 1.0, 1.0);
        let line = format_sentence(1, 1, "", "1", &payload, fill);
        h.feed(&line);
        assert_eq!(
            h.output(),
            format!("2024-05-01T12:00:00Z *Error* Invalid channel code 1\n      {line}\n")
        );
    }

    #[test]
    fn test_fragment_errors_logged() {
        let mut h = Harness::new();
        let frags = PayloadWriter::ship_and_voyage_sentences(235000001, "GBXY", "ISLAND QUEEN", "A");

        // Second fragment alone is out of sequence.
        h.feed(&frags[1]);
        assert!(h.output().contains("*Error* Expecting fragment 1, got 2!\n"));

        // A clean restart still reassembles.
        h.feed(&frags[0]);
        h.feed(&frags[1]);
        assert!(h.output().contains("ShipAndVoyageData 235000001\n"));
        assert_eq!(h.ingestor.stats().reports, 1);
        assert_eq!(h.ingestor.stats().errors, 1);
    }

    #[test]
    fn test_negative_fragment_count() {
        let mut h = Harness::new();
        let line = format_sentence(-1, 1, "", "A", "15M67FC000G?ufbE`FepT@3n00Sa", 0);
        h.feed(&line);
        assert!(h.output().contains("*Error* Invalid fragment count -1\n"));
    }

    #[test]
    fn test_single_sentence_interrupts_fragments() {
        let mut h = Harness::new();
        let frags = PayloadWriter::ship_and_voyage_sentences(235000001, "GBXY", "ISLAND QUEEN", "A");
        h.feed(&frags[0]);
        h.feed(&PayloadWriter::position_sentence(1, 1.0, 1.0, 1.0, 1.0, "A"));
        h.feed(&frags[1]);

        let out = h.output();
        assert!(out.contains("PositionReportClassAScheduled 000000001\n"));
        assert!(out.contains("*Error* Expecting fragment 1, got 2!\n"));
        assert!(h.registry.get(235000001).is_none());
    }

    #[test]
    fn test_run_reads_stream() {
        let mut h = Harness::new();
        let input = format!(
            "noise\r\n{}\r\n{}\n",
            static_name_sentence(123456789, "NORDIC STAR"),
            PayloadWriter::position_sentence(123456789, 47.5, -122.25, 10.0, 90.0, "A"),
        );
        let stats = h.ingestor.run(input.as_bytes(), &mut h.log).unwrap();
        assert_eq!(
            stats,
            IngestStats {
                lines: 3,
                sentences: 2,
                reports: 2,
                errors: 0
            }
        );
        assert!(h.output().contains("      NORDIC STAR @ 47.500000, -122.250000\n"));
    }

    #[test]
    fn test_store_failure_ends_ingestion() {
        let mut h = Harness::new();
        h.feed(&PayloadWriter::position_sentence(123456789, 1.0, 2.0, 3.0, 4.0, "A"));

        let other = rusqlite::Connection::open(h.env.path()).unwrap();
        other.execute_batch("DROP TABLE names;").unwrap();
        drop(other);

        // Known vessel: the name write fails.
        let identity = static_name_sentence(123456789, "NORDIC STAR");
        let result = h.ingestor.process_line(&identity, t0(), &mut h.log);
        assert!(matches!(result, Err(IngestError::Store(_))));

        // New vessel: the cache lookup fails.
        let position = PayloadWriter::position_sentence(987654321, 1.0, 2.0, 3.0, 4.0, "A");
        let result = h.ingestor.process_line(&position, t0(), &mut h.log);
        assert!(matches!(result, Err(IngestError::Store(_))));
    }

    #[test]
    fn test_close_reports_writes() {
        let mut h = Harness::new();
        for line in PayloadWriter::ship_and_voyage_sentences(235000001, "GBXY", "ISLAND QUEEN", "B") {
            h.feed(&line);
        }
        h.feed(&static_name_sentence(235000001, "ISLAND QUEEN"));
        assert_eq!(h.ingestor.close(), 2);
    }
}
