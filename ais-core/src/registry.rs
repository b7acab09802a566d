//! Per-vessel state registry with time-based eviction.
//!
//! Pure logic, no I/O. Every operation takes the current time explicitly
//! so callers (and tests) control the clock. One mutex covers the whole
//! map: ingestion merges and purges, connection workers take snapshots,
//! and no call re-enters the registry while holding the lock.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Duration, Utc};

use crate::types::{Mmsi, VesselReport};

/// Records silent for longer than this are purged.
pub const MAX_AGE: Duration = Duration::minutes(30);

/// Purges closer together than this are skipped.
pub const MIN_PURGE_INTERVAL: Duration = Duration::seconds(30);

// ---------------------------------------------------------------------------
// Vessel record
// ---------------------------------------------------------------------------

/// Accumulated state for one vessel.
#[derive(Debug, Clone, PartialEq)]
pub struct VesselRecord {
    pub mmsi: Mmsi,

    // Position
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub speed_kts: Option<f64>,
    pub course_deg: Option<f64>,

    // Identity
    pub callsign: Option<String>,
    pub name: Option<String>,

    pub updated: DateTime<Utc>,
}

impl VesselRecord {
    pub fn new(mmsi: Mmsi, now: DateTime<Utc>) -> Self {
        VesselRecord {
            mmsi,
            latitude: None,
            longitude: None,
            speed_kts: None,
            course_deg: None,
            callsign: None,
            name: None,
            updated: now,
        }
    }

    pub fn has_position(&self) -> bool {
        self.latitude.is_some() && self.longitude.is_some()
    }

    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now - self.updated
    }

    /// Strictly older than `MAX_AGE`; a record exactly at the limit survives.
    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        self.age(now) > MAX_AGE
    }

    /// Copy every populated field of `report` into this record.
    /// Unpopulated fields never clear a known value.
    pub fn apply(&mut self, report: &VesselReport) {
        match report {
            VesselReport::Identity(r) => {
                merge_field(&mut self.name, &r.name);
                merge_field(&mut self.callsign, &r.callsign);
            }
            VesselReport::Dynamic(r) => {
                merge_field(&mut self.latitude, &r.latitude);
                merge_field(&mut self.longitude, &r.longitude);
                merge_field(&mut self.speed_kts, &r.speed_kts);
                merge_field(&mut self.course_deg, &r.course_deg);
                merge_field(&mut self.name, &r.name);
            }
        }
    }
}

fn merge_field<T: Clone>(dst: &mut Option<T>, src: &Option<T>) {
    if let Some(v) = src {
        *dst = Some(v.clone());
    }
}

fn fill_if_unset(dst: &mut Option<String>, src: Option<&str>) {
    if dst.is_none() {
        if let Some(v) = src {
            *dst = Some(v.to_string());
        }
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct RegistryState {
    vessels: HashMap<Mmsi, VesselRecord>,
    last_purged: Option<DateTime<Utc>>,
}

impl RegistryState {
    fn purge_stale(&mut self, now: DateTime<Utc>) -> usize {
        if let Some(last) = self.last_purged {
            if now - last < MIN_PURGE_INTERVAL {
                return 0;
            }
        }
        self.last_purged = Some(now);

        let before = self.vessels.len();
        self.vessels.retain(|_, v| !v.is_stale(now));
        before - self.vessels.len()
    }
}

/// Shared map of MMSI to vessel record.
#[derive(Debug, Default)]
pub struct VesselRegistry {
    inner: Mutex<RegistryState>,
}

impl VesselRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        // No operation leaves the map half-updated, so a poisoned lock is still usable.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Merge a report into its vessel's record, creating the record if the
    /// MMSI is unseen. Returns true if the record was created.
    pub fn merge(&self, report: &VesselReport, now: DateTime<Utc>) -> bool {
        let mmsi = report.mmsi();
        let mut state = self.lock();
        let mut created = false;
        let record = state.vessels.entry(mmsi).or_insert_with(|| {
            created = true;
            VesselRecord::new(mmsi, now)
        });
        record.apply(report);
        record.updated = now;
        created
    }

    /// Seed name and callsign on an existing record without overwriting
    /// anything already known. Unknown MMSIs are ignored.
    pub fn remember_identity(&self, mmsi: Mmsi, name: Option<&str>, callsign: Option<&str>) {
        let mut state = self.lock();
        if let Some(record) = state.vessels.get_mut(&mmsi) {
            fill_if_unset(&mut record.name, name);
            fill_if_unset(&mut record.callsign, callsign);
        }
    }

    /// Remove stale records, at most once per `MIN_PURGE_INTERVAL`.
    /// Returns the number removed.
    pub fn purge_stale(&self, now: DateTime<Utc>) -> usize {
        self.lock().purge_stale(now)
    }

    /// Purge, then copy every surviving record, ordered by MMSI.
    pub fn snapshot(&self, now: DateTime<Utc>) -> Vec<VesselRecord> {
        let mut state = self.lock();
        state.purge_stale(now);
        let mut records: Vec<VesselRecord> = state.vessels.values().cloned().collect();
        drop(state);
        records.sort_by_key(|r| r.mmsi);
        records
    }

    /// Current best-known name for a vessel.
    pub fn ship_name(&self, mmsi: Mmsi) -> Option<String> {
        self.lock().vessels.get(&mmsi).and_then(|r| r.name.clone())
    }

    pub fn get(&self, mmsi: Mmsi) -> Option<VesselRecord> {
        self.lock().vessels.get(&mmsi).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().vessels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
