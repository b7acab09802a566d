//! ais-core: Pure decode + tracking library for AIS vessel reports.
//!
//! No async, no I/O beyond reading the config file. This crate is the
//! shared core used by `ais-server` (ingestion daemon + snapshot server).

pub mod config;
pub mod decode;
pub mod kml;
pub mod reassembly;
pub mod registry;
pub mod sentence;
pub mod types;

#[cfg(any(test, feature = "test-helpers"))]
pub mod testing;

// Re-export commonly used types at crate root
pub use decode::decode;
pub use kml::render_kml;
pub use reassembly::{FragmentError, FragmentReassembler, Reassembly};
pub use registry::{VesselRecord, VesselRegistry};
pub use sentence::{parse_sentence, Sentence};
pub use types::*;
