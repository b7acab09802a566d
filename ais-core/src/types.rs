//! Shared types, error enums, and decoded report types for ais-core.

use thiserror::Error;

/// All errors produced by ais-core.
#[derive(Debug, Error)]
pub enum AisError {
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, AisError>;

// ---------------------------------------------------------------------------
// Decode failures
// ---------------------------------------------------------------------------

/// Classification of a decode failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeErrorKind {
    /// The sentence is structurally malformed.
    Parse,
    /// The sentence parsed but its content is inconsistent (checksum, armor, length).
    InvalidMessage,
    /// Well-formed, but not a sentence or message type we decode.
    UnsupportedType,
}

impl DecodeErrorKind {
    /// Label used in the activity log.
    pub fn label(&self) -> &'static str {
        match self {
            DecodeErrorKind::Parse => "Unable to parse",
            DecodeErrorKind::InvalidMessage => "Invalid message",
            DecodeErrorKind::UnsupportedType => "Unsupported message",
        }
    }
}

impl std::fmt::Display for DecodeErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// A classified decode failure with a short human-readable detail.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {detail}")]
pub struct DecodeError {
    pub kind: DecodeErrorKind,
    pub detail: String,
}

impl DecodeError {
    pub fn parse(detail: impl Into<String>) -> Self {
        DecodeError {
            kind: DecodeErrorKind::Parse,
            detail: detail.into(),
        }
    }

    pub fn invalid(detail: impl Into<String>) -> Self {
        DecodeError {
            kind: DecodeErrorKind::InvalidMessage,
            detail: detail.into(),
        }
    }

    pub fn unsupported(detail: impl Into<String>) -> Self {
        DecodeError {
            kind: DecodeErrorKind::UnsupportedType,
            detail: detail.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Vessel identifiers
// ---------------------------------------------------------------------------

/// Maritime Mobile Service Identity. 30 bits on the wire.
pub type Mmsi = u32;

/// Format an MMSI as the 9-digit zero-padded key used everywhere else.
pub fn mmsi_to_string(mmsi: Mmsi) -> String {
    format!("{mmsi:09}")
}

// ---------------------------------------------------------------------------
// Radio channels
// ---------------------------------------------------------------------------

/// One of the two AIS VHF channels. Each has its own fragment sequencing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    A,
    B,
}

impl Channel {
    /// Map a sentence channel code. Anything but `A` or `B` is unrecognized.
    pub fn from_code(code: &str) -> Option<Channel> {
        match code {
            "A" => Some(Channel::A),
            "B" => Some(Channel::B),
            _ => None,
        }
    }

    /// Index into per-channel arrays.
    pub fn index(&self) -> usize {
        match self {
            Channel::A => 0,
            Channel::B => 1,
        }
    }
}

// ---------------------------------------------------------------------------
// Message type metadata
// ---------------------------------------------------------------------------

/// AIS message types this crate decodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    PositionReportClassAScheduled,
    PositionReportClassAAssignedSchedule,
    PositionReportClassAResponseToInterrogation,
    ShipAndVoyageData,
    StandardClassBCSPositionReport,
    ExtendedClassBCSPositionReport,
    ClassBCSStaticDataReport,
    LongRangeBroadcastMessage,
}

/// Known message type table: (type number, message type).
pub const MESSAGE_TABLE: &[(u8, MessageType)] = &[
    (1, MessageType::PositionReportClassAScheduled),
    (2, MessageType::PositionReportClassAAssignedSchedule),
    (3, MessageType::PositionReportClassAResponseToInterrogation),
    (5, MessageType::ShipAndVoyageData),
    (18, MessageType::StandardClassBCSPositionReport),
    (19, MessageType::ExtendedClassBCSPositionReport),
    (24, MessageType::ClassBCSStaticDataReport),
    (27, MessageType::LongRangeBroadcastMessage),
];

impl MessageType {
    /// Look up a message type by number. `None` for types we don't decode.
    pub fn from_number(n: u8) -> Option<MessageType> {
        MESSAGE_TABLE
            .iter()
            .find(|(num, _)| *num == n)
            .map(|(_, ty)| *ty)
    }

    /// Name printed in the activity log header line.
    pub fn name(&self) -> &'static str {
        match self {
            MessageType::PositionReportClassAScheduled => "PositionReportClassAScheduled",
            MessageType::PositionReportClassAAssignedSchedule => {
                "PositionReportClassAAssignedSchedule"
            }
            MessageType::PositionReportClassAResponseToInterrogation => {
                "PositionReportClassAResponseToInterrogation"
            }
            MessageType::ShipAndVoyageData => "ShipAndVoyageData",
            MessageType::StandardClassBCSPositionReport => "StandardClassBCSPositionReport",
            MessageType::ExtendedClassBCSPositionReport => "ExtendedClassBCSPositionReport",
            MessageType::ClassBCSStaticDataReport => "ClassBCSStaticDataReport",
            MessageType::LongRangeBroadcastMessage => "LongRangeBroadcastMessage",
        }
    }
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// AIS six-bit character set
// ---------------------------------------------------------------------------

/// Six-bit ASCII used for names and callsigns (value -> character).
pub const SIXBIT_CHARSET: &[u8; 64] =
    b"@ABCDEFGHIJKLMNOPQRSTUVWXYZ[\\]^_ !\"#$%&'()*+,-./0123456789:;<=>?";

// ---------------------------------------------------------------------------
// Decoded report types
// ---------------------------------------------------------------------------

/// Types 5 and 24: vessel name and/or callsign.
#[derive(Debug, Clone, PartialEq)]
pub struct IdentityReport {
    pub mmsi: Mmsi,
    pub message_type: MessageType,
    pub name: Option<String>,
    pub callsign: Option<String>,
}

/// Types 1-3, 18, 19, 27: position and motion.
#[derive(Debug, Clone, PartialEq)]
pub struct DynamicReport {
    pub mmsi: Mmsi,
    pub message_type: MessageType,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub speed_kts: Option<f64>,
    pub course_deg: Option<f64>,
    /// Only type 19 carries a name alongside the position.
    pub name: Option<String>,
}

/// Union type for all decoded reports.
#[derive(Debug, Clone, PartialEq)]
pub enum VesselReport {
    Identity(IdentityReport),
    Dynamic(DynamicReport),
}

impl VesselReport {
    /// Source MMSI of any report.
    pub fn mmsi(&self) -> Mmsi {
        match self {
            VesselReport::Identity(r) => r.mmsi,
            VesselReport::Dynamic(r) => r.mmsi,
        }
    }

    /// Message type of any report.
    pub fn message_type(&self) -> MessageType {
        match self {
            VesselReport::Identity(r) => r.message_type,
            VesselReport::Dynamic(r) => r.message_type,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
