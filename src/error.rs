use thiserror::Error;

#[derive(Error, Debug)]
pub enum LinkError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("timeout")]
    Timeout,

    #[error("protocol error: {0}")]
    Protocol(String),
    #[error("encode error: {0}")]
    Encode(#[from] EncodeError),
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
    #[error("{operation} not allowed in state {state}")]
    InvalidState {
        operation: &'static str,
        state: &'static str,
    },
    #[error("link busy: {0}")]
    Busy(String),
    #[error("parameter {index}: value {value} rejected ({reason})")]
    Parameter {
        index: usize,
        value: u8,
        reason: String,
    },
    #[error("link task closed")]
    Closed,
}

/// Building an outbound frame from the registry failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodeError {
    #[error("bad item count: expected {expected}, got {actual}")]
    BadItemCount { expected: usize, actual: usize },
}

/// Outcome of checking an inbound buffer against the frame layout.
///
/// `Incomplete` is the normal mid-transfer state; the others mean the
/// stream is out of sync with the device.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("incomplete frame: have {have} bytes, need {need}")]
    Incomplete { have: usize, need: usize },
    #[error("unknown command byte 0x{0:02X}")]
    UnknownCommand(u8),
    #[error("checksum mismatch: computed 0x{expected:02X}, frame carries 0x{actual:02X}")]
    ChecksumMismatch { expected: u8, actual: u8 },
    #[error("length byte {actual} does not match the {expected}-byte payload of this frame")]
    LengthMismatch { expected: usize, actual: u8 },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("short write: {written} of {expected} bytes")]
    ShortWrite { written: usize, expected: usize },
    #[error("transport disconnected")]
    Disconnected,
}

impl ValidationError {
    /// `true` when the caller should keep accumulating bytes.
    #[must_use]
    pub const fn is_incomplete(&self) -> bool {
        matches!(self, Self::Incomplete { .. })
    }
}
