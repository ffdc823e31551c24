//! Error types for the network-facing protocol.

use thiserror::Error;

use ckp_core::CoreError;

/// Errors produced while decoding wire messages.
///
/// Always peer-scoped: a malformed datagram fails the protocol run with its
/// sender and never affects other peers or the process.
#[derive(Debug, Error)]
pub enum WireError {
    #[error("datagram is not valid UTF-8")]
    NotText,

    #[error("unknown message tag: {0:?}")]
    UnknownTag(String),

    #[error("missing field: {0}")]
    MissingField(&'static str),

    #[error("malformed number in field {field}: {value:?}")]
    BadNumber { field: &'static str, value: String },

    #[error("malformed hex: {0}")]
    BadHex(#[from] hex::FromHexError),

    #[error("digest field has {0} bytes, expected 32")]
    BadDigestLength(usize),

    #[error("candidate message carries no digests")]
    EmptyCandidateList,

    #[error("maximum payload of {max} bytes cannot hold a single candidate")]
    PayloadTooSmall { max: usize },
}

/// Errors from the protocol engine.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Rejected configuration, e.g. overlapping match/mismatch thresholds.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A datagram could not be decoded.
    #[error("wire error: {0}")]
    Wire(#[from] WireError),

    /// The core engine rejected an operation.
    #[error("core error: {0}")]
    Core(#[from] CoreError),

    /// Sending or receiving on the transport failed.
    #[error("transport error: {0}")]
    Transport(String),

    /// A consistency check failed; indicates a bug, not a protocol condition.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;
