//! Error types for the core protocol engine.

use thiserror::Error;

use crate::peer::PeerId;

/// Errors from candidate generation and key derivation.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("entropy estimate must be >= 0, got {0}")]
    NegativeEntropy(f32),

    #[error("at most {max} fragments supported per round, got {got}")]
    TooManyFragments { got: usize, max: usize },

    #[error("round of {got} fragments exceeds candidate history capacity {capacity}")]
    RoundTooLarge { got: usize, capacity: usize },

    #[error("no matching key parts retained for peer {0}")]
    NoMatchingParts(PeerId),

    #[error("no state for peer {0}")]
    UnknownPeer(PeerId),

    #[error("key search space of {combinations} combinations exceeds limit {limit}")]
    SearchSpaceTooLarge { combinations: usize, limit: usize },
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
