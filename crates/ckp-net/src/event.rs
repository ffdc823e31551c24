//! Protocol outcome events.

use zeroize::Zeroizing;

use ckp_core::PeerId;

/// Events raised by the protocol engine towards its subscribers.
#[derive(Debug, Clone)]
pub enum ProtocolEvent {
    /// The two-stage acknowledgment completed: both hosts hold `key`.
    Succeeded {
        peer: PeerId,
        /// The shared secret. Wiped when every clone is dropped.
        key: Zeroizing<Vec<u8>>,
    },
    /// The protocol run with `peer` was aborted; all its state is wiped.
    Failed { peer: PeerId, reason: String },
    /// Matching made progress with `peer`.
    Progress {
        peer: PeerId,
        /// Rounds with at least one retained match.
        current: u32,
        /// Rounds required before any verdict is reached.
        max: u32,
        message: String,
    },
}

impl ProtocolEvent {
    /// The peer this event concerns.
    pub fn peer(&self) -> PeerId {
        match self {
            Self::Succeeded { peer, .. }
            | Self::Failed { peer, .. }
            | Self::Progress { peer, .. } => *peer,
        }
    }
}
