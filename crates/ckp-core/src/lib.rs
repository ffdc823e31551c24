//! # CKP Core
//!
//! The candidate key protocol: deriving a shared secret from correlated
//! observations of the same physical phenomenon, without key exchange.
//!
//! Unlike Diffie-Hellman with subsequent verification, this protocol uses
//! only symmetric primitives and needs no prior synchronization: hosts tune
//! in to each other's streams of candidate key parts and select the ones
//! they also generated locally. Only digests ever travel over the network;
//! the raw fragments stay on their host.
//!
//! This crate contains no I/O and no networking. It is pure computation
//! over bounded per-peer histories. The network-facing state machine lives
//! in `ckp-net`.
//!
//! ## Key Types
//!
//! - [`CandidateKeyProtocol`] - The per-peer matching and derivation engine
//! - [`CandidateKeyPart`] - A secret key fragment in the local history
//! - [`CandidateIdentifier`] - The fragment's public, broadcastable face
//! - [`CandidateKey`] - An assembled key candidate awaiting acknowledgment
//! - [`FragmentDigest`] - Double SHA-256 digest identifying a fragment
//!
//! ## Determinism
//!
//! [`CandidateKeyProtocol::generate_key`] combines matched parts in a
//! canonical, digest-sorted order, so two hosts holding the same set of
//! matched parts derive byte-identical keys no matter in which order the
//! matches were discovered.

pub mod digest;
pub mod error;
pub mod history;
pub mod part;
pub mod peer;
pub mod protocol;

pub use digest::FragmentDigest;
pub use error::{CoreError, Result};
pub use history::History;
pub use part::{CandidateIdentifier, CandidateKey, CandidateKeyPart};
pub use peer::PeerId;
pub use protocol::{
    CandidateKeyProtocol, CandidateKeyProtocolConfig, MAX_FRAGMENTS_PER_ROUND,
    SEARCH_COMBINATION_LIMIT,
};
