//! Candidate key material.
//!
//! A *part* is one raw fragment of potential shared secret, private to this
//! host. An *identifier* is the part's public face: digest plus position,
//! safe to broadcast. A *candidate key* is the assembly of all matched
//! parts. Everything carrying raw bytes is wiped on drop.

use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::digest::FragmentDigest;

/// One locally generated key fragment, kept in the candidate history.
///
/// The raw bytes must never leave this host; only the digest is ever put on
/// the wire.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct CandidateKeyPart {
    /// Round this part was generated in. Rounds increase monotonically per
    /// protocol instance.
    pub round: u32,
    /// Position of this part within its round.
    pub index: u8,
    /// The fragment itself. Secret.
    pub bytes: Vec<u8>,
    /// Digest of `bytes`, precomputed at construction.
    pub digest: FragmentDigest,
    /// This part's share of the round's entropy estimate.
    pub entropy: f32,
}

impl CandidateKeyPart {
    /// Create a part from a raw fragment, computing its digest.
    pub fn new(bytes: Vec<u8>, round: u32, index: u8, entropy: f32) -> Self {
        let digest = FragmentDigest::digest(&bytes);
        Self {
            round,
            index,
            bytes,
            digest,
            entropy,
        }
    }

    /// The public identifier to send to remote hosts.
    pub fn identifier(&self) -> CandidateIdentifier {
        CandidateIdentifier {
            round: self.round,
            index: self.index,
            digest: self.digest,
        }
    }
}

impl std::fmt::Debug for CandidateKeyPart {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Raw bytes deliberately omitted.
        f.debug_struct("CandidateKeyPart")
            .field("round", &self.round)
            .field("index", &self.index)
            .field("digest", &self.digest)
            .field("entropy", &self.entropy)
            .finish()
    }
}

/// The public identification of a candidate key part.
///
/// Round and index refer to the *sender's* numbering and uniquely identify
/// a part within the sender's recent history window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CandidateIdentifier {
    /// The sender's round counter for this part.
    pub round: u32,
    /// Position within the round.
    pub index: u8,
    /// Digest of the (hidden) fragment.
    pub digest: FragmentDigest,
}

/// A fully assembled key candidate.
///
/// The raw key may only be used for secure communication after the remote
/// host has acknowledged its digest; until then it is provisional.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct CandidateKey {
    /// How many matched parts were combined into this key.
    pub num_parts: usize,
    /// The key itself. Secret.
    pub bytes: Vec<u8>,
    /// Digest for comparing against a remote host's candidate.
    pub digest: FragmentDigest,
}

impl std::fmt::Debug for CandidateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CandidateKey")
            .field("num_parts", &self.num_parts)
            .field("digest", &self.digest)
            .finish()
    }
}
