//! Proptest generators for property-based testing.

use proptest::prelude::*;

use ckp_core::{CandidateIdentifier, FragmentDigest};

/// Generate a nonempty fragment.
pub fn fragment() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 1..=64)
}

/// Generate a round of up to `max` fragments.
pub fn fragments(max: usize) -> impl Strategy<Value = Vec<Vec<u8>>> {
    prop::collection::vec(fragment(), 1..=max)
}

/// Generate a random digest (not derived from any fragment).
pub fn digest() -> impl Strategy<Value = FragmentDigest> {
    any::<[u8; 32]>().prop_map(FragmentDigest::from_bytes)
}

/// Generate a candidate identifier with arbitrary round and index.
pub fn identifier() -> impl Strategy<Value = CandidateIdentifier> {
    (any::<u32>(), 0u8..=127, digest()).prop_map(|(round, index, digest)| CandidateIdentifier {
        round,
        index,
        digest,
    })
}

/// Generate a plausible entropy estimate.
pub fn entropy() -> impl Strategy<Value = f32> {
    (0u32..=1_000).prop_map(|tenths| tenths as f32 / 10.0)
}
