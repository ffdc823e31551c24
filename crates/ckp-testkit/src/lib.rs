//! # CKP Testkit
//!
//! Testing utilities for the candidate key protocol.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Fixtures**: deterministic two-sided fragment rounds with known
//!   overlap structure, for driving the protocol without sensor data
//! - **Generators**: proptest strategies for property-based testing
//!
//! ## Fixtures
//!
//! ```rust
//! use ckp_testkit::fixtures::correlated_rounds;
//!
//! for round in correlated_rounds(20) {
//!     assert_eq!(round.side1, round.side2);
//! }
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use ckp_testkit::generators::fragment;
//! use ckp_core::FragmentDigest;
//!
//! proptest! {
//!     #[test]
//!     fn digest_is_deterministic(f in fragment()) {
//!         prop_assert_eq!(FragmentDigest::digest(&f), FragmentDigest::digest(&f));
//!     }
//! }
//! ```

pub mod fixtures;
pub mod generators;

pub use fixtures::{
    correlated_rounds, disjoint_rounds, overlapping_rounds, partially_overlapping_rounds,
    random_fragments, TwoSidedRound,
};
pub use generators::{digest, entropy, fragment, fragments, identifier};
