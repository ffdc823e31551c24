//! Test fixtures and helpers.
//!
//! Deterministic two-sided fragment rounds with known overlap structure,
//! for driving the protocol in tests without real sensor data.

use rand::RngCore;

/// One round of fragments for each of two hosts.
#[derive(Debug, Clone)]
pub struct TwoSidedRound {
    pub side1: Vec<Vec<u8>>,
    pub side2: Vec<Vec<u8>>,
}

/// A pair of rounds where both sides share exactly one fragment each.
///
/// In the first round, side2's fragment 1 equals side1's fragment 2; in
/// the second round, side2's fragment 1 equals side1's fragment 4 and
/// side2's fragment 3 equals side1's fragment 2.
pub fn overlapping_rounds() -> Vec<TwoSidedRound> {
    vec![
        TwoSidedRound {
            side1: vec![
                vec![1, 2, 3, 4, 5, 4, 3, 2, 1],
                vec![1, 2, 4, 4, 5, 4, 3, 2, 1],
                vec![1, 2, 3, 4, 5, 4, 7, 2, 1],
                vec![1, 2, 3, 4, 5, 4, 3, 2, 2],
            ],
            side2: vec![
                vec![2, 2, 3, 4, 5, 4, 3, 2, 1],
                vec![1, 2, 3, 4, 5, 4, 7, 2, 1],
                vec![2, 2, 4, 4, 5, 4, 3, 2, 1],
                vec![2, 2, 3, 4, 5, 4, 3, 2, 2],
            ],
        },
        TwoSidedRound {
            side1: vec![
                vec![5, 2, 3, 4, 5, 4, 3, 2, 3],
                vec![4, 2, 4, 4, 5, 4, 3, 2, 3],
                vec![3, 2, 3, 4, 5, 4, 7, 2, 3],
                vec![2, 2, 3, 4, 5, 4, 7, 2, 3],
                vec![1, 2, 3, 4, 5, 4, 3, 2, 4],
            ],
            side2: vec![
                vec![9, 2, 3, 4, 5, 4, 3, 2, 5],
                vec![1, 2, 3, 4, 5, 4, 3, 2, 4],
                vec![7, 2, 3, 4, 5, 4, 3, 2, 3],
                vec![3, 2, 3, 4, 5, 4, 7, 2, 3],
                vec![5, 2, 3, 4, 5, 4, 3, 2, 8],
            ],
        },
    ]
}

/// `count` rounds where both sides observe the identical fragment: the
/// happy path of two devices shaken together.
pub fn correlated_rounds(count: usize) -> Vec<TwoSidedRound> {
    (0..count)
        .map(|i| {
            let fragment = round_fragment(i as u8, 0);
            TwoSidedRound {
                side1: vec![fragment.clone()],
                side2: vec![fragment],
            }
        })
        .collect()
}

/// `count` rounds where the two sides observe unrelated fragments; no
/// round ever matches.
pub fn disjoint_rounds(count: usize) -> Vec<TwoSidedRound> {
    (0..count)
        .map(|i| TwoSidedRound {
            side1: vec![round_fragment(i as u8, 1)],
            side2: vec![round_fragment(i as u8, 2)],
        })
        .collect()
}

/// `count` rounds of several fragments each, where exactly one fragment
/// per round is shared between the sides and the rest is per-side noise.
pub fn partially_overlapping_rounds(count: usize) -> Vec<TwoSidedRound> {
    (0..count)
        .map(|i| {
            let shared = round_fragment(i as u8, 0);
            TwoSidedRound {
                side1: vec![
                    round_fragment(i as u8, 1),
                    shared.clone(),
                    round_fragment(i as u8, 3),
                ],
                side2: vec![
                    round_fragment(i as u8, 2),
                    shared,
                    round_fragment(i as u8, 4),
                ],
            }
        })
        .collect()
}

/// A deterministic fragment for round `i`, distinct per `side` tag.
fn round_fragment(i: u8, side: u8) -> Vec<u8> {
    vec![side, i, 0x5A, i.wrapping_mul(7), 3, 1, 4, 1, 5, 9, 2, 6]
}

/// Random fragments, for tests that only need unique material.
pub fn random_fragments(count: usize, len: usize) -> Vec<Vec<u8>> {
    let mut rng = rand::thread_rng();
    (0..count)
        .map(|_| {
            let mut fragment = vec![0u8; len];
            rng.fill_bytes(&mut fragment);
            fragment
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ckp_core::FragmentDigest;

    #[test]
    fn test_overlapping_rounds_share_expected_fragments() {
        let rounds = overlapping_rounds();
        assert_eq!(rounds[0].side1[2], rounds[0].side2[1]);
        assert_eq!(rounds[1].side1[4], rounds[1].side2[1]);
        assert_eq!(rounds[1].side1[2], rounds[1].side2[3]);
    }

    #[test]
    fn test_correlated_rounds_match_per_round() {
        for round in correlated_rounds(5) {
            assert_eq!(round.side1, round.side2);
        }
        // Different rounds still carry different material.
        let rounds = correlated_rounds(2);
        assert_ne!(rounds[0].side1, rounds[1].side1);
    }

    #[test]
    fn test_partially_overlapping_rounds_share_one_fragment() {
        for round in partially_overlapping_rounds(6) {
            let shared: Vec<_> = round
                .side1
                .iter()
                .filter(|f1| round.side2.contains(f1))
                .collect();
            assert_eq!(shared.len(), 1);
        }
    }

    #[test]
    fn test_disjoint_rounds_never_match() {
        for round in disjoint_rounds(8) {
            for f1 in &round.side1 {
                for f2 in &round.side2 {
                    assert_ne!(FragmentDigest::digest(f1), FragmentDigest::digest(f2));
                }
            }
        }
    }

    #[test]
    fn test_random_fragments_unique() {
        let fragments = random_fragments(16, 16);
        for (i, a) in fragments.iter().enumerate() {
            for b in &fragments[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }
}
