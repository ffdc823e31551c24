//! Per-peer matching and key derivation.
//!
//! This is the transport-agnostic half of the candidate key protocol. Each
//! round of correlated sensor data yields a set of candidate key parts;
//! parts whose digests also show up in a remote host's stream become
//! matching parts; once enough matching material has accumulated, all
//! retained matches are combined into a candidate key.
//!
//! A key part goes through three phases:
//!
//! 1. Generated locally from a feature vector and broadcast by digest.
//! 2. Matched: the same digest was independently produced by a remote
//!    host, so both sides hold byte-identical raw material.
//! 3. Assembled: all matching parts are combined into a candidate key,
//!    whose digest can be compared with the remote host's candidate.
//!
//! Assembly is deterministic over the *set* of matched parts: parts are
//! ordered by digest, not by arrival, so two hosts that learned about the
//! same matches in different orders still derive the same key.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use crate::digest::FragmentDigest;
use crate::error::{CoreError, Result};
use crate::history::History;
use crate::part::{CandidateIdentifier, CandidateKey, CandidateKeyPart};
use crate::peer::PeerId;

/// Hard cap on fragments per round; the wire index field is a single byte.
pub const MAX_FRAGMENTS_PER_ROUND: usize = 127;

/// Upper bound on per-round candidate combinations tried by [`CandidateKeyProtocol::search_key`].
/// Exceeding it is reported as an error rather than silently searching a
/// truncated space.
pub const SEARCH_COMBINATION_LIMIT: usize = 4096;

/// Domain separation tag appended to the matched material before hashing
/// it into the shared key, so the key differs from the comparison digest.
const KEY_DERIVATION_TAG: &[u8] = b"candidate key protocol shared key v1";

/// Configuration for the core engine.
#[derive(Debug, Clone)]
pub struct CandidateKeyProtocolConfig {
    /// Candidates retained per peer for matching against incoming
    /// identifiers. Too small and slow hosts never match; around 20x the
    /// per-round candidate count is a good compromise.
    pub candidate_history_size: usize,
    /// Matching parts retained per peer; must hold enough entropy to
    /// assemble a key.
    pub matching_history_size: usize,
    /// Matches older than this are pruned and no longer contribute to
    /// statistics or keys.
    pub max_match_age: Duration,
}

impl Default for CandidateKeyProtocolConfig {
    fn default() -> Self {
        Self {
            candidate_history_size: 50,
            matching_history_size: 50,
            max_match_age: Duration::from_secs(300),
        }
    }
}

/// A candidate part that a remote host confirmed it also holds.
#[derive(Debug, Clone)]
struct MatchedPart {
    part: CandidateKeyPart,
    matched_at: Instant,
}

/// All protocol state kept for one remote host.
#[derive(Debug)]
struct PeerState {
    /// Rounds of local candidates generated while this peer was tracked.
    local_rounds: u32,
    /// Recent local candidates, matched against the peer's identifiers.
    recent: History<CandidateKeyPart>,
    /// Parts confirmed to match, the raw material of the candidate key.
    matched: History<MatchedPart>,
}

/// The candidate key protocol engine.
///
/// Purely computational: it never touches the network. One instance serves
/// any number of remote peers, with all per-peer state isolated so that a
/// wipe or failure for one peer cannot affect another.
pub struct CandidateKeyProtocol {
    config: CandidateKeyProtocolConfig,
    /// Next round number handed out by [`generate_candidates`](Self::generate_candidates).
    next_round: u32,
    /// Instance-wide copy of recent candidates, used to seed the history
    /// of peers discovered after the candidates were generated.
    recent_all: History<CandidateKeyPart>,
    peers: HashMap<PeerId, PeerState>,
}

impl CandidateKeyProtocol {
    /// Create an engine with the given history bounds.
    pub fn new(config: CandidateKeyProtocolConfig) -> Self {
        let recent_all = History::new(config.candidate_history_size);
        Self {
            config,
            next_round: 1,
            recent_all,
            peers: HashMap::new(),
        }
    }

    /// Turn one round of raw fragments into candidate key parts.
    ///
    /// Assigns the next round number, stores each fragment (with its share
    /// of the round's entropy estimate) in every tracked peer's candidate
    /// history, and returns the public identifiers to broadcast. An empty
    /// fragment set still consumes a round.
    pub fn generate_candidates(
        &mut self,
        fragments: &[Vec<u8>],
        entropy: f32,
    ) -> Result<Vec<CandidateIdentifier>> {
        if entropy < 0.0 || !entropy.is_finite() {
            return Err(CoreError::NegativeEntropy(entropy));
        }
        if fragments.len() > MAX_FRAGMENTS_PER_ROUND {
            return Err(CoreError::TooManyFragments {
                got: fragments.len(),
                max: MAX_FRAGMENTS_PER_ROUND,
            });
        }
        if fragments.len() > self.config.candidate_history_size {
            return Err(CoreError::RoundTooLarge {
                got: fragments.len(),
                capacity: self.config.candidate_history_size,
            });
        }

        let round = self.next_round;
        self.next_round = self.next_round.wrapping_add(1);

        let share = if fragments.is_empty() {
            0.0
        } else {
            entropy / fragments.len() as f32
        };

        let mut identifiers = Vec::with_capacity(fragments.len());
        let mut parts = Vec::with_capacity(fragments.len());
        for (index, fragment) in fragments.iter().enumerate() {
            let part = CandidateKeyPart::new(fragment.clone(), round, index as u8, share);
            identifiers.push(part.identifier());
            parts.push(part);
        }

        for state in self.peers.values_mut() {
            state.local_rounds = state.local_rounds.saturating_add(1);
            for part in &parts {
                state.recent.push(part.clone());
            }
        }
        for part in parts {
            self.recent_all.push(part);
        }

        debug!(
            round,
            candidates = identifiers.len(),
            peers = self.peers.len(),
            "generated candidate key parts"
        );
        Ok(identifiers)
    }

    /// Match incoming identifiers against the local candidate history.
    ///
    /// Returns the position of the first identifier whose digest equals the
    /// digest of a retained local candidate, after promoting that candidate
    /// to matching status. A match means both hosts independently derived
    /// byte-identical raw material. No match is a normal outcome.
    pub fn match_candidates(
        &mut self,
        peer: PeerId,
        identifiers: &[CandidateIdentifier],
    ) -> Option<usize> {
        if identifiers.len() > MAX_FRAGMENTS_PER_ROUND {
            warn!(
                %peer,
                count = identifiers.len(),
                "incoming candidate list larger than any we would generate"
            );
        }
        let state = self.ensure_peer(peer);

        for (position, identifier) in identifiers.iter().enumerate() {
            let hit = state
                .recent
                .find(|part| part.digest == identifier.digest)
                .cloned();
            if let Some(part) = hit {
                debug!(
                    %peer,
                    remote_round = identifier.round,
                    local_round = part.round,
                    "incoming candidate matches local part"
                );
                Self::promote(state, part);
                return Some(position);
            }
        }

        debug!(%peer, count = identifiers.len(), "no incoming candidate matched");
        None
    }

    /// Record that the remote peer matched one of our broadcast candidates.
    ///
    /// `round` and `index` are our own numbering, echoed back by the peer.
    /// An unknown pair is tolerated with a warning: the part has probably
    /// been evicted from the history already.
    pub fn acknowledge_matches(&mut self, peer: PeerId, round: u32, index: u8) {
        let state = self.ensure_peer(peer);
        let hit = state
            .recent
            .find(|part| part.round == round && part.index == index)
            .cloned();
        match hit {
            Some(part) => {
                Self::promote(state, part);
            }
            None => warn!(
                %peer,
                round,
                index,
                "acknowledged candidate not in recent history, probably outdated"
            ),
        }
    }

    /// Rounds of local candidates generated while this peer was tracked.
    pub fn num_local_rounds(&self, peer: PeerId) -> u32 {
        self.peers.get(&peer).map_or(0, |state| state.local_rounds)
    }

    /// Distinct rounds with at least one retained, unexpired match.
    pub fn num_matching_rounds(&mut self, peer: PeerId) -> u32 {
        let max_age = self.config.max_match_age;
        match self.peers.get_mut(&peer) {
            Some(state) => {
                Self::prune_matches(state, max_age);
                let rounds: HashSet<u32> =
                    state.matched.iter().map(|m| m.part.round).collect();
                rounds.len() as u32
            }
            None => 0,
        }
    }

    /// Fraction of local rounds that produced at least one match.
    pub fn matching_rounds_fraction(&mut self, peer: PeerId) -> f32 {
        let local = self.num_local_rounds(peer);
        if local == 0 {
            return 0.0;
        }
        self.num_matching_rounds(peer) as f32 / local as f32
    }

    /// Sum of the entropy shares of all retained, unexpired matches.
    pub fn sum_match_entropy(&mut self, peer: PeerId) -> f32 {
        let max_age = self.config.max_match_age;
        match self.peers.get_mut(&peer) {
            Some(state) => {
                Self::prune_matches(state, max_age);
                state.matched.iter().map(|m| m.part.entropy).sum()
            }
            None => 0.0,
        }
    }

    /// Combine all retained matching parts into a candidate key.
    ///
    /// The combination is canonical: one part per round (lowest digest wins
    /// within a round), ordered by digest, concatenated and hashed. Two
    /// hosts holding the same matched-part set therefore derive the same
    /// key regardless of the order the matches arrived in.
    pub fn generate_key(&mut self, peer: PeerId) -> Result<CandidateKey> {
        let max_age = self.config.max_match_age;
        let state = self
            .peers
            .get_mut(&peer)
            .ok_or(CoreError::UnknownPeer(peer))?;
        Self::prune_matches(state, max_age);

        let selection = Self::canonical_selection(state);
        if selection.is_empty() {
            return Err(CoreError::NoMatchingParts(peer));
        }
        let key = Self::assemble_key(&selection);
        info!(%peer, parts = key.num_parts, digest = %key.digest, "generated candidate key");
        Ok(key)
    }

    /// Try to reconstruct a key with the given digest from retained matches.
    ///
    /// Used when the remote host proposes a key hash first. The search
    /// slides a window of `num_parts` consecutive matched rounds over the
    /// history and, where several candidates matched in one round, tries
    /// every per-round combination. `None` means no retained combination
    /// reproduces the digest, which is expected while matching is still in
    /// progress.
    pub fn search_key(
        &mut self,
        peer: PeerId,
        target: &FragmentDigest,
        num_parts: usize,
    ) -> Result<Option<CandidateKey>> {
        let max_age = self.config.max_match_age;
        let state = self.ensure_peer(peer);
        Self::prune_matches(state, max_age);

        // Group retained matches by round, ascending.
        let mut by_round: BTreeMap<u32, Vec<&CandidateKeyPart>> = BTreeMap::new();
        for matched in state.matched.iter() {
            by_round.entry(matched.part.round).or_default().push(&matched.part);
        }
        let rounds: Vec<Vec<&CandidateKeyPart>> = by_round.into_values().collect();

        if num_parts == 0 || num_parts > rounds.len() {
            debug!(
                %peer,
                num_parts,
                retained_rounds = rounds.len(),
                "cannot reconstruct key of that many parts"
            );
            return Ok(None);
        }

        for window in rounds.windows(num_parts) {
            let combinations = window.iter().map(|candidates| candidates.len()).product::<usize>();
            if combinations > SEARCH_COMBINATION_LIMIT {
                return Err(CoreError::SearchSpaceTooLarge {
                    combinations,
                    limit: SEARCH_COMBINATION_LIMIT,
                });
            }

            // Odometer over one candidate per round in the window.
            let mut picks = vec![0usize; window.len()];
            loop {
                let selection: Vec<&CandidateKeyPart> = window
                    .iter()
                    .zip(&picks)
                    .map(|(candidates, &pick)| candidates[pick])
                    .collect();
                let key = Self::assemble_key(&Self::canonical_order(selection));
                if &key.digest == target {
                    debug!(%peer, parts = num_parts, "reconstructed key matching remote digest");
                    return Ok(Some(key));
                }

                // Advance the odometer; done when it wraps around.
                let mut slot = 0;
                loop {
                    if slot == picks.len() {
                        break;
                    }
                    picks[slot] += 1;
                    if picks[slot] < window[slot].len() {
                        break;
                    }
                    picks[slot] = 0;
                    slot += 1;
                }
                if slot == picks.len() {
                    break;
                }
            }
        }

        debug!(%peer, num_parts, "no retained combination reproduces the digest");
        Ok(None)
    }

    /// Wipe all state for one peer, returning whether any existed.
    ///
    /// Raw fragments, digests and derived material are zeroed as the state
    /// drops. Calling this twice is safe; the second call returns `false`.
    pub fn wipe(&mut self, peer: PeerId) -> bool {
        match self.peers.remove(&peer) {
            Some(state) => {
                info!(
                    %peer,
                    candidates = state.recent.len(),
                    matches = state.matched.len(),
                    "wiped peer state"
                );
                drop(state);
                true
            }
            None => false,
        }
    }

    /// Wipe state for every peer and the instance-wide candidate history.
    pub fn wipe_all(&mut self) {
        let peers = self.peers.len();
        self.peers.clear();
        self.recent_all.clear();
        info!(peers, "wiped all protocol state");
    }

    /// Look up or create the state for a peer.
    ///
    /// New peers are seeded with the instance-wide recent candidates so
    /// that rounds generated shortly before first contact can still match.
    fn ensure_peer(&mut self, peer: PeerId) -> &mut PeerState {
        if !self.peers.contains_key(&peer) {
            let mut recent = History::new(self.config.candidate_history_size);
            let mut seeded_rounds = HashSet::new();
            for part in self.recent_all.iter() {
                seeded_rounds.insert(part.round);
                recent.push(part.clone());
            }
            debug!(
                %peer,
                seeded_candidates = recent.len(),
                seeded_rounds = seeded_rounds.len(),
                "tracking new peer"
            );
            self.peers.insert(
                peer,
                PeerState {
                    local_rounds: seeded_rounds.len() as u32,
                    recent,
                    matched: History::new(self.config.matching_history_size),
                },
            );
        }
        self.peers
            .get_mut(&peer)
            .expect("peer state ensured above")
    }

    /// Move a candidate into the matching list, once per (round, index).
    fn promote(state: &mut PeerState, part: CandidateKeyPart) -> bool {
        let duplicate = state
            .matched
            .iter()
            .any(|m| m.part.round == part.round && m.part.index == part.index);
        if duplicate {
            debug!(
                round = part.round,
                index = part.index,
                "candidate already marked as match"
            );
            return false;
        }
        debug!(
            round = part.round,
            index = part.index,
            "advancing candidate to matching status"
        );
        state.matched.push(MatchedPart {
            part,
            matched_at: Instant::now(),
        });
        true
    }

    fn prune_matches(state: &mut PeerState, max_age: Duration) {
        state
            .matched
            .retain(|m| m.matched_at.elapsed() <= max_age);
    }

    /// One part per round, lowest digest wins, result ordered by digest.
    fn canonical_selection(state: &PeerState) -> Vec<&CandidateKeyPart> {
        let mut by_round: BTreeMap<u32, &CandidateKeyPart> = BTreeMap::new();
        for matched in state.matched.iter() {
            by_round
                .entry(matched.part.round)
                .and_modify(|current| {
                    if matched.part.digest.0 < current.digest.0 {
                        *current = &matched.part;
                    }
                })
                .or_insert(&matched.part);
        }
        Self::canonical_order(by_round.into_values().collect())
    }

    fn canonical_order(mut parts: Vec<&CandidateKeyPart>) -> Vec<&CandidateKeyPart> {
        parts.sort_by(|a, b| a.digest.0.cmp(&b.digest.0));
        parts
    }

    /// Hash the selected parts into a comparison digest and a shared key.
    fn assemble_key(selection: &[&CandidateKeyPart]) -> CandidateKey {
        let total: usize = selection.iter().map(|part| part.bytes.len()).sum();
        let mut material = Zeroizing::new(Vec::with_capacity(total + KEY_DERIVATION_TAG.len()));
        for part in selection {
            material.extend_from_slice(&part.bytes);
        }
        let digest = FragmentDigest::digest(&material);
        material.extend_from_slice(KEY_DERIVATION_TAG);
        let key = FragmentDigest::digest(&material);
        CandidateKey {
            num_parts: selection.len(),
            bytes: key.0.to_vec(),
            digest,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> CandidateKeyProtocolConfig {
        CandidateKeyProtocolConfig::default()
    }

    fn peer(n: u8) -> PeerId {
        PeerId(std::net::IpAddr::V4(std::net::Ipv4Addr::new(10, 0, 0, n)))
    }

    fn fragment(tag: u8) -> Vec<u8> {
        vec![tag, 2, 3, 4, 5, 4, 3, 2, 1]
    }

    #[test]
    fn test_generate_assigns_increasing_rounds() {
        let mut p = CandidateKeyProtocol::new(config());
        let r1 = p.generate_candidates(&[fragment(1)], 1.0).unwrap();
        let r2 = p.generate_candidates(&[fragment(2)], 1.0).unwrap();
        assert_eq!(r1[0].round, 1);
        assert_eq!(r2[0].round, 2);
        assert_eq!(r2[0].index, 0);
    }

    #[test]
    fn test_generate_rejects_bad_input() {
        let mut p = CandidateKeyProtocol::new(config());
        assert!(matches!(
            p.generate_candidates(&[fragment(1)], -1.0),
            Err(CoreError::NegativeEntropy(_))
        ));
        let too_many: Vec<Vec<u8>> = (0..=200u8).map(|i| vec![i]).collect();
        assert!(matches!(
            p.generate_candidates(&too_many, 1.0),
            Err(CoreError::TooManyFragments { .. })
        ));
    }

    #[test]
    fn test_entropy_split_across_fragments() {
        let mut p = CandidateKeyProtocol::new(config());
        let remote = peer(1);
        let fragments = vec![fragment(1), fragment(2), fragment(3), fragment(4)];
        let ids = p.generate_candidates(&fragments, 4.0).unwrap();
        p.acknowledge_matches(remote, ids[0].round, ids[0].index);
        assert!((p.sum_match_entropy(remote) - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_match_position_independent() {
        let mut p = CandidateKeyProtocol::new(config());
        let remote = peer(1);
        p.generate_candidates(&[fragment(7)], 1.0).unwrap();

        let local_digest = FragmentDigest::digest(&fragment(7));
        let foreign = |tag: u8| CandidateIdentifier {
            round: 9,
            index: 0,
            digest: FragmentDigest::digest(&fragment(tag)),
        };
        let hit = CandidateIdentifier {
            round: 9,
            index: 2,
            digest: local_digest,
        };

        // Match found at any list position.
        let incoming = vec![foreign(50), foreign(51), hit];
        assert_eq!(p.match_candidates(remote, &incoming), Some(2));

        // A list with no shared digest yields no match.
        let incoming = vec![foreign(52), foreign(53)];
        assert_eq!(p.match_candidates(remote, &incoming), None);
    }

    #[test]
    fn test_match_promotes_only_once() {
        let mut p = CandidateKeyProtocol::new(config());
        let remote = peer(1);
        let ids = p.generate_candidates(&[fragment(1)], 2.0).unwrap();

        let incoming = vec![CandidateIdentifier {
            round: 1,
            index: 0,
            digest: ids[0].digest,
        }];
        assert_eq!(p.match_candidates(remote, &incoming), Some(0));
        assert_eq!(p.match_candidates(remote, &incoming), Some(0));
        // Acknowledging the same part again changes nothing either.
        p.acknowledge_matches(remote, ids[0].round, ids[0].index);

        assert_eq!(p.num_matching_rounds(remote), 1);
        assert!((p.sum_match_entropy(remote) - 2.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_acknowledge_unknown_part_is_tolerated() {
        let mut p = CandidateKeyProtocol::new(config());
        let remote = peer(1);
        p.acknowledge_matches(remote, 42, 7);
        assert_eq!(p.num_matching_rounds(remote), 0);
    }

    #[test]
    fn test_matching_fraction() {
        let mut p = CandidateKeyProtocol::new(config());
        let remote = peer(1);
        let mut ids = Vec::new();
        for tag in 0..4 {
            ids.push(p.generate_candidates(&[fragment(tag)], 1.0).unwrap());
        }
        // Two of four rounds match.
        p.acknowledge_matches(remote, ids[0][0].round, 0);
        p.acknowledge_matches(remote, ids[2][0].round, 0);
        assert_eq!(p.num_local_rounds(remote), 4);
        assert!((p.matching_rounds_fraction(remote) - 0.5).abs() < f32::EPSILON);
    }

    #[test]
    fn test_key_independent_of_acknowledgment_order() {
        let build = |order: &[usize]| {
            let mut p = CandidateKeyProtocol::new(config());
            let remote = peer(1);
            let mut ids = Vec::new();
            for tag in 0..3 {
                ids.push(p.generate_candidates(&[fragment(tag)], 1.0).unwrap());
            }
            for &i in order {
                p.acknowledge_matches(remote, ids[i][0].round, ids[i][0].index);
            }
            p.generate_key(remote).unwrap()
        };

        let k1 = build(&[0, 1, 2]);
        let k2 = build(&[2, 0, 1]);
        assert_eq!(k1.bytes, k2.bytes);
        assert_eq!(k1.digest, k2.digest);
        assert_eq!(k1.num_parts, 3);
    }

    #[test]
    fn test_key_digest_differs_from_key_bytes() {
        let mut p = CandidateKeyProtocol::new(config());
        let remote = peer(1);
        let ids = p.generate_candidates(&[fragment(1)], 1.0).unwrap();
        p.acknowledge_matches(remote, ids[0].round, ids[0].index);
        let key = p.generate_key(remote).unwrap();
        assert_ne!(key.bytes.as_slice(), key.digest.as_bytes().as_slice());
    }

    #[test]
    fn test_generate_key_without_matches_fails() {
        let mut p = CandidateKeyProtocol::new(config());
        assert!(matches!(
            p.generate_key(peer(1)),
            Err(CoreError::UnknownPeer(_))
        ));
        let remote = peer(2);
        p.generate_candidates(&[fragment(1)], 1.0).unwrap();
        // Track the peer without any match.
        p.match_candidates(remote, &[]);
        assert!(matches!(
            p.generate_key(remote),
            Err(CoreError::NoMatchingParts(_))
        ));
    }

    #[test]
    fn test_search_reconstructs_generated_key() {
        let mut p = CandidateKeyProtocol::new(config());
        let remote = peer(1);
        let mut ids = Vec::new();
        for tag in 0..4 {
            ids.push(p.generate_candidates(&[fragment(tag)], 1.0).unwrap());
        }
        for round_ids in &ids {
            p.acknowledge_matches(remote, round_ids[0].round, round_ids[0].index);
        }
        let key = p.generate_key(remote).unwrap();

        let found = p
            .search_key(remote, &key.digest, key.num_parts)
            .unwrap()
            .expect("own key must be reconstructible");
        assert_eq!(found.bytes, key.bytes);
        assert_eq!(found.digest, key.digest);
    }

    #[test]
    fn test_search_finds_contiguous_subset() {
        let mut p = CandidateKeyProtocol::new(config());
        let remote = peer(1);
        let mut ids = Vec::new();
        for tag in 0..3 {
            ids.push(p.generate_candidates(&[fragment(tag)], 1.0).unwrap());
        }
        for round_ids in &ids {
            p.acknowledge_matches(remote, round_ids[0].round, round_ids[0].index);
        }

        // Key assembled by a remote host that only matched the last two
        // rounds: reproduce its digest locally.
        let tail = [
            CandidateKeyPart::new(fragment(1), 2, 0, 1.0),
            CandidateKeyPart::new(fragment(2), 3, 0, 1.0),
        ];
        let refs: Vec<&CandidateKeyPart> = tail.iter().collect();
        let remote_key =
            CandidateKeyProtocol::assemble_key(&CandidateKeyProtocol::canonical_order(refs));

        let found = p
            .search_key(remote, &remote_key.digest, 2)
            .unwrap()
            .expect("tail subset is contiguous");
        assert_eq!(found.bytes, remote_key.bytes);
    }

    #[test]
    fn test_search_miss_is_not_an_error() {
        let mut p = CandidateKeyProtocol::new(config());
        let remote = peer(1);
        let ids = p.generate_candidates(&[fragment(1)], 1.0).unwrap();
        p.acknowledge_matches(remote, ids[0].round, ids[0].index);

        assert!(p
            .search_key(remote, &FragmentDigest::from_bytes([9; 32]), 1)
            .unwrap()
            .is_none());
        // More parts than retained rounds cannot possibly reconstruct.
        assert!(p
            .search_key(remote, &FragmentDigest::from_bytes([9; 32]), 5)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_search_tries_per_round_combinations() {
        let mut p = CandidateKeyProtocol::new(config());
        let remote = peer(1);
        // One round with two candidates, both matched.
        let ids = p
            .generate_candidates(&[fragment(1), fragment(2)], 2.0)
            .unwrap();
        p.acknowledge_matches(remote, ids[0].round, ids[0].index);
        p.acknowledge_matches(remote, ids[1].round, ids[1].index);

        // A remote key built from the candidate that does NOT win the
        // lowest-digest selection must still be reconstructible.
        for tag in [1u8, 2u8] {
            let alt = [CandidateKeyPart::new(fragment(tag), 1, 0, 1.0)];
            let refs: Vec<&CandidateKeyPart> = alt.iter().collect();
            let remote_key = CandidateKeyProtocol::assemble_key(&refs);
            let found = p
                .search_key(remote, &remote_key.digest, 1)
                .unwrap()
                .expect("single-part combination");
            assert_eq!(found.bytes, remote_key.bytes);
        }
    }

    #[test]
    fn test_candidate_history_eviction() {
        let mut p = CandidateKeyProtocol::new(CandidateKeyProtocolConfig {
            candidate_history_size: 2,
            ..config()
        });
        let remote = peer(1);
        // Track the peer first so its history receives every round.
        p.match_candidates(remote, &[]);
        let first = p.generate_candidates(&[fragment(1)], 1.0).unwrap();
        p.generate_candidates(&[fragment(2)], 1.0).unwrap();
        p.generate_candidates(&[fragment(3)], 1.0).unwrap();

        // Round 1 has been evicted, its digest no longer matches.
        let incoming = vec![CandidateIdentifier {
            round: 1,
            index: 0,
            digest: first[0].digest,
        }];
        assert_eq!(p.match_candidates(remote, &incoming), None);
    }

    #[test]
    fn test_expired_matches_are_pruned() {
        let mut p = CandidateKeyProtocol::new(CandidateKeyProtocolConfig {
            max_match_age: Duration::ZERO,
            ..config()
        });
        let remote = peer(1);
        let ids = p.generate_candidates(&[fragment(1)], 3.0).unwrap();
        p.acknowledge_matches(remote, ids[0].round, ids[0].index);
        std::thread::sleep(Duration::from_millis(2));
        assert_eq!(p.num_matching_rounds(remote), 0);
        assert_eq!(p.sum_match_entropy(remote), 0.0);
    }

    #[test]
    fn test_new_peer_seeded_from_earlier_rounds() {
        let mut p = CandidateKeyProtocol::new(config());
        let ids = p.generate_candidates(&[fragment(1)], 1.0).unwrap();

        // Peer shows up only after the round was generated.
        let late = peer(9);
        let incoming = vec![CandidateIdentifier {
            round: 1,
            index: 0,
            digest: ids[0].digest,
        }];
        assert_eq!(p.match_candidates(late, &incoming), Some(0));
        assert_eq!(p.num_local_rounds(late), 1);
    }

    #[test]
    fn test_wipe_is_idempotent() {
        let mut p = CandidateKeyProtocol::new(config());
        let remote = peer(1);
        let ids = p.generate_candidates(&[fragment(1)], 1.0).unwrap();
        p.acknowledge_matches(remote, ids[0].round, ids[0].index);

        assert!(p.wipe(remote));
        assert!(!p.wipe(remote));
        assert_eq!(p.num_local_rounds(remote), 0);
    }

    #[test]
    fn test_wipe_isolates_peers() {
        let mut p = CandidateKeyProtocol::new(config());
        let (a, b) = (peer(1), peer(2));
        let ids = p.generate_candidates(&[fragment(1)], 1.0).unwrap();
        p.acknowledge_matches(a, ids[0].round, ids[0].index);
        p.acknowledge_matches(b, ids[0].round, ids[0].index);

        assert!(p.wipe(a));
        assert_eq!(p.num_matching_rounds(b), 1);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        fn fragments() -> impl Strategy<Value = Vec<Vec<u8>>> {
            prop::collection::vec(prop::collection::vec(any::<u8>(), 1..32), 1..8)
        }

        proptest! {
            #[test]
            fn prop_identifier_digests_match_fragments(fragments in fragments()) {
                let mut p = CandidateKeyProtocol::new(config());
                let ids = p.generate_candidates(&fragments, 1.0).unwrap();
                prop_assert_eq!(ids.len(), fragments.len());
                for (id, fragment) in ids.iter().zip(&fragments) {
                    prop_assert_eq!(id.digest, FragmentDigest::digest(fragment));
                }
            }

            #[test]
            fn prop_match_hits_first_shared_digest(
                fragments in fragments(),
                pick in any::<prop::sample::Index>(),
            ) {
                let mut p = CandidateKeyProtocol::new(config());
                let remote = peer(1);
                let ids = p.generate_candidates(&fragments, 1.0).unwrap();

                // An incoming list of unknown digests followed by one of ours.
                let shared = ids[pick.index(ids.len())];
                let mut incoming: Vec<CandidateIdentifier> = (0u8..3)
                    .map(|i| CandidateIdentifier {
                        round: 77,
                        index: i,
                        digest: FragmentDigest::from_bytes([0xF0 + i; 32]),
                    })
                    .collect();
                incoming.push(shared);

                prop_assert_eq!(p.match_candidates(remote, &incoming), Some(3));
            }
        }
    }
}
