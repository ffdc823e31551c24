//! The candidate key protocol over a datagram transport.
//!
//! Both hosts generate candidate key parts from their sensor pipelines,
//! broadcast the digests, and optionally flag matches. Matching parts
//! accumulate into a shared key. Because datagrams can be lost, duplicated
//! or reordered, a derived key only becomes the session key after a
//! two-stage acknowledgment: a host that reconstructs a proposed key
//! answers with `ACK` (stage 1), and a host whose proposal is acknowledged
//! resolves the final key (stage 2). When both hosts proposed different
//! keys over the same matched material, stage 2 combines them with XOR,
//! which is commutative and therefore yields the same secret on both ends.
//!
//! All state mutation (inbound datagrams, [`KeyAgreement::add_candidates`],
//! and the retroactive replays they trigger) happens under one async mutex
//! per engine, so handling is strictly serialized. Sends are
//! fire-and-forget; there are no wall-clock timeouts, only round-count
//! thresholds.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, info_span, warn, Instrument};
use zeroize::Zeroizing;

use ckp_core::{
    CandidateIdentifier, CandidateKey, CandidateKeyProtocol, CandidateKeyProtocolConfig,
    FragmentDigest, History, PeerId,
};

use crate::error::{ProtocolError, Result};
use crate::event::ProtocolEvent;
use crate::transport::Transport;
use crate::wire::{self, WireMessage};

/// Recently generated candidate keys remembered per peer, for pairing an
/// incoming acknowledgment with the right proposal.
const GENERATED_KEY_HISTORY: usize = 5;

/// Inbound messages without an immediate local match kept for retroactive
/// matching.
const UNMATCHED_BUFFER_SIZE: usize = 5;

/// Failure reason for the negative eligibility criterion.
const MISMATCH_ABORT_REASON: &str = "too many rounds without a matching key part";

/// Configuration for [`KeyAgreement`].
#[derive(Debug, Clone)]
pub struct ProtocolConfig {
    /// Local candidates retained per peer for matching.
    pub candidate_history_size: usize,
    /// Matching parts retained per peer.
    pub matching_history_size: usize,
    /// Matches older than this no longer count towards a key.
    pub max_match_age: Duration,
    /// Minimum fraction of rounds with a match before a key is proposed.
    ///
    /// Together with [`max_mismatch_rounds_fraction`](Self::max_mismatch_rounds_fraction)
    /// this must not exceed 1.0: a mismatch is defined as (1 - match), and
    /// the two verdicts must stay mutually exclusive.
    pub min_matching_rounds_fraction: f32,
    /// Minimum entropy accumulated in matching parts before a key is
    /// proposed.
    pub min_matching_entropy: f32,
    /// Fraction of matchless rounds at which the run is aborted.
    pub max_mismatch_rounds_fraction: f32,
    /// Rounds that must pass with a peer before any verdict is reached.
    pub min_num_rounds_for_action: u32,
    /// Broadcast candidate identifiers right after generating them. Enable
    /// on hosts that should feed the matching.
    pub broadcast_candidates: bool,
    /// Acknowledge matches of incoming identifiers over the network.
    /// Enable on very lossy links, or on the silent side of an asymmetric
    /// setup where only one host broadcasts.
    pub send_matches: bool,
    /// Label distinguishing co-located engines in log output.
    pub instance: Option<String>,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            candidate_history_size: 50,
            matching_history_size: 50,
            max_match_age: Duration::from_secs(300),
            min_matching_rounds_fraction: 0.5,
            min_matching_entropy: 20.0,
            max_mismatch_rounds_fraction: 0.4,
            min_num_rounds_for_action: 10,
            broadcast_candidates: true,
            send_matches: false,
            instance: None,
        }
    }
}

impl ProtocolConfig {
    /// Reject configurations the protocol cannot run with.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            (
                "min_matching_rounds_fraction",
                self.min_matching_rounds_fraction,
            ),
            (
                "max_mismatch_rounds_fraction",
                self.max_mismatch_rounds_fraction,
            ),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ProtocolError::InvalidConfig(format!(
                    "{name} must be within [0, 1], got {value}"
                )));
            }
        }
        if self.min_matching_rounds_fraction + self.max_mismatch_rounds_fraction > 1.0 {
            return Err(ProtocolError::InvalidConfig(
                "min_matching_rounds_fraction + max_mismatch_rounds_fraction must be <= 1.0"
                    .into(),
            ));
        }
        if self.min_matching_entropy < 0.0 {
            return Err(ProtocolError::InvalidConfig(
                "min_matching_entropy must be >= 0".into(),
            ));
        }
        if self.candidate_history_size == 0 || self.matching_history_size == 0 {
            return Err(ProtocolError::InvalidConfig(
                "history sizes must be nonzero".into(),
            ));
        }
        Ok(())
    }

    fn core(&self) -> CandidateKeyProtocolConfig {
        CandidateKeyProtocolConfig {
            candidate_history_size: self.candidate_history_size,
            matching_history_size: self.matching_history_size,
            max_match_age: self.max_match_age,
        }
    }
}

/// Outcome of the eligibility check run after every state-changing event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Eligibility {
    /// Not enough rounds with this peer for any verdict.
    TooEarly,
    /// Positive criteria fulfilled: propose a candidate key.
    Eligible,
    /// Neither verdict yet, keep collecting.
    Undecided,
    /// Negative criterion fulfilled: abort the run.
    Abort,
}

/// Candidate keys recently proposed to one peer, plus the stage-1 slot.
struct GeneratedKeys {
    recent: History<CandidateKey>,
    /// A key reconstructed to match a remote proposal and already
    /// acknowledged by us, pending stage-2 resolution. Never overwritten
    /// while pending.
    found_matching_key: Option<CandidateKey>,
}

impl GeneratedKeys {
    fn new() -> Self {
        Self {
            recent: History::new(GENERATED_KEY_HISTORY),
            found_matching_key: None,
        }
    }
}

/// An inbound candidate message that found no local match yet.
struct BufferedCandidates {
    from: PeerId,
    identifiers: Vec<CandidateIdentifier>,
}

/// An inbound key proposal that could not be reconstructed yet.
struct BufferedKey {
    from: PeerId,
    num_parts: usize,
    digest: FragmentDigest,
}

/// Everything guarded by the engine's mutex.
struct EngineState {
    ckp: CandidateKeyProtocol,
    generated: HashMap<PeerId, GeneratedKeys>,
    unmatched_candidates: History<BufferedCandidates>,
    unmatched_keys: History<BufferedKey>,
    listeners: Vec<mpsc::UnboundedSender<ProtocolEvent>>,
}

impl EngineState {
    fn new(config: &ProtocolConfig) -> Self {
        Self {
            ckp: CandidateKeyProtocol::new(config.core()),
            generated: HashMap::new(),
            unmatched_candidates: History::new(UNMATCHED_BUFFER_SIZE),
            unmatched_keys: History::new(UNMATCHED_BUFFER_SIZE),
            listeners: Vec::new(),
        }
    }
}

/// The network-facing protocol engine.
///
/// Owns a transport and a [`CandidateKeyProtocol`], drives the per-peer
/// state machine from inbound datagrams, and reports outcomes as
/// [`ProtocolEvent`]s. One engine serves any number of peers concurrently;
/// a failure with one peer never disturbs another.
pub struct KeyAgreement {
    config: ProtocolConfig,
    transport: Arc<dyn Transport>,
    state: Arc<Mutex<EngineState>>,
    receive_loop: JoinHandle<()>,
}

impl KeyAgreement {
    /// Validate the configuration and start the receive loop.
    pub fn new(transport: Arc<dyn Transport>, config: ProtocolConfig) -> Result<Self> {
        config.validate()?;

        let state = Arc::new(Mutex::new(EngineState::new(&config)));
        let span = info_span!(
            "ckp",
            instance = config.instance.as_deref().unwrap_or("-"),
            local = %transport.local_peer()
        );

        let loop_state = Arc::clone(&state);
        let loop_transport = Arc::clone(&transport);
        let loop_config = config.clone();
        let receive_loop = tokio::spawn(
            async move {
                loop {
                    match loop_transport.recv().await {
                        Ok((peer, payload)) => {
                            let mut state = loop_state.lock().await;
                            handle_datagram(
                                &mut state,
                                loop_transport.as_ref(),
                                &loop_config,
                                peer,
                                &payload,
                            )
                            .await;
                        }
                        Err(e) => {
                            debug!(error = %e, "transport receive loop ending");
                            break;
                        }
                    }
                }
            }
            .instrument(span),
        );

        Ok(Self {
            config,
            transport,
            state,
            receive_loop,
        })
    }

    /// Feed one round of raw key material from the sensor pipeline.
    ///
    /// Byte-identical fragments are silently deduplicated. When
    /// [`ProtocolConfig::broadcast_candidates`] is set, the round's
    /// identifiers are broadcast (split across datagrams as needed), and
    /// buffered inbound candidate messages are replayed against the
    /// extended history.
    pub async fn add_candidates(&self, fragments: &[Vec<u8>], entropy: f32) -> Result<()> {
        let mut state = self.state.lock().await;

        let mut seen = HashSet::new();
        let mut unique = Vec::with_capacity(fragments.len());
        for fragment in fragments {
            if seen.insert(FragmentDigest::digest(fragment)) {
                unique.push(fragment.clone());
            }
        }
        if unique.len() < fragments.len() {
            debug!(
                unique = unique.len(),
                total = fragments.len(),
                "dropped duplicate fragments"
            );
        }

        let identifiers = state.ckp.generate_candidates(&unique, entropy)?;

        if self.config.broadcast_candidates && !identifiers.is_empty() {
            let round = identifiers[0].round;
            let digests: Vec<FragmentDigest> =
                identifiers.iter().map(|id| id.digest).collect();
            let datagrams =
                wire::encode_candidate_round(round, &digests, self.transport.max_payload())?;
            debug!(round, datagrams = datagrams.len(), "broadcasting candidates");
            for datagram in datagrams {
                self.transport.broadcast(datagram).await?;
            }
        }

        replay_unmatched_candidates(&mut state, self.transport.as_ref(), &self.config).await;
        Ok(())
    }

    /// Subscribe to protocol events. Every subscriber sees every event.
    pub async fn subscribe(&self) -> mpsc::UnboundedReceiver<ProtocolEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.state.lock().await.listeners.push(tx);
        rx
    }

    /// The local peer identity as remote hosts see it.
    pub fn local_peer(&self) -> PeerId {
        self.transport.local_peer()
    }

    /// Stop the receive loop and wipe all key material.
    pub async fn shutdown(&self) {
        self.receive_loop.abort();
        let mut state = self.state.lock().await;
        state.ckp.wipe_all();
        state.generated.clear();
        state.unmatched_candidates.clear();
        state.unmatched_keys.clear();
        info!("engine shut down, all state wiped");
    }
}

impl Drop for KeyAgreement {
    fn drop(&mut self) {
        self.receive_loop.abort();
    }
}

/// Decode and dispatch one datagram. Never lets an error escape: every
/// failure is converted into a peer-scoped authentication failure.
async fn handle_datagram(
    state: &mut EngineState,
    transport: &dyn Transport,
    config: &ProtocolConfig,
    peer: PeerId,
    payload: &[u8],
) {
    let message = match WireMessage::parse(payload) {
        Ok(message) => message,
        Err(e) => {
            warn!(%peer, error = %e, "undecodable datagram");
            authentication_failed(
                state,
                transport,
                peer,
                true,
                &format!("undecodable datagram: {e}"),
            )
            .await;
            return;
        }
    };

    let outcome = match message {
        WireMessage::Candidates { round, digests } => {
            handle_candidates(state, transport, config, peer, round, digests).await
        }
        WireMessage::Match { round, index } => {
            handle_match(state, transport, config, peer, round, index).await
        }
        WireMessage::Key { num_parts, digest } => {
            handle_key(state, transport, config, peer, num_parts, digest).await
        }
        WireMessage::Ack { digest } => handle_ack(state, transport, peer, digest).await,
        WireMessage::Nack => {
            info!(%peer, "peer terminated the protocol run");
            // No reply: there is no need to acknowledge an abort.
            authentication_failed(
                state,
                transport,
                peer,
                false,
                "peer terminated the protocol run",
            )
            .await;
            Ok(())
        }
    };

    if let Err(e) = outcome {
        error!(%peer, error = %e, "error handling datagram");
        authentication_failed(state, transport, peer, true, &e.to_string()).await;
    }
}

/// Inbound `CAND`: match against the local history, or buffer for later.
async fn handle_candidates(
    state: &mut EngineState,
    transport: &dyn Transport,
    config: &ProtocolConfig,
    peer: PeerId,
    round: u32,
    digests: Vec<FragmentDigest>,
) -> Result<()> {
    debug!(%peer, round, count = digests.len(), "received candidate identifiers");
    let identifiers = wire::identifiers_from_digests(round, &digests);

    match state.ckp.match_candidates(peer, &identifiers) {
        Some(position) => {
            handle_candidate_match(state, transport, config, peer, round, position).await
        }
        None => {
            // Keep the message around: the matching local candidates may
            // simply not have been added yet.
            state.unmatched_candidates.push(BufferedCandidates {
                from: peer,
                identifiers,
            });

            // A mismatch round may tip the negative criterion. The
            // positive criterion cannot newly hold here: nothing was
            // added to the match set.
            if check_key_criteria(state, config, peer) == Eligibility::Abort {
                authentication_failed(state, transport, peer, true, MISMATCH_ABORT_REASON).await;
            }
            Ok(())
        }
    }
}

/// A local candidate matched an incoming identifier list at `position`.
async fn handle_candidate_match(
    state: &mut EngineState,
    transport: &dyn Transport,
    config: &ProtocolConfig,
    peer: PeerId,
    remote_round: u32,
    position: usize,
) -> Result<()> {
    debug!(%peer, remote_round, position, "incoming candidate matches");
    if config.send_matches {
        let message = WireMessage::Match {
            round: remote_round,
            index: position.min(u8::MAX as usize) as u8,
        };
        transport.send_to(message.encode(), peer).await?;
    }

    emit_progress(state, config, peer);

    // The match set grew: the positive criterion may hold now, and
    // buffered key proposals may have become reconstructible.
    check_for_key_generation(state, transport, config, peer).await?;
    replay_unmatched_keys(state, transport, config).await;
    Ok(())
}

/// Inbound `MATCH`: the peer matched a candidate we broadcast.
async fn handle_match(
    state: &mut EngineState,
    transport: &dyn Transport,
    config: &ProtocolConfig,
    peer: PeerId,
    round: u32,
    index: u8,
) -> Result<()> {
    debug!(%peer, round, index, "peer reports matching candidate");
    state.ckp.acknowledge_matches(peer, round, index);
    emit_progress(state, config, peer);
    check_for_key_generation(state, transport, config, peer).await?;
    replay_unmatched_keys(state, transport, config).await;
    Ok(())
}

/// Inbound `KEY`: try to reconstruct the proposed key, or buffer it.
async fn handle_key(
    state: &mut EngineState,
    transport: &dyn Transport,
    config: &ProtocolConfig,
    peer: PeerId,
    num_parts: usize,
    digest: FragmentDigest,
) -> Result<()> {
    debug!(%peer, num_parts, %digest, "received candidate key proposal");
    if !check_for_key_match(state, transport, config, peer, num_parts, digest).await? {
        state.unmatched_keys.push(BufferedKey {
            from: peer,
            num_parts,
            digest,
        });
    }
    Ok(())
}

/// Inbound `ACK`: stage-2 resolution of the final shared key.
async fn handle_ack(
    state: &mut EngineState,
    transport: &dyn Transport,
    peer: PeerId,
    digest: FragmentDigest,
) -> Result<()> {
    debug!(%peer, %digest, "received key acknowledgment");

    let Some(generated) = state.generated.get_mut(&peer) else {
        authentication_failed(
            state,
            transport,
            peer,
            true,
            "key acknowledged but none was ever proposed",
        )
        .await;
        return Ok(());
    };

    let Some(acked) = generated.recent.find(|key| key.digest == digest).cloned() else {
        warn!(
            %peer,
            %digest,
            "acknowledged hash matches no recently generated key, possible attack"
        );
        authentication_failed(
            state,
            transport,
            peer,
            true,
            "acknowledged key was not recently generated",
        )
        .await;
        return Ok(());
    };

    // Either we already reconstructed and acknowledged a key the peer
    // proposed (stage 1 done on our side), or this acknowledgment of our
    // own proposal is the first resolution step.
    let final_key: Zeroizing<Vec<u8>> = match generated.found_matching_key.take() {
        Some(found) => {
            if found.bytes.len() != acked.bytes.len() {
                return Err(ProtocolError::Internal(
                    "matching and acknowledged keys differ in length".into(),
                ));
            }
            if found.bytes == acked.bytes {
                info!(%peer, "both acknowledgments carry the same key, using it");
                Zeroizing::new(found.bytes.clone())
            } else {
                // Overlapping proposals: each side acknowledged the other's
                // key. XOR is commutative, so both ends converge.
                info!(%peer, "overlapping key proposals, combining both");
                Zeroizing::new(
                    found
                        .bytes
                        .iter()
                        .zip(&acked.bytes)
                        .map(|(a, b)| a ^ b)
                        .collect(),
                )
            }
        }
        None => {
            info!(%peer, "peer acknowledged our proposal, using that key");
            Zeroizing::new(acked.bytes.clone())
        }
    };

    // The key is final: everything kept for this peer can go.
    state.generated.remove(&peer);
    state.ckp.wipe(peer);
    info!(%peer, "authentication succeeded");
    emit(
        state,
        ProtocolEvent::Succeeded {
            peer,
            key: final_key,
        },
    );
    Ok(())
}

/// Evaluate the eligibility thresholds for one peer.
fn check_key_criteria(
    state: &mut EngineState,
    config: &ProtocolConfig,
    peer: PeerId,
) -> Eligibility {
    let rounds = state.ckp.num_local_rounds(peer);
    let fraction = state.ckp.matching_rounds_fraction(peer);
    let entropy = state.ckp.sum_match_entropy(peer);
    debug!(
        %peer,
        rounds,
        fraction,
        entropy,
        min_rounds = config.min_num_rounds_for_action,
        "checking key generation criteria"
    );

    if rounds < config.min_num_rounds_for_action {
        return Eligibility::TooEarly;
    }
    if fraction >= config.min_matching_rounds_fraction
        && entropy >= config.min_matching_entropy
    {
        Eligibility::Eligible
    } else if (1.0 - fraction) >= config.max_mismatch_rounds_fraction {
        Eligibility::Abort
    } else {
        Eligibility::Undecided
    }
}

/// Generate and propose a candidate key if the criteria allow it.
async fn check_for_key_generation(
    state: &mut EngineState,
    transport: &dyn Transport,
    config: &ProtocolConfig,
    peer: PeerId,
) -> Result<()> {
    match check_key_criteria(state, config, peer) {
        Eligibility::Eligible => {
            let key = state.ckp.generate_key(peer)?;
            let message = WireMessage::Key {
                num_parts: key.num_parts,
                digest: key.digest,
            };
            info!(%peer, parts = key.num_parts, digest = %key.digest, "proposing candidate key");
            state
                .generated
                .entry(peer)
                .or_insert_with(GeneratedKeys::new)
                .recent
                .push(key);
            transport.send_to(message.encode(), peer).await?;
            Ok(())
        }
        Eligibility::Abort => {
            authentication_failed(state, transport, peer, true, MISMATCH_ABORT_REASON).await;
            Ok(())
        }
        Eligibility::TooEarly | Eligibility::Undecided => Ok(()),
    }
}

/// Try to reconstruct a proposed key and acknowledge it (stage 1).
///
/// Returns whether the proposal was fully handled; `false` means it should
/// stay buffered for retroactive matching.
async fn check_for_key_match(
    state: &mut EngineState,
    transport: &dyn Transport,
    config: &ProtocolConfig,
    peer: PeerId,
    num_parts: usize,
    digest: FragmentDigest,
) -> Result<bool> {
    let Some(key) = state.ckp.search_key(peer, &digest, num_parts)? else {
        debug!(%peer, "cannot reconstruct proposed key from current matches");
        return Ok(false);
    };

    // Unreachable unless the search is broken; check anyway.
    if key.digest != digest {
        return Err(ProtocolError::Internal(
            "key search returned a different digest than was searched for".into(),
        ));
    }

    match check_key_criteria(state, config, peer) {
        Eligibility::Eligible => {
            authentication_succeeded_stage1(state, transport, peer, key).await?;
            Ok(true)
        }
        Eligibility::Abort => {
            authentication_failed(state, transport, peer, true, MISMATCH_ABORT_REASON).await;
            Ok(true)
        }
        Eligibility::TooEarly | Eligibility::Undecided => {
            warn!(
                %peer,
                "reconstructed the proposed key, but local criteria are not fulfilled yet"
            );
            Ok(false)
        }
    }
}

/// Stage 1: remember the reconstructed key and acknowledge it.
async fn authentication_succeeded_stage1(
    state: &mut EngineState,
    transport: &dyn Transport,
    peer: PeerId,
    key: CandidateKey,
) -> Result<()> {
    let entry = state
        .generated
        .entry(peer)
        .or_insert_with(GeneratedKeys::new);
    if entry.found_matching_key.is_some() {
        // A third overlapping proposal would land here; the two-proposal
        // resolution cannot absorb it, so keep the first.
        warn!(%peer, "stage 2 still pending, not overwriting found matching key");
        return Ok(());
    }

    let ack = WireMessage::Ack { digest: key.digest };
    info!(%peer, digest = %key.digest, "reconstructed proposed key, acknowledging");
    entry.found_matching_key = Some(key);
    transport.send_to(ack.encode(), peer).await
}

/// Wipe a peer and raise the failure event, optionally telling the peer.
async fn authentication_failed(
    state: &mut EngineState,
    transport: &dyn Transport,
    peer: PeerId,
    send_terminate: bool,
    reason: &str,
) {
    warn!(%peer, reason, "authentication failed, wiping peer state");
    let had_state = state.ckp.wipe(peer);
    state.generated.remove(&peer);
    state.unmatched_candidates.retain(|entry| entry.from != peer);
    state.unmatched_keys.retain(|entry| entry.from != peer);

    if had_state && send_terminate {
        if let Err(e) = transport.send_to(WireMessage::Nack.encode(), peer).await {
            warn!(%peer, error = %e, "could not send termination message");
        }
    }

    emit(
        state,
        ProtocolEvent::Failed {
            peer,
            reason: reason.to_string(),
        },
    );
}

/// Replay buffered candidate messages after new local candidates arrived.
async fn replay_unmatched_candidates(
    state: &mut EngineState,
    transport: &dyn Transport,
    config: &ProtocolConfig,
) {
    let entries = state.unmatched_candidates.drain();
    for entry in entries {
        match state.ckp.match_candidates(entry.from, &entry.identifiers) {
            Some(position) => {
                let round = entry.identifiers[position].round;
                debug!(peer = %entry.from, round, "buffered candidate message matches now");
                if let Err(e) =
                    handle_candidate_match(state, transport, config, entry.from, round, position)
                        .await
                {
                    error!(peer = %entry.from, error = %e, "error handling retroactive match");
                    authentication_failed(state, transport, entry.from, true, &e.to_string())
                        .await;
                }
            }
            None => {
                state.unmatched_candidates.push(entry);
            }
        }
    }
}

/// Replay buffered key proposals after the match set grew.
async fn replay_unmatched_keys(
    state: &mut EngineState,
    transport: &dyn Transport,
    config: &ProtocolConfig,
) {
    let entries = state.unmatched_keys.drain();
    for entry in entries {
        match check_for_key_match(
            state,
            transport,
            config,
            entry.from,
            entry.num_parts,
            entry.digest,
        )
        .await
        {
            Ok(true) => {}
            Ok(false) => {
                state.unmatched_keys.push(entry);
            }
            Err(e) => {
                error!(peer = %entry.from, error = %e, "error handling buffered key proposal");
                authentication_failed(state, transport, entry.from, true, &e.to_string())
                    .await;
            }
        }
    }
}

fn emit(state: &mut EngineState, event: ProtocolEvent) {
    state
        .listeners
        .retain(|listener| listener.send(event.clone()).is_ok());
}

fn emit_progress(state: &mut EngineState, config: &ProtocolConfig, peer: PeerId) {
    let current = state.ckp.num_matching_rounds(peer);
    let max = config.min_num_rounds_for_action;
    let message = format!("{current} rounds with matching key parts");
    emit(
        state,
        ProtocolEvent::Progress {
            peer,
            current,
            max,
            message,
        },
    );
}
