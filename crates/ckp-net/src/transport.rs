//! Transport abstraction.
//!
//! The protocol only needs unordered, best-effort datagram delivery:
//! unicast to a known peer, broadcast to whoever listens, and an inbound
//! stream of (sender, payload) pairs. Loss, duplication and reordering are
//! all tolerated by the state machine, so implementations make no delivery
//! guarantees.

use async_trait::async_trait;
use bytes::Bytes;

use ckp_core::PeerId;

use crate::error::ProtocolError;

/// Result type for transport operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Datagram transport for protocol messages.
///
/// Implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a datagram to a specific peer. Fire-and-forget.
    async fn send_to(&self, payload: Bytes, peer: PeerId) -> Result<()>;

    /// Send a datagram to all reachable peers. Fire-and-forget.
    async fn broadcast(&self, payload: Bytes) -> Result<()>;

    /// Receive the next datagram from any peer.
    ///
    /// Blocks until a datagram arrives or the transport is torn down.
    async fn recv(&self) -> Result<(PeerId, Bytes)>;

    /// Largest payload a single datagram may carry.
    fn max_payload(&self) -> usize;

    /// The local peer identity, as remote hosts will see it.
    fn local_peer(&self) -> PeerId;
}

/// A simple in-memory transport for testing.
///
/// Uses channels to simulate datagram passing between nodes. Delivery is
/// reliable and ordered, which is fine: the protocol must work on such a
/// network too, and tests needing loss or reordering inject it explicitly.
pub mod memory {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;
    use tokio::sync::{mpsc, Mutex, RwLock};

    /// Default payload bound, matching a UDP datagram over IPv4.
    const DEFAULT_MAX_PAYLOAD: usize = 65_507;

    /// Datagram envelope for internal routing.
    #[derive(Debug, Clone)]
    struct Envelope {
        from: PeerId,
        payload: Bytes,
    }

    /// Shared state for the memory transport network.
    pub struct MemoryNetwork {
        /// Sender channels for each node.
        senders: RwLock<HashMap<PeerId, mpsc::Sender<Envelope>>>,
        max_payload: usize,
    }

    impl MemoryNetwork {
        /// Create a new memory network.
        pub fn new() -> Arc<Self> {
            Self::with_max_payload(DEFAULT_MAX_PAYLOAD)
        }

        /// Create a network with an artificially small datagram bound,
        /// useful for exercising candidate-round splitting.
        pub fn with_max_payload(max_payload: usize) -> Arc<Self> {
            Arc::new(Self {
                senders: RwLock::new(HashMap::new()),
                max_payload,
            })
        }

        /// Create a transport attached to this network.
        pub async fn create_transport(self: &Arc<Self>, peer: PeerId) -> MemoryTransport {
            let (tx, rx) = mpsc::channel(1000);

            self.senders.write().await.insert(peer, tx);

            MemoryTransport {
                peer,
                network: Arc::clone(self),
                receiver: Mutex::new(rx),
            }
        }
    }

    /// In-memory transport implementation.
    pub struct MemoryTransport {
        peer: PeerId,
        network: Arc<MemoryNetwork>,
        receiver: Mutex<mpsc::Receiver<Envelope>>,
    }

    #[async_trait]
    impl Transport for MemoryTransport {
        async fn send_to(&self, payload: Bytes, peer: PeerId) -> Result<()> {
            let senders = self.network.senders.read().await;
            let sender = senders
                .get(&peer)
                .ok_or_else(|| ProtocolError::Transport(format!("peer {peer} not found")))?;
            sender
                .send(Envelope {
                    from: self.peer,
                    payload,
                })
                .await
                .map_err(|_| ProtocolError::Transport("peer disconnected".into()))
        }

        async fn broadcast(&self, payload: Bytes) -> Result<()> {
            let senders = self.network.senders.read().await;
            for (peer, sender) in senders.iter() {
                if peer != &self.peer {
                    // Ignore errors for broadcast (some peers may be gone).
                    let _ = sender
                        .send(Envelope {
                            from: self.peer,
                            payload: payload.clone(),
                        })
                        .await;
                }
            }
            Ok(())
        }

        async fn recv(&self) -> Result<(PeerId, Bytes)> {
            let mut rx = self.receiver.lock().await;
            match rx.recv().await {
                Some(envelope) => Ok((envelope.from, envelope.payload)),
                None => Err(ProtocolError::Transport("channel closed".into())),
            }
        }

        fn max_payload(&self) -> usize {
            self.network.max_payload
        }

        fn local_peer(&self) -> PeerId {
            self.peer
        }
    }
}

#[cfg(test)]
mod tests {
    use super::memory::MemoryNetwork;
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};

    fn peer(n: u8) -> PeerId {
        PeerId(IpAddr::V4(Ipv4Addr::new(10, 0, 0, n)))
    }

    #[tokio::test]
    async fn test_memory_transport_send_recv() {
        let network = MemoryNetwork::new();
        let a = network.create_transport(peer(1)).await;
        let b = network.create_transport(peer(2)).await;

        a.send_to(Bytes::from_static(b"NACK\n"), peer(2))
            .await
            .unwrap();

        let (from, payload) = b.recv().await.unwrap();
        assert_eq!(from, peer(1));
        assert_eq!(&*payload, b"NACK\n");
    }

    #[tokio::test]
    async fn test_memory_transport_broadcast_skips_self() {
        let network = MemoryNetwork::new();
        let a = network.create_transport(peer(1)).await;
        let b = network.create_transport(peer(2)).await;
        let c = network.create_transport(peer(3)).await;

        a.broadcast(Bytes::from_static(b"NACK\n")).await.unwrap();

        let (from_b, _) = b.recv().await.unwrap();
        let (from_c, _) = c.recv().await.unwrap();
        assert_eq!(from_b, peer(1));
        assert_eq!(from_c, peer(1));

        // Nothing looped back to the sender.
        let looped = tokio::time::timeout(std::time::Duration::from_millis(20), a.recv()).await;
        assert!(looped.is_err());
    }

    #[tokio::test]
    async fn test_memory_transport_unknown_peer() {
        let network = MemoryNetwork::new();
        let a = network.create_transport(peer(1)).await;
        assert!(a
            .send_to(Bytes::from_static(b"NACK\n"), peer(9))
            .await
            .is_err());
    }
}
