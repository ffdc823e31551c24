//! # CKP over datagrams
//!
//! Runs the candidate key protocol between hosts over an unreliable,
//! reordering datagram transport (typically UDP multicast).
//!
//! ## Overview
//!
//! Both hosts feed rounds of correlated key material into
//! [`KeyAgreement::add_candidates`]; candidate digests are broadcast and
//! matched on the other side. There is no key agreement to attack in the
//! middle: a host can only follow the protocol if it independently holds
//! the same raw material. Lost or crossing packets cannot yield different
//! final keys, because every candidate key is confirmed by exchanging
//! hashes in a two-stage acknowledgment before use.
//!
//! ## Message Flow
//!
//! ```text
//! Host A                               Host B
//!   |-------- CAND r d1 d2 .. -------->|  broadcast each round
//!   |<------- CAND r' e1 e2 .. --------|
//!   |-------- MATCH r' i ------------->|  (optional, send_matches)
//!   |-------- KEY n h ---------------->|  eligibility reached
//!   |<------- KEY n' h' ---------------|
//!   |<------- ACK h -------------------|  stage 1
//!   |-------- ACK h' ----------------->|
//!   |            (both resolve the final key: stage 2)
//! ```
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use ckp_net::{KeyAgreement, ProtocolConfig, ProtocolEvent, UdpConfig, UdpTransport};
//!
//! async fn example() -> ckp_net::Result<()> {
//!     let transport = UdpTransport::bind(UdpConfig {
//!         receive_port: 54321,
//!         send_port: 54321,
//!         group: "239.1.1.7".parse().unwrap(),
//!     })
//!     .await?;
//!
//!     let engine = KeyAgreement::new(Arc::new(transport), ProtocolConfig::default())?;
//!     let mut events = engine.subscribe().await;
//!
//!     // Feed rounds from the sensor pipeline...
//!     engine.add_candidates(&[vec![1, 2, 3]], 4.0).await?;
//!
//!     while let Some(event) = events.recv().await {
//!         if let ProtocolEvent::Succeeded { peer, key } = event {
//!             println!("shared key with {peer}: {} bytes", key.len());
//!             break;
//!         }
//!     }
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod event;
pub mod protocol;
pub mod transport;
pub mod udp;
pub mod wire;

pub use error::{ProtocolError, Result, WireError};
pub use event::ProtocolEvent;
pub use protocol::{KeyAgreement, ProtocolConfig};
pub use transport::{memory::MemoryNetwork, memory::MemoryTransport, Transport};
pub use udp::{UdpConfig, UdpTransport, MAX_UDP_PAYLOAD};
pub use wire::WireMessage;
