//! UDP transport.
//!
//! Binds one socket for receiving and sends unicast datagrams straight to
//! `peer:send_port`. The broadcast target is the configured group address:
//! a multicast group is joined and used as-is, while a unicast group
//! address turns "broadcast" into plain unicast to that host, which is
//! handy for two-party setups and loopback tests.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::net::UdpSocket;
use tracing::debug;

use ckp_core::PeerId;

use crate::error::ProtocolError;
use crate::transport::{Result, Transport};

/// Largest payload of a UDP datagram over IPv4 (65535 minus IP and UDP
/// headers). Plenty large; fragmentation is the network's problem.
pub const MAX_UDP_PAYLOAD: usize = 65_507;

/// Configuration for [`UdpTransport`].
#[derive(Debug, Clone)]
pub struct UdpConfig {
    /// Local port to listen on. Zero picks an ephemeral port.
    pub receive_port: u16,
    /// Remote port to send to. Usually equal to `receive_port`, but kept
    /// separate so several instances can share one machine.
    pub send_port: u16,
    /// Broadcast target: a multicast group to join, or a unicast address
    /// for two-party operation.
    pub group: IpAddr,
}

/// Datagram transport over a UDP socket.
pub struct UdpTransport {
    socket: UdpSocket,
    send_port: u16,
    group: IpAddr,
    local: SocketAddr,
}

impl UdpTransport {
    /// Bind the receive socket and join the multicast group if one was
    /// configured.
    pub async fn bind(config: UdpConfig) -> Result<Self> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, config.receive_port))
            .await
            .map_err(|e| ProtocolError::Transport(format!("bind failed: {e}")))?;

        match config.group {
            IpAddr::V4(group) if group.is_multicast() => {
                socket
                    .join_multicast_v4(group, Ipv4Addr::UNSPECIFIED)
                    .map_err(|e| {
                        ProtocolError::Transport(format!("joining group {group} failed: {e}"))
                    })?;
            }
            IpAddr::V6(group) if group.is_multicast() => {
                socket.join_multicast_v6(&group, 0).map_err(|e| {
                    ProtocolError::Transport(format!("joining group {group} failed: {e}"))
                })?;
            }
            group => {
                debug!(%group, "group address is unicast, broadcasts go straight to it");
            }
        }

        let local = socket
            .local_addr()
            .map_err(|e| ProtocolError::Transport(e.to_string()))?;
        debug!(%local, group = %config.group, "udp transport bound");

        Ok(Self {
            socket,
            send_port: config.send_port,
            group: config.group,
            local,
        })
    }

    /// The bound local address (useful when binding an ephemeral port).
    pub fn local_addr(&self) -> SocketAddr {
        self.local
    }
}

#[async_trait]
impl Transport for UdpTransport {
    async fn send_to(&self, payload: Bytes, peer: PeerId) -> Result<()> {
        let target = SocketAddr::new(peer.addr(), self.send_port);
        self.socket
            .send_to(&payload, target)
            .await
            .map_err(|e| ProtocolError::Transport(format!("send to {target} failed: {e}")))?;
        Ok(())
    }

    async fn broadcast(&self, payload: Bytes) -> Result<()> {
        let target = SocketAddr::new(self.group, self.send_port);
        self.socket
            .send_to(&payload, target)
            .await
            .map_err(|e| ProtocolError::Transport(format!("broadcast to {target} failed: {e}")))?;
        Ok(())
    }

    async fn recv(&self) -> Result<(PeerId, Bytes)> {
        let mut buf = vec![0u8; MAX_UDP_PAYLOAD];
        let (len, from) = self
            .socket
            .recv_from(&mut buf)
            .await
            .map_err(|e| ProtocolError::Transport(format!("recv failed: {e}")))?;
        buf.truncate(len);
        // Only the address identifies the peer; the source port is
        // ephemeral and may change between datagrams.
        Ok((PeerId::from_addr(from.ip()), Bytes::from(buf)))
    }

    fn max_payload(&self) -> usize {
        MAX_UDP_PAYLOAD
    }

    fn local_peer(&self) -> PeerId {
        PeerId::from_addr(self.local.ip())
    }
}
