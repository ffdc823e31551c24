//! Peer identity.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr};

/// Identity of a remote host the protocol is being run with.
///
/// Keyed by network address rather than by any exchanged identifier: the
/// protocol has no handshake, hosts simply "tune in" to each other's
/// candidate broadcasts. Only the address part is used, never the port,
/// because send and receive ports may differ.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PeerId(pub IpAddr);

impl PeerId {
    /// Create from an IP address.
    pub const fn from_addr(addr: IpAddr) -> Self {
        Self(addr)
    }

    /// The loopback peer, mostly useful in tests.
    pub const LOCALHOST: Self = Self(IpAddr::V4(Ipv4Addr::LOCALHOST));

    /// Get the underlying address.
    pub const fn addr(&self) -> IpAddr {
        self.0
    }
}

impl fmt::Debug for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PeerId({})", self.0)
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<IpAddr> for PeerId {
    fn from(addr: IpAddr) -> Self {
        Self(addr)
    }
}
