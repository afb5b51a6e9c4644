use std::fmt;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, ToSocketAddrs};
use std::str::FromStr;

use crate::error::SocketError;

/// IPv4 address and port of a remote peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PeerAddress {
    ip: [u8; 4],
    port: u16,
}

impl PeerAddress {
    /// `0.0.0.0:0`, used while no server is known.
    pub const NULL: PeerAddress = PeerAddress::new([0, 0, 0, 0], 0);

    pub const fn new(ip: [u8; 4], port: u16) -> Self {
        Self { ip, port }
    }

    pub const fn localhost(port: u16) -> Self {
        Self::new([127, 0, 0, 1], port)
    }

    /// Builds an address from a dotted quad or a host name.
    ///
    /// Dotted quads are taken literally; anything else goes through the system
    /// resolver and the first IPv4 result wins.
    pub fn resolve(host: &str, port: u16) -> Result<Self, SocketError> {
        if let Ok(ip) = host.parse::<Ipv4Addr>() {
            return Ok(Self::new(ip.octets(), port));
        }

        let resolved = (host, port)
            .to_socket_addrs()
            .map_err(|_| SocketError::Resolve(host.to_string()))?;

        resolved
            .filter_map(Self::from_socket_addr)
            .next()
            .ok_or_else(|| SocketError::Resolve(host.to_string()))
    }

    /// Converts a socket address, accepting IPv4 and IPv4-mapped IPv6 only.
    pub fn from_socket_addr(addr: SocketAddr) -> Option<Self> {
        match addr {
            SocketAddr::V4(v4) => Some(Self::from(v4)),
            SocketAddr::V6(v6) => v6
                .ip()
                .to_ipv4_mapped()
                .map(|ip| Self::new(ip.octets(), v6.port())),
        }
    }

    pub fn ip(&self) -> [u8; 4] {
        self.ip
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn is_null(&self) -> bool {
        *self == Self::NULL
    }

    pub fn to_socket_addr(&self) -> SocketAddr {
        SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::from(self.ip), self.port))
    }
}

impl From<SocketAddrV4> for PeerAddress {
    fn from(addr: SocketAddrV4) -> Self {
        Self::new(addr.ip().octets(), addr.port())
    }
}

impl From<PeerAddress> for SocketAddr {
    fn from(addr: PeerAddress) -> Self {
        addr.to_socket_addr()
    }
}

impl fmt::Display for PeerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d] = self.ip;
        write!(f, "{}.{}.{}.{}:{}", a, b, c, d, self.port)
    }
}

impl FromStr for PeerAddress {
    type Err = std::net::AddrParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<SocketAddrV4>().map(Self::from)
    }
}
