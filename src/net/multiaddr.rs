//! Multi-protocol network addresses.
//!
//! Supports the subset the daemon listens on and dials:
//! `/ip4/<addr>/tcp/<port>` and `/ip6/<addr>/tcp/<port>`, optionally
//! followed by `/ipfs/<peer-id>` or `/p2p/<peer-id>`.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::str::FromStr;
use thiserror::Error;

/// Errors produced while parsing a multiaddr.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddrError {
    #[error("empty address")]
    Empty,

    #[error("address must start with '/'")]
    MissingLeadingSlash,

    #[error("unknown protocol {0:?}")]
    UnknownProtocol(String),

    #[error("protocol {0:?} is missing its value")]
    MissingValue(String),

    #[error("invalid value {value:?} for protocol {protocol:?}")]
    InvalidValue { protocol: String, value: String },

    #[error("address needs an ip4/ip6 component followed by tcp")]
    Incomplete,

    #[error("unexpected trailing component {0:?}")]
    Trailing(String),
}

/// A parsed `/ip{4,6}/<addr>/tcp/<port>[/ipfs/<peer>]` address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Multiaddr {
    socket: SocketAddr,
    peer: Option<String>,
}

impl Multiaddr {
    /// Build an address from a concrete socket address.
    pub fn from_socket_addr(socket: SocketAddr) -> Self {
        Self { socket, peer: None }
    }

    /// The transport part of the address.
    pub fn socket_addr(&self) -> SocketAddr {
        self.socket
    }

    /// The peer id component, if any.
    pub fn peer_id(&self) -> Option<&str> {
        self.peer.as_deref()
    }

    /// The address with its peer id component removed.
    pub fn transport(&self) -> Multiaddr {
        Self::from_socket_addr(self.socket)
    }

    /// Whether the port asks the OS to pick one.
    pub fn is_ephemeral(&self) -> bool {
        self.socket.port() == 0
    }
}

impl FromStr for Multiaddr {
    type Err = AddrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(AddrError::Empty);
        }
        let rest = s.strip_prefix('/').ok_or(AddrError::MissingLeadingSlash)?;
        let mut parts = rest.split('/');

        let ip = match parts.next() {
            Some(protocol @ "ip4") => {
                let value = value_of(&mut parts, protocol)?;
                IpAddr::V4(
                    value
                        .parse::<Ipv4Addr>()
                        .map_err(|_| invalid(protocol, value))?,
                )
            }
            Some(protocol @ "ip6") => {
                let value = value_of(&mut parts, protocol)?;
                IpAddr::V6(
                    value
                        .parse::<Ipv6Addr>()
                        .map_err(|_| invalid(protocol, value))?,
                )
            }
            Some(other) if !is_known(other) => {
                return Err(AddrError::UnknownProtocol(other.to_string()))
            }
            _ => return Err(AddrError::Incomplete),
        };

        let port = match parts.next() {
            Some(protocol @ "tcp") => {
                let value = value_of(&mut parts, protocol)?;
                value.parse::<u16>().map_err(|_| invalid(protocol, value))?
            }
            Some(other) if !is_known(other) => {
                return Err(AddrError::UnknownProtocol(other.to_string()))
            }
            _ => return Err(AddrError::Incomplete),
        };

        let peer = match parts.next() {
            None => None,
            Some(protocol @ ("ipfs" | "p2p")) => Some(value_of(&mut parts, protocol)?.to_string()),
            Some(other) => return Err(AddrError::Trailing(other.to_string())),
        };

        if let Some(extra) = parts.next() {
            return Err(AddrError::Trailing(extra.to_string()));
        }

        Ok(Self {
            socket: SocketAddr::new(ip, port),
            peer,
        })
    }
}

fn value_of<'a>(
    parts: &mut impl Iterator<Item = &'a str>,
    protocol: &str,
) -> Result<&'a str, AddrError> {
    parts
        .next()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AddrError::MissingValue(protocol.to_string()))
}

fn invalid(protocol: &str, value: &str) -> AddrError {
    AddrError::InvalidValue {
        protocol: protocol.to_string(),
        value: value.to_string(),
    }
}

fn is_known(protocol: &str) -> bool {
    matches!(protocol, "ip4" | "ip6" | "tcp" | "ipfs" | "p2p")
}

impl fmt::Display for Multiaddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.socket.ip() {
            IpAddr::V4(ip) => write!(f, "/ip4/{}", ip)?,
            IpAddr::V6(ip) => write!(f, "/ip6/{}", ip)?,
        }
        write!(f, "/tcp/{}", self.socket.port())?;
        if let Some(peer) = &self.peer {
            write!(f, "/ipfs/{}", peer)?;
        }
        Ok(())
    }
}

impl From<SocketAddr> for Multiaddr {
    fn from(socket: SocketAddr) -> Self {
        Self::from_socket_addr(socket)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ip4_tcp() {
        let addr: Multiaddr = "/ip4/127.0.0.1/tcp/5001".parse().unwrap();
        assert_eq!(addr.socket_addr(), "127.0.0.1:5001".parse().unwrap());
        assert_eq!(addr.peer_id(), None);
        assert_eq!(addr.to_string(), "/ip4/127.0.0.1/tcp/5001");
    }

    #[test]
    fn parses_ip6_with_peer() {
        let addr: Multiaddr = "/ip6/::1/tcp/4002/p2p/QmPeer".parse().unwrap();
        assert_eq!(addr.peer_id(), Some("QmPeer"));
        assert_eq!(addr.transport().to_string(), "/ip6/::1/tcp/4002");
        assert_eq!(addr.to_string(), "/ip6/::1/tcp/4002/ipfs/QmPeer");
    }

    #[test]
    fn ephemeral_port() {
        let addr: Multiaddr = "/ip4/0.0.0.0/tcp/0".parse().unwrap();
        assert!(addr.is_ephemeral());
    }

    #[test]
    fn rejects_malformed_addresses() {
        assert_eq!("".parse::<Multiaddr>(), Err(AddrError::Empty));
        assert_eq!(
            "ip4/1.2.3.4/tcp/1".parse::<Multiaddr>(),
            Err(AddrError::MissingLeadingSlash)
        );
        assert_eq!(
            "/dns4/example.org/tcp/80".parse::<Multiaddr>(),
            Err(AddrError::UnknownProtocol("dns4".to_string()))
        );
        assert_eq!(
            "/ip4/1.2.3.4".parse::<Multiaddr>(),
            Err(AddrError::Incomplete)
        );
        assert_eq!(
            "/ip4/1.2.3.4/tcp/99999".parse::<Multiaddr>(),
            Err(AddrError::InvalidValue {
                protocol: "tcp".to_string(),
                value: "99999".to_string()
            })
        );
        assert_eq!(
            "/ip4/1.2.3.4/tcp/80/http".parse::<Multiaddr>(),
            Err(AddrError::Trailing("http".to_string()))
        );
        assert_eq!(
            "/ip4/1.2.3.4/udp/80".parse::<Multiaddr>(),
            Err(AddrError::UnknownProtocol("udp".to_string()))
        );
    }
}
