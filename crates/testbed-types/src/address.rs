//! Multiaddr-style network addresses understood by the node binaries.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

/// Transport of an address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transport {
    /// `/udp/{port}`: primary and worker-to-worker endpoints.
    Udp,
    /// `/tcp/{port}/http`: transaction ingress endpoints polled by clients.
    Http,
}

/// A network address rendered as `/ip4/{host}/udp/{port}` or
/// `/ip4/{host}/tcp/{port}/http`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NetworkAddress {
    host: Ipv4Addr,
    port: u16,
    transport: Transport,
}

impl NetworkAddress {
    /// Create an address on an arbitrary host.
    pub fn new(host: Ipv4Addr, port: u16, transport: Transport) -> Self {
        Self {
            host,
            port,
            transport,
        }
    }

    /// Loopback UDP address.
    pub fn udp(port: u16) -> Self {
        Self::new(Ipv4Addr::LOCALHOST, port, Transport::Udp)
    }

    /// Loopback HTTP-over-TCP address.
    pub fn http(port: u16) -> Self {
        Self::new(Ipv4Addr::LOCALHOST, port, Transport::Http)
    }

    pub fn host(&self) -> Ipv4Addr {
        self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn transport(&self) -> Transport {
        self.transport
    }
}

impl fmt::Display for NetworkAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.transport {
            Transport::Udp => write!(f, "/ip4/{}/udp/{}", self.host, self.port),
            Transport::Http => write!(f, "/ip4/{}/tcp/{}/http", self.host, self.port),
        }
    }
}

/// Errors parsing a [`NetworkAddress`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressError {
    #[error("malformed address {0:?}")]
    Malformed(String),

    #[error("invalid host in address {0:?}")]
    InvalidHost(String),

    #[error("invalid port in address {0:?}")]
    InvalidPort(String),
}

impl FromStr for NetworkAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim_end_matches('/').split('/').collect();
        let (host, proto, port, suffix) = match parts.as_slice() {
            ["", "ip4", host, proto, port] => (*host, *proto, *port, None),
            ["", "ip4", host, proto, port, suffix] => (*host, *proto, *port, Some(*suffix)),
            _ => return Err(AddressError::Malformed(s.to_string())),
        };

        let host: Ipv4Addr = host
            .parse()
            .map_err(|_| AddressError::InvalidHost(s.to_string()))?;
        let port: u16 = port
            .parse()
            .map_err(|_| AddressError::InvalidPort(s.to_string()))?;

        let transport = match (proto, suffix) {
            ("udp", None) => Transport::Udp,
            ("tcp", Some("http")) => Transport::Http,
            _ => return Err(AddressError::Malformed(s.to_string())),
        };

        Ok(Self::new(host, port, transport))
    }
}

impl Serialize for NetworkAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for NetworkAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
