use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

pub mod endpoint;

pub use self::endpoint::{Endpoint, ListenAddr, ParseEndpointError};

/// Which way the relay bridges the two address families.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Accept IPv6 clients, dial the target over IPv4.
    Forward,
    /// Accept IPv4 clients, dial the target over IPv6.
    Reverse,
}

impl Direction {
    pub fn listen_family(self) -> Family {
        match self {
            Self::Forward => Family::V6,
            Self::Reverse => Family::V4,
        }
    }

    pub fn dial_family(self) -> Family {
        match self {
            Self::Forward => Family::V4,
            Self::Reverse => Family::V6,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Forward => f.write_str("IPv6 to IPv4"),
            Self::Reverse => f.write_str("IPv4 to IPv6"),
        }
    }
}

/// An address-family preference. `Any` disables filtering and is what the
/// one-shot fallback retries with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Family {
    V4,
    V6,
    Any,
}

impl Family {
    pub fn of(addr: &SocketAddr) -> Self {
        if addr.is_ipv6() { Self::V6 } else { Self::V4 }
    }

    pub fn matches(self, addr: &SocketAddr) -> bool {
        match self {
            Self::V4 => addr.is_ipv4(),
            Self::V6 => addr.is_ipv6(),
            Self::Any => true,
        }
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::V4 => f.write_str("IPv4"),
            Self::V6 => f.write_str("IPv6"),
            Self::Any => f.write_str("any family"),
        }
    }
}

/// Everything the relay needs to run, settled once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub direction: Direction,
    pub listen: ListenAddr,
    pub target: Endpoint,
    /// Serve this many connections, then drain and exit. 0 is unlimited.
    pub max_connections: u64,
    /// Pause between one accepted connection and the next.
    pub accept_delay: Duration,
}
