use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

use thiserror::Error;

/// A dialable `host:port` pair. The host stays exactly as written: a
/// hostname, an IPv4 literal or a bracketless IPv6 literal, scope id and
/// all. Resolution happens at connect time, not here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseEndpointError {
    #[error("missing ':port' suffix")]
    MissingPort,

    #[error("{0}")]
    InvalidPort(ParseIntError),

    #[error("empty host")]
    EmptyHost,
}

impl FromStr for Endpoint {
    type Err = ParseEndpointError;

    // Syntax: <host>:<port>
    //
    // The port is everything after the last colon, so IPv6 literals need
    // no brackets: "fe80::1%eth0:5900" is host "fe80::1%eth0", port 5900.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        use ParseEndpointError::*;

        let (host, port) = s.rsplit_once(':').ok_or(MissingPort)?;

        if port.is_empty() || !port.bytes().all(|b| b.is_ascii_digit()) {
            return Err(MissingPort);
        }

        if host.is_empty() {
            return Err(EmptyHost);
        }

        let port = port.parse().map_err(InvalidPort)?;

        Ok(Self {
            host: host.to_owned(),
            port,
        })
    }
}

/// Where to accept connections. A bare port means the unspecified address
/// of whichever family ends up listening.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenAddr {
    pub host: Option<String>,
    pub port: u16,
}

impl fmt::Display for ListenAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.host {
            Some(host) => write!(f, "{}:{}", host, self.port),
            None => write!(f, "*:{}", self.port),
        }
    }
}

impl FromStr for ListenAddr {
    type Err = ParseEndpointError;

    // Syntax: <port> | <host>:<port>
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        use ParseEndpointError::*;

        if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) {
            let port = s.parse().map_err(InvalidPort)?;

            return Ok(Self { host: None, port });
        }

        let Endpoint { host, port } = s.parse()?;

        Ok(Self {
            host: Some(host),
            port,
        })
    }
}
