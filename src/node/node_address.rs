use std::net::SocketAddr;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CodecError;

/// Host and port of a seed or peer endpoint
#[derive(
    Clone, Debug, Deserialize, Serialize, PartialEq, PartialOrd, Ord, Eq, Hash,
)]
pub struct NodeAddress {
    pub host: String,
    pub port: u16,
}

impl NodeAddress {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Hosts travel inside colon-delimited frames, so they may not carry a colon
    pub fn validate_host(host: &str) -> std::result::Result<(), CodecError> {
        if host.is_empty() || host.contains(':') || host.contains(char::is_whitespace) {
            return Err(CodecError::InvalidHost(host.to_string()));
        }
        Ok(())
    }

    pub fn parse_port(port: &str) -> std::result::Result<u16, CodecError> {
        port.trim()
            .parse::<u16>()
            .map_err(|_| CodecError::InvalidPort(port.to_string()))
    }

    /// Parse `host:port`, or a bare `port` resolved against `default_host`
    pub fn parse_with_default_host(
        s: &str,
        default_host: &str,
    ) -> std::result::Result<Self, CodecError> {
        match s.trim().rsplit_once(':') {
            Some((host, port)) => {
                Self::validate_host(host)?;
                Ok(Self::new(host, Self::parse_port(port)?))
            }
            None => Ok(Self::new(default_host, Self::parse_port(s)?)),
        }
    }

    pub fn from_socket_addr(addr: SocketAddr) -> Self {
        Self::new(addr.ip().to_string(), addr.port())
    }
}

impl FromStr for NodeAddress {
    type Err = CodecError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (host, port) = s
            .trim()
            .rsplit_once(':')
            .ok_or(CodecError::MissingField("port"))?;
        Self::validate_host(host)?;
        Ok(Self::new(host, Self::parse_port(port)?))
    }
}

impl std::fmt::Display for NodeAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}
