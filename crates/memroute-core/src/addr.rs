//! Host address parsing.

use std::fmt;

/// The port memcache-compatible servers listen on unless told otherwise.
pub const DEFAULT_PORT: u16 = 11211;

/// A `host:port` address split into its parts.
///
/// Addresses without a numeric port keep the whole string as `host`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HostAddr {
    pub host: String,
    pub port: Option<u16>,
}

impl HostAddr {
    pub fn parse(addr: &str) -> Self {
        match addr.rsplit_once(':') {
            Some((host, port)) if !host.is_empty() => match port.parse::<u16>() {
                Ok(port) => Self {
                    host: host.to_string(),
                    port: Some(port),
                },
                Err(_) => Self {
                    host: addr.to_string(),
                    port: None,
                },
            },
            _ => Self {
                host: addr.to_string(),
                port: None,
            },
        }
    }

    /// Whether the address names [`DEFAULT_PORT`] explicitly.
    pub fn is_default_port(&self) -> bool {
        self.port == Some(DEFAULT_PORT)
    }
}

impl fmt::Display for HostAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.port {
            Some(port) => write!(f, "{}:{}", self.host, port),
            None => f.write_str(&self.host),
        }
    }
}
