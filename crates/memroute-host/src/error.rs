//! Host error types.

use thiserror::Error;

/// Result type alias for host operations.
pub type HostResult<T> = Result<T, HostError>;

/// Errors a host request can fail with.
#[derive(Debug, Error)]
pub enum HostError {
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("request to {0} timed out")]
    Timeout(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("invalid key: {0:?}")]
    InvalidKey(String),

    #[error("server error: {0}")]
    Server(String),
}
