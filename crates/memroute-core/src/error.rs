//! Configuration error types.

use thiserror::Error;

/// Errors reported by [`MemrouteConfig::validate`](crate::MemrouteConfig::validate).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("scheduler `{0}` needs at least one host")]
    NoHosts(String),

    #[error("manual scheduler needs a non-empty [scheduler.buckets] table")]
    NoBuckets,

    #[error("bucket_count must be a power of two in [1, 65536], got {0}")]
    InvalidBucketCount(usize),

    #[error("invalid duration for `{field}`: {value:?}")]
    InvalidDuration { field: &'static str, value: String },

    #[error("discovery mailbox must hold at least one message")]
    EmptyMailbox,

    #[error("unknown scheduler kind: {0}")]
    UnknownKind(String),
}
