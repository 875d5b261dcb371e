//! Scheduler error types.

use thiserror::Error;

/// Errors that can occur while building a scheduler.
///
/// Routing itself never fails; every error is a construction-time error.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("unknown hash method: {0}")]
    UnknownHashMethod(String),

    #[error("scheduler needs at least one host")]
    NoHosts,

    #[error("duplicate host address: {0}")]
    DuplicateHost(String),

    #[error("bucket count must be a power of two in [1, 65536], got {0}")]
    InvalidBucketCount(usize),

    #[error("bucket {0} has no hosts assigned")]
    EmptyBucket(usize),

    #[error("consistent-hash ring is not sorted after construction")]
    UnsortedRing,

    #[error("auto scheduler must be created inside a tokio runtime")]
    NoRuntime,

    #[error("invalid configuration: {0}")]
    Config(#[from] memroute_core::ConfigError),
}

pub type SchedulerResult<T> = Result<T, SchedulerError>;
