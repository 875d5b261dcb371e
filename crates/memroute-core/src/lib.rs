//! memroute-core — configuration and address types shared by every memroute crate.
//!
//! [`MemrouteConfig`] models `memroute.toml`: which scheduler to build and
//! over which hosts, how discovery runs, host timeouts and log outputs.
//! [`HostAddr`] splits a `host[:port]` address.

pub mod addr;
pub mod config;
pub mod error;

pub use addr::HostAddr;
pub use config::{
    parse_duration, DiscoveryConfig, HostConfig, LogConfig, MemrouteConfig, SchedulerConfig,
    SchedulerKind,
};
pub use error::ConfigError;
