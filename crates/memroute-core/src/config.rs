//! memroute.toml configuration parser.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Largest bucket count the auto scheduler accepts (16 bits of hash prefix).
pub const MAX_BUCKET_COUNT: usize = 1 << 16;

const DEFAULT_HASH: &str = "fnv1a1";
const DEFAULT_BUCKET_COUNT: usize = 16;
const DEFAULT_DISCOVERY_INTERVAL: Duration = Duration::from_secs(10);
const DEFAULT_MAILBOX: usize = 1024;
const DEFAULT_HOST_TIMEOUT: Duration = Duration::from_secs(1);
const DEFAULT_LOG_FILTER: &str = "info";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemrouteConfig {
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub discovery: DiscoveryConfig,
    #[serde(default)]
    pub host: HostConfig,
    #[serde(default)]
    pub log: LogConfig,
}

/// Routing strategy selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchedulerKind {
    Mod,
    Consistent,
    Manual,
    Auto,
}

impl fmt::Display for SchedulerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SchedulerKind::Mod => "mod",
            SchedulerKind::Consistent => "consistent",
            SchedulerKind::Manual => "manual",
            SchedulerKind::Auto => "auto",
        };
        f.write_str(name)
    }
}

impl FromStr for SchedulerKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mod" => Ok(SchedulerKind::Mod),
            "consistent" => Ok(SchedulerKind::Consistent),
            "manual" => Ok(SchedulerKind::Manual),
            "auto" => Ok(SchedulerKind::Auto),
            other => Err(ConfigError::UnknownKind(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    pub kind: SchedulerKind,
    pub hash: Option<String>,
    pub hosts: Option<Vec<String>>,
    pub bucket_count: Option<usize>,
    /// Manual assignment: host address -> bucket indices it serves.
    pub buckets: Option<BTreeMap<String, Vec<usize>>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    pub enabled: Option<bool>,
    pub interval: Option<String>,
    pub mailbox: Option<usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HostConfig {
    pub timeout: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogConfig {
    pub filter: Option<String>,
    pub access: Option<PathBuf>,
    pub error: Option<PathBuf>,
}

impl MemrouteConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse and validate a config document.
    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let config: MemrouteConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Check the cross-field constraints serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.scheduler.validate()?;

        if let Some(interval) = &self.discovery.interval {
            if parse_duration(interval).is_none() {
                return Err(ConfigError::InvalidDuration {
                    field: "discovery.interval",
                    value: interval.clone(),
                });
            }
        }
        if self.discovery.mailbox == Some(0) {
            return Err(ConfigError::EmptyMailbox);
        }
        if let Some(timeout) = &self.host.timeout {
            if parse_duration(timeout).is_none() {
                return Err(ConfigError::InvalidDuration {
                    field: "host.timeout",
                    value: timeout.clone(),
                });
            }
        }
        Ok(())
    }

    /// Scaffold a minimal memroute.toml for the given strategy.
    pub fn scaffold(kind: SchedulerKind) -> Self {
        let hosts = vec!["127.0.0.1:11211".to_string(), "127.0.0.1:11212".to_string()];
        let buckets = (kind == SchedulerKind::Manual).then(|| {
            BTreeMap::from([
                (hosts[0].clone(), vec![0, 1]),
                (hosts[1].clone(), vec![1, 2, 3]),
            ])
        });
        MemrouteConfig {
            scheduler: SchedulerConfig {
                kind,
                hash: Some(DEFAULT_HASH.to_string()),
                hosts: (kind != SchedulerKind::Manual).then_some(hosts),
                bucket_count: (kind == SchedulerKind::Auto).then_some(DEFAULT_BUCKET_COUNT),
                buckets,
            },
            discovery: DiscoveryConfig {
                enabled: Some(true),
                interval: Some("10s".to_string()),
                mailbox: Some(DEFAULT_MAILBOX),
            },
            host: HostConfig {
                timeout: Some("1s".to_string()),
            },
            log: LogConfig {
                filter: Some(DEFAULT_LOG_FILTER.to_string()),
                access: None,
                error: None,
            },
        }
    }
}

impl FromStr for MemrouteConfig {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl SchedulerConfig {
    pub fn hash_name(&self) -> &str {
        self.hash.as_deref().unwrap_or(DEFAULT_HASH)
    }

    pub fn hosts(&self) -> &[String] {
        self.hosts.as_deref().unwrap_or_default()
    }

    pub fn bucket_count(&self) -> usize {
        self.bucket_count.unwrap_or(DEFAULT_BUCKET_COUNT)
    }

    /// Check that the `[scheduler]` section names what its kind needs.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.kind {
            SchedulerKind::Manual => {
                if self.buckets.as_ref().is_none_or(|b| b.is_empty()) {
                    return Err(ConfigError::NoBuckets);
                }
            }
            kind => {
                if self.hosts().is_empty() {
                    return Err(ConfigError::NoHosts(kind.to_string()));
                }
            }
        }

        if self.kind == SchedulerKind::Auto {
            let count = self.bucket_count();
            if !count.is_power_of_two() || count > MAX_BUCKET_COUNT {
                return Err(ConfigError::InvalidBucketCount(count));
            }
        }
        Ok(())
    }
}

impl DiscoveryConfig {
    pub fn enabled(&self) -> bool {
        self.enabled.unwrap_or(true)
    }

    pub fn interval(&self) -> Duration {
        self.interval
            .as_deref()
            .and_then(parse_duration)
            .unwrap_or(DEFAULT_DISCOVERY_INTERVAL)
    }

    pub fn mailbox(&self) -> usize {
        self.mailbox.unwrap_or(DEFAULT_MAILBOX).max(1)
    }
}

impl HostConfig {
    pub fn timeout(&self) -> Duration {
        self.timeout
            .as_deref()
            .and_then(parse_duration)
            .unwrap_or(DEFAULT_HOST_TIMEOUT)
    }
}

impl LogConfig {
    pub fn filter(&self) -> &str {
        self.filter.as_deref().unwrap_or(DEFAULT_LOG_FILTER)
    }
}

/// Parse a duration string like "5s", "500ms", "1m". A bare number is seconds.
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    let (value, unit) = s.split_at(s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len()));
    let value: u64 = value.parse().ok()?;
    match unit {
        "" | "s" => Some(Duration::from_secs(value)),
        "ms" => Some(Duration::from_millis(value)),
        "m" => value.checked_mul(60).map(Duration::from_secs),
        _ => None,
    }
}
