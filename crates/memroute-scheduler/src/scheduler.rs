//! The routing contract and a config-driven factory.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use memroute_core::{DiscoveryConfig, HostConfig, SchedulerConfig, SchedulerKind};
use memroute_host::Host;
use tracing::info;

use crate::auto::{AutoOptions, AutoScheduler};
use crate::consistent::ConsistentHashScheduler;
use crate::error::SchedulerResult;
use crate::hash::HashMethod;
use crate::manual::ManualScheduler;
use crate::modulo::ModScheduler;

/// Routes keys to hosts.
///
/// Implementations are shared across request tasks behind an
/// `Arc<dyn Scheduler>`; every method takes `&self`.
#[async_trait]
pub trait Scheduler: Send + Sync {
    /// Every host this scheduler can route to.
    fn hosts(&self) -> &[Arc<Host>];

    /// Hosts for `key` in preference order; callers try them front to back.
    fn get_hosts_by_key(&self, key: &str) -> Vec<Arc<Host>>;

    /// Partition `keys` so each group can go out in one round trip.
    ///
    /// Groups are indexed by host for modulo and consistent hashing and
    /// by bucket for manual and auto routing.
    fn divide_keys_by_bucket(&self, keys: &[String]) -> Vec<Vec<String>>;

    /// Report how an operation against `host` for `key` went.
    ///
    /// Positive values reward the host, negative ones penalise it.
    /// Best effort: schedulers that do not adapt ignore it.
    async fn feedback(&self, _host: &Host, _key: &str, _adjust: f64) {}

    /// Per-host weight vectors, for introspection only.
    fn stats(&self) -> HashMap<String, Vec<f64>>;
}

/// Build host handles for a list of addresses.
pub fn connect_hosts(addrs: &[String], timeout: Duration) -> Vec<Arc<Host>> {
    addrs
        .iter()
        .map(|addr| Arc::new(Host::with_timeout(addr.clone(), timeout)))
        .collect()
}

/// Build the scheduler a config asks for.
///
/// The `[scheduler]` section is validated first, so configs that were
/// built in code rather than parsed are checked too. Auto schedulers spawn
/// their workers on the current tokio runtime.
pub fn build_scheduler(
    config: &SchedulerConfig,
    discovery: &DiscoveryConfig,
    host: &HostConfig,
) -> SchedulerResult<Arc<dyn Scheduler>> {
    config.validate()?;
    let hash: HashMethod = config.hash_name().parse()?;
    let timeout = host.timeout();

    let scheduler: Arc<dyn Scheduler> = match config.kind {
        SchedulerKind::Mod => Arc::new(ModScheduler::new(
            connect_hosts(config.hosts(), timeout),
            hash,
        )?),
        SchedulerKind::Consistent => Arc::new(ConsistentHashScheduler::new(
            connect_hosts(config.hosts(), timeout),
            hash,
        )?),
        SchedulerKind::Manual => {
            let assignment = config
                .buckets
                .iter()
                .flatten()
                .map(|(addr, buckets)| {
                    (
                        Arc::new(Host::with_timeout(addr.clone(), timeout)),
                        buckets.clone(),
                    )
                })
                .collect();
            Arc::new(ManualScheduler::new(assignment, hash)?)
        }
        SchedulerKind::Auto => {
            let options = AutoOptions {
                check_interval: discovery.interval(),
                mailbox: discovery.mailbox(),
                discovery: discovery.enabled(),
            };
            Arc::new(AutoScheduler::new(
                connect_hosts(config.hosts(), timeout),
                config.bucket_count(),
                hash,
                options,
            )?)
        }
    };

    info!(
        kind = %config.kind,
        %hash,
        hosts = scheduler.hosts().len(),
        "scheduler built"
    );
    Ok(scheduler)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SchedulerError;
    use memroute_core::ConfigError;
    use std::collections::BTreeMap;

    fn config(kind: SchedulerKind) -> SchedulerConfig {
        SchedulerConfig {
            kind,
            hash: None,
            hosts: Some(vec!["a:11211".into(), "b:11211".into()]),
            bucket_count: Some(4),
            buckets: Some(BTreeMap::from([
                ("a:11211".to_string(), vec![0, 1]),
                ("b:11211".to_string(), vec![1]),
            ])),
        }
    }

    fn no_discovery() -> DiscoveryConfig {
        DiscoveryConfig {
            enabled: Some(false),
            ..DiscoveryConfig::default()
        }
    }

    #[tokio::test]
    async fn builds_every_kind() {
        let host = HostConfig::default();
        for (kind, groups) in [
            (SchedulerKind::Mod, 2),
            (SchedulerKind::Consistent, 2),
            (SchedulerKind::Manual, 2),
            (SchedulerKind::Auto, 4),
        ] {
            let scheduler = build_scheduler(&config(kind), &no_discovery(), &host).unwrap();
            assert_eq!(scheduler.hosts().len(), 2, "{kind}");
            assert!(!scheduler.get_hosts_by_key("k").is_empty(), "{kind}");
            assert_eq!(
                scheduler.divide_keys_by_bucket(&["k".to_string()]).len(),
                groups,
                "{kind}"
            );
        }
    }

    #[tokio::test]
    async fn unknown_hash_is_rejected() {
        let mut cfg = config(SchedulerKind::Mod);
        cfg.hash = Some("crc64".into());
        let result = build_scheduler(&cfg, &no_discovery(), &HostConfig::default());
        assert!(matches!(result, Err(SchedulerError::UnknownHashMethod(_))));
    }

    #[tokio::test]
    async fn invalid_section_is_a_config_error() {
        let mut cfg = config(SchedulerKind::Auto);
        cfg.bucket_count = Some(12);
        let result = build_scheduler(&cfg, &no_discovery(), &HostConfig::default());
        assert!(matches!(
            result,
            Err(SchedulerError::Config(ConfigError::InvalidBucketCount(12)))
        ));

        let mut cfg = config(SchedulerKind::Manual);
        cfg.buckets = None;
        let result = build_scheduler(&cfg, &no_discovery(), &HostConfig::default());
        assert!(matches!(result, Err(SchedulerError::Config(ConfigError::NoBuckets))));
    }

    #[test]
    fn connect_hosts_keeps_order() {
        let hosts = connect_hosts(
            &["x:1".to_string(), "y:2".to_string()],
            Duration::from_millis(100),
        );
        let addrs: Vec<&str> = hosts.iter().map(|h| h.addr()).collect();
        assert_eq!(addrs, vec!["x:1", "y:2"]);
    }
}
