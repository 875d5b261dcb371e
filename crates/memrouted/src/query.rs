//! One-shot routing queries for the `route` and `divide` subcommands.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use memroute_core::MemrouteConfig;
use memroute_log::ACCESS_TARGET;
use memroute_scheduler::{Scheduler, build_scheduler};
use serde_json::{Map, Value};
use tracing::info;

/// Load a config, set up logging and build its scheduler.
///
/// Discovery is switched off: a one-shot query exits long before the
/// first probe would matter.
pub fn load(path: &Path) -> anyhow::Result<Arc<dyn Scheduler>> {
    let mut config = MemrouteConfig::from_file(path)
        .with_context(|| format!("loading {}", path.display()))?;
    memroute_log::init(&config.log)?;

    config.discovery.enabled = Some(false);
    Ok(build_scheduler(
        &config.scheduler,
        &config.discovery,
        &config.host,
    )?)
}

/// `{ key: [host, ...] }` in preference order.
pub fn route(scheduler: &dyn Scheduler, keys: &[String]) -> Value {
    let mut routes = Map::new();
    for key in keys {
        let hosts: Vec<Value> = scheduler
            .get_hosts_by_key(key)
            .iter()
            .map(|h| Value::from(h.addr()))
            .collect();
        info!(target: ACCESS_TARGET, key = %key, hosts = ?hosts, "route");
        routes.insert(key.clone(), Value::Array(hosts));
    }
    Value::Object(routes)
}

/// `[[key, ...], ...]`, one group per host or bucket.
pub fn divide(scheduler: &dyn Scheduler, keys: &[String]) -> Value {
    let groups = scheduler.divide_keys_by_bucket(keys);
    info!(
        target: ACCESS_TARGET,
        keys = keys.len(),
        groups = groups.len(),
        "divide"
    );
    Value::from(groups)
}
