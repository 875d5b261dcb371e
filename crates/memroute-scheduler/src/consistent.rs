//! Consistent-hash routing.
//!
//! Each host is placed on a 32-bit ring at [`VIRTUAL_NODES`] points. A
//! key belongs to the first point at or after its own hash, wrapping
//! from the top of the ring back to the start.
//!
//! Ring entries pack `(point << 32) | host_index` into one `u64`, so a
//! plain sort orders them by ring position and the owner falls out of
//! the low half. The ring is built once and never mutated.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use memroute_core::HostAddr;
use memroute_host::Host;
use tracing::debug;

use crate::error::{SchedulerError, SchedulerResult};
use crate::hash::HashMethod;
use crate::scheduler::Scheduler;

/// Ring points per host.
pub const VIRTUAL_NODES: usize = 100;

const RING_SIZE: f64 = (1u64 << 32) as f64;

pub struct ConsistentHashScheduler {
    hosts: Vec<Arc<Host>>,
    ring: Vec<u64>,
    hash: HashMethod,
}

impl ConsistentHashScheduler {
    pub fn new(hosts: Vec<Arc<Host>>, hash: HashMethod) -> SchedulerResult<Self> {
        if hosts.is_empty() {
            return Err(SchedulerError::NoHosts);
        }

        let mut ring = Vec::with_capacity(hosts.len() * VIRTUAL_NODES);
        for (i, host) in hosts.iter().enumerate() {
            let label = ring_label(host.addr());
            for j in 0..VIRTUAL_NODES {
                let point = hash.hash(format!("{label}-{j}").as_bytes());
                ring.push((u64::from(point) << 32) | i as u64);
            }
        }
        ring.sort_unstable();
        if !ring.is_sorted() {
            return Err(SchedulerError::UnsortedRing);
        }

        debug!(hosts = hosts.len(), points = ring.len(), %hash, "hash ring built");
        Ok(Self { hosts, ring, hash })
    }

    /// The packed ring, ascending.
    pub fn ring(&self) -> &[u64] {
        &self.ring
    }

    fn host_index(&self, key: &str) -> usize {
        let h = u64::from(self.hash.hash(key.as_bytes())) << 32;
        let mut i = self.ring.partition_point(|&entry| entry < h);
        if i == self.ring.len() {
            i = 0;
        }
        (self.ring[i] & 0xffff_ffff) as usize
    }
}

/// Ring placement label for an address.
///
/// Addresses on the default port hash by bare hostname so `host` and
/// `host:11211` land on the same ring points.
fn ring_label(addr: &str) -> String {
    let parsed = HostAddr::parse(addr);
    if parsed.is_default_port() {
        parsed.host
    } else {
        addr.to_string()
    }
}

#[async_trait]
impl Scheduler for ConsistentHashScheduler {
    fn hosts(&self) -> &[Arc<Host>] {
        &self.hosts
    }

    fn get_hosts_by_key(&self, key: &str) -> Vec<Arc<Host>> {
        vec![self.hosts[self.host_index(key)].clone()]
    }

    fn divide_keys_by_bucket(&self, keys: &[String]) -> Vec<Vec<String>> {
        let mut groups = vec![Vec::new(); self.hosts.len()];
        for key in keys {
            groups[self.host_index(key)].push(key.clone());
        }
        groups
    }

    /// Share of the ring each host owns, in its own column.
    fn stats(&self) -> HashMap<String, Vec<f64>> {
        let n = self.hosts.len();
        let mut owned = vec![0u64; n];
        let mut prev = 0u64;
        for &entry in &self.ring {
            let point = entry >> 32;
            owned[(entry & 0xffff_ffff) as usize] += point - prev;
            prev = point;
        }
        // The arc past the last point wraps to the first entry's owner.
        let first = (self.ring[0] & 0xffff_ffff) as usize;
        owned[first] += (1u64 << 32) - prev;

        self.hosts
            .iter()
            .enumerate()
            .map(|(i, host)| {
                let mut row = vec![0.0; n];
                row[i] = owned[i] as f64 / RING_SIZE;
                (host.addr().to_string(), row)
            })
            .collect()
    }
}
