//! Operator-assigned bucket routing.
//!
//! The operator states which buckets each host serves. A key resolves to
//! its bucket and gets back every host of that bucket, rotated by the
//! key's hash so the first choice is spread evenly across the bucket's
//! hosts.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use memroute_core::config::MAX_BUCKET_COUNT;
use memroute_host::Host;
use tracing::debug;

use crate::bucket::{bucket_of, divide_keys_by_bucket};
use crate::error::{SchedulerError, SchedulerResult};
use crate::hash::HashMethod;
use crate::scheduler::Scheduler;

pub struct ManualScheduler {
    hosts: Vec<Arc<Host>>,
    /// bucket -> indices into `hosts`, in assignment order.
    buckets: Vec<Vec<usize>>,
    hash: HashMethod,
}

impl ManualScheduler {
    /// Build from `(host, buckets it serves)` pairs.
    ///
    /// The bucket count is one past the largest index referenced; every
    /// bucket below it must have at least one host.
    pub fn new(
        assignment: Vec<(Arc<Host>, Vec<usize>)>,
        hash: HashMethod,
    ) -> SchedulerResult<Self> {
        if assignment.is_empty() {
            return Err(SchedulerError::NoHosts);
        }

        let mut seen = HashSet::new();
        let mut count = 1;
        for (host, served) in &assignment {
            if !seen.insert(host.addr()) {
                return Err(SchedulerError::DuplicateHost(host.addr().to_string()));
            }
            if let Some(&max) = served.iter().max() {
                if max >= MAX_BUCKET_COUNT {
                    return Err(SchedulerError::InvalidBucketCount(max + 1));
                }
                count = count.max(max + 1);
            }
        }

        let mut buckets = vec![Vec::new(); count];
        let mut hosts = Vec::with_capacity(assignment.len());
        for (i, (host, served)) in assignment.into_iter().enumerate() {
            for bucket in served.into_iter().collect::<BTreeSet<_>>() {
                buckets[bucket].push(i);
            }
            hosts.push(host);
        }

        if let Some(empty) = buckets.iter().position(Vec::is_empty) {
            return Err(SchedulerError::EmptyBucket(empty));
        }

        debug!(hosts = hosts.len(), buckets = count, %hash, "manual bucket table built");
        Ok(Self {
            hosts,
            buckets,
            hash,
        })
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }
}

#[async_trait]
impl Scheduler for ManualScheduler {
    fn hosts(&self) -> &[Arc<Host>] {
        &self.hosts
    }

    fn get_hosts_by_key(&self, key: &str) -> Vec<Arc<Host>> {
        let bucket = &self.buckets[bucket_of(self.hash, self.buckets.len(), key)];
        // Rotation uses the raw hash, not the bucket-width-shifted one.
        let rotation = self.hash.hash(key.as_bytes()) as usize % bucket.len();
        let mut hosts: Vec<Arc<Host>> = bucket.iter().map(|&i| self.hosts[i].clone()).collect();
        hosts.rotate_right(rotation);
        hosts
    }

    fn divide_keys_by_bucket(&self, keys: &[String]) -> Vec<Vec<String>> {
        divide_keys_by_bucket(self.hash, self.buckets.len(), keys)
    }

    /// 0/1 membership of each host across buckets.
    fn stats(&self) -> HashMap<String, Vec<f64>> {
        let mut stats: HashMap<String, Vec<f64>> = self
            .hosts
            .iter()
            .map(|h| (h.addr().to_string(), vec![0.0; self.buckets.len()]))
            .collect();
        for (b, members) in self.buckets.iter().enumerate() {
            for &i in members {
                if let Some(row) = stats.get_mut(self.hosts[i].addr()) {
                    row[b] = 1.0;
                }
            }
        }
        stats
    }
}
