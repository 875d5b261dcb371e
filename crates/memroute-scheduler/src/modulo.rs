//! Modulo-hash routing.
//!
//! Stateless: a key goes to `hosts[hash(key) % N]`. Changing the host
//! count remaps most keys; use the consistent-hash scheduler when that
//! matters.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use memroute_host::Host;

use crate::error::{SchedulerError, SchedulerResult};
use crate::hash::HashMethod;
use crate::scheduler::Scheduler;

pub struct ModScheduler {
    hosts: Vec<Arc<Host>>,
    hash: HashMethod,
}

impl ModScheduler {
    pub fn new(hosts: Vec<Arc<Host>>, hash: HashMethod) -> SchedulerResult<Self> {
        if hosts.is_empty() {
            return Err(SchedulerError::NoHosts);
        }
        Ok(Self { hosts, hash })
    }

    fn host_index(&self, key: &str) -> usize {
        self.hash.hash(key.as_bytes()) as usize % self.hosts.len()
    }
}

#[async_trait]
impl Scheduler for ModScheduler {
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

    /// Each host owns exactly its own column.
    fn stats(&self) -> HashMap<String, Vec<f64>> {
        let n = self.hosts.len();
        self.hosts
            .iter()
            .enumerate()
            .map(|(i, host)| {
                let mut row = vec![0.0; n];
                row[i] = 1.0;
                (host.addr().to_string(), row)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hosts(addrs: &[&str]) -> Vec<Arc<Host>> {
        addrs.iter().map(|a| Arc::new(Host::new(*a))).collect()
    }

    #[test]
    fn empty_host_list_is_rejected() {
        assert!(matches!(
            ModScheduler::new(Vec::new(), HashMethod::Fnv1a),
            Err(SchedulerError::NoHosts)
        ));
    }

    #[test]
    fn routes_by_hash_modulo_host_count() {
        let s = ModScheduler::new(hosts(&["a:11211", "b:11211", "c:11211"]), HashMethod::Fnv1a)
            .unwrap();
        for i in 0..100 {
            let key = format!("key-{i}");
            let expected = HashMethod::Fnv1a.hash(key.as_bytes()) as usize % 3;
            let routed = s.get_hosts_by_key(&key);
            assert_eq!(routed.len(), 1);
            assert_eq!(routed[0], s.hosts()[expected]);
        }
    }

    #[test]
    fn resize_moves_keys() {
        let three = ModScheduler::new(hosts(&["a:1", "b:1", "c:1"]), HashMethod::Fnv1a1).unwrap();
        let four =
            ModScheduler::new(hosts(&["a:1", "b:1", "c:1", "d:1"]), HashMethod::Fnv1a1).unwrap();
        let moved = (0..1000)
            .map(|i| format!("k{i}"))
            .filter(|k| three.get_hosts_by_key(k)[0] != four.get_hosts_by_key(k)[0])
            .count();
        // No stability across resize: most keys change owner.
        assert!(moved > 500, "only {moved} keys moved");
    }

    #[test]
    fn divide_groups_by_host() {
        let s = ModScheduler::new(hosts(&["a:1", "b:1"]), HashMethod::Fnv1a1).unwrap();
        let keys: Vec<String> = (0..50).map(|i| format!("k{i}")).collect();
        let groups = s.divide_keys_by_bucket(&keys);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups.iter().map(Vec::len).sum::<usize>(), keys.len());
        for (i, group) in groups.iter().enumerate() {
            for key in group {
                assert_eq!(s.get_hosts_by_key(key)[0], s.hosts()[i]);
            }
        }
    }

    #[test]
    fn stats_is_identity() {
        let s = ModScheduler::new(hosts(&["a:1", "b:1"]), HashMethod::Fnv1a1).unwrap();
        let stats = s.stats();
        assert_eq!(stats["a:1"], vec![1.0, 0.0]);
        assert_eq!(stats["b:1"], vec![0.0, 1.0]);
    }

    #[tokio::test]
    async fn feedback_is_ignored() {
        let s = ModScheduler::new(hosts(&["a:1", "b:1"]), HashMethod::Fnv1a1).unwrap();
        let before = s.get_hosts_by_key("k");
        s.feedback(&s.hosts()[1].clone(), "k", -100.0).await;
        assert_eq!(s.get_hosts_by_key("k"), before);
    }
}
