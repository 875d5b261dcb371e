//! Adaptive bucket routing.
//!
//! Every bucket keeps its own preference order over all hosts. Callers
//! report how operations went through [`Scheduler::feedback`]; a single
//! worker task folds those reports into per-bucket weights and re-ranks
//! the bucket. A second task periodically asks every host which buckets
//! it holds data for and feeds the answer through the same path.
//!
//! ```text
//!  feedback() ──┐                       ┌──────────────────┐
//!               ├──► mailbox (bounded) ─► feedback worker  │
//!  discovery ───┘                       │  RoutingTable    │
//!                                       └────────┬─────────┘
//!                                                │ publish bucket
//!  get_hosts_by_key() ◄── PublishedTable ◄───────┘
//! ```

mod discovery;
mod table;

pub use discovery::{parse_listing, probe_keys};
pub use table::{BucketView, Feedback, PublishedTable, RoutingTable};

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use memroute_core::config::MAX_BUCKET_COUNT;
use memroute_host::Host;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, trace};

use crate::bucket::{bucket_of, divide_keys_by_bucket};
use crate::error::{SchedulerError, SchedulerResult};
use crate::hash::HashMethod;
use crate::scheduler::Scheduler;

/// Default feedback mailbox capacity.
pub const DEFAULT_MAILBOX: usize = 1024;

/// Default delay between discovery passes.
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(10);

/// Runtime knobs for [`AutoScheduler`].
#[derive(Debug, Clone)]
pub struct AutoOptions {
    /// Delay between discovery passes. The first pass runs immediately.
    pub check_interval: Duration,
    /// Feedback mailbox capacity; senders wait while it is full.
    pub mailbox: usize,
    /// Whether to run the discovery task at all.
    pub discovery: bool,
}

impl Default for AutoOptions {
    fn default() -> Self {
        Self {
            check_interval: DEFAULT_CHECK_INTERVAL,
            mailbox: DEFAULT_MAILBOX,
            discovery: true,
        }
    }
}

enum Message {
    Feedback(Feedback),
    /// Resolves once everything queued ahead of it has been applied.
    Sync(oneshot::Sender<()>),
}

/// State shared between the scheduler handle and its discovery task.
struct Shared {
    hosts: Vec<Arc<Host>>,
    index: HashMap<String, usize>,
    hash: HashMethod,
    bucket_count: usize,
    tx: mpsc::Sender<Message>,
    published: Arc<PublishedTable>,
    last_check: Mutex<Option<Instant>>,
}

impl Shared {
    fn bucket_of(&self, key: &str) -> usize {
        bucket_of(self.hash, self.bucket_count, key)
    }

    /// Queue a feedback item, waiting for mailbox space.
    async fn submit(&self, host_index: usize, key: &str, adjust: f64) {
        if !adjust.is_finite() {
            debug!(host = %self.hosts[host_index], key, adjust, "non-finite feedback dropped");
            return;
        }
        let fb = Feedback {
            host_index,
            bucket_index: self.bucket_of(key),
            adjust,
        };
        if self.tx.send(Message::Feedback(fb)).await.is_err() {
            debug!(host = %self.hosts[host_index], "feedback worker gone, dropping feedback");
        }
    }

    fn order(&self, bucket: usize) -> Vec<Arc<Host>> {
        self.published
            .load(bucket)
            .order
            .iter()
            .map(|&i| self.hosts[i].clone())
            .collect()
    }
}

/// Scheduler that learns a per-bucket host order from feedback.
pub struct AutoScheduler {
    shared: Arc<Shared>,
    discovery: Option<JoinHandle<()>>,
}

impl AutoScheduler {
    /// Build the scheduler and start its workers on the current runtime.
    ///
    /// `bucket_count` must be a power of two no larger than 65536. Every
    /// bucket starts with `hosts` in the given order.
    pub fn new(
        hosts: Vec<Arc<Host>>,
        bucket_count: usize,
        hash: HashMethod,
        options: AutoOptions,
    ) -> SchedulerResult<Self> {
        if !bucket_count.is_power_of_two() || bucket_count > MAX_BUCKET_COUNT {
            return Err(SchedulerError::InvalidBucketCount(bucket_count));
        }
        if hosts.is_empty() {
            return Err(SchedulerError::NoHosts);
        }

        let mut index = HashMap::with_capacity(hosts.len());
        for (i, host) in hosts.iter().enumerate() {
            if index.insert(host.addr().to_string(), i).is_some() {
                return Err(SchedulerError::DuplicateHost(host.addr().to_string()));
            }
        }

        let runtime = Handle::try_current().map_err(|_| SchedulerError::NoRuntime)?;

        let table = RoutingTable::new(hosts.len(), bucket_count);
        let published = Arc::new(PublishedTable::new(&table));
        let (tx, rx) = mpsc::channel(options.mailbox.max(1));
        runtime.spawn(feedback_worker(rx, table, published.clone()));

        let shared = Arc::new(Shared {
            hosts,
            index,
            hash,
            bucket_count,
            tx,
            published,
            last_check: Mutex::new(None),
        });

        let discovery = options
            .discovery
            .then(|| runtime.spawn(discovery::run(shared.clone(), options.check_interval)));

        info!(
            hosts = shared.hosts.len(),
            buckets = bucket_count,
            %hash,
            discovery = options.discovery,
            interval_secs = options.check_interval.as_secs(),
            "auto scheduler started"
        );

        Ok(Self { shared, discovery })
    }

    pub fn bucket_count(&self) -> usize {
        self.shared.bucket_count
    }

    /// The published view of one bucket.
    pub fn bucket(&self, bucket: usize) -> Arc<BucketView> {
        self.shared.published.load(bucket)
    }

    /// Wait until every feedback item submitted before this call is applied.
    pub async fn sync(&self) {
        let (done, wait) = oneshot::channel();
        if self.shared.tx.send(Message::Sync(done)).await.is_ok() {
            let _ = wait.await;
        }
    }

    /// When the last discovery pass finished, if any has.
    pub fn last_check(&self) -> Option<Instant> {
        *self.shared.last_check.lock().expect("last_check lock")
    }
}

impl Drop for AutoScheduler {
    fn drop(&mut self) {
        if let Some(task) = self.discovery.take() {
            task.abort();
        }
    }
}

#[async_trait]
impl Scheduler for AutoScheduler {
    fn hosts(&self) -> &[Arc<Host>] {
        &self.shared.hosts
    }

    fn get_hosts_by_key(&self, key: &str) -> Vec<Arc<Host>> {
        self.shared.order(self.shared.bucket_of(key))
    }

    fn divide_keys_by_bucket(&self, keys: &[String]) -> Vec<Vec<String>> {
        divide_keys_by_bucket(self.shared.hash, self.shared.bucket_count, keys)
    }

    async fn feedback(&self, host: &Host, key: &str, adjust: f64) {
        match self.shared.index.get(host.addr()) {
            Some(&i) => self.shared.submit(i, key, adjust).await,
            None => trace!(host = %host, "feedback for unknown host dropped"),
        }
    }

    /// Each host's weight in every bucket.
    fn stats(&self) -> HashMap<String, Vec<f64>> {
        let shared = &self.shared;
        let mut stats: HashMap<String, Vec<f64>> = shared
            .hosts
            .iter()
            .map(|h| (h.addr().to_string(), Vec::with_capacity(shared.bucket_count)))
            .collect();
        for b in 0..shared.bucket_count {
            let view = shared.published.load(b);
            for (i, host) in shared.hosts.iter().enumerate() {
                if let Some(row) = stats.get_mut(host.addr()) {
                    row.push(view.weights[i]);
                }
            }
        }
        stats
    }
}

/// Apply queued feedback in arrival order until every sender is gone.
async fn feedback_worker(
    mut rx: mpsc::Receiver<Message>,
    mut table: RoutingTable,
    published: Arc<PublishedTable>,
) {
    while let Some(message) = rx.recv().await {
        match message {
            Message::Feedback(fb) => {
                if table.apply(fb) {
                    published.store(fb.bucket_index, table.bucket(fb.bucket_index).clone());
                }
            }
            Message::Sync(done) => {
                let _ = done.send(());
            }
        }
    }
    debug!("feedback worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hosts(addrs: &[&str]) -> Vec<Arc<Host>> {
        addrs.iter().map(|a| Arc::new(Host::new(*a))).collect()
    }

    fn quiet() -> AutoOptions {
        AutoOptions {
            discovery: false,
            ..AutoOptions::default()
        }
    }

    fn scheduler(addrs: &[&str], buckets: usize) -> AutoScheduler {
        AutoScheduler::new(hosts(addrs), buckets, HashMethod::Fnv1a1, quiet()).unwrap()
    }

    fn order(s: &AutoScheduler, key: &str) -> Vec<String> {
        s.get_hosts_by_key(key)
            .iter()
            .map(|h| h.addr().to_string())
            .collect()
    }

    #[test]
    fn needs_a_runtime() {
        let result = AutoScheduler::new(hosts(&["a:1"]), 2, HashMethod::Fnv1a1, quiet());
        assert!(matches!(result, Err(SchedulerError::NoRuntime)));
    }

    #[tokio::test]
    async fn rejects_bad_construction() {
        for count in [0, 3, 12, MAX_BUCKET_COUNT * 2] {
            let result = AutoScheduler::new(hosts(&["a:1"]), count, HashMethod::Fnv1a1, quiet());
            assert!(
                matches!(result, Err(SchedulerError::InvalidBucketCount(c)) if c == count),
                "count {count}"
            );
        }
        assert!(matches!(
            AutoScheduler::new(Vec::new(), 2, HashMethod::Fnv1a1, quiet()),
            Err(SchedulerError::NoHosts)
        ));
        assert!(matches!(
            AutoScheduler::new(hosts(&["a:1", "a:1"]), 2, HashMethod::Fnv1a1, quiet()),
            Err(SchedulerError::DuplicateHost(_))
        ));
    }

    #[tokio::test]
    async fn starts_in_address_order() {
        let s = scheduler(&["a:1", "b:1", "c:1"], 8);
        assert_eq!(s.bucket_count(), 8);
        for i in 0..50 {
            assert_eq!(order(&s, &format!("k{i}")), vec!["a:1", "b:1", "c:1"]);
        }
        assert!(s.last_check().is_none());
    }

    #[tokio::test]
    async fn feedback_reorders_only_its_bucket() {
        let s = scheduler(&["a:1", "b:1"], 16);
        let b = s.hosts()[1].clone();

        // "@3..." addresses bucket 3 directly.
        s.feedback(&b, "@3abc", 10.0).await;
        s.sync().await;

        assert_eq!(order(&s, "@3xyz"), vec!["b:1", "a:1"]);
        assert_eq!(order(&s, "@4xyz"), vec!["a:1", "b:1"]);
        assert_eq!(s.bucket(3).weights, vec![0.0, 5.0]);
    }

    #[tokio::test]
    async fn unknown_host_feedback_is_ignored() {
        let s = scheduler(&["a:1", "b:1"], 2);
        let stranger = Host::new("z:1");
        s.feedback(&stranger, "k", 100.0).await;
        s.sync().await;
        for row in s.stats().values() {
            assert!(row.iter().all(|&w| w == 0.0));
        }
    }

    #[tokio::test]
    async fn non_finite_feedback_is_dropped() {
        let s = scheduler(&["a:1", "b:1"], 2);
        let a = s.hosts()[0].clone();
        s.feedback(&a, "k", f64::NAN).await;
        s.feedback(&a, "k", f64::NEG_INFINITY).await;
        s.sync().await;
        assert!(s.stats()["a:1"].iter().all(|&w| w == 0.0));
    }

    #[tokio::test]
    async fn stats_has_one_weight_per_bucket() {
        let s = scheduler(&["a:1", "b:1"], 4);
        let a = s.hosts()[0].clone();
        s.feedback(&a, "@1", -2.0).await;
        s.sync().await;

        let stats = s.stats();
        assert_eq!(stats.len(), 2);
        assert_eq!(stats["a:1"].len(), 4);
        assert_eq!(stats["b:1"], vec![0.0; 4]);
        // Width 2 has no hex digits, so every "@" key lands in bucket 0.
        assert_eq!(stats["a:1"], vec![-2.0, 0.0, 0.0, 0.0]);
    }

    #[tokio::test]
    async fn small_mailbox_still_delivers_everything() {
        let options = AutoOptions {
            mailbox: 1,
            discovery: false,
            ..AutoOptions::default()
        };
        let s = AutoScheduler::new(hosts(&["a:1", "b:1"]), 1, HashMethod::Fnv1a1, options)
            .unwrap();
        let a = s.hosts()[0].clone();
        for _ in 0..20 {
            s.feedback(&a, "k", -1.0).await;
        }
        s.sync().await;
        assert_eq!(s.stats()["a:1"], vec![-20.0]);
        assert_eq!(order(&s, "k"), vec!["b:1", "a:1"]);
    }

    #[tokio::test]
    async fn divide_groups_by_bucket() {
        let s = scheduler(&["a:1"], 8);
        let keys: Vec<String> = (0..200).map(|i| format!("k{i}")).collect();
        let groups = s.divide_keys_by_bucket(&keys);
        assert_eq!(groups.len(), 8);
        for (b, group) in groups.iter().enumerate() {
            for key in group {
                assert_eq!(bucket_of(HashMethod::Fnv1a1, 8, key), b);
            }
        }
    }

    #[tokio::test]
    async fn drop_stops_discovery() {
        let options = AutoOptions {
            check_interval: Duration::from_secs(3600),
            ..AutoOptions::default()
        };
        let s = AutoScheduler::new(hosts(&["127.0.0.1:1"]), 2, HashMethod::Fnv1a1, options)
            .unwrap();
        let task = s.discovery.as_ref().map(JoinHandle::abort_handle).unwrap();
        drop(s);
        for _ in 0..100 {
            if task.is_finished() {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert!(task.is_finished());
    }
}
