//! memroute-scheduler — key-to-host routing for memcache-style clusters.
//!
//! A scheduler answers two questions for a client:
//!
//! - Which hosts should serve this key, in what order?
//! - How should a batch of keys be split so each group goes out in one
//!   round trip?
//!
//! Four strategies share the [`Scheduler`] trait:
//!
//! - [`ModScheduler`]: `hash(key) % N`, stateless
//! - [`ConsistentHashScheduler`]: a virtual-node hash ring
//! - [`ManualScheduler`]: operator-assigned buckets
//! - [`AutoScheduler`]: buckets whose host order adapts to feedback
//!
//! # Architecture
//!
//! ```text
//! build_scheduler(config)
//!   └── Arc<dyn Scheduler>
//!       ├── HashMethod (fnv1a / fnv1a1 / sha256)
//!       ├── bucket_of (top hash bits, "@hex" and "?" escapes)
//!       └── AutoScheduler only
//!           ├── feedback worker (sole writer of the RoutingTable)
//!           └── discovery task (periodic "@" listing probes)
//! ```

pub mod auto;
pub mod bucket;
pub mod consistent;
pub mod error;
pub mod hash;
pub mod manual;
pub mod modulo;
pub mod scheduler;

pub use auto::{AutoOptions, AutoScheduler};
pub use bucket::{bucket_of, bucket_width};
pub use consistent::{ConsistentHashScheduler, VIRTUAL_NODES};
pub use error::{SchedulerError, SchedulerResult};
pub use hash::HashMethod;
pub use manual::ManualScheduler;
pub use modulo::ModScheduler;
pub use scheduler::{Scheduler, build_scheduler, connect_hosts};
