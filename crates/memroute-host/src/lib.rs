//! memroute-host — the node handle the schedulers route keys to.
//!
//! A [`Host`] is identified by its network address. Schedulers only need
//! to build one from an address and issue read-style requests against it
//! (the auto scheduler's discovery probes), so the handle exposes a single
//! `get` that goes through a pluggable [`Transport`].
//!
//! # Architecture
//!
//! ```text
//! Host (addr = identity)
//!   └── Arc<dyn Transport>
//!       └── MemcacheTransport (text protocol `get`, one connection per call)
//! ```

pub mod error;
pub mod host;
pub mod memcache;

pub use error::{HostError, HostResult};
pub use host::{Host, Item, Transport};
pub use memcache::MemcacheTransport;
