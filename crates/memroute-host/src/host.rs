//! Host handle and transport seam.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::HostResult;
use crate::memcache::MemcacheTransport;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);

/// A stored value returned by a `get`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    pub flags: u32,
    pub body: Bytes,
}

/// Issues requests against one node.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Fetch `key`. `Ok(None)` means the node answered with a miss.
    async fn get(&self, key: &str) -> HostResult<Option<Item>>;
}

/// A cache node, identified by its address.
///
/// Two hosts compare equal when their addresses do; the transport is
/// not part of the identity.
pub struct Host {
    addr: String,
    transport: Arc<dyn Transport>,
}

impl Host {
    /// Create a host that speaks the memcache text protocol.
    pub fn new(addr: impl Into<String>) -> Self {
        Self::with_timeout(addr, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(addr: impl Into<String>, timeout: Duration) -> Self {
        let addr = addr.into();
        let transport = Arc::new(MemcacheTransport::new(addr.clone(), timeout));
        Self { addr, transport }
    }

    /// Create a host backed by a caller-supplied transport.
    pub fn with_transport(addr: impl Into<String>, transport: Arc<dyn Transport>) -> Self {
        Self {
            addr: addr.into(),
            transport,
        }
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    pub async fn get(&self, key: &str) -> HostResult<Option<Item>> {
        self.transport.get(key).await
    }
}

impl fmt::Debug for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Host").field("addr", &self.addr).finish()
    }
}

impl fmt::Display for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.addr)
    }
}

impl PartialEq for Host {
    fn eq(&self, other: &Self) -> bool {
        self.addr == other.addr
    }
}

impl Eq for Host {}

impl Hash for Host {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.addr.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HostError;

    struct Fixed(Option<Item>);

    #[async_trait]
    impl Transport for Fixed {
        async fn get(&self, _key: &str) -> HostResult<Option<Item>> {
            Ok(self.0.clone())
        }
    }

    struct Failing;

    #[async_trait]
    impl Transport for Failing {
        async fn get(&self, _key: &str) -> HostResult<Option<Item>> {
            Err(HostError::Timeout("a:11211".into()))
        }
    }

    #[test]
    fn identity_is_the_address() {
        let a = Host::new("a:11211");
        let b = Host::with_transport("a:11211", Arc::new(Failing));
        let c = Host::new("c:11211");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.addr(), "a:11211");
        assert_eq!(a.to_string(), "a:11211");
    }

    #[tokio::test]
    async fn get_delegates_to_transport() {
        let item = Item {
            flags: 7,
            body: Bytes::from_static(b"hello"),
        };
        let host = Host::with_transport("a:11211", Arc::new(Fixed(Some(item.clone()))));
        assert_eq!(host.get("k").await.unwrap(), Some(item));

        let failing = Host::with_transport("a:11211", Arc::new(Failing));
        assert!(matches!(
            failing.get("k").await,
            Err(HostError::Timeout(_))
        ));
    }
}
