//! TTL cache for the fleet's zone-group topology.
//!
//! Topology changes are rare but authoritative: a topology NOTIFY always
//! invalidates, and the next reader repopulates from the device. Fetch
//! errors are never cached.

use std::future::Future;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use tracing::debug;

use maestro_parser::topology::ZoneGroupState;

/// Singleton topology cache.
pub struct TopologyCache {
    inner: RwLock<Option<(ZoneGroupState, Instant)>>,
    ttl: Duration,
}

impl TopologyCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: RwLock::new(None),
            ttl,
        }
    }

    /// The cached topology, if captured within the TTL.
    pub fn get(&self) -> Option<ZoneGroupState> {
        let inner = self.inner.read();
        inner
            .as_ref()
            .filter(|(_, at)| at.elapsed() <= self.ttl)
            .map(|(state, _)| state.clone())
    }

    /// Store a fresh topology capture.
    pub fn set(&self, state: ZoneGroupState) {
        *self.inner.write() = Some((state, Instant::now()));
    }

    /// Clear unconditionally. Called when a topology-change notification
    /// arrives.
    pub fn invalidate(&self) {
        debug!("zone topology cache invalidated");
        *self.inner.write() = None;
    }

    /// Serve from cache, or run `fetch` and populate.
    ///
    /// The lock is not held across the fetch; two concurrent misses may
    /// both fetch, and the later result wins.
    pub async fn get_or_fetch<F, Fut, E>(&self, fetch: F) -> Result<ZoneGroupState, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<ZoneGroupState, E>>,
    {
        if let Some(state) = self.get() {
            return Ok(state);
        }
        let state = fetch().await?;
        self.set(state.clone());
        Ok(state)
    }
}
