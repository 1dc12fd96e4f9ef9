//! In-memory TTL cache
//!
//! Entries expire a fixed time after insertion. Expired entries are never
//! returned by [`TtlCache::get`]; a background janitor sweeps them out
//! periodically. Values are handed out as `Arc`s, so a reader keeps its
//! value alive even if the entry expires or is replaced meanwhile.

use dashmap::DashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, warn};

/// Default time-to-live for cached entries (5 minutes)
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

/// Default interval between janitor sweeps (30 seconds)
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug)]
struct Entry<V> {
    value: Arc<V>,
    expires_at: Instant,
}

impl<V> Entry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

#[derive(Debug)]
struct Inner<V> {
    name: &'static str,
    entries: DashMap<String, Entry<V>>,
    ttl: Duration,
}

/// Keyed store with per-entry expiration, safe for concurrent use
///
/// Clones share the same underlying entries.
#[derive(Debug)]
pub struct TtlCache<V> {
    inner: Arc<Inner<V>>,
}

impl<V> Clone for TtlCache<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V: Send + Sync + 'static> TtlCache<V> {
    /// Create an empty cache whose entries live for `ttl`
    pub fn new(name: &'static str, ttl: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                name,
                entries: DashMap::new(),
                ttl,
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        self.inner.name
    }

    pub fn ttl(&self) -> Duration {
        self.inner.ttl
    }

    /// Get a fresh value for `key`
    pub fn get(&self, key: &str) -> Option<Arc<V>> {
        let entry = self.inner.entries.get(key)?;
        if entry.is_expired(Instant::now()) {
            return None;
        }
        Some(Arc::clone(&entry.value))
    }

    /// Insert `value` under `key` with the default TTL, replacing any prior entry
    pub fn set(&self, key: impl Into<String>, value: V) -> Arc<V> {
        let value = Arc::new(value);
        self.inner.entries.insert(
            key.into(),
            Entry {
                value: Arc::clone(&value),
                expires_at: Instant::now() + self.inner.ttl,
            },
        );
        value
    }

    pub fn remove(&self, key: &str) -> Option<Arc<V>> {
        self.inner.entries.remove(key).map(|(_, entry)| entry.value)
    }

    /// Number of stored entries, expired ones included until the next sweep
    pub fn len(&self) -> usize {
        self.inner.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.entries.is_empty()
    }

    /// Evict every expired entry, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.inner.entries.len();
        self.inner.entries.retain(|_, entry| !entry.is_expired(now));
        before.saturating_sub(self.inner.entries.len())
    }

    /// Spawn the background janitor on the current tokio runtime
    ///
    /// The janitor holds only a weak reference and stops once every clone
    /// of the cache has been dropped. Returns `None` outside a runtime.
    pub fn spawn_janitor(&self, sweep_interval: Duration) -> Option<JoinHandle<()>> {
        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                warn!(cache = self.name(), "No tokio runtime, cache janitor not started");
                return None;
            }
        };

        let weak: Weak<Inner<V>> = Arc::downgrade(&self.inner);
        Some(handle.spawn(async move {
            let mut ticker = interval(sweep_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                let cache = TtlCache { inner };
                let evicted = cache.purge_expired();
                if evicted > 0 {
                    debug!(cache = cache.name(), evicted, "Evicted expired cache entries");
                }
            }
        }))
    }
}
