//! In-memory TTL cache with a background reaper.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use parking_lot::RwLock;
use tracing::{debug, trace};

use reapcache_core::config::CacheConfig;
use reapcache_core::error::{CacheError, Result};

use crate::reaper::{self, ReaperHandle, StopSignal};

/// Cache entry with its insertion time.
#[derive(Clone)]
struct CacheEntry {
    payload: Bytes,
    created_at: Instant,
}

impl CacheEntry {
    fn is_expired_at(&self, now: Instant, ttl: Duration) -> bool {
        now.saturating_duration_since(self.created_at) > ttl
    }
}

/// State shared by every handle of one cache and, weakly, by its reaper.
pub(crate) struct Shared {
    entries: RwLock<HashMap<String, CacheEntry>>,
    ttl: Duration,
    sweep_interval: Duration,
    signal: Arc<StopSignal>,
    #[cfg(test)]
    fail_next_sweep: std::sync::atomic::AtomicBool,
}

impl Shared {
    /// Removes every entry older than the TTL as of `now`.
    pub(crate) fn reap_at(&self, now: Instant) -> usize {
        #[cfg(test)]
        if self.fail_next_sweep.swap(false, std::sync::atomic::Ordering::AcqRel) {
            panic!("injected sweep failure");
        }
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, e| !e.is_expired_at(now, self.ttl));
        before - entries.len()
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        // Last cache handle is gone; there is nothing left to sweep.
        self.signal.stop();
    }
}

/// Concurrent key-value cache whose entries expire after a fixed TTL.
///
/// Handles are cheap to clone and all clones address the same entries.
/// Expired entries are removed by a reaper thread that wakes every
/// `sweep_interval`; lookups do not check age themselves, so an entry stays
/// readable until the sweep that follows its expiry.
///
/// # Bounds
///
/// An entry added at `T` is readable at least until `T + ttl` and is gone by
/// `T + ttl + sweep_interval` (plus scheduling slack).
///
/// # Thread Safety
///
/// All operations go through one `RwLock` over the whole map, so they are
/// linearizable. A sweep holds the write lock for its full scan.
#[derive(Clone)]
pub struct TtlCache {
    shared: Arc<Shared>,
}

impl TtlCache {
    /// Creates a cache and starts its reaper.
    ///
    /// The returned `ReaperHandle` controls the reaper: dropping it stops
    /// sweeping, so keep it alive for as long as eviction is wanted, or call
    /// [`ReaperHandle::detach`] to tie the reaper to the cache's lifetime.
    pub fn new(config: CacheConfig) -> Result<(Self, ReaperHandle)> {
        config.validate()?;

        let signal = Arc::new(StopSignal::new());
        let shared = Arc::new(Shared {
            entries: RwLock::new(HashMap::new()),
            ttl: config.ttl_duration(),
            sweep_interval: config.sweep_interval_duration(),
            signal: Arc::clone(&signal),
            #[cfg(test)]
            fail_next_sweep: std::sync::atomic::AtomicBool::new(false),
        });

        let handle = reaper::spawn(Arc::downgrade(&shared), shared.sweep_interval, signal)?;
        debug!(
            ttl_ms = config.ttl_millis,
            sweep_ms = config.sweep_interval_millis,
            "cache created"
        );

        Ok((Self { shared }, handle))
    }

    /// Creates a cache with the default 5 minute TTL and sweep interval.
    pub fn with_defaults() -> Result<(Self, ReaperHandle)> {
        Self::new(CacheConfig::default())
    }

    /// Stores `payload` under `key`, replacing any previous entry and
    /// resetting its age.
    pub fn add(&self, key: impl Into<String>, payload: impl Into<Bytes>) -> Result<()> {
        let key = key.into();
        let entry = CacheEntry {
            payload: payload.into(),
            created_at: Instant::now(),
        };
        trace!(key = %key, size = entry.payload.len(), "add");
        self.shared.entries.write().insert(key, entry);
        Ok(())
    }

    /// Returns the payload stored under `key`.
    ///
    /// Fails with `CacheError::NotFound` on a miss. Reading does not extend
    /// the entry's lifetime.
    pub fn get(&self, key: &str) -> Result<Bytes> {
        let entries = self.shared.entries.read();
        match entries.get(key) {
            Some(entry) => Ok(entry.payload.clone()),
            None => {
                trace!(key, "miss");
                Err(CacheError::NotFound(key.to_string()))
            }
        }
    }

    /// Returns true if an entry is currently stored under `key`.
    pub fn contains_key(&self, key: &str) -> bool {
        self.shared.entries.read().contains_key(key)
    }

    /// Removes the entry under `key`, returning its payload.
    pub fn remove(&self, key: &str) -> Option<Bytes> {
        self.shared.entries.write().remove(key).map(|e| e.payload)
    }

    /// Clears all cached entries.
    pub fn clear(&self) {
        self.shared.entries.write().clear();
    }

    /// Removes every entry older than the TTL, returning how many were removed.
    ///
    /// The reaper calls this on its own; calling it directly forces a sweep.
    pub fn reap(&self) -> usize {
        self.reap_at(Instant::now())
    }

    pub(crate) fn reap_at(&self, now: Instant) -> usize {
        self.shared.reap_at(now)
    }

    /// Makes the next sweep panic before touching the map.
    #[cfg(test)]
    pub(crate) fn fail_next_sweep(&self) {
        self.shared
            .fail_next_sweep
            .store(true, std::sync::atomic::Ordering::Release);
    }

    /// Returns the number of stored entries, including stale ones not yet swept.
    pub fn len(&self) -> usize {
        self.shared.entries.read().len()
    }

    /// Returns true if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.shared.entries.read().is_empty()
    }

    /// The configured time-to-live.
    pub fn ttl(&self) -> Duration {
        self.shared.ttl
    }

    /// The configured period between sweeps.
    pub fn sweep_interval(&self) -> Duration {
        self.shared.sweep_interval
    }
}

impl std::fmt::Debug for TtlCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TtlCache")
            .field("entries", &self.len())
            .field("ttl", &self.shared.ttl)
            .field("sweep_interval", &self.shared.sweep_interval)
            .finish()
    }
}
