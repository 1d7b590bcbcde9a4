//! # reapcache
//!
//! Concurrent key-value cache whose entries expire after a fixed TTL.
//!
//! ## Features
//!
//! - **Thread-safe**: one lock over the whole map, linearizable operations
//! - **Background eviction**: a reaper thread removes stale entries on a fixed period
//! - **Stoppable**: the reaper exits when its handle is stopped or dropped
//! - **Write-through memo**: `CachedFetcher` fronts a slow `Fetcher`
//!
//! ## Example
//!
//! ```rust
//! use std::time::Duration;
//! use reapcache_cache::TtlCache;
//! use reapcache_core::CacheConfig;
//!
//! let config = CacheConfig::new()
//!     .ttl(Duration::from_millis(100))
//!     .sweep_interval(Duration::from_millis(50));
//! let (cache, reaper) = TtlCache::new(config).unwrap();
//!
//! cache.add("a", vec![0x01u8, 0x02]).unwrap();
//! assert_eq!(&cache.get("a").unwrap()[..], &[0x01, 0x02]);
//!
//! reaper.stop();
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

mod cache;
mod memo;
mod reaper;

pub use cache::TtlCache;
pub use memo::{CachedFetcher, Fetched};
pub use reaper::{ReaperHandle, ReaperState};
