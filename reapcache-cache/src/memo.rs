//! Write-through memo in front of a `Fetcher`.

use bytes::Bytes;
use tracing::{debug, instrument};

use reapcache_core::error::Result;
use reapcache_core::traits::Fetcher;

use crate::cache::TtlCache;

/// Result of a memoized lookup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Fetched {
    /// The payload, from the cache or freshly fetched
    pub payload: Bytes,
    /// Whether the result came from cache
    pub from_cache: bool,
}

/// Serves lookups from a `TtlCache`, falling back to a `Fetcher` on a miss
/// and caching what it returns.
///
/// Concurrent misses for the same key each call the fetcher; the last
/// result written wins.
pub struct CachedFetcher<F> {
    cache: TtlCache,
    fetcher: F,
}

impl<F: Fetcher> CachedFetcher<F> {
    /// Wraps `fetcher` with `cache`.
    pub fn new(cache: TtlCache, fetcher: F) -> Self {
        Self { cache, fetcher }
    }

    /// Returns the payload for `key`, fetching and caching it on a miss.
    ///
    /// Fetch errors are returned as-is and nothing is cached for them.
    #[instrument(skip(self))]
    pub async fn get(&self, key: &str) -> Result<Fetched> {
        match self.cache.get(key) {
            Ok(payload) => {
                return Ok(Fetched {
                    payload,
                    from_cache: true,
                })
            }
            Err(e) if e.is_miss() => {}
            Err(e) => return Err(e),
        }

        let payload = self.fetcher.fetch(key).await?;
        debug!(size = payload.len(), "fetched on miss");
        self.cache.add(key, payload.clone())?;

        Ok(Fetched {
            payload,
            from_cache: false,
        })
    }

    /// The underlying cache.
    pub fn cache(&self) -> &TtlCache {
        &self.cache
    }

    /// The wrapped fetcher.
    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use reapcache_core::error::CacheError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingFetcher {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Fetcher for CountingFetcher {
        async fn fetch(&self, key: &str) -> Result<Bytes> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if key.ends_with("/broken") {
                return Err(CacheError::FetchFailed {
                    key: key.to_string(),
                    reason: "503 Service Unavailable".into(),
                });
            }
            Ok(Bytes::from(format!("body of {key}")))
        }
    }

    fn memo() -> (CachedFetcher<CountingFetcher>, crate::ReaperHandle) {
        let (cache, reaper) = TtlCache::with_defaults().unwrap();
        (CachedFetcher::new(cache, CountingFetcher::default()), reaper)
    }

    #[tokio::test]
    async fn test_miss_then_hit() {
        let (memo, _reaper) = memo();
        let url = "https://pokeapi.co/api/v2/location-area?offset=20";

        let first = memo.get(url).await.unwrap();
        assert!(!first.from_cache);
        assert_eq!(first.payload, Bytes::from(format!("body of {url}")));

        let second = memo.get(url).await.unwrap();
        assert!(second.from_cache);
        assert_eq!(second.payload, first.payload);
        assert_eq!(memo.fetcher().calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_fetch_error_not_cached() {
        let (memo, _reaper) = memo();
        let err = memo.get("https://example.test/broken").await.unwrap_err();
        assert!(matches!(err, CacheError::FetchFailed { .. }));
        assert!(memo.cache().is_empty());

        let _ = memo.get("https://example.test/broken").await;
        assert_eq!(memo.fetcher().calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_refetch_after_reap() {
        let config = reapcache_core::CacheConfig::new()
            .ttl(std::time::Duration::from_millis(5))
            .sweep_interval(std::time::Duration::from_secs(3600));
        let (cache, _reaper) = TtlCache::new(config).unwrap();
        let memo = CachedFetcher::new(cache, CountingFetcher::default());

        memo.get("k").await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert_eq!(memo.cache().reap(), 1);

        let again = memo.get("k").await.unwrap();
        assert!(!again.from_cache);
        assert_eq!(memo.fetcher().calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_blocking_lookup() {
        let (memo, _reaper) = memo();
        memo.cache().add("k", &b"cached"[..]).unwrap();
        let fetched = tokio_test::block_on(memo.get("k")).unwrap();
        assert!(fetched.from_cache);
        assert_eq!(&fetched.payload[..], b"cached");
    }
}
