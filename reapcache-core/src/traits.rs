//! Common traits for reapcache.

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;

// ═══════════════════════════════════════════════════════════════════════════════
// FETCHER TRAIT
// ═══════════════════════════════════════════════════════════════════════════════

/// The expensive lookup a cache is placed in front of.
///
/// Implementations might:
/// - Issue an HTTP request for the key (a URL)
/// - Read a file or query a database
/// - Return canned data in tests
///
/// The key passed to `fetch` is the same key the result will be cached under.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Produces the payload for `key`.
    ///
    /// Errors are surfaced to the caller and never cached.
    async fn fetch(&self, key: &str) -> Result<Bytes>;
}

#[async_trait]
impl<F: Fetcher + ?Sized> Fetcher for std::sync::Arc<F> {
    async fn fetch(&self, key: &str) -> Result<Bytes> {
        (**self).fetch(key).await
    }
}
