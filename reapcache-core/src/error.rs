//! Error types for reapcache.
//!
//! A cache miss is modelled as `CacheError::NotFound` so callers can branch on
//! it with `?`-friendly code, but it is an expected outcome rather than a fault.

use thiserror::Error;

/// Result type alias using `CacheError`.
pub type Result<T> = std::result::Result<T, CacheError>;

/// Main error type for all reapcache operations.
#[derive(Debug, Error)]
pub enum CacheError {
    // ═══════════════════════════════════════════════════════════════════════════
    // LOOKUP
    // ═══════════════════════════════════════════════════════════════════════════

    /// No live entry is stored under the key.
    #[error("key not found: {0}")]
    NotFound(String),

    // ═══════════════════════════════════════════════════════════════════════════
    // FETCH (write-through memo)
    // ═══════════════════════════════════════════════════════════════════════════

    /// The slow-path fetcher failed to produce a payload.
    #[error("fetch failed for '{key}': {reason}")]
    FetchFailed {
        /// Key the fetch was issued for
        key: String,
        /// What the fetcher reported
        reason: String,
    },

    // ═══════════════════════════════════════════════════════════════════════════
    // CONFIGURATION
    // ═══════════════════════════════════════════════════════════════════════════

    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    // ═══════════════════════════════════════════════════════════════════════════
    // REAPER
    // ═══════════════════════════════════════════════════════════════════════════

    /// The OS refused to start the reaper thread.
    #[error("failed to spawn reaper thread: {0}")]
    ReaperSpawn(#[from] std::io::Error),
}

impl CacheError {
    /// Returns true if this is a plain cache miss.
    pub fn is_miss(&self) -> bool {
        matches!(self, CacheError::NotFound(_))
    }

    /// Returns true if retrying the operation may succeed.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, CacheError::NotFound(_) | CacheError::FetchFailed { .. })
    }
}
