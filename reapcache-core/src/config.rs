//! Cache configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::constants::{DEFAULT_SWEEP_INTERVAL_MILLIS, DEFAULT_TTL_MILLIS};
use crate::error::{CacheError, Result};

/// Expiry configuration for a `TtlCache`.
///
/// Both durations are stored in milliseconds so the config serializes to
/// plain integers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Age after which an entry is eligible for removal
    pub ttl_millis: u64,
    /// Period between reaper sweeps
    pub sweep_interval_millis: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_millis: DEFAULT_TTL_MILLIS,
            sweep_interval_millis: DEFAULT_SWEEP_INTERVAL_MILLIS,
        }
    }
}

impl CacheConfig {
    /// Creates a new default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the time-to-live, rounded up to a whole millisecond.
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl_millis = millis_ceil(ttl);
        self
    }

    /// Sets the sweep interval, rounded up to a whole millisecond.
    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval_millis = millis_ceil(interval);
        self
    }

    /// Parses a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// The TTL as a `Duration`.
    pub fn ttl_duration(&self) -> Duration {
        Duration::from_millis(self.ttl_millis)
    }

    /// The sweep interval as a `Duration`.
    pub fn sweep_interval_duration(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_millis)
    }

    /// Checks the configuration before a cache is built from it.
    ///
    /// A sweep interval longer than the TTL is allowed, but entries may then
    /// stay readable for up to `ttl + sweep_interval`.
    pub fn validate(&self) -> Result<()> {
        if self.ttl_millis == 0 {
            return Err(CacheError::ConfigError("ttl must be greater than zero".into()));
        }
        if self.sweep_interval_millis == 0 {
            return Err(CacheError::ConfigError(
                "sweep interval must be greater than zero".into(),
            ));
        }
        if self.sweep_interval_millis > self.ttl_millis {
            warn!(
                ttl_ms = self.ttl_millis,
                sweep_ms = self.sweep_interval_millis,
                "sweep interval exceeds ttl; stale entries will linger longer"
            );
        }
        Ok(())
    }
}

/// Whole milliseconds covering `d`, saturating at `u64::MAX`.
///
/// Rounding up keeps an entry alive for at least the requested TTL.
fn millis_ceil(d: Duration) -> u64 {
    let millis = d.as_nanos().div_ceil(1_000_000);
    u64::try_from(millis).unwrap_or(u64::MAX)
}
