//! Default values for reapcache.

// ═══════════════════════════════════════════════════════════════════════════════
// EXPIRY
// ═══════════════════════════════════════════════════════════════════════════════

/// Default time-to-live for cached entries (5 minutes).
pub const DEFAULT_TTL_MILLIS: u64 = 5 * 60 * 1000;

/// Default period between reaper sweeps.
/// Equal to the TTL, so a stale entry may linger for up to one extra interval.
pub const DEFAULT_SWEEP_INTERVAL_MILLIS: u64 = DEFAULT_TTL_MILLIS;

// ═══════════════════════════════════════════════════════════════════════════════
// REAPER
// ═══════════════════════════════════════════════════════════════════════════════

/// Name given to the background reaper thread.
pub const REAPER_THREAD_NAME: &str = "reapcache-reaper";
