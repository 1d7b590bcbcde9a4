//! Background reaper thread.
//!
//! One reaper runs per cache. It alternates between sleeping for the sweep
//! interval and sweeping stale entries until it is stopped, either through its
//! `ReaperHandle` or because every handle to the cache has been dropped.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, error, info};

use reapcache_core::constants::REAPER_THREAD_NAME;
use reapcache_core::error::Result;

use crate::cache::Shared;

/// Lifecycle state of a reaper.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum ReaperState {
    /// Waiting out the sweep interval.
    Sleeping = 0,
    /// Holding the cache lock and removing stale entries.
    Sweeping = 1,
    /// Terminated; no further sweeps will run.
    Stopped = 2,
}

impl ReaperState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => ReaperState::Sleeping,
            1 => ReaperState::Sweeping,
            _ => ReaperState::Stopped,
        }
    }
}

/// Wakes a sleeping reaper and tells it to exit.
pub(crate) struct StopSignal {
    stopped: Mutex<bool>,
    wake: Condvar,
}

impl StopSignal {
    pub(crate) fn new() -> Self {
        Self {
            stopped: Mutex::new(false),
            wake: Condvar::new(),
        }
    }

    pub(crate) fn stop(&self) {
        *self.stopped.lock() = true;
        self.wake.notify_all();
    }

    fn is_stopped(&self) -> bool {
        *self.stopped.lock()
    }

    /// Sleeps until `timeout` elapses or the signal fires.
    /// Returns true if the reaper should exit.
    fn sleep(&self, timeout: Duration) -> bool {
        let deadline = Instant::now().checked_add(timeout);
        let mut stopped = self.stopped.lock();
        while !*stopped {
            match deadline {
                Some(deadline) => {
                    if self.wake.wait_until(&mut stopped, deadline).timed_out() {
                        break;
                    }
                }
                // Interval too large to represent; only a stop ends the wait.
                None => self.wake.wait(&mut stopped),
            }
        }
        *stopped
    }
}

/// Counters the reaper thread publishes to its handle.
struct ReaperStatus {
    state: AtomicU8,
    sweeps: AtomicU64,
    failed_sweeps: AtomicU64,
}

impl ReaperStatus {
    fn set(&self, state: ReaperState) {
        self.state.store(state as u8, Ordering::Release);
    }
}

/// Handle to control a cache's reaper.
///
/// Dropping the handle stops the reaper and waits for it to exit.
#[must_use = "dropping the handle stops the reaper"]
pub struct ReaperHandle {
    signal: Arc<StopSignal>,
    status: Arc<ReaperStatus>,
    thread: Option<JoinHandle<()>>,
}

impl ReaperHandle {
    /// Current lifecycle state.
    pub fn state(&self) -> ReaperState {
        ReaperState::from_u8(self.status.state.load(Ordering::Acquire))
    }

    /// Returns true until the reaper has stopped.
    pub fn is_running(&self) -> bool {
        self.state() != ReaperState::Stopped
    }

    /// Number of sweeps completed so far.
    pub fn sweeps(&self) -> u64 {
        self.status.sweeps.load(Ordering::Acquire)
    }

    /// Number of sweeps that panicked and were skipped.
    pub fn failed_sweeps(&self) -> u64 {
        self.status.failed_sweeps.load(Ordering::Acquire)
    }

    /// Stops the reaper and waits for its thread to finish.
    ///
    /// If a sweep is in progress it completes first; a sleeping reaper wakes
    /// immediately.
    pub fn stop(mut self) {
        self.shutdown();
    }

    /// Lets the reaper run without a handle.
    ///
    /// It keeps sweeping until the last handle to its cache is dropped.
    pub fn detach(mut self) {
        self.thread.take();
    }

    fn shutdown(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };
        self.signal.stop();
        if thread.join().is_err() {
            error!("reaper thread panicked outside a sweep");
            self.status.set(ReaperState::Stopped);
        }
    }
}

impl Drop for ReaperHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for ReaperHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReaperHandle")
            .field("state", &self.state())
            .field("sweeps", &self.sweeps())
            .field("failed_sweeps", &self.failed_sweeps())
            .finish()
    }
}

/// Starts the reaper thread for `cache`.
pub(crate) fn spawn(
    cache: Weak<Shared>,
    interval: Duration,
    signal: Arc<StopSignal>,
) -> Result<ReaperHandle> {
    let status = Arc::new(ReaperStatus {
        state: AtomicU8::new(ReaperState::Sleeping as u8),
        sweeps: AtomicU64::new(0),
        failed_sweeps: AtomicU64::new(0),
    });

    let thread = thread::Builder::new()
        .name(REAPER_THREAD_NAME.to_string())
        .spawn({
            let signal = Arc::clone(&signal);
            let status = Arc::clone(&status);
            move || run(cache, interval, &signal, &status)
        })?;

    Ok(ReaperHandle {
        signal,
        status,
        thread: Some(thread),
    })
}

/// Main reaper loop.
fn run(cache: Weak<Shared>, interval: Duration, signal: &StopSignal, status: &ReaperStatus) {
    debug!(?interval, "reaper started");

    loop {
        status.set(ReaperState::Sleeping);
        if signal.sleep(interval) {
            break;
        }

        let Some(shared) = cache.upgrade() else {
            break;
        };

        status.set(ReaperState::Sweeping);
        match guarded_sweep(|| shared.reap_at(Instant::now())) {
            Some(removed) => {
                let sweeps = status.sweeps.fetch_add(1, Ordering::AcqRel) + 1;
                if removed > 0 {
                    info!(removed, sweep = sweeps, "reaped expired entries");
                } else {
                    debug!(sweep = sweeps, "sweep found nothing to reap");
                }
            }
            None => {
                status.failed_sweeps.fetch_add(1, Ordering::AcqRel);
            }
        }
        drop(shared);

        if signal.is_stopped() {
            break;
        }
    }

    status.set(ReaperState::Stopped);
    debug!("reaper stopped");
}

/// Runs one sweep, containing a panic so later sweeps still happen.
fn guarded_sweep<F>(sweep: F) -> Option<usize>
where
    F: FnOnce() -> usize,
{
    match panic::catch_unwind(AssertUnwindSafe(sweep)) {
        Ok(removed) => Some(removed),
        Err(cause) => {
            let message = cause
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| cause.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            error!(%message, "sweep panicked; will retry next interval");
            None
        }
    }
}
