/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 19/10/26
******************************************************************************/

//! Clock trait and implementations for the scheduler's time source.
//!
//! All scheduler timestamps are microseconds on a monotonic scale. The
//! origin is arbitrary; only differences matter.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Monotonic microsecond time source.
///
/// Implementations must never go backwards. The [`ThreadContext`] reads it
/// when stamping creation times and arming deadlines.
///
/// [`ThreadContext`]: super::ThreadContext
pub trait Clock: Send + Sync {
    /// Returns the current time in microseconds.
    #[must_use]
    fn now_us(&self) -> u64;
}

/// Clock backed by [`Instant`], counting from its own construction.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    /// Creates a clock whose zero is now.
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    #[inline]
    fn now_us(&self) -> u64 {
        u64::try_from(self.origin.elapsed().as_micros()).unwrap_or(u64::MAX)
    }
}

/// Clock that only moves when told to.
///
/// Useful for tests and simulations that need exact control over deadlines
/// and heartbeats.
///
/// # Examples
///
/// ```
/// use sequencer_sched::sequencer::{Clock, ManualClock};
///
/// let clock = ManualClock::new(1_000);
/// clock.advance(500);
/// assert_eq!(clock.now_us(), 1_500);
/// ```
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    /// Creates a clock reading `start_us`.
    #[must_use]
    pub fn new(start_us: u64) -> Self {
        Self {
            now: AtomicU64::new(start_us),
        }
    }

    /// Moves the clock forward by `delta_us`.
    pub fn advance(&self, delta_us: u64) {
        self.now.fetch_add(delta_us, Ordering::Relaxed);
    }

    /// Sets the clock to `now_us`. Ignored if that would move it backwards.
    pub fn set(&self, now_us: u64) {
        self.now.fetch_max(now_us, Ordering::Relaxed);
    }
}

impl Clock for ManualClock {
    #[inline]
    fn now_us(&self) -> u64 {
        self.now.load(Ordering::Relaxed)
    }
}
