//! Time sources for controllers and stores.
//!
//! Counters persist absolute timestamps, so every clock here reports
//! wall-clock [`Timestamp`]s. The fake clock allows mocking the passage
//! of time in tests.

use crate::timestamp::{duration_to_nanos, Timestamp};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

/// A time source used by controllers and stores.
pub trait Clock: Clone + Send + Sync {
    /// Returns a measurement of the clock.
    fn now(&self) -> Timestamp;
}

/// The non-monotonic clock implemented by [`SystemTime`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::from(SystemTime::now())
    }
}

/// A mock implementation of a clock. All it does is keep track of
/// what "now" is, and return that.
///
/// # Thread safety
/// The mock time is represented as an atomic u64 count of nanoseconds, behind an [`Arc`].
/// Clones of this clock will all show the same time, even if the original advances.
#[derive(Debug, Clone, Default)]
pub struct FakeRelativeClock {
    now: Arc<AtomicU64>,
}

impl FakeRelativeClock {
    /// Returns a fake clock that starts out at the given instant.
    pub fn starting_at(start: Timestamp) -> Self {
        FakeRelativeClock {
            now: Arc::new(AtomicU64::new(start.as_nanos())),
        }
    }

    /// Advances the fake clock by the given amount.
    pub fn advance(&self, by: Duration) {
        let by = duration_to_nanos(by);
        let mut prev = self.now.load(Ordering::Acquire);
        let mut next = prev.saturating_add(by);
        while let Err(next_prev) =
            self.now
                .compare_exchange_weak(prev, next, Ordering::Release, Ordering::Relaxed)
        {
            prev = next_prev;
            next = prev.saturating_add(by);
        }
    }
}

impl PartialEq for FakeRelativeClock {
    fn eq(&self, other: &Self) -> bool {
        self.now.load(Ordering::Relaxed) == other.now.load(Ordering::Relaxed)
    }
}

impl Clock for FakeRelativeClock {
    fn now(&self) -> Timestamp {
        Timestamp::from_nanos(self.now.load(Ordering::Relaxed))
    }
}
