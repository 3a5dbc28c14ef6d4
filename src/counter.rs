//! The per-identity access counter kept in a store.

use crate::state::Freshness;
use crate::timestamp::{duration_nanos, Timestamp};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// The number of accesses an identity made within the current window.
///
/// One counter is stored per policy and identity. The stored `count` is only
/// meaningful while the window that began at `start` has not elapsed; past
/// that, the logical count is zero no matter what the field says.
///
/// Counters are copied in and out of stores: every read yields an
/// independent value that can be mutated before writing it back.
///
/// Decoding ignores unknown fields and fills missing ones with zero values.
/// A counter with a zero duration is never fresh.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessCounter {
    count: u64,
    start: Timestamp,
    #[serde(with = "duration_nanos")]
    duration: Duration,
}

impl AccessCounter {
    /// A counter with no accesses, whose window of the given length starts at `now`.
    pub fn new(duration: Duration, now: Timestamp) -> Self {
        AccessCounter {
            count: 0,
            start: now,
            duration,
        }
    }

    /// The raw stored count, regardless of freshness.
    pub fn stored_count(&self) -> u64 {
        self.count
    }

    /// When the current window started.
    pub fn start(&self) -> Timestamp {
        self.start
    }

    /// The length of the counter's window.
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// The logical count at `now`: the stored count while fresh, zero afterwards.
    pub fn count_at(&self, now: Timestamp) -> u64 {
        if self.is_fresh_at(now) {
            self.count
        } else {
            0
        }
    }

    /// Counts one access at `now`.
    ///
    /// A fresh counter is incremented; a stale one starts a new window at `now`
    /// with a count of one.
    pub fn increment_at(&mut self, now: Timestamp) {
        if self.is_fresh_at(now) {
            self.count = self.count.saturating_add(1);
        } else {
            self.count = 1;
            self.start = now;
        }
    }

    /// Encodes the counter into its persisted JSON form.
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Decodes a counter from its persisted JSON form.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

impl Freshness for AccessCounter {
    fn is_fresh_at(&self, now: Timestamp) -> bool {
        now.duration_since(self.start) < self.duration
    }
}
