//! The outcome of admission decisions.

use crate::timestamp::Timestamp;
use std::fmt;
use std::time::Duration;

/// Header carrying the quota's limit.
pub const LIMIT_HEADER: &str = "X-RateLimit-Limit";
/// Header carrying the accesses left in the current window.
pub const REMAINING_HEADER: &str = "X-RateLimit-Remaining";
/// Header carrying the UNIX time (in seconds) at which the window resets.
pub const RESET_HEADER: &str = "X-RateLimit-Reset";

/// Information about an identity's quota consumption at the time a
/// decision was reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaSnapshot {
    pub(crate) limit: u64,
    pub(crate) remaining: u64,
    pub(crate) reset_at: Timestamp,
}

impl QuotaSnapshot {
    /// The quota's limit.
    pub fn limit(&self) -> u64 {
        self.limit
    }

    /// The number of accesses left in the current window.
    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    /// When the current window ends.
    pub fn reset_at(&self) -> Timestamp {
        self.reset_at
    }

    /// The time left from `now` until the window resets, or zero if it
    /// already has.
    pub fn wait_time_from(&self, now: Timestamp) -> Duration {
        self.reset_at.duration_since(now)
    }

    /// The `X-RateLimit-*` header names and values describing this snapshot.
    pub fn headers(&self) -> [(&'static str, String); 3] {
        [
            (LIMIT_HEADER, self.limit.to_string()),
            (REMAINING_HEADER, self.remaining.to_string()),
            (RESET_HEADER, self.reset_at.as_unix_secs().to_string()),
        ]
    }
}

/// An admission decision, along with the quota state it left behind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// The access was admitted (and counted, unless it was only peeked at).
    Allowed(QuotaSnapshot),
    /// The quota was exhausted; nothing was counted.
    Denied(QuotaSnapshot),
}

impl Decision {
    /// Returns `true` for [`Decision::Allowed`].
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allowed(_))
    }

    /// The quota state after the decision.
    pub fn snapshot(&self) -> &QuotaSnapshot {
        match self {
            Decision::Allowed(s) | Decision::Denied(s) => s,
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::Allowed(s) => write!(f, "allowed, {} of {} left", s.remaining, s.limit),
            Decision::Denied(s) => write!(f, "rate-limited until {}", s.reset_at),
        }
    }
}
