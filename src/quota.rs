use std::num::NonZeroU64;
use std::time::Duration;

/// An admission quota: a number of accesses allowed within a fixed time window.
///
/// Quotas are expressed in a positive number of accesses (the `limit`) and the
/// length of the window in which those accesses are counted. Once the window
/// that started with the first counted access has elapsed, the count resets.
///
/// Neither the limit nor the window may be zero.
///
/// # Key ids
/// Several independently configured quotas may share one store. Each quota
/// derives a [`key_id`](Quota::key_id) from `window / limit` that is mixed into
/// the store keys, so the counters of two differently configured policies do
/// not collide.
///
/// # Examples
///
/// Construct a quota that allows 50 accesses per second:
/// ```rust
/// # use throttle::Quota;
/// # use nonzero_ext::nonzero;
/// # use std::time::Duration;
/// let q = Quota::per_second(nonzero!(50u64));
/// assert_eq!(q.limit().get(), 50);
/// assert_eq!(q.window(), Duration::from_secs(1));
/// assert_eq!(q.key_id(), "20000000");
/// assert_eq!(Some(q), Quota::new(nonzero!(50u64), Duration::from_secs(1)));
/// ```
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub struct Quota {
    pub(crate) limit: NonZeroU64,
    pub(crate) within: Duration,
}

/// Constructors for Quotas
impl Quota {
    /// Construct a quota for a number of accesses per second.
    pub const fn per_second(limit: NonZeroU64) -> Quota {
        Quota {
            limit,
            within: Duration::from_secs(1),
        }
    }

    /// Construct a quota for a number of accesses per 60-second period.
    pub const fn per_minute(limit: NonZeroU64) -> Quota {
        Quota {
            limit,
            within: Duration::from_secs(60),
        }
    }

    /// Construct a quota for a number of accesses per 60-minute (3600-second) period.
    pub const fn per_hour(limit: NonZeroU64) -> Quota {
        Quota {
            limit,
            within: Duration::from_secs(60 * 60),
        }
    }

    /// Construct a quota for a given limit within an arbitrary window.
    ///
    /// Returns `None` if the window is zero.
    pub const fn new(limit: NonZeroU64, within: Duration) -> Option<Quota> {
        if within.is_zero() {
            None
        } else {
            Some(Quota { limit, within })
        }
    }
}

/// Retrieving information about a quota
impl Quota {
    /// The maximum number of accesses counted within one window.
    pub const fn limit(&self) -> NonZeroU64 {
        self.limit
    }

    /// The length of the window.
    pub const fn window(&self) -> Duration {
        self.within
    }

    /// A stable identifier for this quota's configuration: the window in
    /// nanoseconds divided by the limit.
    pub fn key_id(&self) -> String {
        let per_access = self.within.as_nanos() / u128::from(self.limit.get());
        per_access.to_string()
    }
}
