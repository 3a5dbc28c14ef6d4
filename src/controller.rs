//! Accounting of accesses against one quota.

use crate::clock::{Clock, SystemClock};
use crate::counter::AccessCounter;
use crate::decision::{Decision, QuotaSnapshot};
use crate::errors::{Error, StoreError};
use crate::state::KeyValueStore;
use crate::timestamp::Timestamp;
use crate::Quota;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use tracing::{event, span, Level};

/// Counts accesses per identity against one [`Quota`], keeping the counters in
/// a shared store.
///
/// The read-increment-write cycle of [`register_access`](Controller::register_access)
/// and [`check_and_register`](Controller::check_and_register) runs under the
/// store's per-key lock (see [`KeyValueStore::key_locks`]), so controllers that
/// were constructed separately but share a store and a key do not lose
/// updates. Stores without a lock table fall back to a mutex private to this
/// controller.
///
/// The read-only queries take no lock. Checking
/// [`denies_access`](Controller::denies_access) and then calling
/// [`register_access`](Controller::register_access) is therefore approximate:
/// concurrent callers may all pass the check before any of them registers.
/// Use [`check_and_register`](Controller::check_and_register) where the limit
/// must hold exactly.
pub struct Controller<S, C = SystemClock> {
    quota: Quota,
    store: Arc<S>,
    clock: C,
    fallback: Mutex<()>,
}

impl<S: KeyValueStore> Controller<S, SystemClock> {
    /// Constructs a controller for `quota` on the system clock.
    pub fn new(quota: Quota, store: Arc<S>) -> Self {
        Self::with_clock(quota, store, SystemClock)
    }
}

impl<S: KeyValueStore, C: Clock> Controller<S, C> {
    /// Constructs a controller for `quota` with a custom clock.
    pub fn with_clock(quota: Quota, store: Arc<S>, clock: C) -> Self {
        Controller {
            quota,
            store,
            clock,
            fallback: Mutex::new(()),
        }
    }

    /// The quota this controller enforces.
    pub fn quota(&self) -> Quota {
        self.quota
    }

    /// The store the counters live in.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Returns the counter stored for `id`.
    ///
    /// A missing counter is not an error: the first access of an identity
    /// gets a fresh, empty counter for the quota's window. A counter that can
    /// not be decoded is replaced the same way.
    pub fn access_count(&self, id: &str) -> Result<AccessCounter, Error> {
        self.access_count_at(id, self.clock.now())
    }

    fn access_count_at(&self, id: &str, now: Timestamp) -> Result<AccessCounter, Error> {
        let fresh = || AccessCounter::new(self.quota.within, now);
        let bytes = match self.store.get(id)? {
            Some(bytes) => bytes,
            None => return Ok(fresh()),
        };
        match AccessCounter::from_bytes(&bytes) {
            Ok(counter) => Ok(counter),
            Err(source) => {
                let err = StoreError::Decode {
                    key: id.to_owned(),
                    source,
                };
                event!(Level::WARN, %err, "replacing unreadable counter");
                Ok(fresh())
            }
        }
    }

    /// Writes `counter` to the store under `id`.
    pub fn set_access_count(&self, id: &str, counter: &AccessCounter) -> Result<(), Error> {
        let bytes = counter.to_bytes().map_err(Error::Encode)?;
        self.store.set(id, bytes)?;
        Ok(())
    }

    fn exclusive<T>(&self, id: &str, f: impl FnOnce() -> T) -> T {
        match self.store.key_locks() {
            Some(locks) => locks.with_lock(id, f),
            None => {
                let _guard = self.fallback.lock();
                f()
            }
        }
    }

    /// Counts one access for `id`, without checking the quota.
    pub fn register_access(&self, id: &str) -> Result<(), Error> {
        self.exclusive(id, || -> Result<(), Error> {
            let now = self.clock.now();
            let mut counter = self.access_count_at(id, now)?;
            counter.increment_at(now);
            self.set_access_count(id, &counter)
        })
    }

    /// Returns whether `id` has used up its quota for the current window.
    pub fn denies_access(&self, id: &str) -> Result<bool, Error> {
        let now = self.clock.now();
        let counter = self.access_count_at(id, now)?;
        Ok(counter.count_at(now) >= self.quota.limit.get())
    }

    /// When the current window of `id` ends.
    pub fn retry_at(&self, id: &str) -> Result<Timestamp, Error> {
        let counter = self.access_count(id)?;
        Ok(counter.start() + self.quota.within)
    }

    /// The number of accesses `id` has left in the current window.
    pub fn remaining_limit(&self, id: &str) -> Result<u64, Error> {
        let now = self.clock.now();
        let counter = self.access_count_at(id, now)?;
        Ok(self.quota.limit.get().saturating_sub(counter.count_at(now)))
    }

    /// Limit, remaining accesses and reset time of `id`, all from one read.
    pub fn snapshot(&self, id: &str) -> Result<QuotaSnapshot, Error> {
        let now = self.clock.now();
        let counter = self.access_count_at(id, now)?;
        Ok(self.snapshot_of(&counter, now))
    }

    fn snapshot_of(&self, counter: &AccessCounter, now: Timestamp) -> QuotaSnapshot {
        let limit = self.quota.limit.get();
        QuotaSnapshot {
            limit,
            remaining: limit.saturating_sub(counter.count_at(now)),
            reset_at: counter.start() + self.quota.within,
        }
    }

    /// Decides whether `id` may access without counting anything.
    pub fn peek(&self, id: &str) -> Result<Decision, Error> {
        let now = self.clock.now();
        let counter = self.access_count_at(id, now)?;
        let snapshot = self.snapshot_of(&counter, now);
        if counter.count_at(now) >= snapshot.limit {
            Ok(Decision::Denied(snapshot))
        } else {
            Ok(Decision::Allowed(snapshot))
        }
    }

    /// Checks the quota of `id` and counts the access if it is admitted, as one
    /// atomic step.
    ///
    /// Denied accesses are not counted. The returned snapshot reflects the
    /// state after the decision.
    pub fn check_and_register(&self, id: &str) -> Result<Decision, Error> {
        let span = span!(Level::TRACE, "check_and_register", key = id);
        let _enter = span.enter();
        let decision = self.exclusive(id, || -> Result<Decision, Error> {
            let now = self.clock.now();
            let mut counter = self.access_count_at(id, now)?;
            if counter.count_at(now) >= self.quota.limit.get() {
                return Ok(Decision::Denied(self.snapshot_of(&counter, now)));
            }
            counter.increment_at(now);
            self.set_access_count(id, &counter)?;
            Ok(Decision::Allowed(self.snapshot_of(&counter, now)))
        })?;
        event!(Level::TRACE, ?decision);
        Ok(decision)
    }
}

impl<S, C: Clock + fmt::Debug> fmt::Debug for Controller<S, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Controller")
            .field("quota", &self.quota)
            .field("clock", &self.clock)
            .finish()
    }
}
