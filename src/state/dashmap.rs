use crate::clock::{Clock, SystemClock};
use crate::counter::AccessCounter;
use crate::errors::StoreError;
use crate::state::{ExpiringStore, Freshness, KeyLocks, KeyValueStore, SweepReport, Verdict};
use dashmap::DashMap;
use serde::de::DeserializeOwned;
use std::fmt;
use std::marker::PhantomData;
use tracing::{event, Level};

/// A concurrent, thread-safe and fairly performant in-memory store based on
/// [`DashMap`].
///
/// Keys are spread over shards that are locked independently, so lookups of
/// different identities rarely wait on each other.
pub struct DashMapStore<T = AccessCounter, C: Clock = SystemClock> {
    data: DashMap<String, Vec<u8>>,
    locks: KeyLocks,
    clock: C,
    binding: PhantomData<fn() -> T>,
}

impl<T> DashMapStore<T, SystemClock> {
    /// Constructs an empty store on the system clock.
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl<T> Default for DashMapStore<T, SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, C: Clock> DashMapStore<T, C> {
    /// Constructs an empty store that judges freshness with the given clock.
    pub fn with_clock(clock: C) -> Self {
        DashMapStore {
            data: DashMap::new(),
            locks: KeyLocks::default(),
            clock,
            binding: PhantomData,
        }
    }

    /// Shrinks the capacity of the underlying map as much as possible.
    pub fn shrink_to_fit(&self) {
        self.data.shrink_to_fit();
    }
}

impl<T, C: Clock> KeyValueStore for DashMapStore<T, C> {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.data.get(key).map(|v| v.value().clone()))
    }

    fn set(&self, key: &str, value: Vec<u8>) -> Result<(), StoreError> {
        self.data.insert(key.to_owned(), value);
        Ok(())
    }

    fn key_locks(&self) -> Option<&KeyLocks> {
        Some(&self.locks)
    }
}

impl<T, C> ExpiringStore for DashMapStore<T, C>
where
    T: Freshness + DeserializeOwned,
    C: Clock,
{
    type Value = T;

    fn delete(&self, key: &str) {
        self.data.remove(key);
        self.locks.forget(key);
    }

    fn clean(&self) -> SweepReport {
        let now = self.clock.now();
        let keys: Vec<String> = self.data.iter().map(|e| e.key().clone()).collect();
        let mut report = SweepReport::default();
        for key in keys {
            let mut verdict = None;
            let removed = self.data.remove_if(&key, |k, v| {
                let v = Verdict::of::<T>(k, v, now);
                verdict = Some(v);
                v.evicts()
            });
            if let Some(verdict) = verdict {
                report.record(verdict);
            }
            if removed.is_some() {
                self.locks.forget(&key);
                event!(Level::TRACE, key = key.as_str(), ?verdict, "evicted");
            }
        }
        event!(Level::DEBUG, ?report, "swept dashmap store");
        report
    }

    fn len(&self) -> usize {
        self.data.len()
    }
}

impl<T, C: Clock + fmt::Debug> fmt::Debug for DashMapStore<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DashMapStore")
            .field("entries", &self.data.len())
            .field("clock", &self.clock)
            .finish()
    }
}
