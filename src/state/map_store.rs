use crate::clock::{Clock, SystemClock};
use crate::counter::AccessCounter;
use crate::errors::StoreError;
use crate::state::{ExpiringStore, Freshness, KeyLocks, KeyValueStore, SweepReport, Verdict};
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use tracing::{event, Level};

/// A thread-safe (but not very performant under contention) in-memory store
/// backed by a [`HashMap`] behind one read/write lock.
///
/// Lookups share the lock; writes and deletions take it exclusively. The
/// `MapStore` is the default store: construct it explicitly, wrap it in an
/// [`Arc`](std::sync::Arc) to share it between controllers, and start a
/// [`Sweeper`](crate::state::Sweeper) to reclaim stale entries.
///
/// The type parameter `T` is what payloads are decoded into when the store is
/// swept or [read](ExpiringStore::read).
pub struct MapStore<T = AccessCounter, C: Clock = SystemClock> {
    data: RwLock<HashMap<String, Vec<u8>>>,
    locks: KeyLocks,
    clock: C,
    binding: PhantomData<fn() -> T>,
}

impl<T> MapStore<T, SystemClock> {
    /// Constructs an empty store on the system clock.
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl<T> Default for MapStore<T, SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, C: Clock> MapStore<T, C> {
    /// Constructs an empty store that judges freshness with the given clock.
    pub fn with_clock(clock: C) -> Self {
        MapStore {
            data: RwLock::new(HashMap::new()),
            locks: KeyLocks::default(),
            clock,
            binding: PhantomData,
        }
    }
}

impl<T, C: Clock> KeyValueStore for MapStore<T, C> {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.data.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: Vec<u8>) -> Result<(), StoreError> {
        self.data.write().insert(key.to_owned(), value);
        Ok(())
    }

    fn key_locks(&self) -> Option<&KeyLocks> {
        Some(&self.locks)
    }
}

impl<T, C> ExpiringStore for MapStore<T, C>
where
    T: Freshness + DeserializeOwned,
    C: Clock,
{
    type Value = T;

    fn delete(&self, key: &str) {
        self.data.write().remove(key);
        self.locks.forget(key);
    }

    fn clean(&self) -> SweepReport {
        let now = self.clock.now();
        let keys: Vec<String> = self.data.read().keys().cloned().collect();
        let mut report = SweepReport::default();
        for key in keys {
            // Lock per key, never across the sweep.
            let mut data = self.data.write();
            let verdict = match data.get(&key) {
                Some(bytes) => Verdict::of::<T>(&key, bytes, now),
                // deleted since the snapshot was taken
                None => continue,
            };
            report.record(verdict);
            if verdict.evicts() {
                data.remove(&key);
                drop(data);
                self.locks.forget(&key);
                event!(Level::TRACE, key = key.as_str(), ?verdict, "evicted");
            }
        }
        event!(Level::DEBUG, ?report, "swept map store");
        report
    }

    fn len(&self) -> usize {
        self.data.read().len()
    }
}

impl<T, C: Clock + fmt::Debug> fmt::Debug for MapStore<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MapStore")
            .field("entries", &self.data.read().len())
            .field("clock", &self.clock)
            .finish()
    }
}
