//! State stores for controllers.
//!
//! A store maps opaque string keys to byte payloads. Controllers only need
//! the small [`KeyValueStore`] contract, so any backend that can get and set
//! bytes can hold access counters. The in-memory stores in this crate also
//! implement [`ExpiringStore`]: they decode their payloads into a
//! [`Freshness`] type and can sweep out entries that went stale.
//!
//! Two in-memory stores ship with this crate:
//!
//! * [`MapStore`], a [`HashMap`](std::collections::HashMap) behind a single
//!   read/write lock. Simple, and the default.
//! * [`DashMapStore`], backed by a sharded [`DashMap`](::dashmap::DashMap),
//!   for workloads with many identities where one lock becomes contended.

use crate::errors::StoreError;
use crate::timestamp::Timestamp;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::{event, Level};

mod dashmap;
mod locks;
mod map_store;
mod sweeper;

pub use self::dashmap::DashMapStore;
pub use locks::KeyLocks;
pub use map_store::MapStore;
#[cfg(feature = "futures")]
pub use sweeper::sweep_every;
pub use sweeper::{StoreOptions, Sweeper, DEFAULT_CLEANING_PERIOD};

/// A value that can tell whether it is still current.
///
/// Expiring stores decode their payloads into a `Freshness` type to decide
/// which entries a sweep may drop.
pub trait Freshness {
    /// Returns whether the value is still fresh at `now`.
    fn is_fresh_at(&self, now: Timestamp) -> bool;
}

/// The storage contract consumed by controllers.
///
/// Implement this to plug in a different backend. A missing key is reported
/// as `Ok(None)`; errors are reserved for backend failures.
pub trait KeyValueStore: Send + Sync {
    /// Returns a copy of the bytes stored under `key`.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Stores `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: Vec<u8>) -> Result<(), StoreError>;

    /// The lock table that serializes read-modify-write cycles on this store.
    ///
    /// Controllers lock a key here before updating its counter, so that all
    /// controllers sharing the store serialize on the same per-key lock. A
    /// store that returns `None` leaves serialization to each controller,
    /// which only protects against races within that one controller.
    fn key_locks(&self) -> Option<&KeyLocks> {
        None
    }
}

impl<S: KeyValueStore + ?Sized> KeyValueStore for Arc<S> {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: Vec<u8>) -> Result<(), StoreError> {
        (**self).set(key, value)
    }

    fn key_locks(&self) -> Option<&KeyLocks> {
        (**self).key_locks()
    }
}

/// A store whose entries expire and can be swept out.
pub trait ExpiringStore: KeyValueStore {
    /// The type payloads are decoded into.
    type Value: Freshness + DeserializeOwned;

    /// Removes the entry under `key`, if there is one.
    fn delete(&self, key: &str);

    /// Decodes the entry stored under `key`.
    fn read(&self, key: &str) -> Result<Option<Self::Value>, StoreError> {
        match self.get(key)? {
            None => Ok(None),
            Some(bytes) => decode(key, &bytes).map(Some),
        }
    }

    /// Removes every entry that is no longer fresh, along with entries that
    /// can not be decoded.
    ///
    /// Each entry is checked and removed atomically, but the sweep as a whole
    /// is not: entries written while a sweep runs may or may not be visited.
    fn clean(&self) -> SweepReport;

    /// The number of entries in the store, fresh or not.
    fn len(&self) -> usize;

    /// Returns `true` if the store holds no entries.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// What a single [`ExpiringStore::clean`] pass did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    /// Entries looked at.
    pub scanned: usize,
    /// Stale entries removed.
    pub evicted: usize,
    /// Undecodable entries removed.
    pub corrupt: usize,
}

pub(crate) fn decode<T: DeserializeOwned>(key: &str, bytes: &[u8]) -> Result<T, StoreError> {
    serde_json::from_slice(bytes).map_err(|source| StoreError::Decode {
        key: key.to_owned(),
        source,
    })
}

/// The sweep's verdict on a single entry.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub(crate) enum Verdict {
    Fresh,
    Stale,
    Corrupt,
}

impl Verdict {
    pub(crate) fn of<T>(key: &str, bytes: &[u8], now: Timestamp) -> Verdict
    where
        T: Freshness + DeserializeOwned,
    {
        match decode::<T>(key, bytes) {
            Ok(value) if value.is_fresh_at(now) => Verdict::Fresh,
            Ok(_) => Verdict::Stale,
            Err(err) => {
                event!(Level::WARN, %err, "dropping undecodable entry");
                Verdict::Corrupt
            }
        }
    }

    pub(crate) fn evicts(self) -> bool {
        self != Verdict::Fresh
    }
}

impl SweepReport {
    pub(crate) fn record(&mut self, verdict: Verdict) {
        self.scanned += 1;
        match verdict {
            Verdict::Fresh => {}
            Verdict::Stale => self.evicted += 1,
            Verdict::Corrupt => self.corrupt += 1,
        }
    }
}
