use dashmap::DashMap;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

/// A table of per-key mutexes.
///
/// Stores hand out their lock table through
/// [`KeyValueStore::key_locks`](super::KeyValueStore::key_locks), so every
/// controller updating a key on the same store waits on the same mutex,
/// independently of how many controllers were constructed.
///
/// Entries are created on first use and dropped again by
/// [`forget`](KeyLocks::forget) once nobody holds them.
#[derive(Default)]
pub struct KeyLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl KeyLocks {
    /// Runs `f` while holding the lock for `key`.
    pub fn with_lock<T>(&self, key: &str, f: impl FnOnce() -> T) -> T {
        let lock = self.lock_for(key);
        let _guard = lock.lock();
        f()
    }

    fn lock_for(&self, key: &str) -> Arc<Mutex<()>> {
        // fast path: the key was locked before.
        if let Some(lock) = self.locks.get(key) {
            return Arc::clone(lock.value());
        }
        let entry = self.locks.entry(key.to_owned()).or_default();
        Arc::clone(entry.value())
    }

    /// Drops the lock entry for `key` unless somebody is holding or waiting on it.
    pub fn forget(&self, key: &str) {
        self.locks.remove_if(key, |_, lock| Arc::strong_count(lock) == 1);
    }

    /// The number of keys with a live lock entry.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    /// Returns `true` if no lock entries exist.
    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

impl fmt::Debug for KeyLocks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyLocks")
            .field("keys", &self.locks.len())
            .finish()
    }
}
