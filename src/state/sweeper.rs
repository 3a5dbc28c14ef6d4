use crate::state::ExpiringStore;
use crate::timestamp::duration_millis;
use parking_lot::{Condvar, Mutex, MutexGuard};
use serde::{Deserialize, Serialize};
use std::io;
use std::sync::{Arc, Weak};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{event, Level};

/// How often stores are swept unless configured otherwise.
pub const DEFAULT_CLEANING_PERIOD: Duration = Duration::from_secs(15 * 60);

/// Configuration for an expiring store's background sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreOptions {
    /// The time between two sweeps.
    #[serde(rename = "cleaning_period_ms", with = "duration_millis")]
    pub cleaning_period: Duration,
}

impl Default for StoreOptions {
    fn default() -> Self {
        StoreOptions {
            cleaning_period: DEFAULT_CLEANING_PERIOD,
        }
    }
}

impl StoreOptions {
    /// Starts a [`Sweeper`] for `store` with these options.
    pub fn start_sweeper<S>(&self, store: &Arc<S>) -> io::Result<Sweeper>
    where
        S: ExpiringStore + 'static,
    {
        Sweeper::spawn(store, self.cleaning_period)
    }
}

#[derive(Default)]
struct Signal {
    stopped: Mutex<bool>,
    wake: Condvar,
}

/// A background thread that periodically [cleans](ExpiringStore::clean) a store.
///
/// The sweeper only holds a weak reference to the store: it exits on its own
/// once the store is dropped. Dropping the sweeper (or calling
/// [`stop`](Sweeper::stop)) wakes the thread and waits for it to finish,
/// even in the middle of a long period.
///
/// ```rust
/// # use std::sync::Arc;
/// # use std::time::Duration;
/// use throttle::state::{MapStore, Sweeper};
/// let store: Arc<MapStore> = Arc::new(MapStore::new());
/// let sweeper = Sweeper::spawn(&store, Duration::from_secs(60)).unwrap();
/// // ... serve traffic ...
/// sweeper.stop();
/// ```
pub struct Sweeper {
    signal: Arc<Signal>,
    handle: Option<thread::JoinHandle<()>>,
}

impl Sweeper {
    /// Spawns a thread that cleans `store` once every `period`.
    pub fn spawn<S>(store: &Arc<S>, period: Duration) -> io::Result<Sweeper>
    where
        S: ExpiringStore + 'static,
    {
        let store = Arc::downgrade(store);
        let signal = Arc::new(Signal::default());
        let handle = thread::Builder::new()
            .name("throttle-sweeper".to_owned())
            .spawn({
                let signal = Arc::clone(&signal);
                move || run(&store, period, &signal)
            })?;
        Ok(Sweeper {
            signal,
            handle: Some(handle),
        })
    }

    /// Stops the sweep and waits for the thread to exit.
    pub fn stop(mut self) {
        self.shutdown();
    }

    /// Returns `true` once the sweeper thread has exited.
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, |h| h.is_finished())
    }

    fn shutdown(&mut self) {
        *self.signal.stopped.lock() = true;
        self.signal.wake.notify_all();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                event!(Level::ERROR, "sweeper thread panicked");
            }
        }
    }
}

impl Drop for Sweeper {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for Sweeper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sweeper")
            .field("finished", &self.is_finished())
            .finish()
    }
}

fn run<S: ExpiringStore>(store: &Weak<S>, period: Duration, signal: &Signal) {
    let mut stopped = signal.stopped.lock();
    loop {
        let deadline = Instant::now() + period;
        while !*stopped {
            if signal.wake.wait_until(&mut stopped, deadline).timed_out() {
                break;
            }
        }
        if *stopped {
            return;
        }
        let Some(store) = store.upgrade() else {
            event!(Level::DEBUG, "store dropped, sweeper exiting");
            return;
        };
        MutexGuard::unlocked(&mut stopped, || {
            store.clean();
        });
    }
}

/// Cleans `store` once every `period`, for as long as the store is alive.
///
/// The returned future completes once the store has been dropped; drop the
/// future to stop sweeping earlier. It does not depend on any particular
/// executor.
#[cfg(feature = "futures")]
pub async fn sweep_every<S: ExpiringStore>(store: Weak<S>, period: Duration) {
    loop {
        futures_timer::Delay::new(period).await;
        match store.upgrade() {
            Some(store) => {
                store.clean();
            }
            None => {
                event!(Level::DEBUG, "store dropped, sweep finished");
                return;
            }
        }
    }
}
