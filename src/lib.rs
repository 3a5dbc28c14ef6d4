//! # throttle - fixed-window admission control
//!
//! This crate decides whether an identity (a client address, an API key, ...)
//! may perform another action under a [`Quota`]: a number of allowed accesses
//! within a fixed time window. Counters are kept per policy and identity in a
//! shared key-value store, which reclaims stale counters in the background.
//!
//! ## Parts
//!
//! * [`state`]: the store contract ([`KeyValueStore`](state::KeyValueStore)),
//!   the in-memory expiring stores and the background [`Sweeper`](state::Sweeper).
//! * [`Controller`]: atomic read-increment-write accounting for one quota on one
//!   store.
//! * [`Policy`]: the entry point that composes store keys from a prefix, the
//!   quota and the identity, and reports [`Decision`]s.
//!
//! ## Example
//!
//! ```rust
//! # use std::sync::Arc;
//! # use std::time::Duration;
//! # use nonzero_ext::nonzero;
//! use throttle::{Decision, Policy, PolicyOptions, Quota};
//! use throttle::state::{MapStore, StoreOptions};
//!
//! let store: Arc<MapStore> = Arc::new(MapStore::new());
//! let _sweeper = StoreOptions::default().start_sweeper(&store).unwrap();
//!
//! let quota = Quota::new(nonzero!(2u64), Duration::from_secs(10)).unwrap();
//! let policy = Policy::new(quota, Arc::clone(&store), PolicyOptions::default());
//!
//! assert!(policy.check("alice").unwrap().unwrap().is_allowed());
//! assert!(policy.check("alice").unwrap().unwrap().is_allowed());
//! match policy.check("alice").unwrap() {
//!     Some(Decision::Denied(snapshot)) => assert_eq!(snapshot.remaining(), 0),
//!     other => panic!("expected a denial, got {:?}", other),
//! }
//! // other identities have their own counters:
//! assert!(policy.check("bob").unwrap().unwrap().is_allowed());
//! ```
//!
//! ## Exactness under concurrency
//!
//! [`Controller::check_and_register`] (and therefore [`Policy::check`]) checks
//! and counts under a per-key lock, so the limit holds exactly even with many
//! concurrent callers. Calling [`Controller::denies_access`] and then
//! [`Controller::register_access`] is cheaper for readers but approximate: racing
//! callers may all pass the check before any of them is counted.

pub mod clock;
mod controller;
mod counter;
mod decision;
mod errors;
pub mod policy;
mod quota;
pub mod state;
mod timestamp;

pub use controller::Controller;
pub use counter::AccessCounter;
pub use decision::{Decision, QuotaSnapshot, LIMIT_HEADER, REMAINING_HEADER, RESET_HEADER};
pub use errors::{Error, StoreError};
pub use policy::{Policy, PolicyOptions, Rejection};
pub use quota::Quota;
pub use timestamp::Timestamp;
