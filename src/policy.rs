//! Throttling policies: the entry point for admission decisions.
//!
//! A [`Policy`] ties a [`Quota`] to a store and a set of [`PolicyOptions`].
//! It turns caller-supplied identities into store keys, asks its
//! [`Controller`] for a decision and tells the caller which status and
//! message to reject with. Extracting identities from requests and writing
//! responses is left to the integration with an HTTP framework.
//!
//! ```rust
//! # use std::sync::Arc;
//! # use nonzero_ext::nonzero;
//! use throttle::{Policy, PolicyOptions, Quota, state::MapStore};
//!
//! let store: Arc<MapStore> = Arc::new(MapStore::new());
//! let policy = Policy::new(Quota::per_minute(nonzero!(1u64)), store, PolicyOptions::default());
//!
//! let first = policy.check("10.0.0.1").unwrap().unwrap();
//! assert!(first.is_allowed());
//! assert_eq!(first.snapshot().remaining(), 0);
//!
//! let second = policy.check("10.0.0.1").unwrap().unwrap();
//! assert!(!second.is_allowed());
//! assert_eq!(policy.rejection().status_code, 429);
//! ```

use crate::clock::{Clock, SystemClock};
use crate::controller::Controller;
use crate::decision::{Decision, QuotaSnapshot};
use crate::errors::Error;
use crate::state::KeyValueStore;
use crate::Quota;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// The separator between the parts of a store key.
pub const KEY_SEPARATOR: &str = "_";

/// Joins key parts with [`KEY_SEPARATOR`].
pub fn make_key(parts: &[&str]) -> String {
    parts.join(KEY_SEPARATOR)
}

/// Options for a throttling [`Policy`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyOptions {
    /// Prefix of every store key the policy uses.
    pub key_prefix: String,
    /// Status code for rejected requests.
    pub status_code: u16,
    /// Body for rejected requests.
    pub message: String,
    /// A disabled policy admits everything and counts nothing.
    pub disabled: bool,
}

impl Default for PolicyOptions {
    fn default() -> Self {
        PolicyOptions {
            key_prefix: "throttle".to_owned(),
            status_code: 429,
            message: "Too Many Requests".to_owned(),
            disabled: false,
        }
    }
}

/// The response a denied access should receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rejection<'a> {
    /// Status code to answer with.
    pub status_code: u16,
    /// Body to answer with.
    pub message: &'a str,
}

/// A throttling policy: one quota, enforced per identity.
pub struct Policy<S, C = SystemClock> {
    controller: Controller<S, C>,
    options: PolicyOptions,
}

impl<S: KeyValueStore> Policy<S, SystemClock> {
    /// Constructs a policy for `quota` on the system clock.
    pub fn new(quota: Quota, store: Arc<S>, options: PolicyOptions) -> Self {
        Self::with_clock(quota, store, options, SystemClock)
    }
}

impl<S: KeyValueStore, C: Clock> Policy<S, C> {
    /// Constructs a policy for `quota` with a custom clock.
    pub fn with_clock(quota: Quota, store: Arc<S>, options: PolicyOptions, clock: C) -> Self {
        Policy {
            controller: Controller::with_clock(quota, store, clock),
            options,
        }
    }

    /// The controller doing the accounting for this policy.
    pub fn controller(&self) -> &Controller<S, C> {
        &self.controller
    }

    /// The options this policy was built with.
    pub fn options(&self) -> &PolicyOptions {
        &self.options
    }

    /// The store key for `identity`.
    pub fn key(&self, identity: &str) -> String {
        let key_id = self.controller.quota().key_id();
        make_key(&[self.options.key_prefix.as_str(), key_id.as_str(), identity])
    }

    /// Decides whether `identity` is admitted, counting the access if so.
    ///
    /// Returns `Ok(None)` if the policy is disabled.
    pub fn check(&self, identity: &str) -> Result<Option<Decision>, Error> {
        if self.options.disabled {
            return Ok(None);
        }
        self.controller
            .check_and_register(&self.key(identity))
            .map(Some)
    }

    /// Decides whether `identity` would be admitted, without counting anything.
    pub fn peek(&self, identity: &str) -> Result<Option<Decision>, Error> {
        if self.options.disabled {
            return Ok(None);
        }
        self.controller.peek(&self.key(identity)).map(Some)
    }

    /// Reports the quota state of `identity` without deciding anything.
    pub fn inspect(&self, identity: &str) -> Result<Option<QuotaSnapshot>, Error> {
        if self.options.disabled {
            return Ok(None);
        }
        self.controller.snapshot(&self.key(identity)).map(Some)
    }

    /// Counts an access for `identity` without checking its quota.
    pub fn register(&self, identity: &str) -> Result<(), Error> {
        if self.options.disabled {
            return Ok(());
        }
        self.controller.register_access(&self.key(identity))
    }

    /// How denied accesses should be answered.
    pub fn rejection(&self) -> Rejection<'_> {
        Rejection {
            status_code: self.options.status_code,
            message: &self.options.message,
        }
    }
}

impl<S, C: Clock + fmt::Debug> fmt::Debug for Policy<S, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Policy")
            .field("controller", &self.controller)
            .field("options", &self.options)
            .finish()
    }
}
