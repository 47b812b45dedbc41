//! Capabilities the lifecycle core consumes: time, identity, authorization.
//!
//! None of them is read from global state; services and factories receive
//! them explicitly so audit stamps stay deterministic under test.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Duration, Utc};
use common::Actor;

/// Source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to. Millisecond precision.
#[derive(Debug)]
pub struct FixedClock {
    millis: AtomicI64,
}

impl FixedClock {
    pub fn new(at: DateTime<Utc>) -> Self {
        Self {
            millis: AtomicI64::new(at.timestamp_millis()),
        }
    }

    /// Moves the clock forward.
    pub fn advance(&self, by: Duration) {
        self.millis.fetch_add(by.num_milliseconds(), Ordering::SeqCst);
    }

    pub fn set(&self, at: DateTime<Utc>) {
        self.millis.store(at.timestamp_millis(), Ordering::SeqCst);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.millis.load(Ordering::SeqCst)).unwrap_or_default()
    }
}

/// Source of the identity performing the current operation.
pub trait ActorSource: Send + Sync {
    fn current_actor(&self) -> Actor;
}

impl ActorSource for Actor {
    fn current_actor(&self) -> Actor {
        self.clone()
    }
}

/// Answers whether the caller holds a permission.
pub trait Authorizer: Send + Sync {
    fn can(&self, permission: &str) -> bool;
}

/// Authorizer backed by a fixed set of granted permissions.
///
/// A grant of `*` allows everything; a grant of `brand.*` allows every
/// permission starting with `brand.`.
#[derive(Debug, Clone, Default)]
pub struct StaticAuthorizer {
    granted: HashSet<String>,
}

impl StaticAuthorizer {
    pub fn new<I, P>(granted: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<String>,
    {
        Self {
            granted: granted.into_iter().map(Into::into).collect(),
        }
    }

    /// Grants everything.
    pub fn allow_all() -> Self {
        Self::new(["*"])
    }

    /// Grants nothing.
    pub fn deny_all() -> Self {
        Self::default()
    }
}

impl Authorizer for StaticAuthorizer {
    fn can(&self, permission: &str) -> bool {
        if self.granted.contains("*") || self.granted.contains(permission) {
            return true;
        }
        self.granted.iter().any(|grant| {
            grant
                .strip_suffix(".*")
                .and_then(|prefix| permission.strip_prefix(prefix))
                .is_some_and(|rest| rest.starts_with('.'))
        })
    }
}

/// Per-request capabilities handed to every mutating service call.
#[derive(Clone)]
pub struct RequestContext {
    actor: Actor,
    authorizer: Arc<dyn Authorizer>,
}

impl RequestContext {
    pub fn new(actor: Actor, authorizer: Arc<dyn Authorizer>) -> Self {
        Self { actor, authorizer }
    }

    /// The system actor with every permission.
    pub fn system() -> Self {
        Self::new(Actor::system(), Arc::new(StaticAuthorizer::allow_all()))
    }

    pub fn actor(&self) -> &Actor {
        &self.actor
    }

    pub fn authorizer(&self) -> &dyn Authorizer {
        self.authorizer.as_ref()
    }
}

impl ActorSource for RequestContext {
    fn current_actor(&self) -> Actor {
        self.actor.clone()
    }
}

impl std::fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestContext")
            .field("actor", &self.actor)
            .finish_non_exhaustive()
    }
}
