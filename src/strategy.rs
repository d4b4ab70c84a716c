//! The limiter interface and the registry of named implementations.
//!
//! Every limiter that can stand in front of a request handler
//! implements [`RateLimit`]. A [`Registry`] maps names to
//! [`Constructor`]s so that the implementation can be chosen at
//! start-up, e.g. from a configuration file:
//!
//! ```
//! # use std::time::Duration;
//! use ratelimit_decay::prelude::*;
//! use ratelimit_decay::Registry;
//!
//! let registry = Registry::default();
//! let lim = registry.build("decay", 3, Duration::from_secs(3)).unwrap();
//! assert_eq!(3, lim.capacity());
//! assert!(lim.consume_async());
//! assert_eq!(1, lim.consumed());
//! lim.destroy().unwrap();
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use crate::example_algorithms::Unlimited;
use crate::thread_safety::GatePolicy;
use crate::{ConfigurationError, LimiterError, RateLimiter, RegistryError};

/// The name of the strategy used when none is configured.
pub const DEFAULT_STRATEGY: &str = "decay";

/// The operations every rate limiter implementation provides.
pub trait RateLimit: Send + Sync + fmt::Debug {
    /// Blocks until a permit is available, then consumes it.
    fn consume(&self) -> Result<(), LimiterError>;

    /// Never blocks; returns `true` iff a permit was consumed.
    fn consume_async(&self) -> bool;

    /// A non-authoritative peek at whether a permit is available.
    fn allowed(&self) -> bool;

    /// The configured burst size.
    fn capacity(&self) -> u32;

    /// `capacity - remaining`.
    fn consumed(&self) -> u32;

    /// Stops background replenishment. Meant to be called once.
    fn destroy(&self) -> Result<(), LimiterError>;
}

/// A function that constructs a limiter for `capacity` permits per
/// `window`.
pub type Constructor = fn(u32, Duration) -> Result<Box<dyn RateLimit>, ConfigurationError>;

impl RateLimit for RateLimiter {
    fn consume(&self) -> Result<(), LimiterError> {
        RateLimiter::consume(self)
    }

    fn consume_async(&self) -> bool {
        RateLimiter::consume_async(self)
    }

    fn allowed(&self) -> bool {
        RateLimiter::allowed(self)
    }

    fn capacity(&self) -> u32 {
        RateLimiter::capacity(self)
    }

    fn consumed(&self) -> u32 {
        RateLimiter::consumed(self)
    }

    fn destroy(&self) -> Result<(), LimiterError> {
        RateLimiter::destroy(self)
    }
}

fn decay(capacity: u32, window: Duration) -> Result<Box<dyn RateLimit>, ConfigurationError> {
    Ok(Box::new(RateLimiter::with_policy(
        capacity,
        window,
        GatePolicy::Conservative,
    )?))
}

fn decay_precise(capacity: u32, window: Duration) -> Result<Box<dyn RateLimit>, ConfigurationError> {
    Ok(Box::new(RateLimiter::with_policy(
        capacity,
        window,
        GatePolicy::Precise,
    )?))
}

fn unlimited(capacity: u32, window: Duration) -> Result<Box<dyn RateLimit>, ConfigurationError> {
    Ok(Box::new(Unlimited::new(capacity, window)?))
}

/// Maps strategy names to limiter constructors.
///
/// The default registry knows `decay`, `decay-precise` and
/// `unlimited`.
#[derive(Clone)]
pub struct Registry {
    constructors: BTreeMap<String, Constructor>,
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        f.debug_set().entries(self.constructors.keys()).finish()
    }
}

impl Default for Registry {
    fn default() -> Self {
        let mut registry = Registry::empty();
        registry.register(DEFAULT_STRATEGY, decay);
        registry.register("decay-precise", decay_precise);
        registry.register("unlimited", unlimited);
        registry
    }
}

impl Registry {
    /// A registry without any strategies.
    pub fn empty() -> Registry {
        Registry {
            constructors: BTreeMap::new(),
        }
    }

    /// Adds a strategy, returning the constructor it replaced, if any.
    pub fn register<N: Into<String>>(&mut self, name: N, constructor: Constructor) -> Option<Constructor> {
        self.constructors.insert(name.into(), constructor)
    }

    /// Looks up the constructor registered under `name`.
    pub fn resolve(&self, name: &str) -> Result<Constructor, RegistryError> {
        self.constructors
            .get(name)
            .copied()
            .ok_or_else(|| RegistryError::UnknownStrategy(name.to_string()))
    }

    /// Constructs a limiter with the strategy registered under `name`.
    pub fn build(
        &self,
        name: &str,
        capacity: u32,
        window: Duration,
    ) -> Result<Box<dyn RateLimit>, RegistryError> {
        let constructor = self.resolve(name)?;
        Ok(constructor(capacity, window)?)
    }

    /// The registered strategy names, in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.constructors.keys().map(String::as_str)
    }
}
