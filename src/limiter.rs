//! A rate limiter whose permits decay back in over a window.

use std::fmt;
use std::mem;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::info;

use crate::decay::DecayScheduler;
use crate::store::PermitStore;
use crate::thread_safety::{Gate, GatePolicy};
use crate::{ConfigurationError, LimiterError};

/// An in-memory rate limiter handing out up to `capacity` permits at
/// once, and putting one permit back every `window / capacity`.
///
/// The limiter starts out full. Permits can be taken either by waiting
/// for one ([`consume`](#method.consume)) or by asking whether one is
/// available right now ([`consume_async`](#method.consume_async)).
///
/// # Example
/// ```
/// # use std::time::Duration;
/// use ratelimit_decay::RateLimiter;
///
/// let lim = RateLimiter::new(2, Duration::from_secs(60)).unwrap();
/// assert!(lim.consume_async());
/// assert!(lim.consume_async());
/// // The bucket is empty; the next permit arrives 30s from now:
/// assert!(!lim.consume_async());
/// lim.destroy().unwrap();
/// ```
///
/// # Teardown
/// Once [`destroy`](#method.destroy) was called (or the limiter was
/// dropped), no further permits are handed out: `consume` returns
/// [`LimiterError::Destroyed`], including for callers that were
/// waiting at that moment, and `consume_async` and `allowed` return
/// `false`.
pub struct RateLimiter {
    store: Arc<PermitStore>,
    gate: Gate,
    refill_interval: Duration,
    lifecycle: Mutex<Lifecycle>,
}

enum Lifecycle {
    Active(DecayScheduler),
    Destroyed,
}

impl fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        write!(
            f,
            "RateLimiter{{{store:?}, every {interval:?}, {policy:?}}}",
            store = self.store,
            interval = self.refill_interval,
            policy = self.gate.policy()
        )
    }
}

impl RateLimiter {
    /// Construct a new rate limiter that holds up to `capacity` permits
    /// and replenishes all of them over `window`, using the
    /// conservative gate policy.
    pub fn new(capacity: u32, window: Duration) -> Result<Self, ConfigurationError> {
        Self::with_policy(capacity, window, GatePolicy::default())
    }

    /// Same as [`new`](#method.new), with an explicit policy for
    /// non-blocking consumers.
    pub fn with_policy(
        capacity: u32,
        window: Duration,
        policy: GatePolicy,
    ) -> Result<Self, ConfigurationError> {
        let capacity = NonZeroU32::new(capacity).ok_or(ConfigurationError::ZeroCapacity)?;
        Self::build_with_capacity(capacity)
            .per(window)
            .policy(policy)
            .build()
    }

    /// Construct a new rate limiter that hands out `capacity` permits
    /// per second.
    pub fn per_second(capacity: NonZeroU32) -> Result<Self, ConfigurationError> {
        Self::build_with_capacity(capacity).build()
    }

    /// Return a builder that can be used to construct a rate limiter
    /// using the parameters passed to the Builder.
    pub fn build_with_capacity(capacity: NonZeroU32) -> Builder {
        Builder {
            capacity,
            window: Duration::from_secs(1),
            policy: GatePolicy::default(),
        }
    }

    /// Waits until a permit is available and consumes it.
    ///
    /// There is no timeout; the call returns once a permit was taken,
    /// or with [`LimiterError::Destroyed`] once the limiter is torn
    /// down.
    pub fn consume(&self) -> Result<(), LimiterError> {
        self.gate.consume(&self.store)
    }

    /// Consumes a permit if one can be had without waiting, and returns
    /// whether it did. Never blocks.
    ///
    /// Under [`GatePolicy::Conservative`] this also returns `false`
    /// while another thread is blocked in [`consume`](#method.consume).
    pub fn consume_async(&self) -> bool {
        self.gate.consume_async(&self.store)
    }

    /// Reports whether a permit is available right now, without taking
    /// it. Other consumers may race ahead, so a `true` result does not
    /// guarantee that a subsequent consume succeeds.
    pub fn allowed(&self) -> bool {
        !self.store.is_closed() && self.store.remaining() > 0
    }

    /// The maximum number of permits held at once.
    pub fn capacity(&self) -> u32 {
        self.store.capacity().get()
    }

    /// The number of permits currently available.
    pub fn remaining(&self) -> u32 {
        self.store.remaining()
    }

    /// The number of permits taken and not yet replenished.
    pub fn consumed(&self) -> u32 {
        self.capacity() - self.remaining()
    }

    /// The time between two permit insertions, `window / capacity`.
    pub fn refill_interval(&self) -> Duration {
        self.refill_interval
    }

    /// The policy followed by [`consume_async`](#method.consume_async).
    pub fn policy(&self) -> GatePolicy {
        self.gate.policy()
    }

    /// Returns whether the limiter was torn down.
    pub fn is_destroyed(&self) -> bool {
        matches!(*self.lifecycle.lock(), Lifecycle::Destroyed)
    }

    /// Returns whether the background decay thread is alive.
    pub fn scheduler_running(&self) -> bool {
        match &*self.lifecycle.lock() {
            Lifecycle::Active(scheduler) => scheduler.is_running(),
            Lifecycle::Destroyed => false,
        }
    }

    /// Stops replenishing permits and releases every blocked consumer.
    ///
    /// The decay thread has exited by the time this returns. Calling
    /// `destroy` a second time returns
    /// [`LimiterError::AlreadyDestroyed`] and has no other effect.
    pub fn destroy(&self) -> Result<(), LimiterError> {
        let previous = mem::replace(&mut *self.lifecycle.lock(), Lifecycle::Destroyed);
        match previous {
            Lifecycle::Active(mut scheduler) => {
                self.store.close();
                scheduler.stop();
                info!(
                    capacity = self.capacity(),
                    ticks = scheduler.ticks(),
                    "rate limiter destroyed"
                );
                Ok(())
            }
            Lifecycle::Destroyed => Err(LimiterError::AlreadyDestroyed),
        }
    }
}

impl Drop for RateLimiter {
    fn drop(&mut self) {
        if !self.is_destroyed() {
            let _ = self.destroy();
        }
    }
}

/// An object that allows incrementally constructing rate limiters.
#[derive(Debug, Clone)]
pub struct Builder {
    capacity: NonZeroU32,
    window: Duration,
    policy: GatePolicy,
}

impl Builder {
    /// Sets the window over which a fully drained limiter is
    /// replenished. Defaults to one second.
    pub fn per(&mut self, window: Duration) -> &mut Builder {
        self.window = window;
        self
    }

    /// Sets the policy for non-blocking consumers.
    pub fn policy(&mut self, policy: GatePolicy) -> &mut Builder {
        self.policy = policy;
        self
    }

    /// Validates the parameters, fills the store and starts the decay
    /// scheduler.
    pub fn build(&self) -> Result<RateLimiter, ConfigurationError> {
        if self.window.is_zero() {
            return Err(ConfigurationError::ZeroWindow);
        }
        let refill_interval = self.window / self.capacity.get();
        if refill_interval.is_zero() {
            return Err(ConfigurationError::IntervalTooShort {
                capacity: self.capacity.get(),
                window: self.window,
            });
        }

        let store = Arc::new(PermitStore::full(self.capacity));
        let scheduler = DecayScheduler::spawn(store.clone(), refill_interval)
            .map_err(ConfigurationError::SchedulerSpawn)?;
        info!(
            capacity = self.capacity.get(),
            window = ?self.window,
            policy = ?self.policy,
            "rate limiter started"
        );
        Ok(RateLimiter {
            store,
            gate: Gate::new(self.policy),
            refill_interval,
            lifecycle: Mutex::new(Lifecycle::Active(scheduler)),
        })
    }
}
