use std::num::NonZeroU32;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tracing::info;

use crate::strategy::RateLimit;
use crate::{ConfigurationError, LimiterError};

/// The most naive implementation of a rate-limiter ever: Always
/// allows every request through.
///
/// It validates its parameters like any other strategy and honors
/// teardown, which makes it a useful stand-in when rate limiting should
/// be switched off without changing the code that calls the limiter.
///
/// # Example
/// ```
/// # use std::time::Duration;
/// use ratelimit_decay::prelude::*;
/// use ratelimit_decay::example_algorithms::Unlimited;
/// let unlimited = Unlimited::new(1, Duration::from_secs(1)).unwrap();
/// for _ in 0..100 {
///     assert!(unlimited.consume_async());
/// }
/// assert_eq!(0, unlimited.consumed());
/// ```
#[derive(Debug)]
pub struct Unlimited {
    capacity: NonZeroU32,
    destroyed: AtomicBool,
}

impl Unlimited {
    pub fn new(capacity: u32, window: Duration) -> Result<Unlimited, ConfigurationError> {
        let capacity = NonZeroU32::new(capacity).ok_or(ConfigurationError::ZeroCapacity)?;
        if window.is_zero() {
            return Err(ConfigurationError::ZeroWindow);
        }
        Ok(Unlimited {
            capacity,
            destroyed: AtomicBool::new(false),
        })
    }

    fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }
}

impl RateLimit for Unlimited {
    /// Returns immediately; there is never anything to wait for.
    fn consume(&self) -> Result<(), LimiterError> {
        if self.is_destroyed() {
            return Err(LimiterError::Destroyed);
        }
        Ok(())
    }

    fn consume_async(&self) -> bool {
        !self.is_destroyed()
    }

    fn allowed(&self) -> bool {
        !self.is_destroyed()
    }

    fn capacity(&self) -> u32 {
        self.capacity.get()
    }

    /// Nothing is ever held back, so nothing counts as consumed.
    fn consumed(&self) -> u32 {
        0
    }

    fn destroy(&self) -> Result<(), LimiterError> {
        if self.destroyed.swap(true, Ordering::AcqRel) {
            return Err(LimiterError::AlreadyDestroyed);
        }
        info!("unlimited rate limiter destroyed");
        Ok(())
    }
}
