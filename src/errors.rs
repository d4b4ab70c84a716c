use std::io;
use std::time::Duration;

use thiserror::Error;

/// An error that is returned when a rate limiter is constructed with
/// parameters that can not describe a working limiter.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// A limiter must hold at least one permit.
    #[error("rate limiter capacity must be at least 1")]
    ZeroCapacity,

    /// The replenishment window must be longer than zero.
    #[error("rate limiter window must be longer than zero")]
    ZeroWindow,

    /// The window is too short to hand out `capacity` permits: the
    /// interval between two refills would round down to zero.
    #[error("window {window:?} is too short to refill {capacity} permits")]
    IntervalTooShort { capacity: u32, window: Duration },

    /// The background decay thread could not be started. No part of
    /// the limiter is left running in this case.
    #[error("failed to start the decay scheduler: {0}")]
    SchedulerSpawn(#[source] io::Error),
}

/// Gives additional information about a consume or teardown request
/// that could not be honored.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum LimiterError {
    /// The limiter was torn down, either before the call or while the
    /// caller was waiting for a permit.
    #[error("rate limiter has been destroyed")]
    Destroyed,

    /// `destroy` was called on a limiter that is already destroyed.
    #[error("rate limiter was already destroyed")]
    AlreadyDestroyed,
}

/// Errors returned when selecting a limiter strategy by name.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("no rate limiter strategy named {0:?} is registered")]
    UnknownStrategy(String),

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
}
