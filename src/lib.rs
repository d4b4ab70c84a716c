//! # Decaying permit-store rate limiting in Rust
//!
//! This crate implements a rate limiter that holds a bounded number of
//! *permits* and lets them decay back in at a steady pace. Callers
//! either wait for a permit or ask for one without waiting, which makes
//! the limiter suitable as a guard in front of a request handler: work
//! that gets a permit runs, work that doesn't is rejected (or waits).
//!
//! ## Interface
//!
//! A [`RateLimiter`](limiter/struct.RateLimiter.html) is constructed
//! with a *capacity* (the burst size) and a *window* (the time it takes
//! to replenish a fully drained limiter):
//!
//! ``` rust
//! use std::time::Duration;
//! use ratelimit_decay::RateLimiter;
//!
//! // Allow bursts of 50 requests, and 50 requests per second on average:
//! let lim = RateLimiter::new(50, Duration::from_secs(1)).unwrap();
//! assert!(lim.consume_async());
//! assert_eq!(1, lim.consumed());
//! ```
//!
//! The builder interface takes the capacity as a `NonZeroU32`:
//!
//! ``` rust
//! # use std::time::Duration;
//! use nonzero_ext::nonzero;
//! use ratelimit_decay::{GatePolicy, RateLimiter};
//!
//! // Bursts of 4, one permit back every 250ms:
//! let lim = RateLimiter::build_with_capacity(nonzero!(4u32))
//!     .per(Duration::from_secs(1))
//!     .policy(GatePolicy::Precise)
//!     .build()
//!     .unwrap();
//! assert_eq!(Duration::from_millis(250), lim.refill_interval());
//! ```
//!
//! Permits can be taken in two ways:
//!
//! * [`consume`](limiter/struct.RateLimiter.html#method.consume) waits
//!   until a permit is available and takes it.
//! * [`consume_async`](limiter/struct.RateLimiter.html#method.consume_async)
//!   takes a permit if one is available right now and reports whether
//!   it did. It never blocks.
//!
//! [`allowed`](limiter/struct.RateLimiter.html#method.allowed) peeks at
//! the permit count without taking anything; since other callers may
//! race ahead, its answer is advisory only.
//!
//! ## Decay
//!
//! Every limiter owns one background thread that puts a permit back
//! every `window / capacity`. When the limiter is full, that thread
//! stalls until a permit is taken instead of saving up ticks, so the
//! admitted rate never exceeds `capacity / window` beyond the initial
//! burst.
//!
//! ## Blocking and non-blocking consumers
//!
//! Blocking consumers pass through an exclusive gate one at a time. By
//! default ([`GatePolicy::Conservative`](thread_safety/enum.GatePolicy.html)),
//! a non-blocking consumer that finds the gate taken reports `false`
//! right away, even if a permit happens to be available; with
//! `GatePolicy::Precise` it goes straight to the permit count instead.
//!
//! ## Teardown
//!
//! [`destroy`](limiter/struct.RateLimiter.html#method.destroy) stops the
//! background thread and waits for it to exit. Afterwards, `consume`
//! returns [`LimiterError::Destroyed`](errors/enum.LimiterError.html)
//! (also to callers that were waiting), and the non-blocking calls
//! return `false`. Dropping a limiter tears it down as well.
//!
//! ## Swapping implementations
//!
//! All limiters implement the [`RateLimit`](strategy/trait.RateLimit.html)
//! trait. A [`Registry`](strategy/struct.Registry.html) maps strategy
//! names to constructors, so that the implementation in use can be
//! chosen at start-up.
//!
//! ## HTTP front end
//!
//! With the `server` feature (enabled by default), the
//! [`server`](server/index.html) module maps limiter decisions to HTTP
//! responses, and the `ratelimit-server` binary serves them.

pub mod decay;
pub mod errors;
pub mod example_algorithms;
pub mod limiter;
pub mod prelude;
pub mod store;
pub mod strategy;
pub mod thread_safety;

#[cfg(feature = "server")]
pub mod server;

#[doc(hidden)]
pub mod test_utilities;

pub use self::errors::*;
pub use self::limiter::{Builder, RateLimiter};
pub use self::strategy::{Constructor, RateLimit, Registry, DEFAULT_STRATEGY};
pub use self::thread_safety::GatePolicy;
