//! A module exporting useful traits defined in this crate.

pub use crate::strategy::RateLimit;
