use std::time::Duration;

use crate::limiter::RateLimiter;
use crate::thread_safety::GatePolicy;

#[derive(Debug, Clone, Copy)]
pub enum Variant {
    Conservative,
    Precise,
}

impl Variant {
    pub const ALL: &'static [Variant; 2] = &[Variant::Conservative, Variant::Precise];

    pub fn policy(self) -> GatePolicy {
        match self {
            Variant::Conservative => GatePolicy::Conservative,
            Variant::Precise => GatePolicy::Precise,
        }
    }

    /// A limiter with this variant's gate policy.
    pub fn limiter(self, capacity: u32, window: Duration) -> RateLimiter {
        RateLimiter::with_policy(capacity, window, self.policy())
            .expect("test limiter parameters are valid")
    }

    /// A limiter that is effectively never refilled during a test or
    /// benchmark run.
    pub fn static_limiter(self, capacity: u32) -> RateLimiter {
        self.limiter(capacity, Duration::from_secs(3600) * capacity)
    }
}
