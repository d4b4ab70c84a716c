//! Arbitration between blocking and non-blocking consumers.

use parking_lot::Mutex;
use tracing::trace;

use crate::store::PermitStore;
use crate::LimiterError;

/// Decides how non-blocking consumers treat a blocking consumer that
/// is currently waiting for a permit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GatePolicy {
    /// A non-blocking consume gives up as soon as a blocking consume is
    /// in flight, even if permits are available. Such a caller may see
    /// `false` where a permit could have been handed out, but it never
    /// competes with a waiter for the next permit.
    #[default]
    Conservative,

    /// A non-blocking consume goes straight to the permit store. It
    /// reports `false` only if no permit is available at that instant,
    /// and may take a permit a blocked consumer was waiting for.
    Precise,
}

/// The exclusive lock that all blocking consumers pass through.
///
/// Blocking consumers are serialized: only one of them waits on the
/// permit store at any time, while the others queue on the gate.
#[derive(Debug, Default)]
pub struct Gate {
    lock: Mutex<()>,
    policy: GatePolicy,
}

impl Gate {
    /// Constructs an open gate with the given policy.
    pub fn new(policy: GatePolicy) -> Gate {
        Gate {
            lock: Mutex::new(()),
            policy,
        }
    }

    /// The policy non-blocking consumers follow.
    pub fn policy(&self) -> GatePolicy {
        self.policy
    }

    /// Takes the gate, waits for a permit in `store`, and takes it.
    pub fn consume(&self, store: &PermitStore) -> Result<(), LimiterError> {
        let _gate = self.lock.lock();
        store.acquire()
    }

    /// Takes a permit from `store` if that is possible without waiting.
    pub fn consume_async(&self, store: &PermitStore) -> bool {
        match self.policy {
            GatePolicy::Precise => store.try_acquire(),
            GatePolicy::Conservative => match self.lock.try_lock() {
                Some(_gate) => store.try_acquire(),
                None => {
                    trace!("blocking consumer in flight, refusing non-blocking consume");
                    false
                }
            },
        }
    }
}
