//! The bounded permit counter at the bottom of every limiter.

use std::fmt;
use std::num::NonZeroU32;

use parking_lot::{Condvar, Mutex};

use crate::decay::StopSignal;
use crate::LimiterError;

/// A counter of available permits, bounded by a capacity that is fixed
/// at construction.
///
/// Consumers take permits out with [`try_acquire`](#method.try_acquire)
/// or [`acquire`](#method.acquire); the decay scheduler puts them back
/// with [`try_insert`](#method.try_insert) or
/// [`insert_or_stall`](#method.insert_or_stall). Every one of these is
/// atomic with respect to all others, so a permit can never be handed
/// out twice or lost.
pub struct PermitStore {
    capacity: NonZeroU32,
    state: Mutex<StoreState>,
    permit_added: Condvar,
    permit_taken: Condvar,
}

#[derive(Debug)]
struct StoreState {
    available: u32,
    closed: bool,
}

impl fmt::Debug for PermitStore {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        let state = self.state.lock();
        write!(
            f,
            "PermitStore{{{available}/{capacity}{closed}}}",
            available = state.available,
            capacity = self.capacity,
            closed = if state.closed { ", closed" } else { "" }
        )
    }
}

impl PermitStore {
    /// Constructs a store holding `capacity` permits.
    pub fn full(capacity: NonZeroU32) -> PermitStore {
        PermitStore::with_available(capacity, capacity.get())
    }

    /// Constructs a store holding `available` permits, capped at
    /// `capacity`.
    pub fn with_available(capacity: NonZeroU32, available: u32) -> PermitStore {
        PermitStore {
            capacity,
            state: Mutex::new(StoreState {
                available: available.min(capacity.get()),
                closed: false,
            }),
            permit_added: Condvar::new(),
            permit_taken: Condvar::new(),
        }
    }

    /// Takes one permit if any is available. Never blocks.
    pub fn try_acquire(&self) -> bool {
        let mut state = self.state.lock();
        if state.closed || state.available == 0 {
            return false;
        }
        state.available -= 1;
        drop(state);
        self.permit_taken.notify_one();
        true
    }

    /// Blocks until a permit is available and takes it.
    ///
    /// Returns [`LimiterError::Destroyed`] if the store is closed
    /// before a permit could be taken.
    pub fn acquire(&self) -> Result<(), LimiterError> {
        let mut state = self.state.lock();
        loop {
            if state.closed {
                return Err(LimiterError::Destroyed);
            }
            if state.available > 0 {
                state.available -= 1;
                drop(state);
                self.permit_taken.notify_one();
                return Ok(());
            }
            self.permit_added.wait(&mut state);
        }
    }

    /// Puts one permit back if there is room for it. Never blocks.
    pub fn try_insert(&self) -> bool {
        let mut state = self.state.lock();
        if state.closed || state.available >= self.capacity.get() {
            return false;
        }
        state.available += 1;
        drop(state);
        self.permit_added.notify_one();
        true
    }

    /// Puts one permit back, waiting for a consumer to free a slot
    /// while the store is full.
    ///
    /// Returns `false` without inserting once `stop` is triggered or
    /// the store is closed.
    pub fn insert_or_stall(&self, stop: &StopSignal) -> bool {
        let mut state = self.state.lock();
        loop {
            if state.closed || stop.is_triggered() {
                return false;
            }
            if state.available < self.capacity.get() {
                state.available += 1;
                drop(state);
                self.permit_added.notify_one();
                return true;
            }
            self.permit_taken.wait(&mut state);
        }
    }

    /// Wakes a producer stalled in `insert_or_stall` so that it
    /// re-checks its stop signal.
    pub(crate) fn wake_producers(&self) {
        // Taking the lock orders this wakeup after the producer's check
        // of the stop signal.
        let _state = self.state.lock();
        self.permit_taken.notify_all();
    }

    /// Closes the store: every blocked and future `acquire` fails, and
    /// nothing can be inserted or taken any more.
    pub fn close(&self) {
        let mut state = self.state.lock();
        state.closed = true;
        drop(state);
        self.permit_added.notify_all();
        self.permit_taken.notify_all();
    }

    /// Returns whether [`close`](#method.close) was called.
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// The number of permits that can currently be taken.
    pub fn remaining(&self) -> u32 {
        self.state.lock().available
    }

    /// The maximum number of permits the store holds at once.
    pub fn capacity(&self) -> NonZeroU32 {
        self.capacity
    }
}
