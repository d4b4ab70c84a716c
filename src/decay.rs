//! The background task that puts permits back into a store.
//!
//! A [`DecayScheduler`] owns one OS thread. That thread inserts a
//! single permit every `interval`, on a fixed grid starting at the
//! moment the scheduler was spawned. If the store is already full on a
//! tick, the thread stalls on that tick until a consumer frees a slot;
//! grid points that pass while it is stalled are skipped rather than
//! replayed, so the store can never be refilled faster than one permit
//! per interval.

use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, trace};

use crate::store::PermitStore;

/// A one-shot cancellation flag that a waiting thread can observe
/// immediately.
#[derive(Debug, Default)]
pub struct StopSignal {
    stopped: Mutex<bool>,
    cvar: Condvar,
}

impl StopSignal {
    /// Raises the signal and wakes every thread waiting on it.
    pub fn trigger(&self) {
        *self.stopped.lock() = true;
        self.cvar.notify_all();
    }

    /// Returns whether the signal has been raised.
    pub fn is_triggered(&self) -> bool {
        *self.stopped.lock()
    }

    /// Sleeps until `deadline` or until the signal is raised, whichever
    /// comes first. Returns `true` if the signal was raised.
    pub fn wait_until(&self, deadline: Instant) -> bool {
        let mut stopped = self.stopped.lock();
        while !*stopped {
            if self.cvar.wait_until(&mut stopped, deadline).timed_out() {
                break;
            }
        }
        *stopped
    }
}

/// Handle to a running decay thread.
#[derive(Debug)]
pub struct DecayScheduler {
    interval: Duration,
    store: Arc<PermitStore>,
    stop: Arc<StopSignal>,
    ticks: Arc<AtomicU64>,
    handle: Option<JoinHandle<()>>,
}

impl DecayScheduler {
    /// Starts a thread that inserts one permit into `store` every
    /// `interval`.
    pub fn spawn(store: Arc<PermitStore>, interval: Duration) -> io::Result<DecayScheduler> {
        let stop = Arc::new(StopSignal::default());
        let ticks = Arc::new(AtomicU64::new(0));
        let handle = {
            let (store, stop, ticks) = (store.clone(), stop.clone(), ticks.clone());
            thread::Builder::new()
                .name("ratelimit-decay".into())
                .spawn(move || decay_loop(&store, &stop, &ticks, interval))?
        };
        Ok(DecayScheduler {
            interval,
            store,
            stop,
            ticks,
            handle: Some(handle),
        })
    }

    /// The time between two permit insertions.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// The number of permits this scheduler has inserted so far.
    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Acquire)
    }

    /// Returns whether the decay thread is still alive.
    pub fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .map_or(false, |handle| !handle.is_finished())
    }

    /// Stops the decay thread and waits for it to exit. No permit is
    /// inserted after this returns.
    pub fn stop(&mut self) {
        self.stop.trigger();
        self.store.wake_producers();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                debug!("decay thread panicked before it was stopped");
            }
        }
    }
}

impl Drop for DecayScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

fn decay_loop(store: &PermitStore, stop: &StopSignal, ticks: &AtomicU64, interval: Duration) {
    let mut next_tick = Instant::now() + interval;
    loop {
        if stop.wait_until(next_tick) {
            break;
        }
        if !store.try_insert() {
            debug!(?interval, "permit store is full, stalling decay");
            if !store.insert_or_stall(stop) {
                break;
            }
        }
        let total = ticks.fetch_add(1, Ordering::AcqRel) + 1;
        trace!(total, "inserted permit");
        next_tick = next_grid_point(next_tick, interval, Instant::now());
    }
    debug!(ticks = ticks.load(Ordering::Acquire), "decay scheduler stopped");
}

/// Returns the first point on the grid `last + k * interval` (k ≥ 1)
/// that lies after `now`.
fn next_grid_point(last: Instant, interval: Duration, now: Instant) -> Instant {
    let next = last + interval;
    if next > now {
        return next;
    }
    let behind = now.duration_since(next).as_nanos();
    let skipped = behind / interval.as_nanos() + 1;
    let skipped = u32::try_from(skipped).unwrap_or(u32::MAX);
    next + interval * skipped
}
