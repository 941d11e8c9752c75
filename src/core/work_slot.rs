//! Deferred work slot.
//!
//! One work item, run on one dedicated worker thread that may block. The
//! worker owns a single-threaded tokio runtime so the body can be written as
//! async code, the same way pool workers execute their jobs.
//!
//! Scheduling coalesces: while an instance is queued or running, further
//! `schedule` calls are merged into it. The slot state machine is
//!
//! ```text
//! Idle --schedule--> Queued --worker picks up--> Running --done--> Idle
//!   \                  |                                            |
//!    `------------- cancel_and_wait (discard / wait) --> Stopped <--'
//! ```

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use async_trait::async_trait;
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use parking_lot::{Condvar, Mutex};
use tracing::{debug, error, info};

use crate::core::error::EngineError;
use crate::core::stats::EngineCounters;

/// Capability handed to deferred work bodies.
///
/// Only the slot's worker thread creates these, so holding one means the
/// code may block.
#[derive(Debug)]
pub struct WorkContext {
    run_seq: u64,
}

impl WorkContext {
    /// Sequence number of this run, starting at 1.
    #[must_use]
    pub const fn run_seq(&self) -> u64 {
        self.run_seq
    }
}

/// Body executed by the deferred work slot.
///
/// The body has no error path; anything that goes wrong must be logged by
/// the body itself.
#[async_trait]
pub trait DeferredWork: Send + Sync + 'static {
    /// Run one instance of the work.
    async fn run(&self, ctx: &WorkContext);
}

/// Opaque long-running operation standing in for slow I/O.
#[derive(Debug, Clone)]
pub struct SimulatedIo {
    latency: Duration,
}

impl SimulatedIo {
    /// Operation that sleeps for `latency` per run.
    #[must_use]
    pub const fn new(latency: Duration) -> Self {
        Self { latency }
    }

    /// Configured latency.
    #[must_use]
    pub const fn latency(&self) -> Duration {
        self.latency
    }
}

#[async_trait]
impl DeferredWork for SimulatedIo {
    async fn run(&self, ctx: &WorkContext) {
        tokio::time::sleep(self.latency).await;
        info!(
            run_seq = ctx.run_seq(),
            slept_ms = u64::try_from(self.latency.as_millis()).unwrap_or(u64::MAX),
            "Yawn! Blocking operation finished sleeping"
        );
    }
}

/// Lifecycle of the single work instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    /// Nothing queued or running.
    Idle,
    /// Queued, not yet picked up by the worker.
    Queued,
    /// Running on the worker.
    Running,
    /// Cancelled for good.
    Stopped,
}

struct SlotShared {
    state: Mutex<SlotState>,
    idle: Condvar,
    counters: Arc<EngineCounters>,
    /// While set, the worker does not pick up queued instances.
    #[cfg(test)]
    pickup_held: Mutex<bool>,
    #[cfg(test)]
    pickup_cond: Condvar,
}

impl SlotShared {
    fn wait_not_busy(&self) -> parking_lot::MutexGuard<'_, SlotState> {
        let mut state = self.state.lock();
        self.idle
            .wait_while(&mut state, |s| matches!(s, SlotState::Queued | SlotState::Running));
        state
    }

    #[cfg(test)]
    fn wait_pickup(&self) {
        let mut held = self.pickup_held.lock();
        self.pickup_cond.wait_while(&mut held, |h| *h);
    }
}

/// Single coalescing work item executed on a dedicated worker thread.
pub struct DeferredWorkSlot {
    shared: Arc<SlotShared>,
    /// Wake-up sender. `None` once stopped so the worker exits.
    ticket_tx: Mutex<Option<Sender<()>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl DeferredWorkSlot {
    /// Start the worker thread for `work`.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::ContextUnavailable` if the worker runtime or
    /// thread cannot be created.
    pub(crate) fn new(
        name: &str,
        stack_size: usize,
        work: Arc<dyn DeferredWork>,
        counters: Arc<EngineCounters>,
    ) -> Result<Self, EngineError> {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .map_err(|e| EngineError::ContextUnavailable(format!("worker runtime: {e}")))?;

        let shared = Arc::new(SlotShared {
            state: Mutex::new(SlotState::Idle),
            idle: Condvar::new(),
            counters,
            #[cfg(test)]
            pickup_held: Mutex::new(false),
            #[cfg(test)]
            pickup_cond: Condvar::new(),
        });
        // Capacity one: the channel only carries wake-ups, the state carries truth.
        let (ticket_tx, ticket_rx) = bounded::<()>(1);

        let worker_shared = Arc::clone(&shared);
        let worker = thread::Builder::new()
            .name(name.to_owned())
            .stack_size(stack_size)
            .spawn(move || worker_loop(&rt, &ticket_rx, &worker_shared, work.as_ref()))
            .map_err(|e| EngineError::ContextUnavailable(format!("worker thread: {e}")))?;

        debug!(thread = name, "Deferred work thread started");
        Ok(Self {
            shared,
            ticket_tx: Mutex::new(Some(ticket_tx)),
            worker: Mutex::new(Some(worker)),
        })
    }

    /// Queue the work unless an instance is already queued or running.
    ///
    /// Never blocks, so it is safe from the restricted timer context.
    /// Returns `true` if a new instance was queued.
    pub fn schedule(&self) -> bool {
        let mut state = self.shared.state.lock();
        match *state {
            SlotState::Idle => {}
            SlotState::Queued | SlotState::Running => {
                EngineCounters::bump(&self.shared.counters.work_coalesced);
                debug!(state = ?*state, "Work schedule coalesced");
                return false;
            }
            SlotState::Stopped => return false,
        }

        let tx_guard = self.ticket_tx.lock();
        let Some(tx) = tx_guard.as_ref() else {
            return false;
        };
        match tx.try_send(()) {
            // A full channel still holds a ticket the worker has not consumed.
            Ok(()) | Err(TrySendError::Full(())) => {}
            Err(TrySendError::Disconnected(())) => return false,
        }
        *state = SlotState::Queued;
        EngineCounters::bump(&self.shared.counters.work_scheduled);
        debug!("Work scheduled");
        true
    }

    /// Block until no instance is queued or running.
    pub fn flush(&self) {
        drop(self.shared.wait_not_busy());
    }

    /// Discard a queued instance, wait for a running one, and stop the worker.
    ///
    /// Afterwards no instance is pending and [`schedule`](Self::schedule)
    /// always returns `false`. Returns `true` if a queued instance was
    /// discarded.
    pub fn cancel_and_wait(&self) -> bool {
        let discarded = {
            let mut state = self.shared.state.lock();
            let discarded = *state == SlotState::Queued;
            if discarded {
                *state = SlotState::Idle;
                EngineCounters::bump(&self.shared.counters.work_discarded);
                self.shared.idle.notify_all();
            }
            drop(state);

            let mut state = self.shared.wait_not_busy();
            *state = SlotState::Stopped;
            discarded
        };

        self.ticket_tx.lock().take();
        if let Some(worker) = self.worker.lock().take() {
            if worker.join().is_err() {
                error!("Deferred work thread panicked");
            }
            debug!("Deferred work thread joined");
        }
        discarded
    }

    /// Current slot state.
    #[must_use]
    pub fn state(&self) -> SlotState {
        *self.shared.state.lock()
    }

    #[cfg(test)]
    pub(crate) fn hold_pickup(&self, held: bool) {
        *self.shared.pickup_held.lock() = held;
        self.shared.pickup_cond.notify_all();
    }
}

impl Drop for DeferredWorkSlot {
    fn drop(&mut self) {
        self.cancel_and_wait();
    }
}

fn worker_loop(
    rt: &tokio::runtime::Runtime,
    ticket_rx: &Receiver<()>,
    shared: &SlotShared,
    work: &dyn DeferredWork,
) {
    let mut run_seq = 0_u64;
    // recv() fails once the sender is dropped, which is the stop signal.
    while ticket_rx.recv().is_ok() {
        #[cfg(test)]
        shared.wait_pickup();
        {
            let mut state = shared.state.lock();
            if *state != SlotState::Queued {
                // Discarded by cancel_and_wait.
                continue;
            }
            *state = SlotState::Running;
        }

        run_seq += 1;
        let ctx = WorkContext { run_seq };
        debug!(run_seq, "Deferred work running");
        let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| {
            rt.block_on(work.run(&ctx));
        }));
        if outcome.is_err() {
            error!(run_seq, "Deferred work panicked");
        }

        let mut state = shared.state.lock();
        if *state == SlotState::Running {
            *state = SlotState::Idle;
        }
        EngineCounters::bump(&shared.counters.work_completed);
        drop(state);
        shared.idle.notify_all();
    }
    debug!("Deferred work thread exiting");
}
