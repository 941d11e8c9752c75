//! Single-shot, re-armable countdown timer.
//!
//! Each timer owns one dedicated thread that sleeps on a `Condvar` until the
//! armed deadline and then runs the callback. That thread is the restricted
//! context: callbacks must not block, and they receive a [`TimerContext`]
//! rather than anything that could wait on background work.
//!
//! # Design
//!
//! - **No polling**: the thread waits on a `Condvar` with the deadline as timeout
//! - **Non-blocking cancel**: [`CountdownTimer::cancel`] never waits for a running fire
//! - **Hard barrier**: [`CountdownTimer::cancel_sync`] waits out a running fire and joins

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, MutexGuard};
use tracing::{debug, error};

use crate::core::error::EngineError;

/// Longest delay honoured; longer requests are clamped.
pub const MAX_DELAY: Duration = Duration::from_secs(10 * 365 * 24 * 60 * 60);

/// Timer state guarded by the timer mutex.
#[derive(Debug, Default)]
struct TimerState {
    /// Pending expiry, if armed.
    deadline: Option<Instant>,
    /// A callback is running on the timer thread.
    firing: bool,
    /// No further fires may happen.
    shutdown: bool,
    /// Bumped by every external arm or cancel.
    generation: u64,
}

#[derive(Debug, Default)]
struct TimerShared {
    state: Mutex<TimerState>,
    wake: Condvar,
}

impl TimerShared {
    /// Returns `None` once shut down, otherwise whether a fire was replaced.
    fn arm(&self, delay: Duration) -> Option<bool> {
        let mut state = self.state.lock();
        if state.shutdown {
            return None;
        }
        let was_pending = state.deadline.is_some();
        state.deadline = Some(Instant::now() + delay.min(MAX_DELAY));
        state.generation = state.generation.wrapping_add(1);
        drop(state);
        self.wake.notify_all();
        Some(was_pending)
    }

    /// Arm on behalf of a running callback, unless an external arm or
    /// cancel has happened since the fire started.
    fn rearm_from(&self, generation: u64, delay: Duration) -> bool {
        let mut state = self.state.lock();
        if state.shutdown || state.generation != generation {
            return false;
        }
        state.deadline = Some(Instant::now() + delay.min(MAX_DELAY));
        drop(state);
        self.wake.notify_all();
        true
    }
}

/// Capability handed to timer callbacks.
///
/// Holding one means the code runs in the restricted context.
pub struct TimerContext<'a> {
    shared: &'a TimerShared,
    fired_at: Instant,
    fire_seq: u64,
    generation: u64,
}

impl TimerContext<'_> {
    /// Re-arm the timer that is currently firing.
    ///
    /// Does nothing and returns `false` if the timer is being torn down, or
    /// if it was armed or cancelled from outside since this fire started.
    pub fn rearm(&self, delay: Duration) -> bool {
        self.shared.rearm_from(self.generation, delay)
    }

    /// When this fire started.
    #[must_use]
    pub const fn fired_at(&self) -> Instant {
        self.fired_at
    }

    /// Sequence number of this fire, starting at 1.
    #[must_use]
    pub const fn fire_seq(&self) -> u64 {
        self.fire_seq
    }
}

/// Callback run on every fire.
pub type TimerCallback = Box<dyn Fn(&TimerContext<'_>) + Send + Sync + 'static>;

/// Single-shot countdown timer with its own callback thread.
pub struct CountdownTimer {
    shared: Arc<TimerShared>,
    thread: Mutex<Option<JoinHandle<()>>>,
    thread_id: ThreadId,
}

impl CountdownTimer {
    /// Start the timer thread; the timer begins disarmed.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::ContextUnavailable` if the thread cannot be spawned.
    pub fn new(name: &str, stack_size: usize, callback: TimerCallback) -> Result<Self, EngineError> {
        let shared = Arc::new(TimerShared::default());
        let thread_shared = Arc::clone(&shared);
        let handle = thread::Builder::new()
            .name(name.to_owned())
            .stack_size(stack_size)
            .spawn(move || timer_loop(&thread_shared, &callback))
            .map_err(|e| EngineError::ContextUnavailable(format!("timer thread: {e}")))?;

        debug!(thread = name, "Timer thread started");
        Ok(Self {
            shared,
            thread_id: handle.thread().id(),
            thread: Mutex::new(Some(handle)),
        })
    }

    /// Schedule a single fire at now + `delay`, replacing any pending fire.
    ///
    /// Returns `true` if a pending fire was replaced. Ignored after
    /// [`cancel_sync`](Self::cancel_sync).
    pub fn arm(&self, delay: Duration) -> bool {
        self.shared.arm(delay).unwrap_or(false)
    }

    /// Prevent the pending fire, if any. Does not wait for a running fire.
    ///
    /// Returns `true` if a fire was pending.
    pub fn cancel(&self) -> bool {
        let mut state = self.shared.state.lock();
        let was_pending = state.deadline.take().is_some();
        state.generation = state.generation.wrapping_add(1);
        drop(state);
        self.shared.wake.notify_all();
        was_pending
    }

    /// Cancel, wait for any in-flight fire, and stop the timer thread.
    ///
    /// No fire happens after this returns. Returns `true` if a fire was
    /// pending. Calling it from inside a callback stops future fires but
    /// cannot wait for the current one.
    pub fn cancel_sync(&self) -> bool {
        let was_pending = {
            let mut state = self.shared.state.lock();
            state.shutdown = true;
            state.deadline.take().is_some()
        };
        self.shared.wake.notify_all();

        if thread::current().id() == self.thread_id {
            return was_pending;
        }
        if let Some(handle) = self.thread.lock().take() {
            if handle.join().is_err() {
                error!("Timer thread panicked");
            }
            debug!("Timer thread joined");
        }
        was_pending
    }

    /// Whether a fire is pending.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.shared.state.lock().deadline.is_some()
    }

    /// Whether the callback is running right now.
    #[must_use]
    pub fn is_firing(&self) -> bool {
        self.shared.state.lock().firing
    }

    /// Whether the timer has been stopped for good.
    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.shared.state.lock().shutdown
    }
}

impl Drop for CountdownTimer {
    fn drop(&mut self) {
        self.cancel_sync();
    }
}

fn timer_loop(shared: &TimerShared, callback: &TimerCallback) {
    let mut fire_seq = 0_u64;
    let mut state = shared.state.lock();
    loop {
        if state.shutdown {
            break;
        }
        let Some(deadline) = state.deadline else {
            shared.wake.wait(&mut state);
            continue;
        };
        if Instant::now() < deadline {
            shared.wake.wait_until(&mut state, deadline);
            continue;
        }

        state.deadline = None;
        state.firing = true;
        fire_seq += 1;
        let generation = state.generation;
        run_callback(&mut state, shared, callback, fire_seq, generation);
        state.firing = false;
        shared.wake.notify_all();
    }
    debug!("Timer thread exiting");
}

fn run_callback(
    state: &mut MutexGuard<'_, TimerState>,
    shared: &TimerShared,
    callback: &TimerCallback,
    fire_seq: u64,
    generation: u64,
) {
    let ctx = TimerContext {
        shared,
        fired_at: Instant::now(),
        fire_seq,
        generation,
    };
    MutexGuard::unlocked(state, || {
        if panic::catch_unwind(AssertUnwindSafe(|| callback(&ctx))).is_err() {
            error!(fire_seq, "Timer callback panicked");
        }
    });
    debug!(fire_seq, "Timer fire complete");
}
