//! Engine lifecycle and command handling.
//!
//! [`Engine::init`] builds the parts in dependency order so the timer, which
//! is the only source of activity, exists last. [`Engine::teardown`] takes
//! them down in the reverse order: no new commands, no timer fire, no
//! blocking work in flight, and only then are the tracked processes
//! released.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::EngineConfig;
use crate::core::control::Command;
use crate::core::dispatcher::{Dispatcher, Mode, ModeCell};
use crate::core::error::EngineError;
use crate::core::process::{Pid, ProcessTable};
use crate::core::stats::{EngineCounters, EngineStats};
use crate::core::store::TrackedEntityStore;
use crate::core::timer::CountdownTimer;
use crate::core::work_slot::{DeferredWork, DeferredWorkSlot, SlotState};
use crate::infra::device::{DeviceNumber, DeviceRegistration, DeviceRegistry};

/// What teardown found and released.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeardownReport {
    /// A timer fire was still pending and got cancelled.
    pub timer_was_pending: bool,
    /// A queued blocking operation was discarded before it started.
    pub work_discarded: bool,
    /// Tracked entities released.
    pub entities_drained: usize,
    /// Final counters.
    pub stats: EngineStats,
}

/// Deferred-execution engine.
pub struct Engine {
    config: EngineConfig,
    counters: Arc<EngineCounters>,
    work_slot: Arc<DeferredWorkSlot>,
    store: Arc<TrackedEntityStore>,
    dispatcher: Arc<Dispatcher>,
    registration: Mutex<Option<DeviceRegistration>>,
    timer: CountdownTimer,
    opened: AtomicBool,
    torn_down: AtomicBool,
}

impl Engine {
    /// Construct the engine and register its control surface.
    ///
    /// Steps run in order: mode, work slot, store, device registration,
    /// timer. A failing step unwinds the completed ones in reverse.
    ///
    /// # Errors
    ///
    /// - `EngineError::InvalidConfig` if `config` fails validation
    /// - `EngineError::RegionInUse` / `EngineError::OutOfMemory` from device registration
    /// - `EngineError::ContextUnavailable` if a thread or runtime cannot start
    pub fn init(
        config: EngineConfig,
        table: Arc<dyn ProcessTable>,
        registry: &Arc<DeviceRegistry>,
        work: Arc<dyn DeferredWork>,
    ) -> Result<Self, EngineError> {
        config.validate().map_err(EngineError::InvalidConfig)?;
        info!(device = %config.device.number(), name = %config.device.name, "[deferred_init] Init module");

        let counters = Arc::new(EngineCounters::default());
        let mode = ModeCell::new();

        let work_slot = Arc::new(DeferredWorkSlot::new(
            &format!("{}-work", config.device.name),
            config.thread_stack_size,
            work,
            Arc::clone(&counters),
        )?);

        let store = Arc::new(TrackedEntityStore::new(table, Arc::clone(&counters)));

        let registration = match registry.register(config.device.number(), &config.device.name) {
            Ok(registration) => registration,
            Err(e) => {
                warn!(error = %e, "Control surface registration failed");
                unwind(&store, &work_slot);
                return Err(e);
            }
        };

        let dispatcher = Arc::new(Dispatcher::new(
            mode,
            Arc::clone(&work_slot),
            Arc::clone(&store),
            Arc::clone(&counters),
        ));
        let fire_dispatcher = Arc::clone(&dispatcher);
        let timer = match CountdownTimer::new(
            &format!("{}-timer", config.device.name),
            config.thread_stack_size,
            Box::new(move |ctx| fire_dispatcher.on_fire(ctx)),
        ) {
            Ok(timer) => timer,
            Err(e) => {
                warn!(error = %e, "Timer construction failed");
                registration.unregister();
                unwind(&store, &work_slot);
                return Err(e);
            }
        };

        Ok(Self {
            config,
            counters,
            work_slot,
            store,
            dispatcher,
            registration: Mutex::new(Some(registration)),
            timer,
            opened: AtomicBool::new(false),
            torn_down: AtomicBool::new(false),
        })
    }

    /// Open a control handle.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::AlreadyBusy` if exclusive open is configured and
    /// another handle is live.
    pub fn open(&self) -> Result<ControlHandle<'_>, EngineError> {
        if self.config.exclusive_open
            && self
                .opened
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
        {
            warn!("[deferred_open] Device busy");
            return Err(EngineError::AlreadyBusy);
        }
        info!("[deferred_open] Device opened");
        Ok(ControlHandle { engine: self })
    }

    fn execute(&self, command: Command) -> Result<(), EngineError> {
        info!(command = %command, "[deferred_ioctl] Command");
        match command {
            Command::TimerSet { delay_secs } => {
                self.dispatcher.mode().set(Mode::Plain);
                self.arm(delay_secs);
            }
            Command::TimerCancel => {
                if self.timer.cancel() {
                    EngineCounters::bump(&self.counters.timer_cancels);
                }
            }
            Command::TimerAlloc { delay_secs } => {
                self.dispatcher.mode().set(Mode::BlockingOp);
                self.arm(delay_secs);
            }
            Command::TimerMon {
                pid,
                delay_secs,
                period_secs,
            } => {
                if let Err(e) = self.store.register(pid) {
                    warn!(pid = %pid, error = %e, "Monitor registration rejected");
                    return Err(e);
                }
                self.dispatcher
                    .set_monitor_period(period_secs.map(Duration::from_secs));
                self.dispatcher.mode().set(Mode::Monitor);
                self.arm(delay_secs);
            }
        }
        Ok(())
    }

    fn arm(&self, delay_secs: u64) {
        EngineCounters::bump(&self.counters.timer_arms);
        self.timer.arm(Duration::from_secs(delay_secs));
    }

    /// Current mode; `None` only if the stored value is corrupt.
    #[must_use]
    pub fn mode(&self) -> Option<Mode> {
        self.dispatcher.mode().get()
    }

    /// Whether a timer fire is pending.
    #[must_use]
    pub fn timer_pending(&self) -> bool {
        self.timer.is_pending()
    }

    /// State of the deferred work slot.
    #[must_use]
    pub fn work_state(&self) -> SlotState {
        self.work_slot.state()
    }

    /// Block until no blocking operation is queued or running.
    pub fn flush_work(&self) {
        self.work_slot.flush();
    }

    /// Number of tracked processes.
    #[must_use]
    pub fn tracked(&self) -> usize {
        self.store.len()
    }

    /// Tracked pids in registration order.
    #[must_use]
    pub fn tracked_pids(&self) -> Vec<Pid> {
        self.store.pids()
    }

    /// Snapshot of engine counters.
    #[must_use]
    pub fn stats(&self) -> EngineStats {
        self.counters.snapshot()
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Registered control-surface device number.
    #[must_use]
    pub const fn device_number(&self) -> DeviceNumber {
        self.config.device.number()
    }

    /// Tear the engine down.
    ///
    /// Order: unregister the control surface, synchronously cancel the
    /// timer, cancel-and-wait the work slot, drain the store. Never fails.
    #[must_use = "the report says what was still outstanding"]
    pub fn teardown(self) -> TeardownReport {
        self.shutdown()
            .unwrap_or_else(|| TeardownReport {
                timer_was_pending: false,
                work_discarded: false,
                entities_drained: 0,
                stats: self.stats(),
            })
    }

    fn shutdown(&self) -> Option<TeardownReport> {
        if self.torn_down.swap(true, Ordering::AcqRel) {
            return None;
        }
        info!("[deferred_exit] Exit module");

        if let Some(registration) = self.registration.lock().take() {
            registration.unregister();
        }
        let timer_was_pending = self.timer.cancel_sync();
        let work_discarded = self.work_slot.cancel_and_wait();
        let entities_drained = self.store.drain_all();

        let stats = self.stats();
        info!(
            timer_was_pending,
            work_discarded,
            entities_drained,
            fires = stats.timer_fires,
            "Engine torn down"
        );
        Some(TeardownReport {
            timer_was_pending,
            work_discarded,
            entities_drained,
            stats,
        })
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        let _ = self.shutdown();
    }
}

fn unwind(store: &TrackedEntityStore, work_slot: &DeferredWorkSlot) {
    store.drain_all();
    work_slot.cancel_and_wait();
}

/// Per-open handle on the engine's control surface.
///
/// Borrowing the engine ties every handle's lifetime to it, so teardown
/// cannot start while a handle could still issue commands.
pub struct ControlHandle<'a> {
    engine: &'a Engine,
}

impl ControlHandle<'_> {
    /// Run a decoded command.
    ///
    /// # Errors
    ///
    /// `TIMER_MON` fails with `EngineError::NoSuchProcess` or
    /// `EngineError::OutOfMemory` and leaves the engine unchanged.
    pub fn execute(&self, command: Command) -> Result<(), EngineError> {
        self.engine.execute(command)
    }

    /// Decode and run a raw request.
    ///
    /// # Errors
    ///
    /// `EngineError::InvalidCommand` for unknown codes, otherwise as
    /// [`execute`](Self::execute).
    pub fn ioctl(&self, code: u32, arg: u64) -> Result<(), EngineError> {
        let command = Command::decode(code, arg, self.engine.config.monitor_delay_secs)
            .inspect_err(|e| warn!(code, error = %e, "[deferred_ioctl] Rejected"))?;
        self.execute(command)
    }

    /// Engine behind this handle.
    #[must_use]
    pub const fn engine(&self) -> &Engine {
        self.engine
    }
}

impl Drop for ControlHandle<'_> {
    fn drop(&mut self) {
        if self.engine.config.exclusive_open {
            self.engine.opened.store(false, Ordering::Release);
        }
        info!("[deferred_release] Device released");
    }
}
