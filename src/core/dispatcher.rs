//! Mode dispatcher.
//!
//! Decides what a timer fire does. The mode is written by command handlers
//! and read only here, on the timer thread.

use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::core::stats::EngineCounters;
use crate::core::store::TrackedEntityStore;
use crate::core::timer::TimerContext;
use crate::core::work_slot::DeferredWorkSlot;

/// What the next timer fire does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum Mode {
    /// Nothing armed yet.
    None = 0,
    /// The fire itself is the effect.
    Plain = 1,
    /// Hand the blocking operation to the deferred work slot.
    BlockingOp = 2,
    /// Sweep the tracked-entity store.
    Monitor = 3,
}

impl Mode {
    /// Decode a raw mode value.
    #[must_use]
    pub const fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(Self::None),
            1 => Some(Self::Plain),
            2 => Some(Self::BlockingOp),
            3 => Some(Self::Monitor),
            _ => None,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::None => "none",
            Self::Plain => "plain",
            Self::BlockingOp => "blocking_op",
            Self::Monitor => "monitor",
        };
        f.write_str(name)
    }
}

/// Atomic cell holding the current [`Mode`].
#[derive(Debug)]
pub struct ModeCell(AtomicU8);

impl ModeCell {
    /// Cell starting at [`Mode::None`].
    #[must_use]
    pub const fn new() -> Self {
        Self(AtomicU8::new(Mode::None as u8))
    }

    /// Store a mode.
    pub fn set(&self, mode: Mode) {
        self.0.store(mode as u8, Ordering::Release);
    }

    /// Load the mode; `None` for a raw value outside [`Mode`].
    #[must_use]
    pub fn get(&self) -> Option<Mode> {
        Mode::from_raw(self.raw())
    }

    /// Raw stored value.
    #[must_use]
    pub fn raw(&self) -> u8 {
        self.0.load(Ordering::Acquire)
    }

    #[cfg(test)]
    pub(crate) fn set_raw(&self, raw: u8) {
        self.0.store(raw, Ordering::Release);
    }
}

impl Default for ModeCell {
    fn default() -> Self {
        Self::new()
    }
}

/// Routes each timer fire according to the current mode.
pub struct Dispatcher {
    mode: ModeCell,
    /// Periodic monitor re-arm in milliseconds; 0 means single sweep.
    monitor_period_ms: AtomicU64,
    work_slot: Arc<DeferredWorkSlot>,
    store: Arc<TrackedEntityStore>,
    counters: Arc<EngineCounters>,
}

impl Dispatcher {
    pub(crate) fn new(
        mode: ModeCell,
        work_slot: Arc<DeferredWorkSlot>,
        store: Arc<TrackedEntityStore>,
        counters: Arc<EngineCounters>,
    ) -> Self {
        Self {
            mode,
            monitor_period_ms: AtomicU64::new(0),
            work_slot,
            store,
            counters,
        }
    }

    /// Current mode cell.
    #[must_use]
    pub const fn mode(&self) -> &ModeCell {
        &self.mode
    }

    /// Set or clear periodic monitor re-arming.
    pub fn set_monitor_period(&self, period: Option<Duration>) {
        let ms = period.map_or(0, |p| u64::try_from(p.as_millis()).unwrap_or(u64::MAX).max(1));
        self.monitor_period_ms.store(ms, Ordering::Release);
    }

    /// Periodic monitor re-arm interval, if enabled.
    #[must_use]
    pub fn monitor_period(&self) -> Option<Duration> {
        match self.monitor_period_ms.load(Ordering::Acquire) {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }

    /// Handle one timer fire. Runs in the restricted context and never blocks.
    pub fn on_fire(&self, ctx: &TimerContext<'_>) {
        EngineCounters::bump(&self.counters.timer_fires);
        let current = thread::current();
        let raw = self.mode.raw();
        info!(
            fire_seq = ctx.fire_seq(),
            thread = current.name().unwrap_or("?"),
            mode = raw,
            "[timer_handler] Timer fired"
        );

        match Mode::from_raw(raw) {
            Some(Mode::None | Mode::Plain) => {}
            Some(Mode::BlockingOp) => {
                if !self.work_slot.schedule() {
                    debug!("Blocking operation already pending");
                }
            }
            Some(Mode::Monitor) => self.monitor(ctx),
            None => warn!(mode = raw, "Unknown timer mode ignored"),
        }
    }

    fn monitor(&self, ctx: &TimerContext<'_>) {
        let reaped = self.store.sweep_dead();
        let remaining = self.store.len();
        debug!(reaped, remaining, "Monitor sweep complete");

        // A command may have switched mode while the sweep ran.
        if self.mode.get() != Some(Mode::Monitor) {
            return;
        }
        if let Some(period) = self.monitor_period() {
            if remaining > 0 && ctx.rearm(period) {
                debug!(period_ms = u64::try_from(period.as_millis()).unwrap_or(u64::MAX), "Monitor re-armed");
            }
        }
    }
}
