//! Engine counters and snapshots.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Statistics about timer, work and monitoring activity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineStats {
    /// Times the timer was armed.
    pub timer_arms: u64,
    /// Cancels that actually removed a pending fire.
    pub timer_cancels: u64,
    /// Timer fires dispatched.
    pub timer_fires: u64,
    /// Work instances queued.
    pub work_scheduled: u64,
    /// Schedule requests merged into an instance already queued or running.
    pub work_coalesced: u64,
    /// Work instances that ran to completion.
    pub work_completed: u64,
    /// Queued work instances discarded at teardown.
    pub work_discarded: u64,
    /// Entities inserted into the store.
    pub entities_registered: u64,
    /// Entities removed by a monitoring sweep.
    pub entities_reaped: u64,
    /// Entities released by teardown.
    pub entities_drained: u64,
}

impl EngineStats {
    /// Entities still tracked according to the counters.
    #[must_use]
    pub const fn entities_outstanding(&self) -> u64 {
        self.entities_registered
            .saturating_sub(self.entities_reaped)
            .saturating_sub(self.entities_drained)
    }
}

/// Internal counters for engine statistics (thread-safe).
#[derive(Debug, Default)]
pub(crate) struct EngineCounters {
    pub timer_arms: AtomicU64,
    pub timer_cancels: AtomicU64,
    pub timer_fires: AtomicU64,
    pub work_scheduled: AtomicU64,
    pub work_coalesced: AtomicU64,
    pub work_completed: AtomicU64,
    pub work_discarded: AtomicU64,
    pub entities_registered: AtomicU64,
    pub entities_reaped: AtomicU64,
    pub entities_drained: AtomicU64,
}

impl EngineCounters {
    /// Get a snapshot of current statistics.
    pub fn snapshot(&self) -> EngineStats {
        EngineStats {
            timer_arms: self.timer_arms.load(Ordering::Relaxed),
            timer_cancels: self.timer_cancels.load(Ordering::Relaxed),
            timer_fires: self.timer_fires.load(Ordering::Relaxed),
            work_scheduled: self.work_scheduled.load(Ordering::Relaxed),
            work_coalesced: self.work_coalesced.load(Ordering::Relaxed),
            work_completed: self.work_completed.load(Ordering::Relaxed),
            work_discarded: self.work_discarded.load(Ordering::Relaxed),
            entities_registered: self.entities_registered.load(Ordering::Relaxed),
            entities_reaped: self.entities_reaped.load(Ordering::Relaxed),
            entities_drained: self.entities_drained.load(Ordering::Relaxed),
        }
    }

    pub fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add(counter: &AtomicU64, n: usize) {
        counter.fetch_add(n as u64, Ordering::Relaxed);
    }
}
