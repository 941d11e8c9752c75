//! Tracked-entity store.
//!
//! A mutex-guarded ordered collection of processes under watch. The command
//! path inserts into it and the timer's monitoring sweep removes from it, so
//! every access goes through the one mutex held here. Lock hold times stay
//! short: a sweep probes liveness on a snapshot taken outside the lock, and
//! references removed by a sweep or drain are released only after the lock
//! is dropped.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::core::error::EngineError;
use crate::core::process::{Pid, ProcessRef, ProcessTable};
use crate::core::stats::EngineCounters;

/// One process under watch.
#[derive(Debug)]
pub struct TrackedEntity {
    pid: Pid,
    process: ProcessRef,
}

impl TrackedEntity {
    /// Build an entity from a freshly resolved reference.
    #[must_use]
    pub fn new(process: ProcessRef) -> Self {
        Self {
            pid: process.pid(),
            process,
        }
    }

    /// Identifier of the watched process.
    #[must_use]
    pub const fn pid(&self) -> Pid {
        self.pid
    }

    /// Whether the watched process has terminated.
    #[must_use]
    pub fn has_exited(&self) -> bool {
        self.process.has_exited()
    }
}

/// Set of tracked entities behind a single mutex.
pub struct TrackedEntityStore {
    table: Arc<dyn ProcessTable>,
    entities: Mutex<Vec<Arc<TrackedEntity>>>,
    counters: Arc<EngineCounters>,
}

impl TrackedEntityStore {
    pub(crate) fn new(table: Arc<dyn ProcessTable>, counters: Arc<EngineCounters>) -> Self {
        Self {
            table,
            entities: Mutex::new(Vec::new()),
            counters,
        }
    }

    /// Resolve `pid` and start tracking it.
    ///
    /// # Errors
    ///
    /// - `EngineError::NoSuchProcess` if `pid` does not name a live process
    /// - `EngineError::OutOfMemory` if the entity record cannot be allocated
    ///
    /// The store is unchanged on error.
    pub fn register(&self, pid: Pid) -> Result<(), EngineError> {
        let process = self
            .table
            .resolve(pid)
            .ok_or(EngineError::NoSuchProcess(pid))?;
        let entity = Arc::new(TrackedEntity::new(process));

        let mut entities = self.entities.lock();
        if entities.try_reserve(1).is_err() {
            drop(entities);
            // `entity` drops here, releasing the reference just taken.
            return Err(EngineError::OutOfMemory);
        }
        entities.push(entity);
        let tracked = entities.len();
        drop(entities);

        EngineCounters::bump(&self.counters.entities_registered);
        info!(pid = %pid, tracked, "Process registered for monitoring");
        Ok(())
    }

    /// Remove and release every entity whose process has exited.
    ///
    /// Liveness is probed on a snapshot with the lock released; the lock is
    /// then retaken only to unlink the dead entries. Live entities keep their
    /// position. Returns the number removed.
    pub fn sweep_dead(&self) -> usize {
        let snapshot: Vec<Arc<TrackedEntity>> = self.entities.lock().clone();
        let dead: Vec<Arc<TrackedEntity>> = snapshot
            .into_iter()
            .filter(|entity| entity.has_exited())
            .collect();
        if dead.is_empty() {
            return 0;
        }

        let reaped = {
            let mut entities = self.entities.lock();
            let (gone, live): (Vec<_>, Vec<_>) = entities
                .drain(..)
                .partition(|entity| dead.iter().any(|d| Arc::ptr_eq(d, entity)));
            *entities = live;
            gone
        };
        drop(dead);

        for entity in &reaped {
            info!(
                pid = %entity.pid,
                name = entity.process.name().as_deref().unwrap_or("?"),
                "Monitored process has exited"
            );
        }
        let count = reaped.len();
        drop(reaped);

        if count > 0 {
            EngineCounters::add(&self.counters.entities_reaped, count);
        }
        count
    }

    /// Remove and release every entity regardless of liveness.
    pub fn drain_all(&self) -> usize {
        let drained = std::mem::take(&mut *self.entities.lock());
        let count = drained.len();
        drop(drained);

        EngineCounters::add(&self.counters.entities_drained, count);
        debug!(count, "Tracked entities drained");
        count
    }

    /// Number of tracked entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.lock().len()
    }

    /// Whether nothing is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.lock().is_empty()
    }

    /// Whether `pid` is tracked (at least once).
    #[must_use]
    pub fn contains(&self, pid: Pid) -> bool {
        self.entities.lock().iter().any(|e| e.pid == pid)
    }

    /// Tracked pids in insertion order.
    #[must_use]
    pub fn pids(&self) -> Vec<Pid> {
        self.entities.lock().iter().map(|entity| entity.pid).collect()
    }
}
