//! In-memory process table.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::core::process::{Pid, ProcessObject, ProcessRef, ProcessTable};

/// Simulated process with a settable exit flag.
#[derive(Debug)]
pub struct SimulatedProcess {
    pid: Pid,
    name: String,
    exited: AtomicBool,
}

impl ProcessObject for SimulatedProcess {
    fn pid(&self) -> Pid {
        self.pid
    }

    fn has_exited(&self) -> bool {
        self.exited.load(Ordering::Acquire)
    }

    fn name(&self) -> Option<String> {
        Some(self.name.clone())
    }
}

/// Process table backed by simulated processes, for development/testing.
///
/// The table keeps one reference to every process it ever spawned, so
/// [`outstanding_refs`](Self::outstanding_refs) reports exactly the
/// references handed out and not yet released. Exited processes stay
/// in the table but no longer resolve.
pub struct InMemoryProcessTable {
    processes: RwLock<HashMap<Pid, Arc<SimulatedProcess>>>,
    next_pid: AtomicI32,
}

impl InMemoryProcessTable {
    /// Create an empty table; spawned pids start at 1000.
    #[must_use]
    pub fn new() -> Self {
        Self {
            processes: RwLock::new(HashMap::new()),
            next_pid: AtomicI32::new(1000),
        }
    }

    /// Start a simulated process and return its pid.
    pub fn spawn(&self, name: &str) -> Pid {
        let pid = Pid::from_raw(self.next_pid.fetch_add(1, Ordering::Relaxed));
        let process = Arc::new(SimulatedProcess {
            pid,
            name: name.to_owned(),
            exited: AtomicBool::new(false),
        });
        self.processes.write().insert(pid, process);
        pid
    }

    /// Mark a process as exited. Returns `false` for unknown pids.
    pub fn exit(&self, pid: Pid) -> bool {
        self.processes.read().get(&pid).is_some_and(|p| {
            p.exited.store(true, Ordering::Release);
            true
        })
    }

    /// References handed out for `pid` that are still held.
    #[must_use]
    pub fn outstanding_refs(&self, pid: Pid) -> usize {
        self.processes
            .read()
            .get(&pid)
            .map_or(0, |p| Arc::strong_count(p) - 1)
    }

    /// References handed out across all processes that are still held.
    #[must_use]
    pub fn total_outstanding_refs(&self) -> usize {
        self.processes
            .read()
            .values()
            .map(|p| Arc::strong_count(p) - 1)
            .sum()
    }
}

impl Default for InMemoryProcessTable {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessTable for InMemoryProcessTable {
    fn resolve(&self, pid: Pid) -> Option<ProcessRef> {
        let processes = self.processes.read();
        let process = processes.get(&pid).filter(|p| !p.has_exited())?;
        let object: Arc<dyn ProcessObject> = Arc::clone(process) as Arc<dyn ProcessObject>;
        Some(ProcessRef::from_arc(object))
    }
}
