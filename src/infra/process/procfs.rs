//! Host process table backed by `/proc`.
//!
//! A resolved process is pinned by its start time (field 22 of
//! `/proc/<pid>/stat`). It counts as exited once its stat entry disappears,
//! it turns zombie or dead, or the pid has been reused by a process with a
//! different start time.

use std::fs;
use std::path::PathBuf;

use nix::errno::Errno;
use nix::sys::signal::kill;
use tracing::debug;

use crate::core::process::{Pid, ProcessObject, ProcessRef, ProcessTable};

/// Scheduler state letter from `/proc/<pid>/stat`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcState {
    /// Runnable.
    Running,
    /// Interruptible or uninterruptible sleep, stopped, traced, idle.
    Sleeping,
    /// Exited but not yet reaped.
    Zombie,
    /// Being torn down.
    Dead,
    /// Anything else.
    Unknown,
}

impl ProcState {
    /// Parse state from the stat state letter.
    #[must_use]
    pub const fn from_char(c: char) -> Self {
        match c {
            'R' => Self::Running,
            'S' | 'D' | 'T' | 't' | 'I' | 'W' | 'P' => Self::Sleeping,
            'Z' => Self::Zombie,
            'X' | 'x' => Self::Dead,
            _ => Self::Unknown,
        }
    }

    /// Whether a process in this state has terminated.
    #[must_use]
    pub const fn is_terminated(self) -> bool {
        matches!(self, Self::Zombie | Self::Dead)
    }
}

/// Fields of interest from one `/proc/<pid>/stat` read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatSnapshot {
    /// Command name without parentheses.
    pub comm: String,
    /// Current state.
    pub state: ProcState,
    /// Start time in clock ticks after boot.
    pub start_time: u64,
}

impl StatSnapshot {
    /// Parse the contents of a stat file.
    ///
    /// `comm` may contain spaces and parentheses, so fields are split after
    /// the last `)`.
    #[must_use]
    pub fn parse(content: &str) -> Option<Self> {
        let open = content.find('(')?;
        let close = content.rfind(')')?;
        let comm = content.get(open + 1..close)?.to_owned();
        let rest: Vec<&str> = content.get(close + 1..)?.split_whitespace().collect();
        // rest[0] is field 3 (state); field 22 (starttime) is rest[19].
        let state = ProcState::from_char(rest.first()?.chars().next()?);
        let start_time = rest.get(19)?.parse().ok()?;
        Some(Self {
            comm,
            state,
            start_time,
        })
    }
}

/// A live host process pinned by start time.
#[derive(Debug)]
pub struct HostProcess {
    pid: Pid,
    comm: String,
    start_time: u64,
    stat_path: PathBuf,
}

impl ProcessObject for HostProcess {
    fn pid(&self) -> Pid {
        self.pid
    }

    fn has_exited(&self) -> bool {
        let Ok(content) = fs::read_to_string(&self.stat_path) else {
            return true;
        };
        StatSnapshot::parse(&content)
            .is_none_or(|snap| snap.state.is_terminated() || snap.start_time != self.start_time)
    }

    fn name(&self) -> Option<String> {
        Some(self.comm.clone())
    }
}

/// Process table resolving pids of the host through `/proc`.
#[derive(Debug, Clone)]
pub struct ProcfsTable {
    root: PathBuf,
}

impl ProcfsTable {
    /// Table over the system `/proc`.
    #[must_use]
    pub fn new() -> Self {
        Self::with_root("/proc")
    }

    /// Table over an alternate proc mount.
    #[must_use]
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn stat_path(&self, pid: Pid) -> PathBuf {
        self.root.join(pid.as_raw().to_string()).join("stat")
    }
}

impl Default for ProcfsTable {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessTable for ProcfsTable {
    fn resolve(&self, pid: Pid) -> Option<ProcessRef> {
        if pid.as_raw() <= 0 {
            return None;
        }
        // Signal 0 probes existence; EPERM still means the pid is in use.
        match kill(nix::unistd::Pid::from_raw(pid.as_raw()), None) {
            Ok(()) | Err(Errno::EPERM) => {}
            Err(e) => {
                debug!(pid = %pid, error = %e, "Process probe failed");
                return None;
            }
        }

        let stat_path = self.stat_path(pid);
        let snap = StatSnapshot::parse(&fs::read_to_string(&stat_path).ok()?)?;
        if snap.state.is_terminated() {
            return None;
        }

        Some(ProcessRef::from_arc(std::sync::Arc::new(HostProcess {
            pid,
            comm: snap.comm,
            start_time: snap.start_time,
            stat_path,
        })))
    }
}
