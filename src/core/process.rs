//! Handles to externally-owned process objects.
//!
//! The engine never owns processes. It holds [`ProcessRef`]s, unique strong
//! references obtained from a [`ProcessTable`], and releases each one exactly
//! once by dropping it.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Process identifier as supplied by control callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Pid(i32);

impl Pid {
    /// Wrap a raw pid value.
    #[must_use]
    pub const fn from_raw(raw: i32) -> Self {
        Self(raw)
    }

    /// Raw pid value.
    #[must_use]
    pub const fn as_raw(self) -> i32 {
        self.0
    }

    /// Pid of the calling process.
    #[must_use]
    pub fn current() -> Self {
        // Linux pids are bounded by pid_max (at most 2^22), so this never truncates.
        Self(std::process::id().try_into().unwrap_or(i32::MAX))
    }
}

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<u64> for Pid {
    type Error = std::num::TryFromIntError;

    fn try_from(raw: u64) -> Result<Self, Self::Error> {
        i32::try_from(raw).map(Self)
    }
}

/// An externally-owned process object.
pub trait ProcessObject: Send + Sync + 'static {
    /// Identifier the object was resolved from.
    fn pid(&self) -> Pid;

    /// Whether the process has terminated.
    ///
    /// Called from the restricted timer context with the store lock
    /// released. Implementations must answer promptly: a short read such as
    /// `/proc/<pid>/stat` is fine, waiting on other engine activity is not.
    fn has_exited(&self) -> bool;

    /// Short command name, if known.
    fn name(&self) -> Option<String> {
        None
    }
}

/// Unique strong reference to a process object.
///
/// Not `Clone`: the reference is acquired once by [`ProcessTable::resolve`]
/// and released once when this value is dropped.
pub struct ProcessRef {
    inner: Arc<dyn ProcessObject>,
}

impl ProcessRef {
    /// Take a new strong reference on `object`.
    #[must_use]
    pub fn acquire(object: &Arc<dyn ProcessObject>) -> Self {
        Self {
            inner: Arc::clone(object),
        }
    }

    /// Wrap an already-counted reference.
    #[must_use]
    pub fn from_arc(inner: Arc<dyn ProcessObject>) -> Self {
        Self { inner }
    }

    /// Identifier of the referenced process.
    #[must_use]
    pub fn pid(&self) -> Pid {
        self.inner.pid()
    }

    /// Whether the referenced process has terminated.
    #[must_use]
    pub fn has_exited(&self) -> bool {
        self.inner.has_exited()
    }

    /// Command name of the referenced process, if known.
    #[must_use]
    pub fn name(&self) -> Option<String> {
        self.inner.name()
    }
}

impl fmt::Debug for ProcessRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessRef")
            .field("pid", &self.pid())
            .finish_non_exhaustive()
    }
}

/// Resolves pids to live process objects.
pub trait ProcessTable: Send + Sync + 'static {
    /// Resolve `pid` to a live process and take a strong reference on it.
    ///
    /// Returns `None` if no such process exists.
    fn resolve(&self, pid: Pid) -> Option<ProcessRef>;
}
