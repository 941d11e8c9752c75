//! Error types for engine operations.

use nix::errno::Errno;
use thiserror::Error;

use crate::core::process::Pid;

/// Errors produced by engine components and surfaced to control callers.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The pid did not resolve to a live process at registration time.
    #[error("no such process: {0}")]
    NoSuchProcess(Pid),
    /// An entity record or device registration could not be allocated.
    #[error("out of memory")]
    OutOfMemory,
    /// The control code is not recognized.
    #[error("operation not supported: command {0:#x}")]
    InvalidCommand(u32),
    /// The control surface is already held exclusively.
    #[error("device busy")]
    AlreadyBusy,
    /// The requested device number is already registered.
    #[error("device region {major}:{minor} already registered")]
    RegionInUse {
        /// Major number of the conflicting region.
        major: u32,
        /// Minor number of the conflicting region.
        minor: u32,
    },
    /// Configuration failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// A timer thread, worker thread or worker runtime could not be started.
    #[error("execution context unavailable: {0}")]
    ContextUnavailable(String),
}

impl EngineError {
    /// Errno a device-dispatch layer should report for this error.
    #[must_use]
    pub const fn errno(&self) -> Errno {
        match self {
            Self::NoSuchProcess(_) => Errno::ESRCH,
            Self::OutOfMemory => Errno::ENOMEM,
            Self::InvalidCommand(_) => Errno::ENOTTY,
            Self::AlreadyBusy | Self::RegionInUse { .. } => Errno::EBUSY,
            Self::InvalidConfig(_) => Errno::EINVAL,
            Self::ContextUnavailable(_) => Errno::EAGAIN,
        }
    }

    /// Whether the caller may retry the same request later.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::AlreadyBusy)
    }
}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;
