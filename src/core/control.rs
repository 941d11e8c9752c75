//! Control commands and their raw ioctl-style encoding.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::error::EngineError;
use crate::core::process::Pid;

/// Magic byte shared by all engine commands.
pub const IOC_MAGIC: u8 = b'k';

const IOC_NRBITS: u32 = 8;
const IOC_TYPEBITS: u32 = 8;
const IOC_SIZEBITS: u32 = 14;
const IOC_TYPESHIFT: u32 = IOC_NRBITS;
const IOC_SIZESHIFT: u32 = IOC_TYPESHIFT + IOC_TYPEBITS;
const IOC_DIRSHIFT: u32 = IOC_SIZESHIFT + IOC_SIZEBITS;
const IOC_NONE: u32 = 0;
const IOC_WRITE: u32 = 1;

const fn ioc(dir: u32, nr: u32, size: u32) -> u32 {
    (dir << IOC_DIRSHIFT) | ((IOC_MAGIC as u32) << IOC_TYPESHIFT) | nr | (size << IOC_SIZESHIFT)
}

const ARG_SIZE: u32 = u64::BITS / 8;

/// `_IOW('k', 1, u64)`: arm in plain mode; arg is the delay in seconds.
pub const TIMER_SET: u32 = ioc(IOC_WRITE, 1, ARG_SIZE);
/// `_IO('k', 2)`: cancel the pending fire.
pub const TIMER_CANCEL: u32 = ioc(IOC_NONE, 2, 0);
/// `_IOW('k', 3, u64)`: arm in blocking-operation mode; arg is the delay in seconds.
pub const TIMER_ALLOC: u32 = ioc(IOC_WRITE, 3, ARG_SIZE);
/// `_IOW('k', 4, u64)`: monitor a process; arg is the pid.
pub const TIMER_MON: u32 = ioc(IOC_WRITE, 4, ARG_SIZE);

/// A decoded control command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Command {
    /// Plain mode, fire after `delay_secs`.
    TimerSet {
        /// Delay in seconds.
        delay_secs: u64,
    },
    /// Cancel the pending fire.
    TimerCancel,
    /// Blocking-operation mode, fire after `delay_secs`.
    TimerAlloc {
        /// Delay in seconds.
        delay_secs: u64,
    },
    /// Watch `pid`; monitor mode, fire after `delay_secs`.
    TimerMon {
        /// Process to watch.
        pid: Pid,
        /// Delay in seconds before the first sweep.
        delay_secs: u64,
        /// Re-arm every `period_secs` while processes remain tracked.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        period_secs: Option<u64>,
    },
}

impl Command {
    /// Decode a raw request.
    ///
    /// Raw `TIMER_MON` only carries the pid, so its delay is `monitor_delay_secs`.
    ///
    /// # Errors
    ///
    /// - `EngineError::InvalidCommand` for an unknown code
    /// - `EngineError::NoSuchProcess` for a `TIMER_MON` pid outside the pid range
    pub fn decode(code: u32, arg: u64, monitor_delay_secs: u64) -> Result<Self, EngineError> {
        match code {
            TIMER_SET => Ok(Self::TimerSet { delay_secs: arg }),
            TIMER_CANCEL => Ok(Self::TimerCancel),
            TIMER_ALLOC => Ok(Self::TimerAlloc { delay_secs: arg }),
            TIMER_MON => {
                let pid = Pid::try_from(arg)
                    .map_err(|_| EngineError::NoSuchProcess(Pid::from_raw(-1)))?;
                Ok(Self::TimerMon {
                    pid,
                    delay_secs: monitor_delay_secs,
                    period_secs: None,
                })
            }
            other => Err(EngineError::InvalidCommand(other)),
        }
    }

    /// Raw request code.
    #[must_use]
    pub const fn code(&self) -> u32 {
        match self {
            Self::TimerSet { .. } => TIMER_SET,
            Self::TimerCancel => TIMER_CANCEL,
            Self::TimerAlloc { .. } => TIMER_ALLOC,
            Self::TimerMon { .. } => TIMER_MON,
        }
    }

    /// Command name as logged.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::TimerSet { .. } => "TIMER_SET",
            Self::TimerCancel => "TIMER_CANCEL",
            Self::TimerAlloc { .. } => "TIMER_ALLOC",
            Self::TimerMon { .. } => "TIMER_MON",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TimerSet { delay_secs } | Self::TimerAlloc { delay_secs } => {
                write!(f, "{} delay={delay_secs}s", self.name())
            }
            Self::TimerCancel => f.write_str(self.name()),
            Self::TimerMon {
                pid,
                delay_secs,
                period_secs,
            } => {
                write!(f, "{} pid={pid} delay={delay_secs}s", self.name())?;
                if let Some(period) = period_secs {
                    write!(f, " period={period}s")?;
                }
                Ok(())
            }
        }
    }
}
