//! Core deferred-execution engine: timer, work slot, dispatcher, store and lifecycle.

pub mod control;
pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod process;
pub mod stats;
pub mod store;
pub mod timer;
pub mod work_slot;

pub use control::{Command, TIMER_ALLOC, TIMER_CANCEL, TIMER_MON, TIMER_SET};
pub use dispatcher::{Dispatcher, Mode, ModeCell};
pub use engine::{ControlHandle, Engine, TeardownReport};
pub use error::{AppResult, EngineError};
pub use process::{Pid, ProcessObject, ProcessRef, ProcessTable};
pub use stats::EngineStats;
pub use store::{TrackedEntity, TrackedEntityStore};
pub use timer::{CountdownTimer, TimerCallback, TimerContext, MAX_DELAY};
pub use work_slot::{DeferredWork, DeferredWorkSlot, SimulatedIo, SlotState, WorkContext};
