//! # Deferred Engine
//!
//! A small deferred-execution engine: work is requested now and performed
//! later, either when a countdown expires or on a context that is allowed to
//! block.
//!
//! ## Execution contexts
//!
//! - **Timer thread**: runs the fire handler. It must never block, so it only
//!   flips state, schedules work and sweeps the tracked-entity store.
//! - **Worker thread**: runs the deferred work body on a current-thread
//!   tokio runtime. Blocking is allowed here.
//!
//! ## Commands
//!
//! | Command | Effect |
//! |---|---|
//! | `TIMER_SET` | plain mode, arm the timer |
//! | `TIMER_CANCEL` | cancel the pending fire |
//! | `TIMER_ALLOC` | blocking-operation mode, arm the timer |
//! | `TIMER_MON` | track a process, monitor mode, arm the timer |
//!
//! ```rust,ignore
//! use deferred_engine::builders::EngineBuilder;
//! use deferred_engine::core::Command;
//!
//! let engine = EngineBuilder::new().build()?;
//! {
//!     let handle = engine.open()?;
//!     handle.execute(Command::TimerAlloc { delay_secs: 1 })?;
//! }
//! let report = engine.teardown();
//! ```
//!
//! Scenario tests live in `tests/engine_test.rs`.

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Engine core: timer, work slot, dispatcher, store and lifecycle.
pub mod core;
/// Configuration models.
pub mod config;
/// Builders to construct engines from configuration.
pub mod builders;
/// Infrastructure adapters for process tables and device registration.
pub mod infra;
/// API surface for serialized control requests.
pub mod runtime;
/// Shared utilities.
pub mod util;
