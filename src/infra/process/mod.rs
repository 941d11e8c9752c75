//! Process table backends.

pub mod memory;
pub mod procfs;

pub use memory::{InMemoryProcessTable, SimulatedProcess};
pub use procfs::ProcfsTable;
