//! Infrastructure adapters for process tables and device registration.

pub mod device;
pub mod process;

pub use device::{DeviceNumber, DeviceRegistration, DeviceRegistry};
pub use process::{InMemoryProcessTable, ProcfsTable};
