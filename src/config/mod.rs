//! Configuration models for the engine and its control surface.

pub mod engine;

pub use engine::{DeviceConfig, EngineConfig, ENV_PREFIX};
