//! API surface for hosts driving the engine from serialized requests.

pub mod api;

pub use api::{health, status, submit, ControlRequest, Health, StatusResponse};
