//! API-facing request/response models.

use serde::{Deserialize, Serialize};

use crate::core::{Command, ControlHandle, Engine, EngineStats, Mode};

/// Control request payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlRequest {
    /// Optional caller-chosen id echoed in logs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    /// Command to run.
    #[serde(flatten)]
    pub command: Command,
}

impl ControlRequest {
    /// Request without an id.
    #[must_use]
    pub const fn new(command: Command) -> Self {
        Self {
            request_id: None,
            command,
        }
    }

    /// Parse a request from JSON.
    ///
    /// # Errors
    ///
    /// Returns the parse error message.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))
    }
}

/// Engine status snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusResponse {
    /// Current mode; `None` if the stored mode is unrecognized.
    pub mode: Option<Mode>,
    /// Whether a timer fire is pending.
    pub timer_pending: bool,
    /// Number of tracked processes.
    pub tracked: usize,
    /// Counter snapshot.
    pub stats: EngineStats,
}

/// Health response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Health {
    /// Healthy flag.
    pub ok: bool,
}

/// Run a request through an open handle and report the resulting status.
///
/// # Errors
///
/// Returns the command error rendered with its errno.
pub fn submit(handle: &ControlHandle<'_>, req: ControlRequest) -> Result<StatusResponse, String> {
    if let Some(id) = &req.request_id {
        tracing::debug!(request_id = %id, command = %req.command, "Control request");
    }
    handle
        .execute(req.command)
        .map_err(|e| format!("{e} ({})", e.errno()))?;
    Ok(status(handle.engine()))
}

/// Current engine status.
#[must_use]
pub fn status(engine: &Engine) -> StatusResponse {
    StatusResponse {
        mode: engine.mode(),
        timer_pending: engine.timer_pending(),
        tracked: engine.tracked(),
        stats: engine.stats(),
    }
}

/// Return a health payload.
#[must_use]
pub const fn health() -> Health {
    Health { ok: true }
}
