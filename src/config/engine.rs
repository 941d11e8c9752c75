//! Engine configuration structures.

use std::env;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::infra::device::DeviceNumber;

/// Prefix of environment variables read by [`EngineConfig::from_env`].
pub const ENV_PREFIX: &str = "DEFERRED_";

const MIN_STACK_SIZE: usize = 64 * 1024;

/// Control-surface device configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Name registered with the device number.
    pub name: String,
    /// Major number.
    pub major: u32,
    /// Minor number.
    pub minor: u32,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            name: "deferred".into(),
            major: 42,
            minor: 0,
        }
    }
}

impl DeviceConfig {
    /// Device number to register.
    #[must_use]
    pub const fn number(&self) -> DeviceNumber {
        DeviceNumber::new(self.major, self.minor)
    }
}

/// Root engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Control-surface device.
    pub device: DeviceConfig,
    /// Duration of the simulated blocking operation in milliseconds.
    pub blocking_latency_ms: u64,
    /// Delay applied to raw `TIMER_MON` requests, which carry only a pid.
    pub monitor_delay_secs: u64,
    /// Allow at most one open control handle at a time.
    pub exclusive_open: bool,
    /// Stack size for the timer and worker threads.
    pub thread_stack_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            device: DeviceConfig::default(),
            blocking_latency_ms: 5_000,
            monitor_delay_secs: 1,
            exclusive_open: true,
            thread_stack_size: 256 * 1024,
        }
    }
}

impl EngineConfig {
    /// Create the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the simulated blocking latency.
    #[must_use]
    pub fn with_blocking_latency(mut self, latency: Duration) -> Self {
        self.blocking_latency_ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Set the device number.
    #[must_use]
    pub const fn with_device_number(mut self, major: u32, minor: u32) -> Self {
        self.device.major = major;
        self.device.minor = minor;
        self
    }

    /// Enable or disable single-open enforcement.
    #[must_use]
    pub const fn with_exclusive_open(mut self, exclusive: bool) -> Self {
        self.exclusive_open = exclusive;
        self
    }

    /// Simulated blocking latency.
    #[must_use]
    pub const fn blocking_latency(&self) -> Duration {
        Duration::from_millis(self.blocking_latency_ms)
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if self.device.name.trim().is_empty() {
            return Err("device.name must not be empty".into());
        }
        if self.thread_stack_size < MIN_STACK_SIZE {
            return Err(format!(
                "thread_stack_size must be at least {MIN_STACK_SIZE} bytes"
            ));
        }
        Ok(())
    }

    /// Parse configuration from a JSON string and validate.
    ///
    /// # Errors
    ///
    /// Returns a parse or validation error message.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Build configuration from `DEFERRED_*` environment variables, loading
    /// a `.env` file from the working directory first if present.
    ///
    /// # Errors
    ///
    /// Returns a parse or validation error message.
    pub fn from_env() -> Result<Self, String> {
        let _ = dotenvy::dotenv();
        Self::from_vars(|key| env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env) but loads the given env file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or a value is invalid.
    pub fn from_env_file(path: impl AsRef<Path>) -> Result<Self, String> {
        let path = path.as_ref();
        let vars: Vec<(String, String)> = dotenvy::from_path_iter(path)
            .map_err(|e| format!("{}: {e}", path.display()))?
            .collect::<Result<_, _>>()
            .map_err(|e| format!("{}: {e}", path.display()))?;
        Self::from_vars(|key| {
            vars.iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.clone())
                .or_else(|| env::var(key).ok())
        })
    }

    fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, String> {
        let mut cfg = Self::default();
        let get = |name: &str| lookup(&format!("{ENV_PREFIX}{name}"));

        if let Some(name) = get("DEVICE_NAME") {
            cfg.device.name = name;
        }
        if let Some(v) = get("DEVICE_MAJOR") {
            cfg.device.major = parse_var("DEVICE_MAJOR", &v)?;
        }
        if let Some(v) = get("DEVICE_MINOR") {
            cfg.device.minor = parse_var("DEVICE_MINOR", &v)?;
        }
        if let Some(v) = get("BLOCKING_LATENCY_MS") {
            cfg.blocking_latency_ms = parse_var("BLOCKING_LATENCY_MS", &v)?;
        }
        if let Some(v) = get("MONITOR_DELAY_SECS") {
            cfg.monitor_delay_secs = parse_var("MONITOR_DELAY_SECS", &v)?;
        }
        if let Some(v) = get("EXCLUSIVE_OPEN") {
            cfg.exclusive_open = parse_var("EXCLUSIVE_OPEN", &v)?;
        }
        if let Some(v) = get("THREAD_STACK_SIZE") {
            cfg.thread_stack_size = parse_var("THREAD_STACK_SIZE", &v)?;
        }

        cfg.validate()?;
        Ok(cfg)
    }
}

fn parse_var<T: FromStr>(name: &str, value: &str) -> Result<T, String>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| format!("{ENV_PREFIX}{name}: {e}"))
}
