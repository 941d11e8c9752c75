//! In-process character device region registry.
//!
//! Stands in for the host's device-number table: the engine claims its
//! `major:minor` at init and gives it back first thing at teardown.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::core::error::EngineError;

/// Device number (`major:minor`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceNumber {
    /// Major number.
    pub major: u32,
    /// Minor number.
    pub minor: u32,
}

impl DeviceNumber {
    /// Build a device number.
    #[must_use]
    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }
}

impl fmt::Display for DeviceNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.major, self.minor)
    }
}

/// Table of registered device numbers.
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    regions: Mutex<HashMap<DeviceNumber, String>>,
}

impl DeviceRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `number` for `name`.
    ///
    /// # Errors
    ///
    /// - `EngineError::RegionInUse` if `number` is already registered
    /// - `EngineError::OutOfMemory` if the table cannot grow
    pub fn register(
        self: &Arc<Self>,
        number: DeviceNumber,
        name: &str,
    ) -> Result<DeviceRegistration, EngineError> {
        let mut regions = self.regions.lock();
        if regions.contains_key(&number) {
            return Err(EngineError::RegionInUse {
                major: number.major,
                minor: number.minor,
            });
        }
        regions
            .try_reserve(1)
            .map_err(|_| EngineError::OutOfMemory)?;
        regions.insert(number, name.to_owned());
        drop(regions);

        info!(device = %number, name, "Device region registered");
        Ok(DeviceRegistration {
            registry: Arc::clone(self),
            number,
            active: true,
        })
    }

    /// Name registered for `number`, if any.
    #[must_use]
    pub fn lookup(&self, number: DeviceNumber) -> Option<String> {
        self.regions.lock().get(&number).cloned()
    }

    /// Number of registered regions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.regions.lock().len()
    }

    /// Whether no region is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.regions.lock().is_empty()
    }

    fn release(&self, number: DeviceNumber) {
        if let Some(name) = self.regions.lock().remove(&number) {
            info!(device = %number, name = %name, "Device region unregistered");
        }
    }
}

/// Claim on one device number; released by [`unregister`](Self::unregister) or on drop.
#[derive(Debug)]
pub struct DeviceRegistration {
    registry: Arc<DeviceRegistry>,
    number: DeviceNumber,
    active: bool,
}

impl DeviceRegistration {
    /// Registered device number.
    #[must_use]
    pub const fn number(&self) -> DeviceNumber {
        self.number
    }

    /// Give the device number back.
    pub fn unregister(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if std::mem::take(&mut self.active) {
            self.registry.release(self.number);
        }
    }
}

impl Drop for DeviceRegistration {
    fn drop(&mut self) {
        self.release();
    }
}
