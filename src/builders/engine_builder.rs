//! Builder assembling an [`Engine`] from configuration and optional backends.

use std::sync::Arc;

use crate::config::EngineConfig;
use crate::core::{DeferredWork, Engine, EngineError, ProcessTable, SimulatedIo};
use crate::infra::{DeviceRegistry, ProcfsTable};

/// Fluent builder for [`Engine`].
///
/// Unset backends default to the host process table, a fresh device
/// registry and [`SimulatedIo`] with the configured latency.
#[derive(Default)]
pub struct EngineBuilder {
    config: EngineConfig,
    table: Option<Arc<dyn ProcessTable>>,
    registry: Option<Arc<DeviceRegistry>>,
    work: Option<Arc<dyn DeferredWork>>,
}

impl EngineBuilder {
    /// Builder with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the configuration.
    #[must_use]
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Process table used to resolve monitored pids.
    #[must_use]
    pub fn process_table(mut self, table: Arc<dyn ProcessTable>) -> Self {
        self.table = Some(table);
        self
    }

    /// Registry the control surface registers into.
    #[must_use]
    pub fn device_registry(mut self, registry: Arc<DeviceRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Body run by the deferred work slot.
    #[must_use]
    pub fn work(mut self, work: Arc<dyn DeferredWork>) -> Self {
        self.work = Some(work);
        self
    }

    /// Initialize the engine.
    ///
    /// # Errors
    ///
    /// Propagates any [`Engine::init`] failure.
    pub fn build(self) -> Result<Engine, EngineError> {
        let table = self
            .table
            .unwrap_or_else(|| Arc::new(ProcfsTable::new()) as Arc<dyn ProcessTable>);
        let registry = self.registry.unwrap_or_default();
        let work = self.work.unwrap_or_else(|| {
            Arc::new(SimulatedIo::new(self.config.blocking_latency())) as Arc<dyn DeferredWork>
        });
        Engine::init(self.config, table, &registry, work)
    }
}
