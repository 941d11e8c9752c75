//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use deferred_engine::builders::EngineBuilder;
use deferred_engine::config::EngineConfig;
use deferred_engine::core::{
    DeferredWork, Engine, Pid, ProcessObject, ProcessRef, ProcessTable, SimulatedIo, WorkContext,
};
use deferred_engine::infra::{DeviceRegistry, InMemoryProcessTable};
use parking_lot::{Condvar, Mutex};

pub const WAIT: Duration = Duration::from_secs(5);

/// Poll `cond` until it holds or `timeout` elapses.
pub fn wait_until(timeout: Duration, cond: impl Fn() -> bool) -> bool {
    let start = Instant::now();
    loop {
        if cond() {
            return true;
        }
        if start.elapsed() >= timeout {
            return false;
        }
        thread::sleep(Duration::from_millis(2));
    }
}

/// Work body that blocks until released.
pub struct Gate {
    started: AtomicU64,
    open: Mutex<bool>,
    cond: Condvar,
}

impl Gate {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            started: AtomicU64::new(0),
            open: Mutex::new(false),
            cond: Condvar::new(),
        })
    }

    pub fn started(&self) -> u64 {
        self.started.load(Ordering::SeqCst)
    }

    pub fn release(&self) {
        *self.open.lock() = true;
        self.cond.notify_all();
    }
}

#[async_trait]
impl DeferredWork for Gate {
    async fn run(&self, _ctx: &WorkContext) {
        self.started.fetch_add(1, Ordering::SeqCst);
        let mut open = self.open.lock();
        self.cond.wait_while(&mut open, |o| !*o);
    }
}

/// Engine over an in-memory process table with a private device registry.
pub struct Harness {
    pub engine: Engine,
    pub table: Arc<InMemoryProcessTable>,
    pub registry: Arc<DeviceRegistry>,
}

pub fn harness_with(config: EngineConfig, work: Arc<dyn DeferredWork>) -> Harness {
    let table = Arc::new(InMemoryProcessTable::new());
    let registry = Arc::new(DeviceRegistry::new());
    let engine = EngineBuilder::new()
        .config(config)
        .process_table(Arc::clone(&table) as _)
        .device_registry(Arc::clone(&registry))
        .work(work)
        .build()
        .expect("engine init");
    Harness {
        engine,
        table,
        registry,
    }
}

pub fn harness() -> Harness {
    harness_with(
        EngineConfig::default(),
        Arc::new(SimulatedIo::new(Duration::from_millis(5))),
    )
}

/// Live process whose liveness probe takes `delay`, keeping a sweep open.
struct SlowProcess {
    pid: Pid,
    delay: Duration,
    probing: Arc<AtomicBool>,
}

impl ProcessObject for SlowProcess {
    fn pid(&self) -> Pid {
        self.pid
    }

    fn has_exited(&self) -> bool {
        self.probing.store(true, Ordering::SeqCst);
        thread::sleep(self.delay);
        self.probing.store(false, Ordering::SeqCst);
        false
    }
}

/// Process table resolving every pid to a never-exiting slow process.
pub struct SlowProcessTable {
    delay: Duration,
    probing: Arc<AtomicBool>,
}

impl SlowProcessTable {
    pub fn new(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay,
            probing: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Whether a sweep is inside a liveness probe right now.
    pub fn probing(&self) -> bool {
        self.probing.load(Ordering::SeqCst)
    }
}

impl ProcessTable for SlowProcessTable {
    fn resolve(&self, pid: Pid) -> Option<ProcessRef> {
        Some(ProcessRef::from_arc(Arc::new(SlowProcess {
            pid,
            delay: self.delay,
            probing: Arc::clone(&self.probing),
        })))
    }
}
