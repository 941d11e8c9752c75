//! Tests for the request/response API surface

use std::sync::Arc;

use deferred_engine::builders::EngineBuilder;
use deferred_engine::core::{Command, Mode, SimulatedIo};
use deferred_engine::infra::{DeviceRegistry, InMemoryProcessTable};
use deferred_engine::runtime::{health, status, submit, ControlRequest};

fn engine() -> deferred_engine::core::Engine {
    EngineBuilder::new()
        .process_table(Arc::new(InMemoryProcessTable::new()))
        .device_registry(Arc::new(DeviceRegistry::new()))
        .work(Arc::new(SimulatedIo::new(std::time::Duration::ZERO)))
        .build()
        .unwrap()
}

#[test]
fn test_health() {
    assert!(health().ok);
}

#[test]
fn test_request_from_json() {
    let req = ControlRequest::from_json_str(
        r#"{"request_id": "r-1", "command": "TIMER_SET", "delay_secs": 9}"#,
    )
    .unwrap();
    assert_eq!(req.request_id.as_deref(), Some("r-1"));
    assert_eq!(req.command, Command::TimerSet { delay_secs: 9 });

    assert!(ControlRequest::from_json_str(r#"{"command": "TIMER_NOPE"}"#).is_err());
}

#[test]
fn test_submit_reports_status() {
    let engine = engine();
    let handle = engine.open().unwrap();
    let resp = submit(
        &handle,
        ControlRequest::new(Command::TimerSet { delay_secs: 3600 }),
    )
    .unwrap();
    assert_eq!(resp.mode, Some(Mode::Plain));
    assert!(resp.timer_pending);
    assert_eq!(resp.tracked, 0);
    assert_eq!(resp.stats.timer_arms, 1);
}

#[test]
fn test_submit_error_carries_errno() {
    let engine = engine();
    let handle = engine.open().unwrap();
    let err = submit(
        &handle,
        ControlRequest::new(Command::TimerMon {
            pid: deferred_engine::core::Pid::from_raw(999_999),
            delay_secs: 0,
            period_secs: None,
        }),
    )
    .unwrap_err();
    assert!(err.contains("ESRCH"));

    let snapshot = status(&engine);
    assert_eq!(snapshot.mode, Some(Mode::None));
    assert!(!snapshot.timer_pending);
}
