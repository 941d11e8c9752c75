//! Tests for error types

use deferred_engine::core::{EngineError, Pid};
use nix::errno::Errno;

#[test]
fn test_no_such_process_error() {
    let err = EngineError::NoSuchProcess(Pid::from_raw(4242));
    assert_eq!(format!("{err}"), "no such process: 4242");
    assert_eq!(err.errno(), Errno::ESRCH);
}

#[test]
fn test_invalid_command_error() {
    let err = EngineError::InvalidCommand(0x6b09);
    assert_eq!(format!("{err}"), "operation not supported: command 0x6b09");
    assert_eq!(err.errno(), Errno::ENOTTY);
}

#[test]
fn test_region_in_use_error() {
    let err = EngineError::RegionInUse { major: 42, minor: 0 };
    assert_eq!(format!("{err}"), "device region 42:0 already registered");
    assert_eq!(err.errno(), Errno::EBUSY);
    assert!(!err.is_retryable());
}

#[test]
fn test_only_busy_is_retryable() {
    assert!(EngineError::AlreadyBusy.is_retryable());
    assert!(!EngineError::OutOfMemory.is_retryable());
    assert_eq!(EngineError::OutOfMemory.errno(), Errno::ENOMEM);
    assert_eq!(
        EngineError::ContextUnavailable("spawn".into()).errno(),
        Errno::EAGAIN
    );
}

#[test]
fn test_converts_into_app_result() {
    fn host() -> deferred_engine::core::AppResult<()> {
        let open: Result<(), EngineError> = Err(EngineError::AlreadyBusy);
        open?;
        Ok(())
    }
    let err = host().unwrap_err();
    assert!(err.downcast_ref::<EngineError>().is_some());
}
