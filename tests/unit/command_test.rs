//! Tests for command decoding and serialization

use deferred_engine::core::{Command, EngineError, Pid, TIMER_ALLOC, TIMER_MON, TIMER_SET};

#[test]
fn test_decode_roundtrips_through_code() {
    for cmd in [
        Command::TimerSet { delay_secs: 2 },
        Command::TimerCancel,
        Command::TimerAlloc { delay_secs: 7 },
    ] {
        let arg = match cmd {
            Command::TimerSet { delay_secs } | Command::TimerAlloc { delay_secs } => delay_secs,
            _ => 0,
        };
        assert_eq!(Command::decode(cmd.code(), arg, 1).unwrap(), cmd);
    }
}

#[test]
fn test_decode_alloc_and_set_differ() {
    assert_ne!(TIMER_SET, TIMER_ALLOC);
    assert_eq!(
        Command::decode(TIMER_ALLOC, 0, 1).unwrap(),
        Command::TimerAlloc { delay_secs: 0 }
    );
}

#[test]
fn test_decode_mon_out_of_range_pid() {
    let err = Command::decode(TIMER_MON, u64::MAX, 1).unwrap_err();
    assert!(matches!(err, EngineError::NoSuchProcess(_)));
}

#[test]
fn test_command_json_shape() {
    let cmd = Command::TimerMon {
        pid: Pid::from_raw(31),
        delay_secs: 1,
        period_secs: None,
    };
    let json = serde_json::to_value(cmd).unwrap();
    assert_eq!(
        json,
        serde_json::json!({"command": "TIMER_MON", "pid": 31, "delay_secs": 1})
    );

    let back: Command = serde_json::from_str(r#"{"command":"TIMER_CANCEL"}"#).unwrap();
    assert_eq!(back, Command::TimerCancel);
}
