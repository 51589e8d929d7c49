//! End-to-end engine behavior over scripted mock devices.
//!
//! These tests run the real background worker: construction picks the active
//! device, the worker services the buffers, and drop joins the worker before
//! the devices are torn down. Anything timing-dependent polls with a generous
//! deadline instead of asserting on a single sleep.

use pretty_assertions::assert_eq;
use regex::bytes::Regex;
use serial_link::{
    Baudrate, ConnectionStatus, EngineConfig, EngineError, MockOpener, TransferEngine,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

const DEADLINE: Duration = Duration::from_secs(2);

fn engine_with(opener: &MockOpener, names: &[&str]) -> TransferEngine {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
    TransferEngine::with_opener(
        names.iter().map(|s| s.to_string()).collect(),
        Baudrate::Baud9600,
        EngineConfig::default(),
        Arc::new(opener.clone()),
    )
    .expect("engine construction")
}

/// Poll `check` until it returns true or the deadline passes.
fn wait_for(mut check: impl FnMut() -> bool) -> bool {
    let started = Instant::now();
    while started.elapsed() < DEADLINE {
        if check() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    false
}

#[test]
fn print_reaches_the_wire_in_order() {
    let opener = MockOpener::new();
    let device = opener.device("FAKE0");
    let engine = engine_with(&opener, &["FAKE0"]);

    engine.print("AB");
    engine.print("C");

    assert!(
        wait_for(|| device.written_bytes() == b"ABC"),
        "written so far: {:?}",
        device.written_bytes()
    );
    // Units go out one byte per write call.
    assert_eq!(
        device.write_log(),
        vec![b"A".to_vec(), b"B".to_vec(), b"C".to_vec()]
    );
}

#[test]
fn received_bytes_accumulate_until_retrieved() {
    let opener = MockOpener::new();
    let device = opener.device("FAKE0");
    let engine = engine_with(&opener, &["FAKE0"]);

    device.push_read(b"XYZ");

    let mut collected = Vec::new();
    assert!(wait_for(|| {
        collected.extend(engine.retrieve_read_buffer());
        collected == b"XYZ"
    }));
    assert_eq!(engine.retrieve_read_buffer(), b"");
}

#[test]
fn rejected_writes_are_retried_until_accepted() {
    let opener = MockOpener::new();
    let device = opener.device("FAKE0");
    let engine = engine_with(&opener, &["FAKE0"]);

    device.fail_next_writes(4);
    engine.print("AB");

    assert!(wait_for(|| device.written_bytes() == b"AB"));
    assert!(device.write_attempts() >= 6);
}

#[test]
fn repeated_first_match_equals_one_all_matches_pass() {
    let frame = Regex::new(r"cmd:\d+;").unwrap();
    let payload = b"cmd:1;cmd:2;cmd:3;";

    let opener_a = MockOpener::new();
    let device_a = opener_a.device("FAKE0");
    let engine_a = engine_with(&opener_a, &["FAKE0"]);

    let opener_b = MockOpener::new();
    let device_b = opener_b.device("FAKE0");
    let engine_b = engine_with(&opener_b, &["FAKE0"]);

    device_a.push_read(payload);
    device_b.push_read(payload);

    // Wait until both engines have swallowed the whole payload, then let the
    // buffers go quiet before scanning.
    assert!(wait_for(|| {
        device_a.pending_reads() == 0 && device_b.pending_reads() == 0
    }));
    std::thread::sleep(Duration::from_millis(50));

    let mut one_at_a_time = Vec::new();
    while let Some(matched) = engine_a.retrieve_first_match(&frame) {
        one_at_a_time.push(matched);
    }
    let all_at_once = engine_b.retrieve_all_matches(&frame);

    assert_eq!(one_at_a_time, all_at_once);
    assert_eq!(
        one_at_a_time,
        vec![b"cmd:1;".to_vec(), b"cmd:2;".to_vec(), b"cmd:3;".to_vec()]
    );
}

#[test]
fn first_reachable_device_becomes_active() {
    let opener = MockOpener::new();
    opener.refuse("MISSING");
    opener.device("PRESENT");
    let engine = engine_with(&opener, &["MISSING", "PRESENT"]);

    assert!(engine.is_available());
    assert_eq!(engine.device_name().as_deref(), Some("PRESENT"));
    assert_eq!(engine.device_count(), 2);
}

#[test]
fn unreachable_devices_leave_the_engine_unavailable_but_alive() {
    let opener = MockOpener::new();
    opener.refuse("A");
    opener.fail("B");
    let engine = engine_with(&opener, &["A", "B"]);

    assert!(!engine.is_available());
    assert!(!engine.connect());

    // The device coming back is picked up by an explicit reconnect.
    opener.device("A");
    assert!(engine.connect());
    assert!(engine.is_available());
    assert_eq!(engine.device_name().as_deref(), Some("A"));
}

#[test]
fn disconnect_all_then_connect_roundtrip() {
    let opener = MockOpener::new();
    opener.device("FAKE0");
    let engine = engine_with(&opener, &["FAKE0"]);

    assert!(engine.is_available());
    engine.disconnect_all();
    assert!(!engine.is_available());
    engine.disconnect_all();

    assert!(engine.connect());
    assert!(engine.connect());
    assert!(engine.is_available());
}

#[test]
fn queued_output_survives_a_disconnected_start() {
    let opener = MockOpener::new();
    opener.refuse("LATE");
    let engine = engine_with(&opener, &["LATE"]);

    engine.print("held back");
    assert!(!engine.is_available());

    let device = opener.device("LATE");
    assert!(engine.connect());
    assert!(wait_for(|| device.written_bytes() == b"held back"));
}

#[test]
fn drop_stops_the_worker_and_disconnects_devices() {
    let opener = MockOpener::new();
    opener.device("FAKE0");
    let engine = engine_with(&opener, &["FAKE0"]);
    let port = engine.current_device().expect("current device");
    assert_eq!(port.status(), ConnectionStatus::Connected);

    drop(engine);
    assert_eq!(port.status(), ConnectionStatus::Disconnected);
}

#[test]
fn device_accessors_follow_the_current_selection() {
    let opener = MockOpener::new();
    let device = opener.device("FAKE0");
    opener.refuse("FAKE1");
    let engine = engine_with(&opener, &["FAKE0", "FAKE1"]);

    assert_eq!(engine.baud(), Baudrate::Baud9600);
    assert_eq!(
        engine.native_device(1).map(|d| d.name().to_string()).as_deref(),
        Some("FAKE1")
    );
    // Out-of-range indices fall back to the current device.
    assert_eq!(
        engine.native_device(99).map(|d| d.name().to_string()),
        engine.device_name()
    );

    device.set_modem_bits(serial_link::StatusFlag::ClearToSend.mask());
    assert!(engine.check_cts());
    device.set_modem_bits(0);
    assert!(!engine.check_cts());
}

#[test]
fn construction_failure_names_the_offending_device() {
    let opener = MockOpener::new();
    let result = TransferEngine::with_opener(
        vec!["bad\u{0}1".into(), "bad2".into()],
        Baudrate::Baud9600,
        EngineConfig::default(),
        Arc::new(opener),
    );

    match result {
        Err(EngineError::DeviceInit { name, .. }) => assert!(name.starts_with("bad")),
        other => panic!("expected DeviceInit, got: {other:?}"),
    }
}

#[test]
fn empty_device_list_yields_an_idle_engine() {
    let engine = TransferEngine::with_opener(
        Vec::new(),
        Baudrate::Baud9600,
        EngineConfig::default(),
        Arc::new(MockOpener::new()),
    )
    .expect("engine construction");

    assert_eq!(engine.device_count(), 0);
    assert!(!engine.is_available());
    assert!(engine.device_name().is_none());
    assert!(!engine.connect());
    engine.print("goes nowhere");
    assert_eq!(engine.retrieve_read_buffer(), b"");
}
