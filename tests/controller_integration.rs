//! Integration tests for the board controller
//!
//! These tests drive a controller through a real channel:
//! - Snapshot shape for queries in every connection state
//! - Shutdown handshake and loop termination
//! - Not-attached handling and probe retry
//! - End to end over ZeroMQ

mod common;

use arduino_bridge::controller::BoardController;
use arduino_bridge::error::BridgeError;
use arduino_bridge::hardware::{AnalogPattern, HardwareLink, SimulatedConnector};
use arduino_bridge::protocol::{Reply, Request};
use arduino_bridge::transport::{RequestChannel, ZmqRequester, ZmqResponder};
use arduino_bridge::types::{ConnectionState, PinMode, SNAPSHOT_ENTRIES};
use common::mock_helpers::deterministic_connector;
use common::{fast_controller_settings, spawn_controller};
use std::thread;

fn absent_board() -> impl FnMut() -> arduino_bridge::Result<Box<dyn HardwareLink>> + Send {
    || Err(BridgeError::Hardware("no board on any port".to_string()))
}

#[test]
fn test_query_snapshot_is_complete_when_attached() {
    let (mut channel, handle) = spawn_controller(SimulatedConnector::default());

    let reply = channel.exchange(&Request::Query).unwrap();
    let value = reply.result_value().unwrap();
    assert_eq!(value.as_object().unwrap().len(), SNAPSHOT_ENTRIES + 12);
    assert!(reply.snapshot().unwrap().is_complete());
    assert!(reply.error().is_none());

    assert_eq!(channel.exchange(&Request::Shutdown).unwrap(), Reply::Quit);
    let (controller, result) = handle.join().unwrap();
    result.unwrap();
    assert_eq!(controller.state(), ConnectionState::Attached);
}

#[test]
fn test_query_snapshot_is_complete_when_not_attached() {
    let (mut channel, handle) = spawn_controller(absent_board());

    let reply = channel.exchange(&Request::Query).unwrap();
    let value = reply.result_value().unwrap();
    let object = value.as_object().unwrap();
    assert_eq!(object.len(), SNAPSHOT_ENTRIES + 12 + 1);
    assert!(object["digital_pin_2"].is_null());
    assert!(object["analog_pin_7"].is_null());
    assert_eq!(object["error"], "board not attached");

    channel.exchange(&Request::Shutdown).unwrap();
    handle.join().unwrap().1.unwrap();
}

#[test]
fn test_shutdown_acknowledges_and_stops() {
    let connector = SimulatedConnector::default();
    let observer = connector.clone();
    let (mut channel, handle) = spawn_controller(connector);

    channel.exchange(&Request::Query).unwrap();
    assert_eq!(channel.exchange(&Request::Shutdown).unwrap(), Reply::Quit);

    let (controller, result) = handle.join().unwrap();
    result.unwrap();
    assert!(observer.released());
    assert_eq!(controller.stats().requests, 2);

    // The loop has exited, so nobody is left to answer
    assert!(channel.exchange(&Request::Query).is_err());
}

#[test]
fn test_repeated_requests_while_not_attached() {
    let (mut channel, handle) = spawn_controller(absent_board());

    for i in 0..25 {
        let request = if i % 2 == 0 {
            Request::Query
        } else {
            Request::Execute("board.digital_write(13, 1)".to_string())
        };
        let reply = channel.exchange(&request).unwrap();
        assert_eq!(reply.error(), Some("board not attached"));
        assert_eq!(reply.snapshot().unwrap().len(), SNAPSHOT_ENTRIES);
        assert!(reply.output().is_none());
    }

    assert_eq!(channel.exchange(&Request::Shutdown).unwrap(), Reply::Quit);
    let (controller, result) = handle.join().unwrap();
    result.unwrap();
    assert_eq!(controller.state(), ConnectionState::NotAttached);
    assert_eq!(controller.stats().executions, 0);
}

#[test]
fn test_empty_execute_matches_query() {
    let (mut channel, handle) = spawn_controller(deterministic_connector());

    let query = channel.exchange(&Request::Query).unwrap();
    let empty = channel.exchange(&Request::Execute(String::new())).unwrap();
    assert_eq!(query, empty);

    let snapshot = query.snapshot().unwrap();
    assert_eq!(snapshot.digital(3).unwrap().value, Some(1));
    assert_eq!(snapshot.digital(4).unwrap().value, Some(0));
    assert_eq!(snapshot.digital(4).unwrap().mode, Some(PinMode::Input));
    assert_eq!(snapshot.analog(5).unwrap().value, Some(503));

    channel.exchange(&Request::Shutdown).unwrap();
    handle.join().unwrap().1.unwrap();
}

#[test]
fn test_board_attaches_after_failed_probes() {
    let connector = SimulatedConnector::new(3, AnalogPattern::Constant { value: 42 });
    let observer = connector.clone();
    let (mut channel, handle) = spawn_controller(connector);

    let mut not_attached = 0;
    let reply = loop {
        let reply = channel.exchange(&Request::Query).unwrap();
        if reply.error().is_none() {
            break reply;
        }
        not_attached += 1;
        assert!(not_attached < 10, "board never attached");
    };

    assert_eq!(not_attached, 3);
    assert_eq!(observer.attempts(), 4);
    let snapshot = reply.snapshot().unwrap();
    assert_eq!(snapshot.analog(0).unwrap().value, Some(42));
    // Status pin raised on attach
    assert_eq!(snapshot.digital(13).unwrap().value, Some(1));
    assert_eq!(snapshot.digital(13).unwrap().mode, Some(PinMode::Output));

    channel.exchange(&Request::Shutdown).unwrap();
    let (controller, _) = handle.join().unwrap();
    assert_eq!(controller.stats().failed_probes, 3);
}

#[test]
fn test_code_error_is_contained() {
    let (mut channel, handle) = spawn_controller(SimulatedConnector::default());

    let reply = channel
        .exchange(&Request::Execute("board.analog_write(2, 10)".to_string()))
        .unwrap();
    let output = reply.output().unwrap();
    assert!(output.contains("PWM"), "unexpected output: {}", output);
    assert!(reply.snapshot().unwrap().is_complete());

    let reply = channel
        .exchange(&Request::Execute("board.set_pin_mode(2, Constants.PWM); board.analog_write(2, 10)".to_string()))
        .unwrap();
    assert_eq!(reply.output(), Some("None"));
    assert_eq!(reply.snapshot().unwrap().digital(2).unwrap().mode, Some(PinMode::Pwm));

    channel.exchange(&Request::Shutdown).unwrap();
    handle.join().unwrap().1.unwrap();
}

#[test]
fn test_controller_over_zmq() {
    let mut responder = ZmqResponder::bind("tcp://127.0.0.1:*").unwrap();
    let endpoint = responder.local_endpoint().unwrap();

    let server = thread::spawn(move || {
        let mut controller =
            BoardController::new(Box::new(SimulatedConnector::default()), fast_controller_settings());
        controller.run(&mut responder)
    });

    let mut requester = ZmqRequester::connect(&endpoint).unwrap();
    let reply = requester
        .exchange(&Request::Execute("2+2".to_string()))
        .unwrap();
    assert_eq!(reply.output(), Some("4"));
    assert_eq!(reply.snapshot().unwrap().len(), SNAPSHOT_ENTRIES);

    assert!(requester.exchange(&Request::Shutdown).unwrap().is_quit());
    server.join().unwrap().unwrap();
}
