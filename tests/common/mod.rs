//! Common test utilities and helpers

#![allow(dead_code)] // Test utilities may not all be used in every test file

pub mod mock_helpers;

use arduino_bridge::controller::{BoardController, ControllerSettings};
use arduino_bridge::error::Result;
use arduino_bridge::hardware::BoardConnector;
use arduino_bridge::protocol::{Reply, Request};
use arduino_bridge::transport::{local_pair, LocalRequester, RequestChannel};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Upper bound for anything a test waits on
pub fn test_timeout() -> Duration {
    Duration::from_secs(5)
}

/// Controller settings with no sleeping
pub fn fast_controller_settings() -> ControllerSettings {
    ControllerSettings {
        poll_interval: Duration::ZERO,
        probe_retry_delay: Duration::ZERO,
        status_pin: 13,
    }
}

/// Run a controller on its own thread behind an in-process channel
///
/// The thread returns the controller once its loop ends so tests can
/// inspect its final state.
pub fn spawn_controller<C>(connector: C) -> (LocalRequester, JoinHandle<(BoardController, Result<()>)>)
where
    C: BoardConnector + 'static,
{
    let (requester, mut responder) = local_pair();
    let handle = std::thread::spawn(move || {
        let mut controller = BoardController::new(Box::new(connector), fast_controller_settings());
        let result = controller.run(&mut responder);
        (controller, result)
    });
    (requester, handle)
}

/// Poll `condition` until it holds or the test timeout passes
pub fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + test_timeout();
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    condition()
}

/// Request channel that records every request as its wire JSON
pub struct RecordingChannel<C> {
    inner: C,
    sent: Arc<Mutex<Vec<serde_json::Value>>>,
}

impl<C: RequestChannel> RecordingChannel<C> {
    pub fn new(inner: C) -> (Self, Arc<Mutex<Vec<serde_json::Value>>>) {
        let sent = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                inner,
                sent: sent.clone(),
            },
            sent,
        )
    }
}

impl<C: RequestChannel> RequestChannel for RecordingChannel<C> {
    fn exchange(&mut self, request: &Request) -> Result<Reply> {
        self.sent
            .lock()
            .unwrap()
            .push(serde_json::to_value(request).unwrap());
        self.inner.exchange(request)
    }

    fn set_reply_timeout(&mut self, timeout: Option<Duration>) -> Result<()> {
        self.inner.set_reply_timeout(timeout)
    }
}
