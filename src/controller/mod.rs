//! Board Controller
//!
//! This module contains the loop that owns the hardware link and serves the
//! request/reply channel, one request at a time.
//!
//! # Lifecycle
//!
//! ```text
//! NotAttached --probe ok--> Attached --"quit!"--> terminated
//! ```
//!
//! While not attached every request is still answered: queries and
//! executions get a null snapshot with an `error` of `"board not attached"`,
//! and the code is not run. A probe is attempted at the top of each
//! iteration, spaced by the configured retry delay after a failure, so a
//! missing board never delays a reply by more than one probe call.
//!
//! On attach the status pin (13 by default) is set to OUTPUT and driven HIGH.
//!
//! # Concurrency
//!
//! Everything runs on the caller's thread. The link is touched only from
//! [`BoardController::handle`], which never overlaps with itself.

use crate::error::{BridgeError, Result};
use crate::hardware::{BoardConnector, HardwareLink};
use crate::protocol::{Reply, Request, StateReport};
use crate::scripting::{BoardHandle, CodeExecutor};
use crate::transport::ReplyChannel;
use crate::types::{ConnectionState, PinMode, PinSnapshot, HIGH};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Scheduling settings for the controller loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerSettings {
    /// Minimum time between two loop iterations
    pub poll_interval: Duration,
    /// Minimum time between two failed probes
    pub probe_retry_delay: Duration,
    /// Indicator pin raised once the board is attached
    pub status_pin: u8,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(50),
            probe_retry_delay: Duration::from_millis(500),
            status_pin: 13,
        }
    }
}

/// Counters kept by the controller
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ControllerStats {
    /// Requests answered, including the shutdown acknowledgment
    pub requests: u64,
    /// Code payloads actually run against the board
    pub executions: u64,
    /// Probes that did not produce a link
    pub failed_probes: u64,
}

/// Owns the hardware link and answers requests
pub struct BoardController {
    connector: Box<dyn BoardConnector>,
    board: Option<BoardHandle>,
    executor: CodeExecutor,
    settings: ControllerSettings,
    /// Earliest time the next probe may run; `None` means immediately
    next_probe: Option<Instant>,
    /// Set once the link has been released by a shutdown
    released: bool,
    running: Arc<AtomicBool>,
    last_poll_time: Instant,
    stats: ControllerStats,
}

impl BoardController {
    /// Create a controller that will open its link through `connector`
    pub fn new(connector: Box<dyn BoardConnector>, settings: ControllerSettings) -> Self {
        Self {
            connector,
            board: None,
            executor: CodeExecutor::new(),
            settings,
            next_probe: None,
            released: false,
            running: Arc::new(AtomicBool::new(true)),
            last_poll_time: Instant::now(),
            stats: ControllerStats::default(),
        }
    }

    /// Share a running flag; clearing it stops [`run`](Self::run) after the current iteration
    pub fn with_running_flag(mut self, running: Arc<AtomicBool>) -> Self {
        self.running = running;
        self
    }

    pub fn running_flag(&self) -> Arc<AtomicBool> {
        self.running.clone()
    }

    pub fn state(&self) -> ConnectionState {
        if self.board.is_some() || self.released {
            ConnectionState::Attached
        } else {
            ConnectionState::NotAttached
        }
    }

    pub fn stats(&self) -> ControllerStats {
        self.stats
    }

    pub fn settings(&self) -> &ControllerSettings {
        &self.settings
    }

    /// Probe for the board if not attached and the retry delay has passed
    ///
    /// Returns whether a link is held afterwards.
    pub fn maybe_probe(&mut self) -> bool {
        if self.board.is_some() {
            return true;
        }
        if self.released {
            return false;
        }
        if let Some(at) = self.next_probe {
            if Instant::now() < at {
                return false;
            }
        }

        match self.connector.probe() {
            Ok(link) => {
                self.attach(link);
                true
            }
            Err(e) => {
                self.stats.failed_probes += 1;
                self.next_probe = Some(Instant::now() + self.settings.probe_retry_delay);
                tracing::debug!(
                    "Probe of {} failed (attempt {}): {}",
                    self.connector.describe(),
                    self.stats.failed_probes,
                    e
                );
                false
            }
        }
    }

    fn attach(&mut self, link: Box<dyn HardwareLink>) {
        let board = BoardHandle::new(link);
        let pin = self.settings.status_pin;

        let indicator = board.with_link(|link| {
            link.set_pin_mode(pin, PinMode::Output)?;
            link.digital_write(pin, HIGH)
        });
        if let Err(e) = indicator {
            tracing::warn!("Failed to raise status pin {}: {}", pin, e);
        }

        tracing::info!("Attached to {}", self.connector.describe());
        self.board = Some(board);
    }

    /// Answer one request
    pub fn handle(&mut self, request: Request) -> Reply {
        self.stats.requests += 1;

        match request {
            Request::Shutdown => {
                self.release();
                Reply::Quit
            }
            Request::Query => Reply::State(self.query()),
            Request::Execute(code) if code.trim().is_empty() => Reply::State(self.query()),
            Request::Execute(code) => Reply::State(self.execute(&code)),
        }
    }

    fn query(&self) -> StateReport {
        match &self.board {
            Some(board) => StateReport::query(read_or_unavailable(board)),
            None => self.unattached_report(),
        }
    }

    fn execute(&mut self, code: &str) -> StateReport {
        let Some(board) = &self.board else {
            return self.unattached_report();
        };

        self.stats.executions += 1;
        tracing::debug!("Executing payload: {}", code);
        let output = self.executor.execute(code, board);
        StateReport::executed(output, read_or_unavailable(board))
    }

    fn unattached_report(&self) -> StateReport {
        let reason = if self.released {
            BridgeError::Hardware("board released".to_string())
        } else {
            BridgeError::NotAttached
        };
        StateReport::failed(reason.to_string())
    }

    fn release(&mut self) {
        if let Some(board) = self.board.take() {
            match board.release() {
                Ok(()) => tracing::info!("Board released"),
                Err(e) => tracing::error!("Failed to release board: {}", e),
            }
            self.released = true;
        }
    }

    /// Serve requests until a shutdown is received or the running flag clears
    ///
    /// Channel failures end the loop with an error.
    pub fn run(&mut self, channel: &mut dyn ReplyChannel) -> Result<()> {
        tracing::info!("Board controller started");

        let result = self.serve(channel);
        if let Err(e) = &result {
            tracing::error!("Board controller stopping on channel failure: {}", e);
        }

        // Stopped by the running flag or a failure rather than "quit!"
        self.release();
        self.running.store(false, Ordering::SeqCst);
        tracing::info!("Board controller stopped after {} requests", self.stats.requests);
        result
    }

    fn serve(&mut self, channel: &mut dyn ReplyChannel) -> Result<()> {
        while self.running.load(Ordering::SeqCst) {
            self.maybe_probe();

            let Some(request) = channel.recv_request()? else {
                continue;
            };

            let reply = self.handle(request);
            channel.send_reply(&reply)?;
            if reply.is_quit() {
                break;
            }

            self.rate_limit();
        }
        Ok(())
    }

    fn rate_limit(&mut self) {
        let elapsed = self.last_poll_time.elapsed();
        if elapsed < self.settings.poll_interval {
            std::thread::sleep(self.settings.poll_interval - elapsed);
        }
        self.last_poll_time = Instant::now();
    }
}

fn read_or_unavailable(board: &BoardHandle) -> PinSnapshot {
    board.snapshot().unwrap_or_else(|e| {
        tracing::warn!("Failed to read snapshot: {}", e);
        PinSnapshot::unavailable()
    })
}
