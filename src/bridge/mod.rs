//! Bridge Client
//!
//! Adapts the topic bus to the controller's request/reply channel.
//!
//! # Flow
//!
//! A [`BusReceiver`] thread keeps the newest inbound message in a
//! [`Mailbox`]. Each iteration of [`BridgeClient::step`]:
//!
//! 1. Takes the pending message, if any
//! 2. Turns it into a [`Request`]: a code payload on the controller topic is
//!    forwarded, anything else (no message, other topic, non-string payload)
//!    becomes a query so snapshots keep flowing
//! 3. Exchanges it with the controller
//! 4. On the first reply from an attached board only, publishes an empty
//!    readiness ping on the init topic
//! 5. Republishes the reply's `result` on the controller topic
//!
//! Bus payloads are forwarded verbatim as code, except the quit sentinel:
//! it is never forwarded from the bus, and only [`BridgeClient::shutdown`]
//! sends it.

mod mailbox;
mod receiver;

pub use mailbox::Mailbox;
pub use receiver::BusReceiver;

use crate::bus::{BusMessage, BusSink};
use crate::error::{BridgeError, Result};
use crate::protocol::{Reply, Request};
use crate::transport::RequestChannel;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Settings for the bridge loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeSettings {
    /// Topic carrying code payloads in and replies out
    pub topic: String,
    /// Topic of the one-time readiness ping
    pub init_topic: String,
    /// Minimum time between two exchanges
    pub poll_interval: Duration,
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            topic: "eim/arduino".to_string(),
            init_topic: "eim/arduino/init".to_string(),
            poll_interval: Duration::from_millis(50),
        }
    }
}

/// Counters kept by the bridge
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BridgeStats {
    /// Completed request/reply exchanges
    pub exchanges: u64,
    /// Exchanges that carried a code payload
    pub forwarded: u64,
    /// Messages published on the bus
    pub published: u64,
}

/// Main loop of the bridge process
pub struct BridgeClient {
    channel: Box<dyn RequestChannel>,
    sink: Box<dyn BusSink>,
    mailbox: Arc<Mailbox>,
    settings: BridgeSettings,
    init_sent: bool,
    running: Arc<AtomicBool>,
    last_poll_time: Instant,
    stats: BridgeStats,
}

impl BridgeClient {
    pub fn new(
        channel: Box<dyn RequestChannel>,
        sink: Box<dyn BusSink>,
        mailbox: Arc<Mailbox>,
        settings: BridgeSettings,
    ) -> Self {
        Self {
            channel,
            sink,
            mailbox,
            settings,
            init_sent: false,
            running: Arc::new(AtomicBool::new(true)),
            last_poll_time: Instant::now(),
            stats: BridgeStats::default(),
        }
    }

    /// Share a running flag; clearing it stops [`run`](Self::run) after the current exchange
    pub fn with_running_flag(mut self, running: Arc<AtomicBool>) -> Self {
        self.running = running;
        self
    }

    pub fn running_flag(&self) -> Arc<AtomicBool> {
        self.running.clone()
    }

    pub fn mailbox(&self) -> &Arc<Mailbox> {
        &self.mailbox
    }

    pub fn stats(&self) -> BridgeStats {
        self.stats
    }

    /// Whether the readiness ping has gone out
    pub fn is_initialized(&self) -> bool {
        self.init_sent
    }

    /// Take the pending message and map it to a request
    pub fn next_request(&self) -> Request {
        let Some(message) = self.mailbox.take() else {
            return Request::Query;
        };

        if message.topic != self.settings.topic {
            tracing::trace!("Ignoring message on '{}'", message.topic);
            return Request::Query;
        }

        match Request::from_code(message.code()) {
            Request::Shutdown => {
                tracing::warn!("Refusing quit sentinel received from the bus");
                Request::Query
            }
            request => request,
        }
    }

    /// One exchange with the controller plus republishing
    pub fn step(&mut self) -> Result<Reply> {
        let request = self.next_request();
        if let Request::Execute(code) = &request {
            tracing::debug!("Forwarding payload: {}", code);
            self.stats.forwarded += 1;
        }

        let reply = self.channel.exchange(&request)?;
        self.stats.exchanges += 1;

        if let Some(error) = reply.error() {
            tracing::debug!("Controller reported: {}", error);
        }

        if !self.init_sent && reply.error().is_none() {
            self.publish(BusMessage::new(self.settings.init_topic.clone(), ""))?;
            self.init_sent = true;
            tracing::info!("Bridge ready, sent '{}'", self.settings.init_topic);
        }

        let result = reply.result_value()?;
        self.publish(BusMessage::new(self.settings.topic.clone(), result))?;
        Ok(reply)
    }

    fn publish(&mut self, message: BusMessage) -> Result<()> {
        self.sink.publish(&message)?;
        self.stats.published += 1;
        Ok(())
    }

    /// Exchange until the running flag clears
    pub fn run(&mut self) -> Result<()> {
        tracing::info!("Bridge client started on topic '{}'", self.settings.topic);

        while self.running.load(Ordering::SeqCst) {
            if let Err(e) = self.step() {
                tracing::error!("Bridge exchange failed: {}", e);
                self.running.store(false, Ordering::SeqCst);
                return Err(e);
            }
            self.rate_limit();
        }

        tracing::info!("Bridge client stopped after {} exchanges", self.stats.exchanges);
        Ok(())
    }

    /// Send the quit sentinel and wait up to `timeout` for the acknowledgment
    pub fn shutdown(&mut self, timeout: Duration) -> Result<()> {
        self.running.store(false, Ordering::SeqCst);
        self.channel.set_reply_timeout(Some(timeout))?;

        match self.channel.exchange(&Request::Shutdown)? {
            Reply::Quit => {
                tracing::info!("Controller acknowledged shutdown");
                Ok(())
            }
            other => Err(BridgeError::Protocol(format!(
                "expected quit acknowledgment, got {:?}",
                other
            ))),
        }
    }

    fn rate_limit(&mut self) {
        let elapsed = self.last_poll_time.elapsed();
        if elapsed < self.settings.poll_interval {
            std::thread::sleep(self.settings.poll_interval - elapsed);
        }
        self.last_poll_time = Instant::now();
    }
}
