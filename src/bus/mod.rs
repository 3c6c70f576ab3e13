//! Topic bus adapters
//!
//! Messages on the bus are JSON objects `{"topic": .., "payload": ..}`.
//! Inbound payloads of interest are code strings; outbound payloads are the
//! controller's `result` object (or an empty string for the readiness ping).
//!
//! [`BusSource`] and [`BusSink`] are implemented for ZeroMQ SUB/PUB sockets
//! ([`ZmqBusSource`], [`ZmqBusSink`]) and for crossbeam channel ends, which
//! is how tests and embedders drive the bridge without a broker.

mod channel;
mod zmq_bus;

pub use zmq_bus::{ZmqBusSink, ZmqBusSource};

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One message on the bus
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusMessage {
    pub topic: String,
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl BusMessage {
    pub fn new(topic: impl Into<String>, payload: impl Into<serde_json::Value>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }

    /// The payload as a code string, if it is one
    pub fn code(&self) -> Option<&str> {
        self.payload.as_str()
    }
}

/// Inbound side of the bus
pub trait BusSource: Send {
    /// Wait up to `timeout` for the next message
    fn read(&mut self, timeout: Duration) -> Result<Option<BusMessage>>;
}

/// Outbound side of the bus
pub trait BusSink: Send {
    fn publish(&mut self, message: &BusMessage) -> Result<()>;
}

impl<T: BusSource + ?Sized> BusSource for Box<T> {
    fn read(&mut self, timeout: Duration) -> Result<Option<BusMessage>> {
        (**self).read(timeout)
    }
}

impl<T: BusSink + ?Sized> BusSink for Box<T> {
    fn publish(&mut self, message: &BusMessage) -> Result<()> {
        (**self).publish(message)
    }
}
