//! ZeroMQ SUB/PUB bus endpoints
//!
//! Both sockets connect to a broker (an XSUB/XPUB proxy run by the host
//! application); the bridge never binds bus ports itself.

use super::{BusMessage, BusSink, BusSource};
use crate::error::{BridgeError, Result, ResultExt};
use std::time::Duration;

/// Subscriber receiving every topic
pub struct ZmqBusSource {
    socket: zmq::Socket,
}

impl ZmqBusSource {
    pub fn connect(endpoint: &str) -> Result<Self> {
        Self::connect_with(&zmq::Context::new(), endpoint)
    }

    pub fn connect_with(context: &zmq::Context, endpoint: &str) -> Result<Self> {
        let socket = context.socket(zmq::SUB)?;
        socket.set_linger(0)?;
        socket.set_subscribe(b"")?;
        socket
            .connect(endpoint)
            .with_context(|| format!("Failed to connect bus subscriber to {}", endpoint))?;
        tracing::info!("Bus subscriber connected to {}", endpoint);
        Ok(Self { socket })
    }

    /// Bind instead of connect, for tests that play the broker
    pub fn bind(endpoint: &str) -> Result<Self> {
        let socket = zmq::Context::new().socket(zmq::SUB)?;
        socket.set_linger(0)?;
        socket.set_subscribe(b"")?;
        socket
            .bind(endpoint)
            .with_context(|| format!("Failed to bind bus subscriber to {}", endpoint))?;
        Ok(Self { socket })
    }

    pub fn local_endpoint(&self) -> Result<String> {
        last_endpoint(&self.socket)
    }
}

impl BusSource for ZmqBusSource {
    fn read(&mut self, timeout: Duration) -> Result<Option<BusMessage>> {
        let timeout_ms = i64::try_from(timeout.as_millis()).unwrap_or(i64::MAX);
        if self.socket.poll(zmq::POLLIN, timeout_ms)? == 0 {
            return Ok(None);
        }

        let bytes = self.socket.recv_bytes(0)?;
        match serde_json::from_slice::<BusMessage>(&bytes) {
            Ok(message) => Ok(Some(message)),
            Err(e) => {
                tracing::warn!(
                    "Dropping malformed bus message {:?}: {}",
                    String::from_utf8_lossy(&bytes),
                    e
                );
                Ok(None)
            }
        }
    }
}

/// Publisher for replies and the readiness ping
pub struct ZmqBusSink {
    socket: zmq::Socket,
}

impl ZmqBusSink {
    pub fn connect(endpoint: &str) -> Result<Self> {
        Self::connect_with(&zmq::Context::new(), endpoint)
    }

    pub fn connect_with(context: &zmq::Context, endpoint: &str) -> Result<Self> {
        let socket = context.socket(zmq::PUB)?;
        socket.set_linger(0)?;
        socket
            .connect(endpoint)
            .with_context(|| format!("Failed to connect bus publisher to {}", endpoint))?;
        tracing::info!("Bus publisher connected to {}", endpoint);
        Ok(Self { socket })
    }
}

impl BusSink for ZmqBusSink {
    fn publish(&mut self, message: &BusMessage) -> Result<()> {
        let bytes = serde_json::to_vec(message)?;
        self.socket
            .send(bytes, 0)
            .map_err(|e| BridgeError::Bus(format!("publish on '{}' failed: {}", message.topic, e)))
    }
}

fn last_endpoint(socket: &zmq::Socket) -> Result<String> {
    socket
        .get_last_endpoint()?
        .map_err(|raw| BridgeError::Protocol(format!("non UTF-8 endpoint {:?}", raw)))
}
