//! ZeroMQ REQ/REP implementation

use super::{ReplyChannel, RequestChannel};
use crate::error::{BridgeError, Result, ResultExt};
use crate::protocol::{decode, encode, Reply, Request};
use std::time::Duration;

/// Time a closing responder keeps trying to flush its last reply
const RESPONDER_LINGER_MS: i32 = 1000;

fn timeout_ms(timeout: Option<Duration>) -> i32 {
    timeout
        .map(|t| i32::try_from(t.as_millis()).unwrap_or(i32::MAX))
        .unwrap_or(-1)
}

/// Connecting REQ socket held by the bridge
pub struct ZmqRequester {
    socket: zmq::Socket,
    endpoint: String,
}

impl ZmqRequester {
    /// Connect to a controller endpoint, e.g. `tcp://localhost:38782`
    ///
    /// ZeroMQ connects lazily, so this succeeds before the controller is up.
    pub fn connect(endpoint: &str) -> Result<Self> {
        let context = zmq::Context::new();
        Self::connect_with(&context, endpoint)
    }

    /// Connect using an existing context
    pub fn connect_with(context: &zmq::Context, endpoint: &str) -> Result<Self> {
        let socket = context.socket(zmq::REQ)?;
        socket.set_linger(0)?;
        socket
            .connect(endpoint)
            .with_context(|| format!("Failed to connect to {}", endpoint))?;
        tracing::info!("Request channel connected to {}", endpoint);

        Ok(Self {
            socket,
            endpoint: endpoint.to_string(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl RequestChannel for ZmqRequester {
    fn exchange(&mut self, request: &Request) -> Result<Reply> {
        let bytes = encode(request)?;
        self.socket.send(bytes, 0).context("Failed to send request")?;

        match self.socket.recv_bytes(0) {
            Ok(bytes) => decode(&bytes),
            Err(zmq::Error::EAGAIN) => Err(BridgeError::Transport(zmq::Error::EAGAIN)
                .with_context(format!("No reply from {} within timeout", self.endpoint))),
            Err(e) => Err(BridgeError::from(e).with_context("Failed to receive reply")),
        }
    }

    fn set_reply_timeout(&mut self, timeout: Option<Duration>) -> Result<()> {
        self.socket.set_rcvtimeo(timeout_ms(timeout))?;
        Ok(())
    }
}

/// Bound REP socket held by the controller
pub struct ZmqResponder {
    socket: zmq::Socket,
    poll_timeout: Option<Duration>,
}

impl ZmqResponder {
    /// Bind a reply endpoint, e.g. `tcp://*:38782`
    pub fn bind(endpoint: &str) -> Result<Self> {
        let context = zmq::Context::new();
        Self::bind_with(&context, endpoint)
    }

    /// Bind using an existing context
    pub fn bind_with(context: &zmq::Context, endpoint: &str) -> Result<Self> {
        let socket = context.socket(zmq::REP)?;
        socket.set_linger(RESPONDER_LINGER_MS)?;
        socket
            .bind(endpoint)
            .with_context(|| format!("Failed to bind {}", endpoint))?;

        let responder = Self {
            socket,
            poll_timeout: None,
        };
        tracing::info!("Reply channel bound to {}", responder.local_endpoint()?);
        Ok(responder)
    }

    /// Make [`recv_request`](ReplyChannel::recv_request) return `None` after `timeout`
    pub fn with_poll_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.poll_timeout = timeout;
        self
    }

    /// The resolved endpoint, with any wildcard port filled in
    pub fn local_endpoint(&self) -> Result<String> {
        self.socket
            .get_last_endpoint()?
            .map_err(|raw| BridgeError::Protocol(format!("non UTF-8 endpoint {:?}", raw)))
    }
}

impl ReplyChannel for ZmqResponder {
    fn recv_request(&mut self) -> Result<Option<Request>> {
        if self.poll_timeout.is_some() {
            let ready = self
                .socket
                .poll(zmq::POLLIN, i64::from(timeout_ms(self.poll_timeout)))?;
            if ready == 0 {
                return Ok(None);
            }
        }

        let bytes = self.socket.recv_bytes(0).context("Failed to receive request")?;
        decode(&bytes).map(Some)
    }

    fn send_reply(&mut self, reply: &Reply) -> Result<()> {
        let bytes = encode(reply)?;
        self.socket.send(bytes, 0).context("Failed to send reply")?;
        Ok(())
    }
}
