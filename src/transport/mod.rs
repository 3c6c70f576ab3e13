//! Request/reply channel between bridge and controller
//!
//! The channel is strictly alternating: the requester sends one
//! [`Request`], then blocks for exactly one [`Reply`] before it may send
//! again. There is no pipelining and a single peer on each side.
//!
//! Two implementations are provided:
//! - [`ZmqRequester`] / [`ZmqResponder`] - ZeroMQ REQ/REP sockets, used
//!   between processes
//! - [`local_pair`] - crossbeam channels, used to run both sides in one
//!   process (tests, embedding)

mod local;
mod zmq_channel;

pub use local::{local_pair, LocalRequester, LocalResponder};
pub use zmq_channel::{ZmqRequester, ZmqResponder};

use crate::error::Result;
use crate::protocol::{Reply, Request};
use std::time::Duration;

/// Client side of the channel
#[cfg_attr(test, mockall::automock)]
pub trait RequestChannel: Send {
    /// Send a request and block for its reply
    fn exchange(&mut self, request: &Request) -> Result<Reply>;

    /// Bound how long [`exchange`](Self::exchange) waits for a reply
    ///
    /// `None` waits forever, which is the normal mode of operation. A bound
    /// is only set for the shutdown handshake.
    fn set_reply_timeout(&mut self, _timeout: Option<Duration>) -> Result<()> {
        Ok(())
    }
}

/// Server side of the channel
#[cfg_attr(test, mockall::automock)]
pub trait ReplyChannel: Send {
    /// Wait for the next request
    ///
    /// Returns `Ok(None)` when the configured receive timeout elapses with
    /// nothing pending, so the caller can check its running flag.
    fn recv_request(&mut self) -> Result<Option<Request>>;

    /// Answer the request last received
    fn send_reply(&mut self, reply: &Reply) -> Result<()>;
}

impl<T: RequestChannel + ?Sized> RequestChannel for Box<T> {
    fn exchange(&mut self, request: &Request) -> Result<Reply> {
        (**self).exchange(request)
    }

    fn set_reply_timeout(&mut self, timeout: Option<Duration>) -> Result<()> {
        (**self).set_reply_timeout(timeout)
    }
}

impl<T: ReplyChannel + ?Sized> ReplyChannel for Box<T> {
    fn recv_request(&mut self) -> Result<Option<Request>> {
        (**self).recv_request()
    }

    fn send_reply(&mut self, reply: &Reply) -> Result<()> {
        (**self).send_reply(reply)
    }
}
