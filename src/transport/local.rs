//! In-process channel pair

use super::{ReplyChannel, RequestChannel};
use crate::error::{BridgeError, Result};
use crate::protocol::{Reply, Request};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use std::time::Duration;

/// Requester half of [`local_pair`]
pub struct LocalRequester {
    requests: Sender<Request>,
    replies: Receiver<Reply>,
    reply_timeout: Option<Duration>,
}

/// Responder half of [`local_pair`]
pub struct LocalResponder {
    requests: Receiver<Request>,
    replies: Sender<Reply>,
    poll_timeout: Option<Duration>,
}

/// Create a connected requester/responder pair
///
/// Both directions are rendezvous-sized (capacity 1), which preserves the
/// strict alternation of the socket based channel.
pub fn local_pair() -> (LocalRequester, LocalResponder) {
    let (request_tx, request_rx) = bounded(1);
    let (reply_tx, reply_rx) = bounded(1);
    (
        LocalRequester {
            requests: request_tx,
            replies: reply_rx,
            reply_timeout: None,
        },
        LocalResponder {
            requests: request_rx,
            replies: reply_tx,
            poll_timeout: None,
        },
    )
}

impl LocalResponder {
    /// Make [`recv_request`](ReplyChannel::recv_request) return `None` after `timeout`
    pub fn with_poll_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.poll_timeout = timeout;
        self
    }
}

fn disconnected(side: &str) -> BridgeError {
    BridgeError::Channel(format!("{} side of local channel disconnected", side))
}

impl RequestChannel for LocalRequester {
    fn exchange(&mut self, request: &Request) -> Result<Reply> {
        self.requests
            .send(request.clone())
            .map_err(|_| disconnected("responder"))?;

        match self.reply_timeout {
            None => self.replies.recv().map_err(|_| disconnected("responder")),
            Some(timeout) => self.replies.recv_timeout(timeout).map_err(|e| match e {
                RecvTimeoutError::Timeout => {
                    BridgeError::Channel(format!("no reply within {:?}", timeout))
                }
                RecvTimeoutError::Disconnected => disconnected("responder"),
            }),
        }
    }

    fn set_reply_timeout(&mut self, timeout: Option<Duration>) -> Result<()> {
        self.reply_timeout = timeout;
        Ok(())
    }
}

impl ReplyChannel for LocalResponder {
    fn recv_request(&mut self) -> Result<Option<Request>> {
        match self.poll_timeout {
            None => self
                .requests
                .recv()
                .map(Some)
                .map_err(|_| disconnected("requester")),
            Some(timeout) => match self.requests.recv_timeout(timeout) {
                Ok(request) => Ok(Some(request)),
                Err(RecvTimeoutError::Timeout) => Ok(None),
                Err(RecvTimeoutError::Disconnected) => Err(disconnected("requester")),
            },
        }
    }

    fn send_reply(&mut self, reply: &Reply) -> Result<()> {
        self.replies
            .send(reply.clone())
            .map_err(|_| disconnected("requester"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_local_exchange() {
        let (mut requester, mut responder) = local_pair();
        let server = thread::spawn(move || {
            let request = responder.recv_request().unwrap();
            responder.send_reply(&Reply::Quit).unwrap();
            request
        });

        assert_eq!(requester.exchange(&Request::Shutdown).unwrap(), Reply::Quit);
        assert_eq!(server.join().unwrap(), Some(Request::Shutdown));
    }

    #[test]
    fn test_dropped_responder_is_an_error() {
        let (mut requester, responder) = local_pair();
        drop(responder);
        assert!(matches!(
            requester.exchange(&Request::Query),
            Err(BridgeError::Channel(_))
        ));
    }

    #[test]
    fn test_reply_timeout() {
        let (mut requester, _responder) = local_pair();
        requester
            .set_reply_timeout(Some(Duration::from_millis(10)))
            .unwrap();
        assert!(requester.exchange(&Request::Query).is_err());
    }

    #[test]
    fn test_poll_timeout() {
        let (_requester, responder) = local_pair();
        let mut responder = responder.with_poll_timeout(Some(Duration::from_millis(10)));
        assert_eq!(responder.recv_request().unwrap(), None);
    }
}
