//! Crossbeam channel ends as bus endpoints

use super::{BusMessage, BusSink, BusSource};
use crate::error::{BridgeError, Result};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use std::time::Duration;

impl BusSource for Receiver<BusMessage> {
    fn read(&mut self, timeout: Duration) -> Result<Option<BusMessage>> {
        match self.recv_timeout(timeout) {
            Ok(message) => Ok(Some(message)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => {
                Err(BridgeError::Bus("inbound channel disconnected".to_string()))
            }
        }
    }
}

impl BusSink for Sender<BusMessage> {
    fn publish(&mut self, message: &BusMessage) -> Result<()> {
        self.send(message.clone())
            .map_err(|_| BridgeError::Bus("outbound channel disconnected".to_string()))
    }
}
