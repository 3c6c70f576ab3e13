//! Single-slot mailbox between the bus receiver and the bridge loop

use crate::bus::BusMessage;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

/// Holds at most one pending inbound message
///
/// A new message replaces any unconsumed one. The lock is held only for the
/// swap itself.
#[derive(Debug, Default)]
pub struct Mailbox {
    slot: Mutex<Option<BusMessage>>,
    overwritten: AtomicU64,
}

impl Mailbox {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self) -> MutexGuard<'_, Option<BusMessage>> {
        // The slot holds plain data, so a poisoned lock is still consistent
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Store a message, returning the one it displaced
    pub fn put(&self, message: BusMessage) -> Option<BusMessage> {
        let displaced = self.slot().replace(message);
        if displaced.is_some() {
            self.overwritten.fetch_add(1, Ordering::Relaxed);
        }
        displaced
    }

    /// Remove and return the pending message
    pub fn take(&self) -> Option<BusMessage> {
        self.slot().take()
    }

    /// Copy of the pending message, leaving it in place
    pub fn peek(&self) -> Option<BusMessage> {
        self.slot().clone()
    }

    /// Number of messages dropped because a newer one arrived first
    pub fn overwritten(&self) -> u64 {
        self.overwritten.load(Ordering::Relaxed)
    }
}
