//! Background thread draining the bus into the mailbox

use super::Mailbox;
use crate::bus::BusSource;
use crate::error::{BridgeError, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// Handle to the running receiver thread
pub struct BusReceiver {
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl BusReceiver {
    /// Start draining `source` into `mailbox`
    ///
    /// `read_timeout` bounds how long a stop request can go unnoticed. A bus
    /// failure stops the receiver and clears `running`, which also stops
    /// anything else sharing the flag.
    pub fn spawn(
        mut source: Box<dyn BusSource>,
        mailbox: Arc<Mailbox>,
        running: Arc<AtomicBool>,
        read_timeout: Duration,
    ) -> Result<Self> {
        let flag = running.clone();
        let handle = std::thread::Builder::new()
            .name("bus-receiver".to_string())
            .spawn(move || {
                tracing::debug!("Bus receiver started");
                while flag.load(Ordering::SeqCst) {
                    match source.read(read_timeout) {
                        Ok(Some(message)) => {
                            if let Some(displaced) = mailbox.put(message) {
                                tracing::trace!("Dropped unconsumed message on '{}'", displaced.topic);
                            }
                        }
                        Ok(None) => {}
                        Err(e) => {
                            tracing::error!("Bus receiver failed: {}", e);
                            flag.store(false, Ordering::SeqCst);
                        }
                    }
                }
                tracing::debug!("Bus receiver stopped");
            })?;

        Ok(Self {
            running,
            handle: Some(handle),
        })
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Clear the running flag and wait for the thread
    pub fn stop(&mut self) -> Result<()> {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            handle
                .join()
                .map_err(|_| BridgeError::Bus("bus receiver thread panicked".to_string()))?;
        }
        Ok(())
    }
}

impl Drop for BusReceiver {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            tracing::error!("{}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::BusMessage;
    use crossbeam_channel::unbounded;
    use std::time::Instant;

    #[test]
    fn test_receiver_fills_mailbox() {
        let (tx, rx) = unbounded();
        let mailbox = Arc::new(Mailbox::new());
        let running = Arc::new(AtomicBool::new(true));
        let mut receiver = BusReceiver::spawn(
            Box::new(rx),
            mailbox.clone(),
            running,
            Duration::from_millis(10),
        )
        .unwrap();

        tx.send(BusMessage::new("eim/arduino", "1")).unwrap();
        let deadline = Instant::now() + Duration::from_secs(2);
        while mailbox.peek().is_none() {
            assert!(Instant::now() < deadline);
            std::thread::sleep(Duration::from_millis(1));
        }
        receiver.stop().unwrap();
        assert!(!receiver.is_running());
        assert_eq!(mailbox.take(), Some(BusMessage::new("eim/arduino", "1")));
    }

    #[test]
    fn test_source_failure_clears_running() {
        let (tx, rx) = unbounded::<BusMessage>();
        drop(tx);
        let running = Arc::new(AtomicBool::new(true));
        let mut receiver = BusReceiver::spawn(
            Box::new(rx),
            Arc::new(Mailbox::new()),
            running.clone(),
            Duration::from_millis(10),
        )
        .unwrap();

        let deadline = Instant::now() + Duration::from_secs(2);
        while running.load(Ordering::SeqCst) {
            assert!(Instant::now() < deadline);
            std::thread::sleep(Duration::from_millis(1));
        }
        receiver.stop().unwrap();
    }
}
