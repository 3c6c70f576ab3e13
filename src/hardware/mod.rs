//! Hardware link abstraction
//!
//! The controller never talks to a board directly. It goes through a
//! [`HardwareLink`], obtained from a [`BoardConnector`] once a probe
//! succeeds. Real board drivers live outside this crate and plug in by
//! implementing these two traits; [`SimulatedBoard`] is the in-tree
//! implementation used when no physical driver is configured and in tests.
//!
//! # Example
//!
//! ```ignore
//! use arduino_bridge::hardware::{read_snapshot, BoardConnector, SimulatedConnector};
//!
//! let mut connector = SimulatedConnector::default();
//! let mut link = connector.probe()?;
//! link.digital_write(13, 1)?;
//! let snapshot = read_snapshot(link.as_mut());
//! ```

pub mod simulated;

pub use simulated::{AnalogPattern, SimulatedBoard, SimulatedConnector};

use crate::error::Result;
use crate::types::{analog_index, digital_index, PinMode, PinSnapshot, ANALOG_PINS, DIGITAL_PINS};

/// Unified interface to an attached board
///
/// Mirrors the pin-level operations a Firmata client exposes. Pin numbers
/// follow Arduino numbering: digital pins for everything except
/// `analog_read` and `set_pin_mode(_, PinMode::Analog)`, which take the
/// analog channel number. Implementations must be `Send` so the controller
/// can own them from any thread.
#[cfg_attr(test, mockall::automock)]
pub trait HardwareLink: Send {
    /// Configure a pin's mode
    fn set_pin_mode(&mut self, pin: u8, mode: PinMode) -> Result<()>;

    /// Report a digital pin's configured mode
    fn pin_mode(&mut self, pin: u8) -> Result<PinMode>;

    /// Read a digital pin (0 or 1)
    fn digital_read(&mut self, pin: u8) -> Result<u16>;

    /// Read an analog channel (0..=1023)
    fn analog_read(&mut self, pin: u8) -> Result<u16>;

    /// Drive a digital pin
    fn digital_write(&mut self, pin: u8, value: u16) -> Result<()>;

    /// Write a PWM duty cycle or servo angle
    fn analog_write(&mut self, pin: u8, value: u16) -> Result<()>;

    /// Attach a servo to a pin
    fn servo_config(&mut self, pin: u8) -> Result<()> {
        self.set_pin_mode(pin, PinMode::Servo)
    }

    /// Release the board connection
    fn shutdown(&mut self) -> Result<()>;
}

/// Opens hardware links
///
/// `probe` is called repeatedly until it succeeds; a failure means the
/// board is absent or still booting and is not an error for the caller.
pub trait BoardConnector: Send {
    /// Try to open a link to the board
    fn probe(&mut self) -> Result<Box<dyn HardwareLink>>;

    /// Human readable description for logs
    fn describe(&self) -> String {
        "board".to_string()
    }
}

impl<F> BoardConnector for F
where
    F: FnMut() -> Result<Box<dyn HardwareLink>> + Send,
{
    fn probe(&mut self) -> Result<Box<dyn HardwareLink>> {
        self()
    }
}

/// Read every tracked pin into a snapshot
///
/// A failed read leaves that entry unknown; the snapshot itself is always
/// complete.
pub fn read_snapshot(link: &mut dyn HardwareLink) -> PinSnapshot {
    let digital: Vec<(Option<PinMode>, Option<u16>)> = DIGITAL_PINS
        .iter()
        .map(|&pin| {
            let mode = link
                .pin_mode(pin)
                .map_err(|e| tracing::warn!("Failed to read mode of pin {}: {}", pin, e))
                .ok();
            let value = link
                .digital_read(pin)
                .map_err(|e| tracing::warn!("Failed to read digital pin {}: {}", pin, e))
                .ok();
            (mode, value)
        })
        .collect();

    let analog: Vec<Option<u16>> = ANALOG_PINS
        .iter()
        .map(|&pin| {
            link.analog_read(pin)
                .map_err(|e| tracing::warn!("Failed to read analog pin {}: {}", pin, e))
                .ok()
        })
        .collect();

    PinSnapshot::from_fn(
        |pin| {
            digital_index(pin)
                .and_then(|i| digital.get(i).copied())
                .unwrap_or((None, None))
        },
        |pin| analog_index(pin).and_then(|i| analog.get(i).copied().flatten()),
    )
}
