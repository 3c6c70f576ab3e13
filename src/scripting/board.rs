//! Script-facing board handle and constants namespace

use crate::error::{BridgeError, Result};
use crate::hardware::{read_snapshot, HardwareLink};
use crate::types::{PinMode, PinSnapshot, HIGH, LOW};
use std::sync::{Arc, Mutex};

/// Shared handle to the attached hardware link
///
/// The controller keeps one of these for the lifetime of the attachment and
/// hands clones to the script engine. All access goes through the mutex, but
/// the controller is single-threaded so it is never contended.
#[derive(Clone)]
pub struct BoardHandle {
    link: Arc<Mutex<Box<dyn HardwareLink>>>,
}

impl BoardHandle {
    pub fn new(link: Box<dyn HardwareLink>) -> Self {
        Self {
            link: Arc::new(Mutex::new(link)),
        }
    }

    /// Run a closure against the underlying link
    pub fn with_link<R>(&self, f: impl FnOnce(&mut dyn HardwareLink) -> Result<R>) -> Result<R> {
        let mut guard = self
            .link
            .lock()
            .map_err(|_| BridgeError::Hardware("hardware link lock poisoned".to_string()))?;
        f(guard.as_mut())
    }

    /// Read every tracked pin
    pub fn snapshot(&self) -> Result<PinSnapshot> {
        self.with_link(|link| Ok(read_snapshot(link)))
    }

    /// Release the board
    pub fn release(&self) -> Result<()> {
        self.with_link(|link| link.shutdown())
    }

    pub(crate) fn set_pin_mode(&self, pin: i64, mode: PinMode) -> Result<()> {
        let pin = pin_number(pin)?;
        self.with_link(|link| link.set_pin_mode(pin, mode))
    }

    pub(crate) fn digital_read(&self, pin: i64) -> Result<i64> {
        let pin = pin_number(pin)?;
        self.with_link(|link| link.digital_read(pin)).map(i64::from)
    }

    pub(crate) fn analog_read(&self, pin: i64) -> Result<i64> {
        let pin = pin_number(pin)?;
        self.with_link(|link| link.analog_read(pin)).map(i64::from)
    }

    pub(crate) fn digital_write(&self, pin: i64, value: i64) -> Result<()> {
        let pin = pin_number(pin)?;
        let level = if value == 0 { LOW } else { HIGH };
        self.with_link(|link| link.digital_write(pin, level))
    }

    pub(crate) fn analog_write(&self, pin: i64, value: i64) -> Result<()> {
        let pin = pin_number(pin)?;
        let value = u16::try_from(value).map_err(|_| BridgeError::InvalidPin {
            pin: i64::from(pin),
            reason: format!("value {} does not fit an analog write", value),
        })?;
        self.with_link(|link| link.analog_write(pin, value))
    }

    pub(crate) fn servo_config(&self, pin: i64) -> Result<()> {
        let pin = pin_number(pin)?;
        self.with_link(|link| link.servo_config(pin))
    }

    /// Mode and level of a digital pin
    pub(crate) fn pin_state(&self, pin: i64) -> Result<(PinMode, i64)> {
        let pin = pin_number(pin)?;
        self.with_link(|link| {
            let mode = link.pin_mode(pin)?;
            let value = link.digital_read(pin)?;
            Ok((mode, i64::from(value)))
        })
    }
}

impl std::fmt::Debug for BoardHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("BoardHandle")
    }
}

fn pin_number(pin: i64) -> Result<u8> {
    u8::try_from(pin).map_err(|_| BridgeError::InvalidPin {
        pin,
        reason: "pin numbers are 0..=255".to_string(),
    })
}

/// The `Constants` namespace exposed to scripts
///
/// Pin modes map to their Firmata codes; `HIGH`/`LOW` to logic levels.
#[derive(Debug, Clone, Copy, Default)]
pub struct HardwareConstants;

impl HardwareConstants {
    /// Property names and values, in registration order
    pub fn entries() -> Vec<(&'static str, i64)> {
        let mut entries: Vec<(&'static str, i64)> = PinMode::ALL
            .into_iter()
            .filter(|m| *m != PinMode::Shift)
            .map(|m| (m.name(), i64::from(m.code())))
            .collect();
        entries.push(("HIGH", i64::from(HIGH)));
        entries.push(("LOW", i64::from(LOW)));
        entries
    }
}
