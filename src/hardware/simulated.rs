//! Simulated Board for Running Without Hardware
//!
//! This module provides an in-memory Arduino Nano class board that
//! implements [`HardwareLink`]. It keeps pin modes and written values,
//! answers reads from them, and generates analog input from a configurable
//! pattern.
//!
//! # Analog Patterns
//!
//! - [`AnalogPattern::Constant`] - Fixed reading on every channel
//! - [`AnalogPattern::Counter`] - Incrementing reading that wraps at 1024
//! - [`AnalogPattern::Sine`] - Sinusoid over time, phase-shifted per channel
//!
//! # Probe Failures
//!
//! [`SimulatedConnector`] can be told to fail its first N probes, which is
//! how a board that is unplugged or still booting looks to the controller.

use crate::error::{BridgeError, Result};
use crate::types::{PinMode, ANALOG_PINS, HIGH, LOW};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Instant;

use super::{BoardConnector, HardwareLink};

/// Highest digital pin on the board
const MAX_DIGITAL_PIN: u8 = 13;

/// Full-scale analog reading (10-bit ADC)
const ANALOG_MAX: u16 = 1023;

/// Pattern for generating analog input readings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnalogPattern {
    /// Constant value
    Constant { value: u16 },
    /// Counter that increments on every read
    Counter { step: u16 },
    /// Sine wave around the mid-scale
    Sine { frequency_hz: f64, amplitude: f64 },
}

impl Default for AnalogPattern {
    fn default() -> Self {
        AnalogPattern::Constant { value: 0 }
    }
}

/// In-memory board
pub struct SimulatedBoard {
    modes: [PinMode; MAX_DIGITAL_PIN as usize + 1],
    levels: [u16; MAX_DIGITAL_PIN as usize + 1],
    analog_overrides: [Option<u16>; 8],
    pattern: AnalogPattern,
    counter: u16,
    start_time: Instant,
    released: Arc<AtomicBool>,
}

impl SimulatedBoard {
    /// Create a board with Firmata power-on defaults (all digital pins OUTPUT, LOW)
    pub fn new() -> Self {
        Self {
            modes: [PinMode::Output; MAX_DIGITAL_PIN as usize + 1],
            levels: [LOW; MAX_DIGITAL_PIN as usize + 1],
            analog_overrides: [None; 8],
            pattern: AnalogPattern::default(),
            counter: 0,
            start_time: Instant::now(),
            released: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Set the analog input pattern
    pub fn with_pattern(mut self, pattern: AnalogPattern) -> Self {
        self.pattern = pattern;
        self
    }

    /// Pin an analog channel to a fixed reading
    pub fn set_analog_input(&mut self, channel: u8, value: u16) -> Result<()> {
        let index = analog_channel(channel)?;
        self.analog_overrides[index] = Some(value.min(ANALOG_MAX));
        Ok(())
    }

    /// Drive the external level seen on an input pin
    pub fn set_digital_input(&mut self, pin: u8, value: u16) -> Result<()> {
        let index = digital_pin(pin)?;
        self.levels[index] = if value == LOW { LOW } else { HIGH };
        Ok(())
    }

    /// Flag raised once [`HardwareLink::shutdown`] has been called
    pub fn released_flag(&self) -> Arc<AtomicBool> {
        self.released.clone()
    }

    fn ensure_open(&self) -> Result<()> {
        if self.released.load(Ordering::SeqCst) {
            Err(BridgeError::Hardware("link already released".to_string()))
        } else {
            Ok(())
        }
    }

    fn generate(&mut self, channel: usize) -> u16 {
        match self.pattern {
            AnalogPattern::Constant { value } => value.min(ANALOG_MAX),
            AnalogPattern::Counter { step } => {
                self.counter = self.counter.wrapping_add(step) % (ANALOG_MAX + 1);
                self.counter
            }
            AnalogPattern::Sine {
                frequency_hz,
                amplitude,
            } => {
                let t = self.start_time.elapsed().as_secs_f64();
                let phase = channel as f64 * std::f64::consts::FRAC_PI_4;
                let mid = f64::from(ANALOG_MAX) / 2.0;
                let v = mid + amplitude * (2.0 * std::f64::consts::PI * frequency_hz * t + phase).sin();
                v.clamp(0.0, f64::from(ANALOG_MAX)) as u16
            }
        }
    }
}

impl Default for SimulatedBoard {
    fn default() -> Self {
        Self::new()
    }
}

fn digital_pin(pin: u8) -> Result<usize> {
    if pin <= MAX_DIGITAL_PIN {
        Ok(pin as usize)
    } else {
        Err(BridgeError::InvalidPin {
            pin: i64::from(pin),
            reason: format!("digital pins are 0..={}", MAX_DIGITAL_PIN),
        })
    }
}

fn analog_channel(channel: u8) -> Result<usize> {
    ANALOG_PINS
        .iter()
        .position(|&p| p == channel)
        .ok_or_else(|| BridgeError::InvalidPin {
            pin: i64::from(channel),
            reason: "analog channels are 0..=7".to_string(),
        })
}

impl HardwareLink for SimulatedBoard {
    fn set_pin_mode(&mut self, pin: u8, mode: PinMode) -> Result<()> {
        self.ensure_open()?;
        if mode == PinMode::Analog {
            // Analog mode addresses the channel, not a digital pin
            analog_channel(pin)?;
            return Ok(());
        }
        let index = digital_pin(pin)?;
        self.modes[index] = mode;
        if mode == PinMode::Pullup {
            self.levels[index] = HIGH;
        }
        Ok(())
    }

    fn pin_mode(&mut self, pin: u8) -> Result<PinMode> {
        self.ensure_open()?;
        Ok(self.modes[digital_pin(pin)?])
    }

    fn digital_read(&mut self, pin: u8) -> Result<u16> {
        self.ensure_open()?;
        let index = digital_pin(pin)?;
        Ok(if self.levels[index] == LOW { LOW } else { HIGH })
    }

    fn analog_read(&mut self, pin: u8) -> Result<u16> {
        self.ensure_open()?;
        let index = analog_channel(pin)?;
        match self.analog_overrides[index] {
            Some(value) => Ok(value),
            None => Ok(self.generate(index)),
        }
    }

    fn digital_write(&mut self, pin: u8, value: u16) -> Result<()> {
        self.ensure_open()?;
        let index = digital_pin(pin)?;
        self.levels[index] = if value == LOW { LOW } else { HIGH };
        Ok(())
    }

    fn analog_write(&mut self, pin: u8, value: u16) -> Result<()> {
        self.ensure_open()?;
        let index = digital_pin(pin)?;
        match self.modes[index] {
            PinMode::Pwm | PinMode::Servo => {
                // Digital reads of a PWM pin report whether it is driven at all
                self.levels[index] = if value == 0 { LOW } else { HIGH };
                Ok(())
            }
            other => Err(BridgeError::Hardware(format!(
                "pin {} is in {} mode, not PWM or SERVO",
                pin, other
            ))),
        }
    }

    fn shutdown(&mut self) -> Result<()> {
        self.released.store(true, Ordering::SeqCst);
        tracing::info!("Simulated board released");
        Ok(())
    }
}

/// Connector that hands out [`SimulatedBoard`] links
#[derive(Debug, Clone)]
pub struct SimulatedConnector {
    failed_probes: u32,
    pattern: AnalogPattern,
    attempts: Arc<AtomicU32>,
    released: Arc<AtomicBool>,
}

impl SimulatedConnector {
    /// Create a connector whose first `failed_probes` probes fail
    pub fn new(failed_probes: u32, pattern: AnalogPattern) -> Self {
        Self {
            failed_probes,
            pattern,
            attempts: Arc::new(AtomicU32::new(0)),
            released: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Number of probes made so far (shared across clones)
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Whether a board handed out by this connector has been released
    pub fn released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }
}

impl Default for SimulatedConnector {
    fn default() -> Self {
        Self::new(0, AnalogPattern::default())
    }
}

impl BoardConnector for SimulatedConnector {
    fn probe(&mut self) -> Result<Box<dyn HardwareLink>> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if attempt <= self.failed_probes {
            return Err(BridgeError::Hardware(format!(
                "simulated board still booting (probe {} of {})",
                attempt, self.failed_probes
            )));
        }

        let mut board = SimulatedBoard::new().with_pattern(self.pattern);
        board.released = self.released.clone();
        Ok(Box::new(board))
    }

    fn describe(&self) -> String {
        "simulated board".to_string()
    }
}
