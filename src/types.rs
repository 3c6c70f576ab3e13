//! Core data types for the Arduino bridge
//!
//! This module contains the board-facing data structures shared by the
//! controller, the bridge client and the wire protocol.
//!
//! # Main Types
//!
//! - [`PinMode`] - Firmata pin mode tags (input, output, analog, pwm, ...)
//! - [`DigitalPinState`] / [`AnalogPinState`] - One tracked pin in a snapshot
//! - [`PinSnapshot`] - A full read of every tracked pin at one instant
//! - [`ConnectionState`] - Whether the controller holds a hardware link
//!
//! # Pin Tables
//!
//! The tracked pins are fixed: digital pins 2 through 13 ([`DIGITAL_PINS`])
//! and analog pins 0 through 7 ([`ANALOG_PINS`]). A snapshot always carries
//! every one of them, in that order, even when values are unknown.

use serde::de::{self, IgnoredAny, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Digital pins tracked in every snapshot
pub const DIGITAL_PINS: [u8; 12] = [2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13];

/// Analog pins tracked in every snapshot
pub const ANALOG_PINS: [u8; 8] = [0, 1, 2, 3, 4, 5, 6, 7];

/// Number of entries in a snapshot (12 digital + 8 analog)
pub const SNAPSHOT_ENTRIES: usize = DIGITAL_PINS.len() + ANALOG_PINS.len();

/// Logic level HIGH
pub const HIGH: u16 = 1;

/// Logic level LOW
pub const LOW: u16 = 0;

/// Pin mode tag as defined by the Firmata protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PinMode {
    Input,
    Output,
    Analog,
    Pwm,
    Servo,
    Shift,
    I2c,
    OneWire,
    Stepper,
    Encoder,
    Serial,
    Pullup,
    Ignore,
}

impl PinMode {
    /// All modes, in Firmata code order
    pub const ALL: [PinMode; 13] = [
        PinMode::Input,
        PinMode::Output,
        PinMode::Analog,
        PinMode::Pwm,
        PinMode::Servo,
        PinMode::Shift,
        PinMode::I2c,
        PinMode::OneWire,
        PinMode::Stepper,
        PinMode::Encoder,
        PinMode::Serial,
        PinMode::Pullup,
        PinMode::Ignore,
    ];

    /// Firmata numeric code for this mode
    pub fn code(self) -> u8 {
        match self {
            PinMode::Input => 0x00,
            PinMode::Output => 0x01,
            PinMode::Analog => 0x02,
            PinMode::Pwm => 0x03,
            PinMode::Servo => 0x04,
            PinMode::Shift => 0x05,
            PinMode::I2c => 0x06,
            PinMode::OneWire => 0x07,
            PinMode::Stepper => 0x08,
            PinMode::Encoder => 0x09,
            PinMode::Serial => 0x0A,
            PinMode::Pullup => 0x0B,
            PinMode::Ignore => 0x7F,
        }
    }

    /// Look up a mode by its Firmata code
    pub fn from_code(code: i64) -> Option<Self> {
        Self::ALL.into_iter().find(|m| i64::from(m.code()) == code)
    }

    /// Upper-case tag used on the wire and in scripts
    pub fn name(self) -> &'static str {
        match self {
            PinMode::Input => "INPUT",
            PinMode::Output => "OUTPUT",
            PinMode::Analog => "ANALOG",
            PinMode::Pwm => "PWM",
            PinMode::Servo => "SERVO",
            PinMode::Shift => "SHIFT",
            PinMode::I2c => "I2C",
            PinMode::OneWire => "ONEWIRE",
            PinMode::Stepper => "STEPPER",
            PinMode::Encoder => "ENCODER",
            PinMode::Serial => "SERIAL",
            PinMode::Pullup => "PULLUP",
            PinMode::Ignore => "IGNORE",
        }
    }
}

impl fmt::Display for PinMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PinMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|m| m.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown pin mode '{}'", s))
    }
}

/// Whether the controller currently owns a hardware link
///
/// Transitions once, from `NotAttached` to `Attached`, and never reverts
/// for the lifetime of the controller process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No board has answered a probe yet
    #[default]
    NotAttached,
    /// A board answered and the status pin was raised
    Attached,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::NotAttached => write!(f, "Not attached"),
            ConnectionState::Attached => write!(f, "Attached"),
        }
    }
}

/// State of one digital pin in a snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DigitalPinState {
    pub pin: u8,
    /// Configured mode, `None` when unknown
    pub mode: Option<PinMode>,
    /// Last digital read, `None` when unknown
    pub value: Option<u16>,
}

/// State of one analog pin in a snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalogPinState {
    pub pin: u8,
    /// Last analog read, `None` when unknown
    pub value: Option<u16>,
}

/// A full read of every tracked pin
///
/// Always holds exactly [`SNAPSHOT_ENTRIES`] entries in the order of
/// [`DIGITAL_PINS`] then [`ANALOG_PINS`]. On the wire it is a flat object:
/// `pin_N_state` for every digital pin, then `digital_pin_N`, then
/// `analog_pin_N`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PinSnapshot {
    digital: [DigitalPinState; 12],
    analog: [AnalogPinState; 8],
}

impl PinSnapshot {
    /// Snapshot with every mode and value unknown
    pub fn unavailable() -> Self {
        Self {
            digital: std::array::from_fn(|i| DigitalPinState {
                pin: DIGITAL_PINS[i],
                mode: None,
                value: None,
            }),
            analog: std::array::from_fn(|i| AnalogPinState {
                pin: ANALOG_PINS[i],
                value: None,
            }),
        }
    }

    /// Build a snapshot by querying each tracked pin
    pub fn from_fn<D, A>(mut digital: D, mut analog: A) -> Self
    where
        D: FnMut(u8) -> (Option<PinMode>, Option<u16>),
        A: FnMut(u8) -> Option<u16>,
    {
        let mut snapshot = Self::unavailable();
        for entry in snapshot.digital.iter_mut() {
            let (mode, value) = digital(entry.pin);
            entry.mode = mode;
            entry.value = value;
        }
        for entry in snapshot.analog.iter_mut() {
            entry.value = analog(entry.pin);
        }
        snapshot
    }

    /// Digital pin entries in pin order
    pub fn digital_pins(&self) -> &[DigitalPinState] {
        &self.digital
    }

    /// Analog pin entries in pin order
    pub fn analog_pins(&self) -> &[AnalogPinState] {
        &self.analog
    }

    /// Look up a digital pin entry
    pub fn digital(&self, pin: u8) -> Option<&DigitalPinState> {
        digital_index(pin).map(|i| &self.digital[i])
    }

    /// Look up an analog pin entry
    pub fn analog(&self, pin: u8) -> Option<&AnalogPinState> {
        analog_index(pin).map(|i| &self.analog[i])
    }

    /// Number of tracked pins
    pub fn len(&self) -> usize {
        self.digital.len() + self.analog.len()
    }

    /// Always false; kept for API symmetry with `len`
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Whether every entry carries a value
    pub fn is_complete(&self) -> bool {
        self.digital.iter().all(|d| d.mode.is_some() && d.value.is_some())
            && self.analog.iter().all(|a| a.value.is_some())
    }
}

impl Default for PinSnapshot {
    fn default() -> Self {
        Self::unavailable()
    }
}

/// Index of a digital pin in [`DIGITAL_PINS`]
pub fn digital_index(pin: u8) -> Option<usize> {
    DIGITAL_PINS.iter().position(|&p| p == pin)
}

/// Index of an analog pin in [`ANALOG_PINS`]
pub fn analog_index(pin: u8) -> Option<usize> {
    ANALOG_PINS.iter().position(|&p| p == pin)
}

/// Wire key for a digital pin's mode
pub fn state_key(pin: u8) -> String {
    format!("pin_{}_state", pin)
}

/// Wire key for a digital pin's value
pub fn digital_key(pin: u8) -> String {
    format!("digital_pin_{}", pin)
}

/// Wire key for an analog pin's value
pub fn analog_key(pin: u8) -> String {
    format!("analog_pin_{}", pin)
}

impl Serialize for PinSnapshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.digital.len() * 2 + self.analog.len()))?;
        for d in &self.digital {
            map.serialize_entry(&state_key(d.pin), &d.mode)?;
        }
        for d in &self.digital {
            map.serialize_entry(&digital_key(d.pin), &d.value)?;
        }
        for a in &self.analog {
            map.serialize_entry(&analog_key(a.pin), &a.value)?;
        }
        map.end()
    }
}

enum SnapshotKey {
    State(usize),
    Digital(usize),
    Analog(usize),
    Other,
}

fn parse_snapshot_key(key: &str) -> SnapshotKey {
    let pin_of = |s: &str| s.parse::<u8>().ok();

    if let Some(rest) = key.strip_prefix("pin_").and_then(|r| r.strip_suffix("_state")) {
        if let Some(i) = pin_of(rest).and_then(digital_index) {
            return SnapshotKey::State(i);
        }
    } else if let Some(rest) = key.strip_prefix("digital_pin_") {
        if let Some(i) = pin_of(rest).and_then(digital_index) {
            return SnapshotKey::Digital(i);
        }
    } else if let Some(rest) = key.strip_prefix("analog_pin_") {
        if let Some(i) = pin_of(rest).and_then(analog_index) {
            return SnapshotKey::Analog(i);
        }
    }
    SnapshotKey::Other
}

struct SnapshotVisitor;

impl<'de> Visitor<'de> for SnapshotVisitor {
    type Value = PinSnapshot;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a pin snapshot object")
    }

    fn visit_map<M: MapAccess<'de>>(self, mut map: M) -> Result<PinSnapshot, M::Error> {
        let mut snapshot = PinSnapshot::unavailable();
        let mut seen_state = [false; 12];
        let mut seen_digital = [false; 12];
        let mut seen_analog = [false; 8];

        while let Some(key) = map.next_key::<String>()? {
            match parse_snapshot_key(&key) {
                SnapshotKey::State(i) => {
                    snapshot.digital[i].mode = map.next_value()?;
                    seen_state[i] = true;
                }
                SnapshotKey::Digital(i) => {
                    snapshot.digital[i].value = map.next_value()?;
                    seen_digital[i] = true;
                }
                SnapshotKey::Analog(i) => {
                    snapshot.analog[i].value = map.next_value()?;
                    seen_analog[i] = true;
                }
                SnapshotKey::Other => {
                    map.next_value::<IgnoredAny>()?;
                }
            }
        }

        if let Some(i) = seen_state.iter().position(|s| !s) {
            return Err(missing(state_key(DIGITAL_PINS[i])));
        }
        if let Some(i) = seen_digital.iter().position(|s| !s) {
            return Err(missing(digital_key(DIGITAL_PINS[i])));
        }
        if let Some(i) = seen_analog.iter().position(|s| !s) {
            return Err(missing(analog_key(ANALOG_PINS[i])));
        }
        Ok(snapshot)
    }
}

fn missing<E: de::Error>(key: String) -> E {
    E::custom(format!("incomplete snapshot: missing field `{}`", key))
}

impl<'de> Deserialize<'de> for PinSnapshot {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(SnapshotVisitor)
    }
}
