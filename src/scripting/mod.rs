//! Sandboxed Code Execution
//!
//! Execute requests carry a code payload that runs against the attached
//! board. Payloads are Rhai expressions evaluated in a scope that holds
//! exactly two names:
//!
//! - `board` - the hardware handle
//! - `Constants` - pin mode codes and logic levels
//!
//! ## Board Methods
//!
//! - `board.set_pin_mode(pin, mode)` - `mode` is a `Constants` code or a name like `"OUTPUT"`
//! - `board.digital_read(pin)` / `board.analog_read(pin)`
//! - `board.digital_write(pin, value)` / `board.analog_write(pin, value)`
//! - `board.servo_config(pin)`
//! - `board.get_pin_state(pin)` - map with `pin`, `mode` and `value`
//!
//! Releasing the board is not available to scripts.
//!
//! ## Constants
//!
//! `INPUT`, `OUTPUT`, `ANALOG`, `PWM`, `SERVO`, `I2C`, `ONEWIRE`, `STEPPER`,
//! `ENCODER`, `SERIAL`, `PULLUP`, `IGNORE`, `HIGH`, `LOW`
//!
//! ## Example Payloads
//!
//! ```rhai
//! board.set_pin_mode(3, Constants.OUTPUT)
//! ```
//!
//! ```rhai
//! board.digital_write(13, Constants.HIGH)
//! ```
//!
//! ```rhai
//! if board.analog_read(0) > 512 { board.digital_write(7, 1) } else { board.digital_write(7, 0) }
//! ```

mod board;
mod engine;

pub use board::{BoardHandle, HardwareConstants};
pub use engine::{render, CodeExecutor, BOARD_VAR, CONSTANTS_VAR, UNIT_OUTPUT};
