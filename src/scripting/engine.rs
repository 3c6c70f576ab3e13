//! Rhai engine backing [`CodeExecutor`]

use super::board::{BoardHandle, HardwareConstants};
use crate::error::{BridgeError, Result};
use crate::types::PinMode;
use rhai::{Dynamic, Engine, EvalAltResult, ImmutableString, Map, Scope};

/// Name of the board handle inside scripts
pub const BOARD_VAR: &str = "board";

/// Name of the constants namespace inside scripts
pub const CONSTANTS_VAR: &str = "Constants";

/// Rendering of a script that produced no value
pub const UNIT_OUTPUT: &str = "None";

type ScriptResult<T> = std::result::Result<T, Box<EvalAltResult>>;

fn to_script<T>(result: Result<T>) -> ScriptResult<T> {
    result.map_err(|e| e.to_string().into())
}

fn mode_from_code(code: i64) -> ScriptResult<PinMode> {
    PinMode::from_code(code).ok_or_else(|| format!("unknown pin mode code {}", code).into())
}

/// Evaluates code payloads against a board handle
///
/// Each call gets a fresh scope holding only `board` and `Constants`; nothing
/// survives between executions. The engine has no file, module or `eval`
/// access and hard limits on work per payload.
pub struct CodeExecutor {
    engine: Engine,
}

impl CodeExecutor {
    /// Create an executor with the board API registered
    pub fn new() -> Self {
        let mut engine = Engine::new();
        Self::configure_engine(&mut engine);
        Self { engine }
    }

    fn configure_engine(engine: &mut Engine) {
        // Safety limits
        engine.set_max_expr_depths(64, 64);
        engine.set_max_call_levels(32);
        engine.set_max_operations(10_000);
        engine.set_max_string_size(10_000);
        engine.set_max_array_size(1_000);
        engine.set_max_map_size(1_000);
        engine.disable_symbol("eval");

        engine.on_print(|text| tracing::info!(target: "arduino_bridge::script", "{}", text));
        engine.on_debug(|text, _source, pos| {
            tracing::debug!(target: "arduino_bridge::script", "{:?}: {}", pos, text)
        });

        engine.register_type_with_name::<BoardHandle>("Board");
        engine.register_type_with_name::<HardwareConstants>("Constants");

        for (name, value) in HardwareConstants::entries() {
            engine.register_get(name, move |_: &mut HardwareConstants| value);
        }

        // Mode by Firmata code (Constants.OUTPUT) or by name ("OUTPUT")
        engine.register_fn(
            "set_pin_mode",
            |board: &mut BoardHandle, pin: i64, mode: i64| -> ScriptResult<()> {
                let mode = mode_from_code(mode)?;
                to_script(board.set_pin_mode(pin, mode))
            },
        );
        engine.register_fn(
            "set_pin_mode",
            |board: &mut BoardHandle, pin: i64, mode: ImmutableString| -> ScriptResult<()> {
                let mode: PinMode = mode.parse().map_err(|e: String| -> Box<EvalAltResult> { e.into() })?;
                to_script(board.set_pin_mode(pin, mode))
            },
        );

        engine.register_fn("digital_read", |board: &mut BoardHandle, pin: i64| {
            to_script(board.digital_read(pin))
        });
        engine.register_fn("analog_read", |board: &mut BoardHandle, pin: i64| {
            to_script(board.analog_read(pin))
        });
        engine.register_fn(
            "digital_write",
            |board: &mut BoardHandle, pin: i64, value: i64| to_script(board.digital_write(pin, value)),
        );
        engine.register_fn(
            "analog_write",
            |board: &mut BoardHandle, pin: i64, value: i64| to_script(board.analog_write(pin, value)),
        );
        engine.register_fn("servo_config", |board: &mut BoardHandle, pin: i64| {
            to_script(board.servo_config(pin))
        });
        engine.register_fn(
            "get_pin_state",
            |board: &mut BoardHandle, pin: i64| -> ScriptResult<Map> {
                let (mode, value) = to_script(board.pin_state(pin))?;
                let mut state = Map::new();
                state.insert("pin".into(), Dynamic::from(pin));
                state.insert("mode".into(), Dynamic::from(mode.name().to_string()));
                state.insert("value".into(), Dynamic::from(value));
                Ok(state)
            },
        );
    }

    /// Evaluate code and return its raw value
    pub fn evaluate(&self, code: &str, board: &BoardHandle) -> Result<Dynamic> {
        let mut scope = Scope::new();
        scope.push(BOARD_VAR, board.clone());
        scope.push(CONSTANTS_VAR, HardwareConstants);

        self.engine
            .eval_with_scope::<Dynamic>(&mut scope, code)
            .map_err(BridgeError::from_rhai_error)
    }

    /// Evaluate code and stringify the outcome
    ///
    /// Never fails: a script error becomes the output text.
    pub fn execute(&self, code: &str, board: &BoardHandle) -> String {
        match self.evaluate(code, board) {
            Ok(value) => render(value),
            Err(BridgeError::Script(message)) => {
                tracing::debug!("Code payload failed: {}", message);
                message
            }
            Err(e) => e.to_string(),
        }
    }
}

impl Default for CodeExecutor {
    fn default() -> Self {
        Self::new()
    }
}

/// Stringify a script result
pub fn render(value: Dynamic) -> String {
    if value.is_unit() {
        UNIT_OUTPUT.to_string()
    } else if value.is_string() {
        value.into_string().unwrap_or_default()
    } else {
        value.to_string()
    }
}
