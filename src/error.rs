//! Error handling for the Arduino bridge
//!
//! This module defines custom error types and a Result alias for use
//! throughout the crate.

use thiserror::Error;

/// Main error type for bridge and controller operations
#[derive(Error, Debug)]
pub enum BridgeError {
    /// Errors raised by the ZeroMQ sockets (request/reply channel and bus)
    #[error("Transport error: {0}")]
    Transport(#[from] zmq::Error),

    /// Malformed or unexpected wire payloads
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Errors reported by a hardware link
    #[error("Hardware error: {0}")]
    Hardware(String),

    /// An operation needed the board but no link is attached
    #[error("board not attached")]
    NotAttached,

    /// A pin outside the board's fixed pin tables
    #[error("Invalid pin {pin}: {reason}")]
    InvalidPin { pin: i64, reason: String },

    /// Errors related to Rhai script execution
    #[error("Script error: {0}")]
    Script(String),

    /// Errors related to configuration loading/saving
    #[error("Configuration error: {0}")]
    Config(String),

    /// Errors on the topic bus
    #[error("Bus error: {0}")]
    Bus(String),

    /// Errors spawning or reaping the controller process
    #[error("Process error: {0}")]
    Process(String),

    /// Errors related to in-process channel communication
    #[error("Channel error: {0}")]
    Channel(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<BridgeError>,
    },
}

impl BridgeError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        BridgeError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Create a script error from a Rhai error
    pub fn from_rhai_error(err: Box<rhai::EvalAltResult>) -> Self {
        BridgeError::Script(err.to_string())
    }
}

impl From<Box<rhai::EvalAltResult>> for BridgeError {
    fn from(err: Box<rhai::EvalAltResult>) -> Self {
        BridgeError::from_rhai_error(err)
    }
}

impl From<serde_json::Error> for BridgeError {
    fn from(err: serde_json::Error) -> Self {
        BridgeError::Protocol(err.to_string())
    }
}

/// Result type alias for bridge operations
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: Into<BridgeError>,
{
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.into().with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.into().with_context(f()))
    }
}
