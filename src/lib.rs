//! # Arduino Bridge: Topic Bus to Microcontroller
//!
//! Connects a block-programming message bus to an Arduino class board. Two
//! cooperating processes share the work:
//!
//! - **Controller**: owns the hardware link, binds a reply endpoint and
//!   answers one request at a time with a full pin snapshot
//! - **Bridge**: subscribes to the bus, forwards code payloads to the
//!   controller and republishes every reply
//!
//! ## Architecture
//!
//! - **Protocol**: `{"arduino_code": ..}` requests, `{"result": ..}` replies
//! - **Transport**: ZeroMQ REQ/REP between the processes, crossbeam in-process
//! - **Bus**: ZeroMQ SUB/PUB against the host application's broker
//! - **Scripting**: Rhai sandbox exposing `board` and `Constants` to payloads
//! - **Supervisor**: the bridge spawns and reaps the controller process
//!
//! ## Pins
//!
//! Digital pins 2 through 13 and analog pins 0 through 7 appear in every
//! snapshot, always in that order.
//!
//! ## Example
//!
//! ```ignore
//! use arduino_bridge::{
//!     bridge::{BridgeClient, BridgeSettings, Mailbox},
//!     controller::{BoardController, ControllerSettings},
//!     hardware::SimulatedConnector,
//!     transport::local_pair,
//! };
//! use std::sync::Arc;
//!
//! let (requester, mut responder) = local_pair();
//! let mut controller = BoardController::new(
//!     Box::new(SimulatedConnector::default()),
//!     ControllerSettings::default(),
//! );
//! std::thread::spawn(move || controller.run(&mut responder));
//!
//! let (sink, published) = crossbeam_channel::unbounded();
//! let mut client = BridgeClient::new(
//!     Box::new(requester),
//!     Box::new(sink),
//!     Arc::new(Mailbox::new()),
//!     BridgeSettings::default(),
//! );
//! client.step()?;
//! ```

pub mod bridge;
pub mod bus;
pub mod config;
pub mod controller;
pub mod error;
pub mod hardware;
pub mod logging;
pub mod protocol;
pub mod scripting;
pub mod supervisor;
pub mod transport;
pub mod types;

// Re-export commonly used types
pub use bridge::{BridgeClient, BridgeSettings, Mailbox};
pub use config::BridgeConfig;
pub use controller::{BoardController, ControllerSettings};
pub use error::{BridgeError, Result};
pub use hardware::{BoardConnector, HardwareLink};
pub use protocol::{Reply, Request, StateReport};
pub use types::{ConnectionState, PinMode, PinSnapshot};
