//! Wire protocol between the bridge client and the board controller
//!
//! Every exchange is one JSON request followed by one JSON reply:
//!
//! ```text
//! request:  {"arduino_code": "<code>" | "" | null}
//! reply:    {"result": "quit!"}
//!           {"result": {"pin_2_state": .., "digital_pin_2": .., "analog_pin_0": .., "output": ..}}
//! ```
//!
//! An empty or absent code is a [`Request::Query`], the sentinel `"quit!"`
//! is a [`Request::Shutdown`], anything else is a [`Request::Execute`].

use crate::error::{BridgeError, Result};
use crate::types::PinSnapshot;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Code value that asks the controller to release the board and exit
pub const QUIT_SENTINEL: &str = "quit!";

/// A request sent to the board controller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "WireRequest", into = "WireRequest")]
pub enum Request {
    /// Return the current snapshot, no side effect
    Query,
    /// Run code against the board, then return output and snapshot
    Execute(String),
    /// Release the board and stop the controller loop
    Shutdown,
}

impl Request {
    /// Classify a code payload
    pub fn from_code(code: Option<&str>) -> Self {
        match code {
            None | Some("") => Request::Query,
            Some(QUIT_SENTINEL) => Request::Shutdown,
            Some(code) => Request::Execute(code.to_string()),
        }
    }

    /// The code field as it travels on the wire
    pub fn code(&self) -> &str {
        match self {
            Request::Query => "",
            Request::Execute(code) => code,
            Request::Shutdown => QUIT_SENTINEL,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WireRequest {
    #[serde(default)]
    arduino_code: Option<String>,
}

impl From<WireRequest> for Request {
    fn from(wire: WireRequest) -> Self {
        Request::from_code(wire.arduino_code.as_deref())
    }
}

impl From<Request> for WireRequest {
    fn from(request: Request) -> Self {
        WireRequest {
            arduino_code: Some(request.code().to_string()),
        }
    }
}

/// Board state returned for queries and executions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateReport {
    #[serde(flatten)]
    pub snapshot: PinSnapshot,

    /// Stringified result (or error) of executed code
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,

    /// Set when the controller could not serve the request, e.g. no board
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StateReport {
    /// Report for a query
    pub fn query(snapshot: PinSnapshot) -> Self {
        Self {
            snapshot,
            output: None,
            error: None,
        }
    }

    /// Report for an execution
    pub fn executed(output: impl Into<String>, snapshot: PinSnapshot) -> Self {
        Self {
            snapshot,
            output: Some(output.into()),
            error: None,
        }
    }

    /// Report for a request the controller could not serve
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            snapshot: PinSnapshot::unavailable(),
            output: None,
            error: Some(error.into()),
        }
    }
}

/// A reply from the board controller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "WireReply", into = "WireReply")]
pub enum Reply {
    /// Snapshot, possibly with execution output
    State(StateReport),
    /// Acknowledgment of [`Request::Shutdown`]
    Quit,
}

impl Reply {
    /// The reported snapshot, if this is not the quit acknowledgment
    pub fn snapshot(&self) -> Option<&PinSnapshot> {
        match self {
            Reply::State(report) => Some(&report.snapshot),
            Reply::Quit => None,
        }
    }

    /// Execution output, if any
    pub fn output(&self) -> Option<&str> {
        match self {
            Reply::State(report) => report.output.as_deref(),
            Reply::Quit => None,
        }
    }

    /// Controller-side error, if any
    pub fn error(&self) -> Option<&str> {
        match self {
            Reply::State(report) => report.error.as_deref(),
            Reply::Quit => None,
        }
    }

    pub fn is_quit(&self) -> bool {
        matches!(self, Reply::Quit)
    }

    /// The `result` member as a JSON value, for republishing on the bus
    pub fn result_value(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(WireResult::from(self.clone()))?)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum WireResult {
    Ack(String),
    State(StateReport),
}

impl From<Reply> for WireResult {
    fn from(reply: Reply) -> Self {
        match reply {
            Reply::State(report) => WireResult::State(report),
            Reply::Quit => WireResult::Ack(QUIT_SENTINEL.to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WireReply {
    result: WireResult,
}

impl TryFrom<WireReply> for Reply {
    type Error = String;

    fn try_from(wire: WireReply) -> std::result::Result<Self, Self::Error> {
        match wire.result {
            WireResult::Ack(ack) if ack == QUIT_SENTINEL => Ok(Reply::Quit),
            WireResult::Ack(other) => Err(format!("unexpected reply string '{}'", other)),
            WireResult::State(report) => Ok(Reply::State(report)),
        }
    }
}

impl From<Reply> for WireReply {
    fn from(reply: Reply) -> Self {
        WireReply {
            result: reply.into(),
        }
    }
}

/// Encode a protocol message as JSON bytes
pub fn encode<T: Serialize>(message: &T) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(message)?)
}

/// Decode a protocol message from JSON bytes
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    serde_json::from_slice(bytes).map_err(|e| {
        BridgeError::Protocol(format!(
            "{} in payload {:?}",
            e,
            String::from_utf8_lossy(bytes)
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PinMode;
    use serde_json::json;

    #[test]
    fn test_result_value_keeps_pin_order() {
        let reply = Reply::State(StateReport::query(PinSnapshot::unavailable()));
        let value = reply.result_value().unwrap();
        let keys: Vec<&str> = value.as_object().unwrap().keys().map(String::as_str).collect();

        assert_eq!(keys[0], "pin_2_state");
        assert_eq!(keys[11], "pin_13_state");
        assert_eq!(keys[12], "digital_pin_2");
        assert_eq!(keys[13], "digital_pin_3");
        assert_eq!(keys[23], "digital_pin_13");
        assert_eq!(keys[24], "analog_pin_0");
        assert_eq!(keys[31], "analog_pin_7");

        let wire = String::from_utf8(encode(&reply).unwrap()).unwrap();
        let republished = serde_json::to_string(&value).unwrap();
        assert!(wire.contains(&republished));
    }

    #[test]
    fn test_request_classification() {
        assert_eq!(Request::from_code(None), Request::Query);
        assert_eq!(Request::from_code(Some("")), Request::Query);
        assert_eq!(Request::from_code(Some("quit!")), Request::Shutdown);
        assert_eq!(
            Request::from_code(Some("2+2")),
            Request::Execute("2+2".to_string())
        );
    }

    #[test]
    fn test_request_wire_shape() {
        let value = serde_json::to_value(Request::Execute("2+2".into())).unwrap();
        assert_eq!(value, json!({"arduino_code": "2+2"}));

        let value = serde_json::to_value(Request::Shutdown).unwrap();
        assert_eq!(value, json!({"arduino_code": "quit!"}));
    }

    #[test]
    fn test_request_decodes_missing_and_null_code_as_query() {
        assert_eq!(decode::<Request>(b"{}").unwrap(), Request::Query);
        assert_eq!(
            decode::<Request>(br#"{"arduino_code": null}"#).unwrap(),
            Request::Query
        );
    }

    #[test]
    fn test_quit_reply_wire_shape() {
        let value = serde_json::to_value(Reply::Quit).unwrap();
        assert_eq!(value, json!({"result": "quit!"}));
        assert_eq!(decode::<Reply>(br#"{"result": "quit!"}"#).unwrap(), Reply::Quit);
    }

    #[test]
    fn test_unknown_reply_string_rejected() {
        assert!(decode::<Reply>(br#"{"result": "bye"}"#).is_err());
    }

    #[test]
    fn test_state_reply_carries_output_and_snapshot() {
        let snapshot = PinSnapshot::from_fn(|_| (Some(PinMode::Input), Some(0)), |_| Some(512));
        let reply = Reply::State(StateReport::executed("4", snapshot.clone()));

        let bytes = encode(&reply).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        let result = value["result"].as_object().unwrap();
        assert_eq!(result.len(), 33);
        assert_eq!(result["output"], "4");
        assert!(!result.contains_key("error"));

        let decoded: Reply = decode(&bytes).unwrap();
        assert_eq!(decoded.output(), Some("4"));
        assert_eq!(decoded.snapshot(), Some(&snapshot));
    }

    #[test]
    fn test_query_reply_has_no_output_key() {
        let reply = Reply::State(StateReport::query(PinSnapshot::unavailable()));
        let result = reply.result_value().unwrap();
        assert_eq!(result.as_object().unwrap().len(), 32);
        assert!(result.get("output").is_none());
    }

    #[test]
    fn test_failed_report_keeps_full_snapshot() {
        let reply = Reply::State(StateReport::failed("board not attached"));
        let result = reply.result_value().unwrap();
        assert_eq!(result["error"], "board not attached");
        assert_eq!(result.as_object().unwrap().len(), 33);
    }

    #[test]
    fn test_decode_garbage_is_protocol_error() {
        let err = decode::<Reply>(b"not json").unwrap_err();
        assert!(matches!(err, BridgeError::Protocol(_)));
    }
}
