//! Message envelopes (JSON).
//!
//! Every frame is a JSON object with an integer `type` field; the remaining
//! fields depend on the type. Inbound frames are decoded once into typed
//! envelopes so the engine never re-parses a payload. Unknown or malformed
//! frames surface as errors for the caller to log and drop.

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::Value;

use crate::error::{ObjLinkError, Result};

/// Key marking an inbound object reference inside any payload.
pub const OBJECT_MARKER: &str = "__QObject*__";

/// Key marking a locally-held proxy handle in a resolved or outbound value.
pub const PTR_MARKER: &str = "__ptr__";

/// Wire message types. The integer values are fixed by the protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageType {
    Signal = 1,
    PropertyUpdate = 2,
    Init = 3,
    Idle = 4,
    Debug = 5,
    InvokeMethod = 6,
    ConnectToSignal = 7,
    DisconnectFromSignal = 8,
    SetProperty = 9,
    Response = 10,
}

impl MessageType {
    /// Map a raw `type` field to a known message type.
    pub fn from_wire(raw: i64) -> Option<Self> {
        match raw {
            1 => Some(MessageType::Signal),
            2 => Some(MessageType::PropertyUpdate),
            3 => Some(MessageType::Init),
            4 => Some(MessageType::Idle),
            5 => Some(MessageType::Debug),
            6 => Some(MessageType::InvokeMethod),
            7 => Some(MessageType::ConnectToSignal),
            8 => Some(MessageType::DisconnectFromSignal),
            9 => Some(MessageType::SetProperty),
            10 => Some(MessageType::Response),
            _ => None,
        }
    }

    /// Integer value used on the wire.
    pub fn as_wire(self) -> u8 {
        self as u8
    }
}

/// Signal emission (peer to client).
#[derive(Debug, Clone, Deserialize)]
pub struct SignalFrame {
    pub object: String,
    pub signal: i32,
    #[serde(default)]
    pub args: Vec<Value>,
}

/// Response to a correlated request (peer to client).
#[derive(Debug, Clone, Deserialize)]
pub struct ResponseFrame {
    pub id: u64,
    #[serde(default)]
    pub data: Value,
}

/// One object's slice of a property-update batch.
///
/// Keys of `properties` and `signals` are stringified property/signal
/// indexes; the engine parses them back to integers at dispatch time.
#[derive(Debug, Clone, Deserialize)]
pub struct PropertyUpdateItem {
    pub object: String,
    #[serde(default)]
    pub signals: HashMap<String, Vec<Value>>,
    #[serde(default)]
    pub properties: HashMap<String, Value>,
}

/// Batched property updates (peer to client).
#[derive(Debug, Clone, Deserialize)]
pub struct PropertyUpdateFrame {
    #[serde(default)]
    pub data: Vec<PropertyUpdateItem>,
}

/// Decoded inbound frame.
#[derive(Debug)]
pub enum Inbound {
    Signal(SignalFrame),
    PropertyUpdate(PropertyUpdateFrame),
    Response(ResponseFrame),
}

/// Decode one inbound JSON document.
///
/// Only the three peer-to-client types decode successfully; outbound types
/// and unknown values are reported as [`ObjLinkError::BadMessage`].
pub fn decode(text: &str) -> Result<Inbound> {
    let value: Value = serde_json::from_str(text)
        .map_err(|e| ObjLinkError::BadMessage(format!("invalid json: {e}")))?;
    let raw = value
        .get("type")
        .and_then(Value::as_i64)
        .ok_or_else(|| ObjLinkError::BadMessage("missing integer `type` field".into()))?;
    match MessageType::from_wire(raw) {
        Some(MessageType::Signal) => Ok(Inbound::Signal(parse(value)?)),
        Some(MessageType::Response) => Ok(Inbound::Response(parse(value)?)),
        Some(MessageType::PropertyUpdate) => Ok(Inbound::PropertyUpdate(parse(value)?)),
        _ => Err(ObjLinkError::BadMessage(format!(
            "unhandled message type {raw}"
        ))),
    }
}

fn parse<T: serde::de::DeserializeOwned>(value: Value) -> Result<T> {
    serde_json::from_value(value).map_err(|e| ObjLinkError::BadMessage(e.to_string()))
}
