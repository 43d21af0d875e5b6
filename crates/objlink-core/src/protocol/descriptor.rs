//! Object descriptors, received in the init response or embedded in payloads.

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::Value;

/// Method table entry: `[name, index]`.
pub type MethodEntry = (String, i32);

/// Signal table entry: `[name, index]`.
pub type SignalEntry = (String, i32);

/// Property table entry: `[index, name, notifySignal, initialValue]`.
///
/// `notifySignal` is `[name | 1, index]`, or an empty array when the property
/// has no change notification. A leading `1` means the signal name was elided
/// on the wire and is reconstructed as `<propertyName>Changed`.
#[derive(Debug, Clone, Deserialize)]
pub struct PropertyEntry(pub i32, pub String, pub Vec<Value>, pub Value);

impl PropertyEntry {
    pub fn index(&self) -> i32 {
        self.0
    }

    pub fn name(&self) -> &str {
        &self.1
    }

    pub fn initial_value(&self) -> &Value {
        &self.3
    }

    /// Resolved notify signal `(name, index)`, reconstructing elided names.
    pub fn notify_signal(&self) -> Option<(String, i32)> {
        let raw = &self.2;
        if raw.is_empty() {
            return None;
        }
        let index = raw.get(1).and_then(Value::as_i64)? as i32;
        let name = match &raw[0] {
            Value::Number(n) if n.as_i64() == Some(1) => format!("{}Changed", self.1),
            Value::String(s) => s.clone(),
            _ => return None,
        };
        Some((name, index))
    }
}

/// Everything the peer advertises about one exported object.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ObjectDescriptor {
    #[serde(default)]
    pub methods: Vec<MethodEntry>,
    #[serde(default)]
    pub properties: Vec<PropertyEntry>,
    #[serde(default)]
    pub signals: Vec<SignalEntry>,
    #[serde(default)]
    pub enums: HashMap<String, HashMap<String, i64>>,
}
