//! Marker resolution and value coercion.
//!
//! Payloads may embed object references of the shape
//! `{"__QObject*__": true, "id": <string>, "data": <descriptor>?}`.
//! [`resolve_markers`] rewrites every such marker into a local handle
//! reference `{"__ptr__": <handle>}`, lazily constructing proxies for
//! objects the registry has not seen yet. [`Unwrap`] is the read-side
//! helper that turns resolved values back into typed data or live proxies.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use objlink_core::error::ObjLinkError;
use objlink_core::protocol::descriptor::ObjectDescriptor;
use objlink_core::protocol::message::{OBJECT_MARKER, PTR_MARKER};

use crate::channel::Channel;
use crate::object::RemoteObject;
use crate::registry;

/// Recursively resolve object markers in `value`.
///
/// Arrays and plain objects are walked element by element; a marker either
/// resolves to the registered proxy or materializes a new one from its
/// embedded descriptor. Unresolvable markers become null.
pub(crate) fn resolve_markers(channel: &Arc<Channel>, value: &Value) -> Value {
    match value {
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| resolve_markers(channel, item))
                .collect(),
        ),
        Value::Object(map) => {
            if map.contains_key(OBJECT_MARKER) && map.contains_key("id") {
                resolve_object(channel, map)
            } else {
                let mut out = Map::new();
                for (key, item) in map {
                    out.insert(key.clone(), resolve_markers(channel, item));
                }
                Value::Object(out)
            }
        }
        other => other.clone(),
    }
}

fn resolve_object(channel: &Arc<Channel>, map: &Map<String, Value>) -> Value {
    let Some(id) = map.get("id").and_then(Value::as_str) else {
        tracing::warn!("object marker without a string id");
        return Value::Null;
    };

    if let Some(existing) = channel.registry().get(id) {
        return existing.to_value();
    }

    let Some(data) = map.get("data") else {
        let err = ObjLinkError::MissingData(id.to_string());
        tracing::warn!(code = err.code().as_str(), "{err}");
        return Value::Null;
    };
    let descriptor: ObjectDescriptor = match serde_json::from_value(data.clone()) {
        Ok(descriptor) => descriptor,
        Err(e) => {
            tracing::warn!(object = %id, error = %e, "invalid embedded descriptor");
            return Value::Null;
        }
    };

    let object = RemoteObject::attach(channel, id, &descriptor);

    // Transient objects announce their own end. Drop the proxy from the
    // registry right away and defer the final release until the current
    // fan-out completes, so destroy handlers still see a live object.
    let weak = Arc::downgrade(&object);
    object.connect("destroyed", move |_args: &[Value]| {
        if let Some(object) = weak.upgrade() {
            if let Some(channel) = object.channel() {
                channel.registry().remove(object.id());
            }
            object.mark_destroy_after_signal();
        }
    });

    // past init, cross-references must resolve immediately
    object.unwrap_properties();

    object.to_value()
}

/// Deferred coercion over a resolved JSON value.
///
/// Signal arguments, method results, and property reads all hand out
/// `Unwrap` so each consumer picks its own target type: plain data via
/// [`Unwrap::get`], object references via [`Unwrap::object`].
#[derive(Debug, Clone)]
pub struct Unwrap(Value);

impl Unwrap {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    pub fn null() -> Self {
        Self(Value::Null)
    }

    pub fn value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }

    pub fn is_null(&self) -> bool {
        self.0.is_null()
    }

    /// Coerce to a plain data type. Failures are logged and yield `None`.
    pub fn get<T: DeserializeOwned>(&self) -> Option<T> {
        match serde_json::from_value(self.0.clone()) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(error = %e, "value coercion failed");
                None
            }
        }
    }

    /// Resolve to the live proxy this value references.
    ///
    /// Null yields `None` silently; a non-marker value or a handle that is
    /// no longer in the validity set is logged and yields `None`.
    pub fn object(&self) -> Option<Arc<RemoteObject>> {
        if self.0.is_null() {
            return None;
        }
        let Some(handle) = self.0.get(PTR_MARKER).and_then(Value::as_u64) else {
            tracing::warn!("value does not reference a native object");
            return None;
        };
        let resolved = registry::resolve_handle(handle);
        if resolved.is_none() {
            tracing::warn!(handle, "stale object reference");
        }
        resolved
    }
}
