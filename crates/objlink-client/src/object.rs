//! Remote-object proxies.
//!
//! A proxy mirrors one object exported by the peer: method table, property
//! cache, signal connections. Member tables are fixed at construction; only
//! the cache and the connection lists mutate afterwards, and neither lock is
//! ever held while a user callback runs.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use serde_json::{json, Value};

use objlink_core::error::{MemberKind, ObjLinkError};
use objlink_core::protocol::descriptor::ObjectDescriptor;
use objlink_core::protocol::message::{MessageType, PTR_MARKER};

use crate::channel::Channel;
use crate::lock_unpoisoned;
use crate::registry;
use crate::unwrap::{resolve_markers, Unwrap};

/// Completion callback for a method invocation. The argument is the peer's
/// response with object markers already resolved.
pub type InvokeCallback = Box<dyn FnOnce(Unwrap) + Send>;

#[derive(Debug, Clone, Copy)]
struct SignalSlot {
    index: i32,
    is_notify: bool,
}

#[derive(Clone)]
struct Connection {
    id: u64,
    signal_name: String,
    callback: Arc<dyn Fn(&[Value]) + Send + Sync>,
}

/// Connection ids are process-wide unique and never zero; the counter wraps
/// past zero instead of overflowing.
fn next_connection_id() -> u64 {
    static NEXT_CONNECTION: AtomicU64 = AtomicU64::new(1);
    loop {
        let id = NEXT_CONNECTION.fetch_add(1, Ordering::Relaxed);
        if id != 0 {
            return id;
        }
    }
}

/// The peer may advertise any of the three spellings for the implicit
/// destroy notification.
fn is_destroyed_signal(name: &str) -> bool {
    matches!(name, "destroyed" | "destroyed()" | "destroyed(QObject*)")
}

/// Local stand-in for an object exported by the peer.
pub struct RemoteObject {
    id: String,
    handle: u64,
    channel: Weak<Channel>,

    methods: HashMap<String, i32>,
    properties: HashMap<String, i32>,
    signals: HashMap<String, SignalSlot>,
    notify_signals: HashMap<i32, String>,
    enums: HashMap<String, HashMap<String, i64>>,

    property_cache: Mutex<HashMap<i32, Value>>,
    connections: Mutex<HashMap<i32, Vec<Connection>>>,
    destroy_after_signal: AtomicBool,
}

impl RemoteObject {
    /// Build a proxy from its descriptor and enter it into the channel's
    /// registry and the process-wide validity set.
    ///
    /// Initial property values are cached in wrapped form: they may
    /// reference objects that do not exist yet. The caller runs
    /// [`RemoteObject::unwrap_properties`] once the object graph is
    /// complete.
    pub(crate) fn attach(
        channel: &Arc<Channel>,
        id: &str,
        descriptor: &ObjectDescriptor,
    ) -> Arc<RemoteObject> {
        let mut methods = HashMap::new();
        for (name, index) in &descriptor.methods {
            methods.insert(name.clone(), *index);
        }

        let mut signals: HashMap<String, SignalSlot> = HashMap::new();
        let mut properties = HashMap::new();
        let mut notify_signals = HashMap::new();
        let mut cache = HashMap::new();

        for entry in &descriptor.properties {
            cache.insert(entry.index(), entry.initial_value().clone());
            if let Some((name, index)) = entry.notify_signal() {
                add_signal(&mut signals, &name, index, true);
                notify_signals.insert(entry.index(), name);
            }
            properties.insert(entry.name().to_string(), entry.index());
        }

        for (name, index) in &descriptor.signals {
            add_signal(&mut signals, name, *index, false);
        }

        let object = Arc::new(RemoteObject {
            id: id.to_string(),
            handle: registry::next_handle(),
            channel: Arc::downgrade(channel),
            methods,
            properties,
            signals,
            notify_signals,
            enums: descriptor.enums.clone(),
            property_cache: Mutex::new(cache),
            connections: Mutex::new(HashMap::new()),
            destroy_after_signal: AtomicBool::new(false),
        });
        registry::register_handle(object.handle, &object);
        channel.registry().insert(id, object.clone());
        object
    }

    /// The object id this proxy mirrors.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The owning channel, if it is still alive.
    pub fn channel(&self) -> Option<Arc<Channel>> {
        self.channel.upgrade()
    }

    /// Wire form of a local reference to this proxy. Passing this value as a
    /// method argument or property value sends the object reference to the
    /// peer.
    pub fn to_value(&self) -> Value {
        json!({ PTR_MARKER: self.handle })
    }

    /// Method names, sorted.
    pub fn methods(&self) -> Vec<String> {
        sorted_keys(&self.methods)
    }

    /// Property names, sorted.
    pub fn properties(&self) -> Vec<String> {
        sorted_keys(&self.properties)
    }

    /// Signal names (notify signals included), sorted.
    pub fn signal_names(&self) -> Vec<String> {
        sorted_keys(&self.signals)
    }

    /// Enum tables advertised by the peer.
    pub fn enums(&self) -> &HashMap<String, HashMap<String, i64>> {
        &self.enums
    }

    /// Whether `name` is a property-notify signal.
    pub fn is_notify_signal(&self, name: &str) -> bool {
        self.signals.get(name).is_some_and(|slot| slot.is_notify)
    }

    /// The notify signal for `property`, if the property declares one.
    pub fn notify_signal_for_property(&self, property: &str) -> Option<&str> {
        let index = self.properties.get(property)?;
        self.notify_signals.get(index).map(String::as_str)
    }

    /// Invoke `name` without a completion callback.
    ///
    /// The response is still awaited and unwrapped, so objects embedded in
    /// it get registered. Returns false when the method is unknown.
    pub fn invoke(&self, name: &str, args: Vec<Value>) -> bool {
        self.invoke_inner(name, args, None)
    }

    /// Invoke `name`; `callback` runs once with the unwrapped response.
    pub fn invoke_with<F>(&self, name: &str, args: Vec<Value>, callback: F) -> bool
    where
        F: FnOnce(Unwrap) + Send + 'static,
    {
        self.invoke_inner(name, args, Some(Box::new(callback)))
    }

    fn invoke_inner(&self, name: &str, args: Vec<Value>, callback: Option<InvokeCallback>) -> bool {
        let Some(&method) = self.methods.get(name) else {
            self.report_unknown(MemberKind::Method, name);
            return false;
        };
        let Some(channel) = self.channel.upgrade() else {
            tracing::warn!(object = %self.id, "invoke on a closed channel");
            return false;
        };

        let args: Vec<Value> = args.into_iter().map(rewrite_local_reference).collect();
        let msg = json!({
            "type": MessageType::InvokeMethod.as_wire(),
            "method": method,
            "args": args,
            "object": &self.id,
        });

        // The completion must not keep a retired proxy alive, hence Weak.
        // Unwrapping runs even without a user callback so that objects
        // embedded in the response get registered.
        let weak = match registry::resolve_handle(self.handle) {
            Some(object) => Arc::downgrade(&object),
            None => Weak::new(),
        };
        channel.exec_with(
            msg,
            Box::new(move |response| {
                let Some(object) = weak.upgrade() else {
                    tracing::debug!("dropping response for a retired object");
                    return;
                };
                let result = object.unwrap_value(&response);
                if let Some(callback) = callback {
                    callback(Unwrap::new(result));
                }
            }),
        );
        true
    }

    /// Read the cached value of `property`. Unknown properties and missing
    /// cache entries yield an empty value.
    pub fn property(&self, name: &str) -> Unwrap {
        let Some(&index) = self.properties.get(name) else {
            self.report_unknown(MemberKind::Property, name);
            return Unwrap::null();
        };
        let cache = lock_unpoisoned(&self.property_cache);
        Unwrap::new(cache.get(&index).cloned().unwrap_or(Value::Null))
    }

    /// Write `property` on the peer. When cache-on-write is enabled the
    /// local cache is updated before the frame leaves.
    pub fn set_property(&self, name: &str, value: Value) -> bool {
        let Some(&index) = self.properties.get(name) else {
            self.report_unknown(MemberKind::Property, name);
            return false;
        };
        let Some(channel) = self.channel.upgrade() else {
            tracing::warn!(object = %self.id, "set_property on a closed channel");
            return false;
        };

        if channel.property_caching() {
            lock_unpoisoned(&self.property_cache).insert(index, value.clone());
        }

        let sendval = rewrite_local_reference(value);
        channel.exec(json!({
            "type": MessageType::SetProperty.as_wire(),
            "property": index,
            "value": sendval,
            "object": &self.id,
        }));
        true
    }

    /// Connect `callback` to signal `name`; it receives the raw argument
    /// slice. Returns the connection id, or `None` for unknown signals.
    pub fn connect<F>(&self, name: &str, callback: F) -> Option<u64>
    where
        F: Fn(&[Value]) + Send + Sync + 'static,
    {
        self.connect_arc(name, Arc::new(callback))
    }

    /// Connect `callback` to signal `name`, coercing the first `arity`
    /// arguments individually. Missing arguments coerce from null.
    pub fn connect_n<F>(&self, name: &str, arity: usize, callback: F) -> Option<u64>
    where
        F: Fn(&[Unwrap]) + Send + Sync + 'static,
    {
        self.connect_arc(
            name,
            Arc::new(move |args: &[Value]| {
                let coerced: Vec<Unwrap> = (0..arity)
                    .map(|i| Unwrap::new(args.get(i).cloned().unwrap_or(Value::Null)))
                    .collect();
                callback(&coerced);
            }),
        )
    }

    fn connect_arc(&self, name: &str, callback: Arc<dyn Fn(&[Value]) + Send + Sync>) -> Option<u64> {
        let Some(slot) = self.signals.get(name) else {
            self.report_unknown(MemberKind::Signal, name);
            return None;
        };

        let connection = Connection {
            id: next_connection_id(),
            signal_name: name.to_string(),
            callback,
        };
        let id = connection.id;
        lock_unpoisoned(&self.connections)
            .entry(slot.index)
            .or_default()
            .push(connection);

        // Pure signals need an explicit subscription. Notify signals ride
        // along with property updates and `destroyed` is always delivered.
        if !slot.is_notify && !is_destroyed_signal(name) {
            if let Some(channel) = self.channel.upgrade() {
                channel.exec(json!({
                    "type": MessageType::ConnectToSignal.as_wire(),
                    "object": &self.id,
                    "signal": slot.index,
                }));
            }
        }
        Some(id)
    }

    /// Remove the connection with `id`. The last connection on a pure
    /// signal also unsubscribes from the peer.
    pub fn disconnect(&self, id: u64) -> bool {
        let mut connections = lock_unpoisoned(&self.connections);
        let mut found: Option<(i32, String)> = None;
        for (index, list) in connections.iter_mut() {
            if let Some(position) = list.iter().position(|c| c.id == id) {
                let connection = list.remove(position);
                found = Some((*index, connection.signal_name));
                break;
            }
        }
        let Some((index, signal_name)) = found else {
            drop(connections);
            tracing::warn!(object = %self.id, id, "disconnect: no connection with this id");
            return false;
        };
        let emptied = connections.get(&index).is_none_or(Vec::is_empty);
        drop(connections);

        let Some(slot) = self.signals.get(&signal_name) else {
            tracing::error!(object = %self.id, signal = %signal_name, "connection referenced an unknown signal");
            return false;
        };
        if emptied && !slot.is_notify && !is_destroyed_signal(&signal_name) {
            if let Some(channel) = self.channel.upgrade() {
                channel.exec(json!({
                    "type": MessageType::DisconnectFromSignal.as_wire(),
                    "object": &self.id,
                    "signal": slot.index,
                }));
            }
        }
        true
    }

    /// Deliver an inbound signal emission: resolve markers in the argument
    /// list, then fan out to the connected callbacks.
    pub(crate) fn signal_emitted(&self, index: i32, args: Vec<Value>) {
        let unwrapped: Vec<Value> = args.iter().map(|arg| self.unwrap_value(arg)).collect();
        self.invoke_signal_callbacks(index, &unwrapped);
    }

    /// Fan out to every callback connected to `index`.
    ///
    /// The connection list is snapshotted first: handlers are free to
    /// connect and disconnect, affecting only future emissions. A deferred
    /// destroy is honored after the last handler returns.
    pub(crate) fn invoke_signal_callbacks(&self, index: i32, args: &[Value]) {
        let snapshot: Vec<Connection> = lock_unpoisoned(&self.connections)
            .get(&index)
            .cloned()
            .unwrap_or_default();

        for connection in &snapshot {
            (connection.callback)(args);
        }

        if self.destroy_after_signal.load(Ordering::Acquire) {
            registry::retire_handle(self.handle);
        }
    }

    /// Apply one object's slice of a property-update batch: cache first,
    /// with markers resolved, then notify-signal callbacks. The order
    /// guarantees a notify handler reading the property sees the new value.
    ///
    /// Arguments of these signals arrive pre-resolved per the update
    /// contract, so delivery bypasses `signal_emitted` to avoid a second
    /// unwrap pass.
    pub(crate) fn property_update(
        &self,
        signals: HashMap<String, Vec<Value>>,
        properties: HashMap<String, Value>,
    ) {
        let mut resolved: Vec<(i32, Value)> = Vec::with_capacity(properties.len());
        for (key, value) in &properties {
            let Ok(index) = key.parse::<i32>() else {
                tracing::warn!(object = %self.id, key = %key, "non-numeric property index");
                continue;
            };
            resolved.push((index, self.unwrap_value(value)));
        }
        {
            let mut cache = lock_unpoisoned(&self.property_cache);
            for (index, value) in resolved {
                cache.insert(index, value);
            }
        }

        for (key, args) in &signals {
            let Ok(index) = key.parse::<i32>() else {
                tracing::warn!(object = %self.id, key = %key, "non-numeric signal index");
                continue;
            };
            self.invoke_signal_callbacks(index, args);
        }
    }

    /// Resolve markers in every cached property value in place.
    pub(crate) fn unwrap_properties(&self) {
        let entries: Vec<(i32, Value)> = lock_unpoisoned(&self.property_cache)
            .iter()
            .map(|(index, value)| (*index, value.clone()))
            .collect();
        let resolved: Vec<(i32, Value)> = entries
            .into_iter()
            .map(|(index, value)| (index, self.unwrap_value(&value)))
            .collect();
        let mut cache = lock_unpoisoned(&self.property_cache);
        for (index, value) in resolved {
            cache.insert(index, value);
        }
    }

    pub(crate) fn unwrap_value(&self, value: &Value) -> Value {
        match self.channel.upgrade() {
            Some(channel) => resolve_markers(&channel, value),
            None => value.clone(),
        }
    }

    pub(crate) fn mark_destroy_after_signal(&self) {
        self.destroy_after_signal.store(true, Ordering::Release);
    }

    fn report_unknown(&self, kind: MemberKind, name: &str) {
        let err = ObjLinkError::UnknownMember {
            kind,
            object: self.id.clone(),
            name: name.to_string(),
        };
        tracing::warn!(code = err.code().as_str(), "{err}");
    }
}

impl Drop for RemoteObject {
    fn drop(&mut self) {
        registry::retire_handle(self.handle);
    }
}

impl std::fmt::Debug for RemoteObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteObject")
            .field("id", &self.id)
            .field("methods", &self.methods.len())
            .field("properties", &self.properties.len())
            .field("signals", &self.signals.len())
            .finish()
    }
}

/// An existing slot may only be replaced by a signal of the same kind, so a
/// property-notify signal never degrades into a pure one.
fn add_signal(signals: &mut HashMap<String, SignalSlot>, name: &str, index: i32, is_notify: bool) {
    if let Some(existing) = signals.get(name) {
        if existing.is_notify != is_notify {
            return;
        }
    }
    signals.insert(name.to_string(), SignalSlot { index, is_notify });
}

/// Outbound values referencing a local proxy are rewritten to the peer's
/// form `{"id": <object id>}`. Stale references become null.
fn rewrite_local_reference(value: Value) -> Value {
    let Some(handle) = value.get(PTR_MARKER).and_then(Value::as_u64) else {
        return value;
    };
    match registry::resolve_handle(handle) {
        Some(object) => json!({ "id": object.id() }),
        None => {
            tracing::warn!(handle, "outbound value references a retired object");
            Value::Null
        }
    }
}

fn sorted_keys<V>(map: &HashMap<String, V>) -> Vec<String> {
    let mut keys: Vec<String> = map.keys().cloned().collect();
    keys.sort();
    keys
}
