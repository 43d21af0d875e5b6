//! Channel engine: handshake, inbound dispatch, request correlation.
//!
//! The channel owns the transport, the pending-call table, and the object
//! registry. It sends the init request on construction, builds proxies from
//! the response, and routes every later frame to the right proxy. All
//! processing happens on the transport's delivery thread; completions and
//! signal callbacks run inline.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use serde_json::{json, Value};

use objlink_core::error::ObjLinkError;
use objlink_core::protocol::descriptor::ObjectDescriptor;
use objlink_core::protocol::message::{self, Inbound, MessageType};
use objlink_core::protocol::message::{PropertyUpdateFrame, ResponseFrame, SignalFrame};

use crate::lock_unpoisoned;
use crate::object::RemoteObject;
use crate::registry::{ObjectRegistry, PendingCallback, PendingCalls};
use crate::stats::{ChannelStats, StatsSnapshot};
use crate::transport::Transport;

/// Callback invoked once after the handshake completes and all advertised
/// proxies exist.
pub type InitCallback = Box<dyn FnOnce(&Arc<Channel>) + Send>;

/// Client side of one bridge connection.
pub struct Channel {
    weak: Weak<Channel>,
    transport: Arc<dyn Transport>,
    objects: ObjectRegistry,
    pending: PendingCalls,
    next_request_id: AtomicU64,
    init_callback: Mutex<Option<InitCallback>>,
    property_caching: AtomicBool,
    auto_idle: AtomicBool,
    stats: ChannelStats,
}

impl Channel {
    /// Open a channel over `transport` and start the handshake.
    pub fn new(transport: Arc<dyn Transport>) -> Arc<Channel> {
        Self::build(transport, None)
    }

    /// Open a channel; `init` runs once the peer's objects are available.
    pub fn with_init<F>(transport: Arc<dyn Transport>, init: F) -> Arc<Channel>
    where
        F: FnOnce(&Arc<Channel>) + Send + 'static,
    {
        Self::build(transport, Some(Box::new(init)))
    }

    fn build(transport: Arc<dyn Transport>, init: Option<InitCallback>) -> Arc<Channel> {
        let channel = Arc::new_cyclic(|weak: &Weak<Channel>| Channel {
            weak: weak.clone(),
            transport,
            objects: ObjectRegistry::new(),
            pending: PendingCalls::new(),
            next_request_id: AtomicU64::new(0),
            init_callback: Mutex::new(init),
            property_caching: AtomicBool::new(true),
            auto_idle: AtomicBool::new(true),
            stats: ChannelStats::default(),
        });

        let weak = Arc::downgrade(&channel);
        channel
            .transport
            .register_message_handler(Box::new(move |text: &str| {
                if let Some(channel) = weak.upgrade() {
                    channel.handle_message(text);
                }
            }));

        let weak = Arc::downgrade(&channel);
        channel.exec_with(
            json!({ "type": MessageType::Init.as_wire() }),
            Box::new(move |data| {
                if let Some(channel) = weak.upgrade() {
                    channel.connection_made(data);
                }
            }),
        );
        channel
    }

    /// Proxy lookup by object name.
    pub fn object(&self, name: &str) -> Option<Arc<RemoteObject>> {
        self.objects.get(name)
    }

    /// Snapshot of every exported object.
    pub fn objects(&self) -> HashMap<String, Arc<RemoteObject>> {
        self.objects.snapshot()
    }

    pub(crate) fn registry(&self) -> &ObjectRegistry {
        &self.objects
    }

    /// Whether `set_property` updates the local cache before the peer
    /// confirms. On by default.
    pub fn property_caching(&self) -> bool {
        self.property_caching.load(Ordering::Relaxed)
    }

    pub fn set_property_caching(&self, enabled: bool) {
        self.property_caching.store(enabled, Ordering::Relaxed);
    }

    /// Whether a processed property-update batch automatically reports the
    /// client idle. On by default.
    pub fn auto_idle(&self) -> bool {
        self.auto_idle.load(Ordering::Relaxed)
    }

    pub fn set_auto_idle(&self, enabled: bool) {
        self.auto_idle.store(enabled, Ordering::Relaxed);
        if enabled {
            self.idle();
        }
    }

    /// Tell the peer the client is idle and ready for update batches.
    pub fn idle(&self) {
        self.exec(json!({ "type": MessageType::Idle.as_wire() }));
    }

    /// Send a debug payload to the peer.
    pub fn debug(&self, data: Value) {
        self.exec(json!({ "type": MessageType::Debug.as_wire(), "data": data }));
    }

    /// Counter snapshot for this channel.
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Requests awaiting a response.
    pub fn pending_requests(&self) -> usize {
        self.pending.len()
    }

    /// Send `data` without expecting a response.
    pub(crate) fn exec(&self, data: Value) {
        self.send(&data);
    }

    /// Correlate `data` with a fresh request id and send it; `callback`
    /// runs once when the matching response arrives.
    pub(crate) fn exec_with(&self, mut data: Value, callback: PendingCallback) {
        let Value::Object(fields) = &mut data else {
            tracing::error!("outbound request must be a json object; dropped");
            return;
        };
        if fields.contains_key("id") {
            let err = ObjLinkError::DuplicateId;
            tracing::error!(code = err.code().as_str(), "{err}; request dropped");
            return;
        }
        let id = self.next_request_id.fetch_add(1, Ordering::Relaxed);
        fields.insert("id".into(), json!(id));
        self.pending.insert(id, callback);
        self.send(&data);
    }

    fn send(&self, frame: &Value) {
        match serde_json::to_string(frame) {
            Ok(text) => {
                if let Err(e) = self.transport.send(&text) {
                    tracing::warn!(error = %e, "transport send failed");
                } else {
                    self.stats.messages_out.fetch_add(1, Ordering::Relaxed);
                }
            }
            Err(e) => tracing::error!(error = %e, "frame serialization failed"),
        }
    }

    /// Entry point for every inbound document.
    fn handle_message(&self, text: &str) {
        self.stats.messages_in.fetch_add(1, Ordering::Relaxed);
        match message::decode(text) {
            Ok(Inbound::Signal(frame)) => self.handle_signal(frame),
            Ok(Inbound::Response(frame)) => self.handle_response(frame),
            Ok(Inbound::PropertyUpdate(frame)) => self.handle_property_update(frame),
            Err(e) => {
                self.stats.decode_errors.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(code = e.code().as_str(), "dropping inbound frame: {e}");
            }
        }
    }

    fn handle_signal(&self, frame: SignalFrame) {
        let Some(object) = self.objects.get(&frame.object) else {
            self.stats.dropped_frames.fetch_add(1, Ordering::Relaxed);
            let err = ObjLinkError::UnknownObject(frame.object);
            tracing::warn!(code = err.code().as_str(), signal = frame.signal, "dropping signal: {err}");
            return;
        };
        self.stats.signals_delivered.fetch_add(1, Ordering::Relaxed);
        object.signal_emitted(frame.signal, frame.args);
    }

    fn handle_response(&self, frame: ResponseFrame) {
        match self.pending.take(frame.id) {
            Some(callback) => {
                self.stats.responses_matched.fetch_add(1, Ordering::Relaxed);
                callback(frame.data);
            }
            None => {
                self.stats.dropped_frames.fetch_add(1, Ordering::Relaxed);
                let err = ObjLinkError::UnmatchedResponse(frame.id);
                tracing::warn!(code = err.code().as_str(), "{err}");
            }
        }
    }

    fn handle_property_update(&self, frame: PropertyUpdateFrame) {
        self.stats.property_updates.fetch_add(1, Ordering::Relaxed);
        for item in frame.data {
            match self.objects.get(&item.object) {
                Some(object) => object.property_update(item.signals, item.properties),
                None => {
                    self.stats.dropped_frames.fetch_add(1, Ordering::Relaxed);
                    let err = ObjLinkError::UnknownObject(item.object);
                    tracing::warn!(code = err.code().as_str(), "dropping property update: {err}");
                }
            }
        }
        if self.auto_idle() {
            self.idle();
        }
    }

    /// Handshake completion: build a proxy per advertised object, resolve
    /// cross-references between their initial property values, hand control
    /// to the user's init callback, then report idle.
    fn connection_made(&self, data: Value) {
        let Some(me) = self.weak.upgrade() else {
            return;
        };
        let Value::Object(descriptors) = data else {
            tracing::error!("malformed init response payload");
            return;
        };
        for (name, raw) in descriptors {
            match serde_json::from_value::<ObjectDescriptor>(raw) {
                Ok(descriptor) => {
                    RemoteObject::attach(&me, &name, &descriptor);
                }
                Err(e) => {
                    tracing::warn!(object = %name, error = %e, "invalid object descriptor");
                }
            }
        }

        for object in self.objects.snapshot().values() {
            object.unwrap_properties();
        }

        let init = lock_unpoisoned(&self.init_callback).take();
        if let Some(init) = init {
            init(&me);
        }

        self.idle();
    }
}

impl std::fmt::Debug for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel")
            .field("objects", &self.objects.len())
            .field("pending", &self.pending.len())
            .finish()
    }
}
