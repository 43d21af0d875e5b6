//! Object registry, pending-call table, and the process-wide validity set.
//!
//! The registry is the single source of truth for object identity: every
//! inbound reference resolves through it and proxies are never cloned. The
//! validity set maps opaque handles to live proxies so a stale handle from
//! the peer can never reach freed state.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock, Weak};

use dashmap::DashMap;
use serde_json::Value;

use crate::lock_unpoisoned;
use crate::object::RemoteObject;

/// Live proxies of one channel, keyed by object id.
#[derive(Default)]
pub struct ObjectRegistry {
    objects: Mutex<HashMap<String, Arc<RemoteObject>>>,
}

impl ObjectRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// A duplicate id is a protocol violation; the first proxy stays
    /// authoritative and the collision is reported.
    pub(crate) fn insert(&self, id: &str, object: Arc<RemoteObject>) {
        let mut objects = lock_unpoisoned(&self.objects);
        if objects.contains_key(id) {
            tracing::error!(object = %id, "registry already holds a proxy for this id; insert refused");
            return;
        }
        objects.insert(id.to_string(), object);
    }

    pub(crate) fn remove(&self, id: &str) -> Option<Arc<RemoteObject>> {
        lock_unpoisoned(&self.objects).remove(id)
    }

    /// Proxy lookup by object id.
    pub fn get(&self, id: &str) -> Option<Arc<RemoteObject>> {
        lock_unpoisoned(&self.objects).get(id).cloned()
    }

    /// Point-in-time copy of the registry contents.
    pub fn snapshot(&self) -> HashMap<String, Arc<RemoteObject>> {
        lock_unpoisoned(&self.objects).clone()
    }

    pub fn len(&self) -> usize {
        lock_unpoisoned(&self.objects).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One-shot completion for a correlated request.
pub(crate) type PendingCallback = Box<dyn FnOnce(Value) + Send>;

/// Pending-call table: request id to completion callback. Entries are
/// inserted exactly once and consumed exactly once.
#[derive(Default)]
pub(crate) struct PendingCalls {
    calls: Mutex<HashMap<u64, PendingCallback>>,
}

impl PendingCalls {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&self, id: u64, callback: PendingCallback) {
        let mut calls = lock_unpoisoned(&self.calls);
        if calls.contains_key(&id) {
            // an outstanding id was reused: the correlation space wrapped
            // within one session, which the protocol does not support
            tracing::error!(id, "pending request id still outstanding; insert refused");
            return;
        }
        calls.insert(id, callback);
    }

    pub(crate) fn take(&self, id: u64) -> Option<PendingCallback> {
        lock_unpoisoned(&self.calls).remove(&id)
    }

    pub(crate) fn len(&self) -> usize {
        lock_unpoisoned(&self.calls).len()
    }
}

static NEXT_HANDLE: AtomicU64 = AtomicU64::new(1);

fn live_objects() -> &'static DashMap<u64, Weak<RemoteObject>> {
    static LIVE: OnceLock<DashMap<u64, Weak<RemoteObject>>> = OnceLock::new();
    LIVE.get_or_init(DashMap::new)
}

/// Mint a fresh validity-set handle. Zero is never handed out, so a zero
/// handle in a payload is always invalid.
pub(crate) fn next_handle() -> u64 {
    loop {
        let handle = NEXT_HANDLE.fetch_add(1, Ordering::Relaxed);
        if handle != 0 {
            return handle;
        }
    }
}

/// Enter a proxy into the validity set under its handle.
pub(crate) fn register_handle(handle: u64, object: &Arc<RemoteObject>) {
    live_objects().insert(handle, Arc::downgrade(object));
}

/// Resolve a handle to its live proxy, refusing retired or unknown handles.
pub(crate) fn resolve_handle(handle: u64) -> Option<Arc<RemoteObject>> {
    live_objects().get(&handle).and_then(|weak| weak.upgrade())
}

/// Drop a handle from the validity set. Idempotent.
pub(crate) fn retire_handle(handle: u64) {
    live_objects().remove(&handle);
}
