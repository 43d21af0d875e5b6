//! In-process transport.
//!
//! This is the semantic reference for adapter behavior and the backbone of
//! the engine's scenario tests: outbound frames are captured for inspection
//! and inbound frames are injected with [`MemoryTransport::deliver`].

use std::sync::{Arc, Mutex};

use objlink_core::Result;

use super::{MessageHandler, Transport};
use crate::lock_unpoisoned;

type SharedHandler = Arc<dyn Fn(&str) + Send + Sync>;

/// Loopback transport with no I/O.
#[derive(Default)]
pub struct MemoryTransport {
    handler: Mutex<Option<SharedHandler>>,
    sent: Mutex<Vec<String>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Frames the engine has sent since the last call.
    pub fn take_sent(&self) -> Vec<String> {
        std::mem::take(&mut *lock_unpoisoned(&self.sent))
    }

    /// Frames sent so far, without consuming them.
    pub fn sent(&self) -> Vec<String> {
        lock_unpoisoned(&self.sent).clone()
    }

    /// Hand one inbound document to the registered handler.
    ///
    /// Returns false when no handler is installed yet. The handler runs on
    /// the caller's thread, outside the transport's locks, so handlers may
    /// send or deliver further frames.
    pub fn deliver(&self, text: &str) -> bool {
        let handler = lock_unpoisoned(&self.handler).clone();
        match handler {
            Some(handler) => {
                handler(text);
                true
            }
            None => false,
        }
    }
}

impl Transport for MemoryTransport {
    fn send(&self, text: &str) -> Result<()> {
        lock_unpoisoned(&self.sent).push(text.to_string());
        Ok(())
    }

    fn register_message_handler(&self, handler: MessageHandler) {
        *lock_unpoisoned(&self.handler) = Some(Arc::from(handler));
    }
}
