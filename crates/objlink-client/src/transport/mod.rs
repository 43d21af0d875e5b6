//! Transport contract and adapters.
//!
//! A transport is a duplex text channel: `send` transmits one framed JSON
//! document, and the engine registers a handler that the transport invokes
//! once per received document. Framing is the transport's responsibility;
//! the shipped TCP adapter uses newline delimiting.

pub mod memory;
pub mod tcp;

use objlink_core::Result;

/// Handler invoked once per inbound message (one JSON document per call).
pub type MessageHandler = Box<dyn Fn(&str) + Send + Sync>;

/// Duplex text channel carrying whole messages in both directions.
pub trait Transport: Send + Sync {
    /// Transmit one framed message.
    fn send(&self, text: &str) -> Result<()>;

    /// Install the inbound message handler.
    fn register_message_handler(&self, handler: MessageHandler);
}
