//! Channel counters.
//!
//! Plumbing-level accounting only: atomic counters with a snapshot accessor,
//! no labels and no exporter.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Default)]
pub(crate) struct ChannelStats {
    pub(crate) messages_in: AtomicU64,
    pub(crate) messages_out: AtomicU64,
    pub(crate) signals_delivered: AtomicU64,
    pub(crate) property_updates: AtomicU64,
    pub(crate) responses_matched: AtomicU64,
    pub(crate) decode_errors: AtomicU64,
    pub(crate) dropped_frames: AtomicU64,
}

impl ChannelStats {
    pub(crate) fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            messages_in: self.messages_in.load(Ordering::Relaxed),
            messages_out: self.messages_out.load(Ordering::Relaxed),
            signals_delivered: self.signals_delivered.load(Ordering::Relaxed),
            property_updates: self.property_updates.load(Ordering::Relaxed),
            responses_matched: self.responses_matched.load(Ordering::Relaxed),
            decode_errors: self.decode_errors.load(Ordering::Relaxed),
            dropped_frames: self.dropped_frames.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of a channel's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Frames received from the transport.
    pub messages_in: u64,
    /// Frames handed to the transport.
    pub messages_out: u64,
    /// Inbound signal frames delivered to a proxy.
    pub signals_delivered: u64,
    /// Property-update batches processed.
    pub property_updates: u64,
    /// Responses matched to a pending request.
    pub responses_matched: u64,
    /// Inbound frames dropped because they failed to decode.
    pub decode_errors: u64,
    /// Well-formed frames dropped (unknown object, unmatched response).
    pub dropped_frames: u64,
}
