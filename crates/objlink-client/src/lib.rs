//! objlink client engine.
//!
//! This crate assembles the client half of the remote-object bridge:
//! - Channel: handshake, inbound dispatch, request correlation, idle protocol
//! - RemoteObject: per-object proxy with methods, cached properties, signals
//! - Registry: one live proxy per object id, plus the process-wide validity
//!   set used to resolve pointer markers safely
//! - Unwrap: recursive object-marker resolution and typed value coercion
//! - Transports: newline-delimited TCP (tokio) and an in-process memory
//!   transport for tests and embedding
//!
//! The engine is designed for panic-free operation: peer anomalies surface
//! as `tracing` events and falsy returns instead of crashing the process.
//! All message handling and user callbacks run on the transport's delivery
//! thread; locks are never held across a user callback.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod channel;
pub mod object;
pub mod registry;
pub mod stats;
pub mod transport;
pub mod unwrap;

pub use channel::Channel;
pub use object::RemoteObject;
pub use stats::StatsSnapshot;
pub use unwrap::Unwrap;

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Locks ignoring poisoning: a panicking user callback must not wedge the
/// engine for every later frame.
pub(crate) fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
