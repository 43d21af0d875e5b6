//! Wire protocol: message envelopes and object descriptors.

pub mod descriptor;
pub mod message;
