//! Shared helpers for engine scenario tests.

#![allow(dead_code)]

use std::sync::Arc;

use serde_json::Value;

use objlink_client::transport::memory::MemoryTransport;
use objlink_client::Channel;

pub type MemoryTransportRef = Arc<MemoryTransport>;

/// Object `obj1`: two methods, one property `x` (index 1, notify `xChanged`
/// at index 3, initial 42), one pure signal `fired` (index 5), `destroyed`
/// (index 0), and an enum table.
pub const RICH: &str = r#"{"obj1":{"methods":[["ping",7],["add",8]],"properties":[[1,"x",[1,3],42]],"signals":[["fired",5],["destroyed",0]],"enums":{"Mode":{"Idle":0,"Busy":1}}}}"#;

/// Descriptor payload for the transient object `obj2`, as embedded by the
/// peer inside responses and signal arguments.
pub const OBJ2_MARKER: &str = r#"{"__QObject*__":true,"id":"obj2","data":{"methods":[["poke",1]],"properties":[[1,"y",[],5]],"signals":[["destroyed",0]]}}"#;

pub fn parsed(frames: Vec<String>) -> Vec<Value> {
    frames
        .iter()
        .map(|frame| serde_json::from_str(frame).unwrap())
        .collect()
}

/// Pop exactly one sent frame.
pub fn single(transport: &MemoryTransport) -> Value {
    let mut frames = parsed(transport.take_sent());
    assert_eq!(frames.len(), 1, "expected exactly one frame: {frames:?}");
    frames.remove(0)
}

/// Build a channel over a memory transport and complete the handshake with
/// `init_data`, the JSON text of the name-to-descriptor map.
///
/// Consumes the init request and the post-handshake idle frame, so the
/// transport starts clean for the test body.
pub fn connected(init_data: &str) -> (Arc<MemoryTransport>, Arc<Channel>) {
    let transport = Arc::new(MemoryTransport::new());
    let channel = Channel::new(transport.clone());

    let init = single(&transport);
    assert_eq!(init["type"], 3);
    assert_eq!(init["id"], 0);

    transport.deliver(&format!(r#"{{"type":10,"id":0,"data":{init_data}}}"#));

    let idle = single(&transport);
    assert_eq!(idle["type"], 4);

    (transport, channel)
}
