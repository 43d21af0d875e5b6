//! Method invocation and response correlation tests.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::sync::{Arc, Mutex};

use serde_json::{json, Value};

mod support;
use support::{connected, single, OBJ2_MARKER, RICH};

#[test]
fn invoke_with_callback_round_trip() {
    let (transport, channel) = connected(RICH);
    let obj1 = channel.object("obj1").unwrap();

    let results: Arc<Mutex<Vec<Value>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = results.clone();
    assert!(obj1.invoke_with("ping", vec![json!(1), json!(2)], move |response| {
        sink.lock().unwrap().push(response.into_value());
    }));

    let frame = single(&transport);
    assert_eq!(frame["type"], 6);
    assert_eq!(frame["method"], 7);
    assert_eq!(frame["args"], json!([1, 2]));
    assert_eq!(frame["object"], "obj1");
    assert_eq!(frame["id"], 1);
    assert_eq!(channel.pending_requests(), 1);

    transport.deliver(r#"{"type":10,"id":1,"data":99}"#);

    assert_eq!(*results.lock().unwrap(), vec![json!(99)]);
    assert_eq!(channel.pending_requests(), 0);
}

#[test]
fn unknown_method_is_rejected_locally() {
    let (transport, channel) = connected(RICH);
    let obj1 = channel.object("obj1").unwrap();

    assert!(!obj1.invoke("frobnicate", vec![]));
    assert!(transport.take_sent().is_empty());
    assert_eq!(channel.pending_requests(), 0);
}

#[test]
fn responses_correlate_out_of_order() {
    let (transport, channel) = connected(RICH);
    let obj1 = channel.object("obj1").unwrap();

    let order: Arc<Mutex<Vec<(&'static str, Value)>>> = Arc::new(Mutex::new(Vec::new()));
    let first = order.clone();
    obj1.invoke_with("ping", vec![], move |response| {
        first.lock().unwrap().push(("ping", response.into_value()));
    });
    let second = order.clone();
    obj1.invoke_with("add", vec![], move |response| {
        second.lock().unwrap().push(("add", response.into_value()));
    });

    let frames = support::parsed(transport.take_sent());
    assert_eq!(frames[0]["id"], 1);
    assert_eq!(frames[1]["id"], 2);

    // the peer answers the second call first
    transport.deliver(r#"{"type":10,"id":2,"data":"second"}"#);
    transport.deliver(r#"{"type":10,"id":1,"data":"first"}"#);

    let order = order.lock().unwrap();
    assert_eq!(*order, vec![("add", json!("second")), ("ping", json!("first"))]);
    assert_eq!(channel.pending_requests(), 0);
}

#[test]
fn unmatched_response_is_dropped() {
    let (transport, channel) = connected(RICH);
    transport.deliver(r#"{"type":10,"id":77,"data":1}"#);
    assert_eq!(channel.stats().dropped_frames, 1);
}

#[test]
fn proxy_arguments_travel_as_object_ids() {
    let init = r#"{"caller":{"methods":[["use",1]]},"target":{"methods":[["m",2]]}}"#;
    let (transport, channel) = connected(init);
    let caller = channel.object("caller").unwrap();
    let target = channel.object("target").unwrap();

    assert!(caller.invoke("use", vec![target.to_value(), json!("plain")]));

    let frame = single(&transport);
    assert_eq!(frame["args"], json!([{ "id": "target" }, "plain"]));
}

#[test]
fn stale_proxy_argument_becomes_null() {
    let (transport, channel) = connected(RICH);
    let obj1 = channel.object("obj1").unwrap();

    assert!(obj1.invoke("ping", vec![json!({ "__ptr__": 18_446_744_073_709_551_615u64 })]));
    let frame = single(&transport);
    assert_eq!(frame["args"], json!([null]));
}

#[test]
fn response_payload_materializes_embedded_objects() {
    let (transport, channel) = connected(RICH);
    let obj1 = channel.object("obj1").unwrap();

    let seen: Arc<Mutex<Vec<Option<String>>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    obj1.invoke_with("ping", vec![], move |response| {
        let id = response.object().map(|o| o.id().to_string());
        sink.lock().unwrap().push(id);
    });

    let _ = transport.take_sent();
    transport.deliver(&format!(r#"{{"type":10,"id":1,"data":{OBJ2_MARKER}}}"#));

    assert_eq!(*seen.lock().unwrap(), vec![Some("obj2".to_string())]);
    let obj2 = channel.object("obj2").expect("lazily registered");
    assert_eq!(obj2.property("y").get::<i64>(), Some(5));
}

#[test]
fn fire_and_forget_invoke_still_registers_embedded_objects() {
    let (transport, channel) = connected(RICH);
    let obj1 = channel.object("obj1").unwrap();

    assert!(obj1.invoke("ping", vec![]));
    let frame = single(&transport);
    transport.deliver(&format!(
        r#"{{"type":10,"id":{},"data":{OBJ2_MARKER}}}"#,
        frame["id"]
    ));

    assert!(channel.object("obj2").is_some());
}
