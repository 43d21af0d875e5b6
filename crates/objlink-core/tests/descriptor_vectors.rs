//! Object descriptor vector tests.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::fs;

use objlink_core::protocol::descriptor::ObjectDescriptor;

fn load(name: &str) -> ObjectDescriptor {
    let s = fs::read_to_string(format!("tests/vectors/{name}")).unwrap();
    serde_json::from_str(&s).unwrap()
}

#[test]
fn parse_full_descriptor() {
    let desc = load("descriptor_full.json");

    assert_eq!(
        desc.methods,
        vec![("ping".to_string(), 7), ("echo".to_string(), 8)]
    );
    assert_eq!(
        desc.signals,
        vec![("fired".to_string(), 5), ("destroyed".to_string(), 0)]
    );
    assert_eq!(desc.enums["Mode"]["Idle"], 0);
    assert_eq!(desc.enums["Mode"]["Busy"], 1);

    assert_eq!(desc.properties.len(), 3);
    let x = &desc.properties[0];
    assert_eq!(x.index(), 1);
    assert_eq!(x.name(), "x");
    assert_eq!(x.initial_value(), &serde_json::json!(42));

    // name elided on the wire, reconstructed from the property name
    assert_eq!(x.notify_signal(), Some(("xChanged".to_string(), 3)));

    // explicit notify signal name is kept as-is
    let label = &desc.properties[1];
    assert_eq!(label.notify_signal(), Some(("labelModified".to_string(), 4)));

    // empty notify array means no change notification
    let silent = &desc.properties[2];
    assert_eq!(silent.notify_signal(), None);
}

#[test]
fn parse_empty_descriptor() {
    let desc = load("descriptor_empty.json");
    assert!(desc.methods.is_empty());
    assert!(desc.properties.is_empty());
    assert!(desc.signals.is_empty());
    assert!(desc.enums.is_empty());
}
