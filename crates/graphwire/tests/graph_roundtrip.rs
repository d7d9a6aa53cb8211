// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

#![allow(clippy::uninlined_format_args)] // Test/bench code readability over pedantic
#![allow(clippy::float_cmp)] // Test assertions with constants
#![allow(clippy::unreadable_literal)] // Large test constants
#![allow(clippy::missing_panics_doc)] // Tests/examples panic on failure
#![allow(clippy::items_after_statements)] // Test helpers
#![allow(clippy::too_many_lines)] // Example/test code
#![allow(clippy::wildcard_imports)] // Test utility imports
#![allow(clippy::similar_names)] // Test variable naming
#![allow(clippy::shadow_unrelated)] // Test scoping

//! Graph-mode round-trip tests: object graphs, sharing, cycles, resets,
//! hooks, and type negotiation.

use std::rc::Rc;
use std::sync::Arc;

use graphwire::{
    cast, cast_mut, node, ChannelAccumulator, ChannelDissipator, Error, GraphReader, GraphWriter,
    MemChannel, NodeRef, Portable, StreamConfig, TypeDirectory,
};

fn graph_writer(chan: &MemChannel, cfg: &StreamConfig) -> GraphWriter {
    GraphWriter::new(
        Box::new(ChannelAccumulator::new(chan.clone())),
        cfg.clone(),
    )
}

fn graph_reader(bytes: Vec<u8>, cfg: &StreamConfig, dir: &Arc<TypeDirectory>) -> GraphReader {
    GraphReader::new(
        Box::new(ChannelDissipator::new(std::io::Cursor::new(bytes))),
        cfg.clone(),
        dir.clone(),
    )
}

#[derive(Portable)]
struct Sensor {
    id: u32,
    value: f64,
    label: String,
    samples: Vec<f64>,
    online: bool,
}

#[test]
fn test_flat_struct_roundtrip() {
    let dir = Arc::new(TypeDirectory::new());
    dir.register::<Sensor>();

    let cfg = StreamConfig::default();
    let chan = MemChannel::new();
    let mut w = graph_writer(&chan, &cfg);
    let root = node(Sensor {
        id: 81,
        value: -2.75,
        label: "coolant/intake".to_string(),
        samples: vec![1.0, 2.5, 4.0],
        online: true,
    });
    w.write_node(Some(&root)).expect("write");
    w.flush().expect("flush");

    let mut r = graph_reader(chan.take(), &cfg, &dir);
    let back = r.read_node().expect("read").expect("non-null");
    let sensor = cast::<Sensor>(&back).expect("type");
    assert_eq!(sensor.id, 81);
    assert_eq!(sensor.value, -2.75);
    assert_eq!(sensor.label, "coolant/intake");
    assert_eq!(sensor.samples, vec![1.0, 2.5, 4.0]);
    assert!(sensor.online);
}

#[test]
fn test_null_roundtrip() {
    let dir = Arc::new(TypeDirectory::new());
    let cfg = StreamConfig::default();
    let chan = MemChannel::new();
    let mut w = graph_writer(&chan, &cfg);
    w.write_node(None).expect("write null");
    w.flush().expect("flush");

    let mut r = graph_reader(chan.take(), &cfg, &dir);
    assert!(r.read_node().expect("read").is_none());
}

#[derive(Portable)]
struct Pair {
    tag: i32,
    left: Option<NodeRef>,
    right: Option<NodeRef>,
}

#[test]
fn test_sharing_is_preserved() {
    let dir = Arc::new(TypeDirectory::new());
    dir.register::<Sensor>();
    dir.register::<Pair>();

    let shared = node(Sensor {
        id: 7,
        value: 1.5,
        label: "shared".to_string(),
        samples: Vec::new(),
        online: false,
    });
    let root = node(Pair {
        tag: 1,
        left: Some(shared.clone()),
        right: Some(shared),
    });

    let cfg = StreamConfig::default();
    let chan = MemChannel::new();
    let mut w = graph_writer(&chan, &cfg);
    w.write_node(Some(&root)).expect("write");
    w.flush().expect("flush");
    // One Pair plus one Sensor: exactly two handles, the second Sensor
    // sight is a back-reference.
    assert_eq!(w.handles_assigned(), 2);

    let mut r = graph_reader(chan.take(), &cfg, &dir);
    let back = r.read_node().expect("read").expect("non-null");
    let pair = cast::<Pair>(&back).expect("type");
    let left = pair.left.as_ref().expect("left");
    let right = pair.right.as_ref().expect("right");
    assert!(
        Rc::ptr_eq(left, right),
        "shared instance must come back as one instance"
    );
}

#[test]
fn test_self_referencing_cycle_terminates() {
    let dir = Arc::new(TypeDirectory::new());
    dir.register::<Pair>();

    let knot = node(Pair {
        tag: 9,
        left: None,
        right: None,
    });
    cast_mut::<Pair>(&knot).expect("type").left = Some(knot.clone());

    let cfg = StreamConfig::default();
    let chan = MemChannel::new();
    let mut w = graph_writer(&chan, &cfg);
    w.write_node(Some(&knot)).expect("write");
    w.flush().expect("flush");
    // Exactly one payload; the self-reference is a handle.
    assert_eq!(w.handles_assigned(), 1);

    let mut r = graph_reader(chan.take(), &cfg, &dir);
    let back = r.read_node().expect("read").expect("non-null");
    let inner = cast::<Pair>(&back)
        .expect("type")
        .left
        .as_ref()
        .expect("left")
        .clone();
    assert!(Rc::ptr_eq(&back, &inner), "result.left must be result");
}

#[test]
fn test_mutual_cycle_terminates() {
    let dir = Arc::new(TypeDirectory::new());
    dir.register::<Pair>();

    let a = node(Pair {
        tag: 1,
        left: None,
        right: None,
    });
    let b = node(Pair {
        tag: 2,
        left: Some(a.clone()),
        right: None,
    });
    cast_mut::<Pair>(&a).expect("type").left = Some(b.clone());

    let cfg = StreamConfig::default();
    let chan = MemChannel::new();
    let mut w = graph_writer(&chan, &cfg);
    w.write_node(Some(&a)).expect("write");
    w.flush().expect("flush");
    assert_eq!(w.handles_assigned(), 2, "two payloads for two objects");

    let mut r = graph_reader(chan.take(), &cfg, &dir);
    let a2 = r.read_node().expect("read").expect("non-null");
    let b2 = cast::<Pair>(&a2)
        .expect("type")
        .left
        .as_ref()
        .expect("a.left")
        .clone();
    let a3 = cast::<Pair>(&b2)
        .expect("type")
        .left
        .as_ref()
        .expect("b.left")
        .clone();
    assert!(Rc::ptr_eq(&a2, &a3), "cycle must close on the same instance");
    assert_eq!(cast::<Pair>(&b2).expect("type").tag, 2);
}

#[test]
fn test_repeated_roots_are_back_references() {
    let dir = Arc::new(TypeDirectory::new());
    dir.register::<Pair>();

    let a = node(Pair {
        tag: 4,
        left: None,
        right: None,
    });
    let b = node(Pair {
        tag: 5,
        left: None,
        right: None,
    });

    let cfg = StreamConfig::default();
    let chan = MemChannel::new();
    let mut w = graph_writer(&chan, &cfg);
    for root in [&a, &b, &a, &b] {
        w.write_node(Some(root)).expect("write");
    }
    w.flush().expect("flush");
    assert_eq!(w.handles_assigned(), 2);
    assert_eq!(w.types_negotiated(), 1, "type name travels once");

    let mut r = graph_reader(chan.take(), &cfg, &dir);
    let a1 = r.read_node().expect("read").expect("non-null");
    let b1 = r.read_node().expect("read").expect("non-null");
    let a2 = r.read_node().expect("read").expect("non-null");
    let b2 = r.read_node().expect("read").expect("non-null");
    assert!(Rc::ptr_eq(&a1, &a2));
    assert!(Rc::ptr_eq(&b1, &b2));
    assert!(!Rc::ptr_eq(&a1, &b1));
}

#[test]
fn test_handle_monotonicity_on_the_wire() {
    let dir = Arc::new(TypeDirectory::new());
    dir.register::<Pair>();

    let a = node(Pair {
        tag: 7,
        left: None,
        right: None,
    });
    let b = node(Pair {
        tag: 8,
        left: None,
        right: None,
    });

    let cfg = StreamConfig::default();
    let chan = MemChannel::new();
    let mut w = graph_writer(&chan, &cfg);
    w.write_node(Some(&a)).expect("write a");
    w.write_node(Some(&a)).expect("write a again");
    w.write_node(Some(&b)).expect("write b");
    w.write_node(Some(&b)).expect("write b again");
    w.flush().expect("flush");

    // Decode the raw protocol integers with the primitive surface.
    let mut r = graph_reader(chan.take(), &cfg, &dir);
    let type_wire = r.read_i32().expect("type slot") as u32;
    assert_eq!(
        type_wire,
        graphwire::wire::TYPE_BIT | graphwire::wire::FIRST_TYPE_ID,
        "first user type takes the first negotiated id"
    );
    let name_len = r.read_i32().expect("name length");
    let mut name = Vec::with_capacity(name_len as usize);
    for _ in 0..name_len {
        name.push(r.read_u8().expect("name byte"));
    }
    assert!(String::from_utf8(name).expect("utf8").ends_with("::Pair"));
    assert_eq!(r.read_i32().expect("tag"), 7);
    assert_eq!(r.read_i32().expect("left"), 0);
    assert_eq!(r.read_i32().expect("right"), 0);
    // Second sight of `a`: a bare back-reference, the first real handle.
    assert_eq!(
        r.read_i32().expect("back-ref a") as u32,
        graphwire::wire::FIRST_HANDLE
    );
    // `b` reuses the negotiated type id; no name follows.
    assert_eq!(r.read_i32().expect("type slot b") as u32, type_wire);
    assert_eq!(r.read_i32().expect("tag"), 8);
    assert_eq!(r.read_i32().expect("left"), 0);
    assert_eq!(r.read_i32().expect("right"), 0);
    // `b` got the next handle, strictly increasing with no reuse.
    assert_eq!(
        r.read_i32().expect("back-ref b") as u32,
        graphwire::wire::FIRST_HANDLE + 1
    );
}

#[test]
fn test_reset_isolation() {
    let dir = Arc::new(TypeDirectory::new());
    dir.register::<Pair>();

    let a = node(Pair {
        tag: 6,
        left: None,
        right: None,
    });

    let cfg = StreamConfig::default();
    let chan = MemChannel::new();
    let mut w = graph_writer(&chan, &cfg);
    w.write_node(Some(&a)).expect("write");
    w.reset();
    // Same reference-identical object after the reset: full payload again.
    w.write_node(Some(&a)).expect("write");
    w.flush().expect("flush");

    let mut r = graph_reader(chan.take(), &cfg, &dir);
    let first = r.read_node().expect("read").expect("non-null");
    let second = r.read_node().expect("read").expect("non-null");
    assert!(
        !Rc::ptr_eq(&first, &second),
        "post-reset payload must build a fresh instance"
    );
    assert_eq!(cast::<Pair>(&second).expect("type").tag, 6);
}

#[test]
fn test_shared_strings_roundtrip_identity() {
    let dir = Arc::new(TypeDirectory::new());
    let cfg = StreamConfig::default();
    let chan = MemChannel::new();
    let mut w = graph_writer(&chan, &cfg);

    let s: Rc<str> = Rc::from("interned-payload");
    w.write_shared_str(Some(&s)).expect("write");
    w.write_shared_str(Some(&s)).expect("write again");
    w.write_shared_str(None).expect("write null");
    w.flush().expect("flush");

    let mut r = graph_reader(chan.take(), &cfg, &dir);
    let s1 = r.read_shared_str().expect("read").expect("non-null");
    let s2 = r.read_shared_str().expect("read").expect("non-null");
    assert_eq!(&*s1, "interned-payload");
    assert!(Rc::ptr_eq(&s1, &s2), "identical handle, identical Rc");
    assert!(r.read_shared_str().expect("read").is_none());
}

#[derive(Portable)]
struct NodeList {
    items: Vec<Option<NodeRef>>,
}

#[test]
fn test_array_of_objects_with_shared_entry() {
    let dir = Arc::new(TypeDirectory::new());
    dir.register::<NodeList>();
    dir.register::<Pair>();

    let shared = node(Pair {
        tag: 3,
        left: None,
        right: None,
    });
    let root = node(NodeList {
        items: vec![Some(shared.clone()), None, Some(shared)],
    });

    let cfg = StreamConfig::default();
    let chan = MemChannel::new();
    let mut w = graph_writer(&chan, &cfg);
    w.write_node(Some(&root)).expect("write");
    w.flush().expect("flush");

    let mut r = graph_reader(chan.take(), &cfg, &dir);
    let back = r.read_node().expect("read").expect("non-null");
    let list = cast::<NodeList>(&back).expect("type");
    assert_eq!(list.items.len(), 3);
    assert!(list.items[1].is_none());
    let first = list.items[0].as_ref().expect("first");
    let third = list.items[2].as_ref().expect("third");
    assert!(Rc::ptr_eq(first, third));
}

#[test]
fn test_unknown_type_error_carries_name() {
    let registered = Arc::new(TypeDirectory::new());
    registered.register::<Sensor>();
    // The reading side never learned about Sensor.
    let bare = Arc::new(TypeDirectory::new());

    let cfg = StreamConfig::default();
    let chan = MemChannel::new();
    let mut w = graph_writer(&chan, &cfg);
    let root = node(Sensor {
        id: 1,
        value: 0.0,
        label: String::new(),
        samples: Vec::new(),
        online: false,
    });
    w.write_node(Some(&root)).expect("write");
    w.flush().expect("flush");

    let mut r = graph_reader(chan.take(), &cfg, &bare);
    let err = r.read_node().err().unwrap();
    match err {
        Error::UnknownType(name) => assert!(
            name.ends_with("::Sensor"),
            "offending name should be carried, got {name}"
        ),
        other => panic!("expected UnknownType, got {other}"),
    }
}

#[test]
fn test_root_primitive_arrays_with_headers() {
    let dir = Arc::new(TypeDirectory::new());
    let cfg = StreamConfig::default();
    let chan = MemChannel::new();
    let mut w = graph_writer(&chan, &cfg);
    let ints: Vec<i32> = (0..500).map(|i| i * 3).collect();
    let flags = [true, false, true];
    w.write_i32_array(&ints).expect("write ints");
    w.write_bool_array(&flags).expect("write bools");
    w.flush().expect("flush");

    let mut r = graph_reader(chan.take(), &cfg, &dir);
    let mut ints_back = vec![0i32; ints.len()];
    r.read_i32_array(&mut ints_back).expect("read ints");
    assert_eq!(ints_back, ints);
    let mut flags_back = [false; 3];
    r.read_bool_array(&mut flags_back).expect("read bools");
    assert_eq!(flags_back, flags);
}

#[test]
fn test_array_header_mismatch_is_fatal() {
    let dir = Arc::new(TypeDirectory::new());
    let cfg = StreamConfig::default();
    let chan = MemChannel::new();
    let mut w = graph_writer(&chan, &cfg);
    w.write_i32_array(&[1, 2, 3]).expect("write");
    w.flush().expect("flush");

    // Wrong declared length.
    let mut r = graph_reader(chan.contents(), &cfg, &dir);
    let mut short = [0i32; 2];
    assert!(matches!(
        r.read_i32_array(&mut short).unwrap_err(),
        Error::ArrayMismatch { .. }
    ));

    // Wrong declared kind.
    let mut r = graph_reader(chan.take(), &cfg, &dir);
    let mut wrong = [0i64; 3];
    assert!(matches!(
        r.read_i64_array(&mut wrong).unwrap_err(),
        Error::ArrayMismatch { .. }
    ));
}

#[test]
fn test_deep_graph_uses_small_buffers() {
    // A chain of 300 nodes through a tiny bunch budget: every control
    // integer crosses many flush boundaries.
    let dir = Arc::new(TypeDirectory::new());
    dir.register::<Pair>();

    let cfg = StreamConfig::with_buffer_bytes(48);
    let mut head = node(Pair {
        tag: 0,
        left: None,
        right: None,
    });
    for tag in 1..300 {
        head = node(Pair {
            tag,
            left: Some(head),
            right: None,
        });
    }

    let chan = MemChannel::new();
    let mut w = graph_writer(&chan, &cfg);
    w.write_node(Some(&head)).expect("write");
    w.flush().expect("flush");
    assert!(w.bunches_flushed() > 10, "tiny buffers must force bunches");

    let mut r = graph_reader(chan.take(), &cfg, &dir);
    let mut cursor = r.read_node().expect("read").expect("non-null");
    let mut expected_tag = 299;
    loop {
        let next = {
            let pair = cast::<Pair>(&cursor).expect("type");
            assert_eq!(pair.tag, expected_tag);
            pair.left.clone()
        };
        match next {
            Some(next) => {
                cursor = next;
                expected_tag -= 1;
            }
            None => break,
        }
    }
    assert_eq!(expected_tag, 0, "whole chain must be reachable");
}
