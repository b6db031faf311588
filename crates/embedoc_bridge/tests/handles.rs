//! Handle lifetimes: exactly-once release, transfer and use after release.

use embedoc_bridge::prelude::*;
use embedoc_bridge::HandleState;
use embedoc_engine::ResourceKind;
use embedoc_testkit::prelude::*;
use proptest::prelude::*;

#[test]
fn explicit_release_then_drop_frees_once() {
    let fixture = TestBridge::new();
    let value = fixture.int_value(1).unwrap();
    let alias = value.clone();

    value.release();
    value.release();
    alias.release();
    assert_eq!(alias.handle().state(), HandleState::Released);
    drop((value, alias));

    let stats = fixture.stats();
    assert_eq!(stats.freed, 1);
    fixture.assert_no_leaks();

    let registry = fixture.registry().stats();
    assert_eq!(registry.released_explicitly, 1);
    assert_eq!(registry.released_by_finalizer, 0);
}

#[test]
fn finalizer_closes_forgotten_database() {
    let fixture = TestBridge::new();
    {
        let db = fixture.open();
        db.create_collection("c").unwrap();
    }
    fixture.assert_no_leaks();
    assert_eq!(fixture.registry().stats().released_by_finalizer, 1);

    // The path is usable again once the finalizer ran.
    let db = fixture.open();
    assert_eq!(db.collection("c").unwrap().count().unwrap(), 0);
    db.close();
}

#[test]
fn transferred_array_is_not_freed_by_its_handle() {
    let fixture = TestBridge::new();
    let array = fixture.make_array().unwrap();
    array.push(&fixture.string_value("x").unwrap()).unwrap();
    let alias = array.clone();

    let value = array.into_value().unwrap();
    assert_eq!(alias.handle().state(), HandleState::Transferred);
    assert_eq!(
        alias.len(),
        Err(BridgeError::UseAfterRelease {
            kind: ResourceKind::Array
        })
    );
    alias.release();
    drop((alias, value));

    let stats = fixture.stats();
    assert_eq!(stats.consumed, 1);
    fixture.assert_no_leaks();
}

#[test]
fn handles_outlive_the_bridge_value() {
    let fixture = TestBridge::new();
    let doc = {
        let bridge = fixture.bridge.clone();
        let doc = bridge.make_document().unwrap();
        doc.set("k", &bridge.bool_value(true).unwrap()).unwrap();
        doc
    };
    assert!(doc.get("k").unwrap().unwrap().get_bool().unwrap());
    drop(doc);
    fixture.assert_no_leaks();
}

#[derive(Debug, Clone, Copy)]
enum Step {
    Clone(usize),
    Release(usize),
    Drop(usize),
}

fn step_strategy() -> impl Strategy<Value = Step> {
    prop_oneof![
        (0usize..8).prop_map(Step::Clone),
        (0usize..8).prop_map(Step::Release),
        (0usize..8).prop_map(Step::Drop),
    ]
}

proptest! {
    #![proptest_config(PropTestConfig::quick().to_proptest_config())]

    #[test]
    fn every_handle_is_freed_exactly_once(steps in prop::collection::vec(step_strategy(), 0..40)) {
        let fixture = TestBridge::new();
        let mut handles = vec![
            fixture.make_null().unwrap(),
            fixture.string_value("s").unwrap(),
        ];
        for step in steps {
            match step {
                Step::Clone(i) => {
                    if let Some(h) = handles.get(i).cloned() {
                        handles.push(h);
                    }
                }
                Step::Release(i) => {
                    if let Some(h) = handles.get(i) {
                        h.release();
                    }
                }
                Step::Drop(i) => {
                    if i < handles.len() {
                        handles.swap_remove(i);
                    }
                }
            }
        }
        drop(handles);

        let stats = fixture.stats();
        prop_assert_eq!(stats.allocated, 2);
        prop_assert_eq!(stats.freed, 2);
        prop_assert!(stats.is_clean());
    }
}
