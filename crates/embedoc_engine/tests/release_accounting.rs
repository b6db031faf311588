//! Allocation and free accounting of the memory engine under arbitrary
//! sequences of constructor and free calls.

use embedoc_engine::{Engine, MemoryEngine, RawHandle, ResourceKind};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    Make(ResourceKind),
    Free { index: usize, kind: ResourceKind },
}

fn kind_strategy() -> impl Strategy<Value = ResourceKind> {
    prop_oneof![
        Just(ResourceKind::Value),
        Just(ResourceKind::Document),
        Just(ResourceKind::Array),
    ]
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        kind_strategy().prop_map(Op::Make),
        (0usize..16, kind_strategy()).prop_map(|(index, kind)| Op::Free { index, kind }),
    ]
}

fn make(engine: &MemoryEngine, kind: ResourceKind) -> RawHandle {
    match kind {
        ResourceKind::Document => engine.make_document(),
        ResourceKind::Array => engine.make_array(),
        _ => engine.make_null(),
    }
    .expect("unlimited engine allocates")
}

fn free(engine: &MemoryEngine, raw: RawHandle, kind: ResourceKind) {
    match kind {
        ResourceKind::Document => engine.free_document(raw),
        ResourceKind::Array => engine.free_array(raw),
        _ => engine.free_value(raw),
    }
}

proptest! {
    #[test]
    fn counters_follow_the_model(ops in prop::collection::vec(op_strategy(), 0..64)) {
        let engine = MemoryEngine::new();
        // (handle, kind, still live)
        let mut handles: Vec<(RawHandle, ResourceKind, bool)> = Vec::new();
        let (mut freed, mut doubles, mut misrouted) = (0u64, 0u64, 0u64);

        for op in ops {
            match op {
                Op::Make(kind) => handles.push((make(&engine, kind), kind, true)),
                Op::Free { index, kind } => {
                    let Some(entry) = handles.get_mut(index) else { continue };
                    free(&engine, entry.0, kind);
                    if !entry.2 {
                        doubles += 1;
                    } else if entry.1 != kind {
                        misrouted += 1;
                    } else {
                        entry.2 = false;
                        freed += 1;
                    }
                }
            }
        }

        let stats = engine.stats();
        prop_assert_eq!(stats.allocated, handles.len() as u64);
        prop_assert_eq!(stats.freed, freed);
        prop_assert_eq!(stats.double_frees, doubles);
        prop_assert_eq!(stats.misrouted_frees, misrouted);
        let live = handles.iter().filter(|h| h.2).count() as u64;
        prop_assert_eq!(stats.live(), live);
    }
}

#[test]
fn consumed_resources_are_not_counted_as_freed() {
    let engine = MemoryEngine::new();
    let doc = engine.make_document().unwrap();
    let value = engine.document_into_value(doc).unwrap();

    engine.free_document(doc);
    engine.free_value(value);

    let stats = engine.stats();
    assert_eq!(stats.allocated, 2);
    assert_eq!(stats.consumed, 1);
    assert_eq!(stats.freed, 1);
    assert_eq!(stats.double_frees, 1);
    assert_eq!(stats.live(), 0);
}
