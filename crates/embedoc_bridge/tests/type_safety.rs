//! Accessors refuse values of any other tag.

use embedoc_bridge::prelude::*;
use embedoc_engine::ValueTag;
use embedoc_testkit::prelude::*;

fn every_tag(fixture: &TestBridge, db: &Database) -> Vec<Value> {
    vec![
        fixture.make_null().unwrap(),
        fixture.int_value(1).unwrap(),
        fixture.double_value(1.5).unwrap(),
        fixture.bool_value(true).unwrap(),
        fixture.string_value("s").unwrap(),
        fixture.make_array().unwrap().into_value().unwrap(),
        fixture.make_document().unwrap().into_value().unwrap(),
        db.make_object_id().unwrap().to_value().unwrap(),
        fixture.make_utc_datetime(Some(5)).unwrap().to_value().unwrap(),
    ]
}

#[test]
fn accessors_match_only_their_tag() {
    let fixture = TestBridge::new();
    let db = fixture.open();

    for value in every_tag(&fixture, &db) {
        let tag = value.tag().unwrap();
        let outcomes = [
            (ValueTag::Int, value.get_int64().err()),
            (ValueTag::Double, value.get_double().err()),
            (ValueTag::Boolean, value.get_bool().err()),
            (ValueTag::String, value.get_string().err()),
            (ValueTag::Array, value.get_array().err()),
            (ValueTag::Document, value.get_document().err()),
            (ValueTag::ObjectId, value.get_object_id().err()),
            (ValueTag::UtcDateTime, value.get_utc_datetime().err()),
        ];
        for (accessor, err) in outcomes {
            if accessor == tag {
                assert!(err.is_none(), "{accessor} accessor failed on its own tag");
            } else {
                assert_eq!(
                    err,
                    Some(BridgeError::type_mismatch(accessor.name(), tag.name())),
                    "{accessor} accessor on {tag}"
                );
            }
        }
    }

    db.close();
    fixture.assert_no_leaks();
}

#[test]
fn wrappers_refuse_foreign_handles() {
    let fixture = TestBridge::new();
    let array = fixture.make_array().unwrap();
    let err = Document::unwrap_from(array.handle().clone()).unwrap_err();
    assert_eq!(err, BridgeError::type_mismatch("Document", "Array"));
    assert_eq!(err.code() as i32, 1);
}
