//! Database workflows through the bridge, from opening a path to reading
//! rows back.

use embedoc_bridge::prelude::*;
use embedoc_testkit::prelude::*;
use serde_json::json;

#[test]
fn insert_then_find_one_user() {
    init_test_logging();
    let fixture = TestBridge::new();
    let db = fixture.open();

    let users = db.create_collection("users").unwrap();
    users
        .insert_object(&host_object(json!({"name": "a", "age": 3})))
        .unwrap();
    assert_eq!(users.count().unwrap(), 1);

    let filter = fixture
        .to_document(&host_object(json!({"name": "a"})))
        .unwrap();
    let cursor = users.find(Some(&filter)).unwrap();
    assert_eq!(cursor.step().unwrap(), CursorState::HasRow);

    let row = cursor.get().unwrap().unwrap().get_document().unwrap();
    let age = row.get("age").unwrap().unwrap();
    assert_eq!(age.type_name().unwrap(), "Int");
    assert_eq!(age.get_int64().unwrap(), 3);

    assert_eq!(cursor.step().unwrap(), CursorState::Exhausted);
    assert!(cursor.get().unwrap().is_none());

    drop((cursor, row, age, filter, users));
    db.close();
    fixture.assert_no_leaks();
}

#[test]
fn rolled_back_insert_is_not_counted() {
    with_test_collection("users", |users| {
        let db = users.database().unwrap();
        users
            .insert_object(&host_object(json!({"name": "kept"})))
            .unwrap();
        let before = users.count().unwrap();

        db.start_transaction(TransactionMode::Write).unwrap();
        users
            .insert_object(&host_object(json!({"name": "discarded"})))
            .unwrap();
        db.rollback().unwrap();

        assert_eq!(users.count().unwrap(), before);
    });
}

#[test]
fn transaction_closure_commits_on_success() {
    with_test_collection("events", |events| {
        let db = events.database().unwrap();
        let inserted = db
            .transaction(TransactionMode::Write, |_| {
                for n in 0..3 {
                    events.insert_object(&HostObject::new().with("n", n))?;
                }
                events.count()
            })
            .unwrap();
        assert_eq!(inserted, 3);
        assert!(db.commit().is_err(), "no transaction may stay open");
    });
}

#[test]
fn function_in_object_leaves_collection_unmodified() {
    with_test_collection("users", |users| {
        let bad = HostObject::new()
            .with("name", "a")
            .with("callback", HostValue::Function("onSave".into()));

        let err = users.insert_object(&bad).unwrap_err();
        assert_eq!(err.host_class().name(), "TypeError");
        assert_eq!(
            err,
            BridgeError::conversion("callback", "unsupported value type function")
        );
        assert_eq!(users.count().unwrap(), 0);

        let symbol = HostObject::new().with(
            "tags",
            vec![HostValue::from("x"), HostValue::Symbol("s".into())],
        );
        assert!(matches!(
            users.insert_object(&symbol),
            Err(BridgeError::Conversion { ref path, .. }) if path == "tags[1]"
        ));
        assert_eq!(users.count().unwrap(), 0);
    });
}

#[test]
fn find_objects_returns_rows_in_insertion_order() {
    let (fixture, db, users) = scenarios::populated_users(4);
    let rows = users.find_objects(None).unwrap();
    let names: Vec<_> = rows
        .iter()
        .map(|row| row.get("name").cloned().unwrap())
        .collect();
    assert_eq!(
        names,
        ["user0", "user1", "user2", "user3"].map(HostValue::from)
    );
    assert_eq!(rows[0].keys().next(), Some("_id"));

    drop((rows, users));
    db.close();
    fixture.assert_no_leaks();
}

#[test]
fn object_ids_round_trip_through_documents() {
    with_test_collection("refs", |refs| {
        let db = refs.database().unwrap();
        let oid = db.make_object_id().unwrap();
        refs.insert_object(
            &HostObject::new()
                .with("_id", HostValue::ObjectId(oid.clone()))
                .with("when", HostValue::Date(86_400_000)),
        )
        .unwrap();

        let rows = refs.find_objects(None).unwrap();
        assert_eq!(rows[0].get("_id"), Some(&HostValue::ObjectId(oid.clone())));
        assert_eq!(rows[0].get("when"), Some(&HostValue::Date(86_400_000)));

        let duplicate = refs.insert_object(&HostObject::new().with("_id", HostValue::ObjectId(oid)));
        assert!(matches!(duplicate, Err(BridgeError::Engine { .. })));
    });
}

#[test]
fn update_with_operators() {
    with_test_collection("users", |users| {
        users
            .insert_object(&host_object(json!({"name": "a", "age": 1, "tmp": true})))
            .unwrap();
        let changed = users
            .update_objects(
                Some(&host_object(json!({"name": "a"}))),
                &host_object(json!({"$set": {"age": 2.5}, "$unset": {"tmp": ""}})),
            )
            .unwrap();
        assert_eq!(changed, 1);

        let rows = users.find_objects(None).unwrap();
        let row = &rows[0];
        assert_eq!(row.get("age"), Some(&HostValue::Number(2.5)));
        assert_eq!(row.get("tmp"), None);
    });
}
