//! End-to-end use of the bindings against an on-disk database.

use ejdb_binding::{Connection, ErrorKind, Hints, OpenMode, OpenOptions, Query};
use ejdb_bson::host::{HostTable, HostValue};
use ejdb_bson::{Document, ObjectId, Value};
use tempfile::tempdir;

fn by_name(name: &str) -> Query {
    Query::builder()
        .filter(Document::new().with("name", name))
        .build()
        .unwrap()
}

#[test]
fn save_and_find_a_pen() {
    let dir = tempdir().unwrap();
    let mut conn = Connection::open(dir.path().join("test.db"), "wct").unwrap();
    assert_eq!(
        conn.mode(),
        OpenMode::READER | OpenMode::WRITER | OpenMode::CREATE | OpenMode::TRUNCATE
    );

    let oid1 = conn
        .save(
            "items",
            &Document::new().with("name", "pen").with("qty", 5i32),
            false,
        )
        .unwrap();
    assert_eq!(oid1.len(), 24);
    assert!(ObjectId::is_valid_hex(&oid1));

    let cursor = conn.find("items", &by_name("pen")).unwrap();
    assert_eq!(cursor.count().unwrap(), 1);
    let expected = Document::new()
        .with("_id", oid1.parse::<ObjectId>().unwrap())
        .with("name", "pen")
        .with("qty", 5i32);
    assert_eq!(cursor.object(0).unwrap(), expected);
    cursor.dispose();
    conn.close().unwrap();
}

#[test]
fn create_on_first_use() {
    let dir = tempdir().unwrap();
    let mut conn = OpenOptions::new(dir.path().join("db")).open().unwrap();
    assert!(conn.collection_names().unwrap().is_empty());

    conn.save("fresh", &Document::new().with("name", "pen"), false)
        .unwrap();
    let cursor = conn.find("fresh", &by_name("pen")).unwrap();
    assert_eq!(cursor.count().unwrap(), 1);
    assert_eq!(conn.collection_names().unwrap(), vec!["fresh".to_string()]);
}

#[test]
fn merge_keeps_unmentioned_fields() {
    let mut conn = Connection::open_in_memory();
    let oid = conn
        .save(
            "items",
            &Document::new()
                .with("name", "pen")
                .with("qty", 5i32)
                .with("color", "red"),
            false,
        )
        .unwrap();
    let id = oid.parse::<ObjectId>().unwrap();

    conn.save(
        "items",
        &Document::new().with("_id", id).with("qty", 7i32),
        true,
    )
    .unwrap();
    let merged = conn.load("items", &oid).unwrap().unwrap();
    assert_eq!(merged.get("name"), Some(&Value::from("pen")));
    assert_eq!(merged.get("color"), Some(&Value::from("red")));
    assert_eq!(merged.get("qty"), Some(&Value::Int32(7)));

    let same = conn
        .save(
            "items",
            &Document::new().with("_id", id).with("qty", 1i32),
            false,
        )
        .unwrap();
    assert_eq!(same, oid);
    let replaced = conn.load("items", &oid).unwrap().unwrap();
    assert_eq!(replaced.get("name"), None);
    assert_eq!(replaced.get("qty"), Some(&Value::Int32(1)));
    assert_eq!(replaced.len(), 2);
}

#[test]
fn next_and_object_agree() {
    let mut conn = Connection::open_in_memory();
    for i in 0..5i32 {
        conn.save("nums", &Document::new().with("n", i), false).unwrap();
    }
    let query = Query::builder()
        .hints(Hints::new().order_by("n", false))
        .build()
        .unwrap();
    let mut cursor = conn.find("nums", &query).unwrap();
    let count = cursor.count().unwrap();
    assert_eq!(count, 5);

    let snapshot: Vec<Document> = (0..count).map(|i| cursor.object(i).unwrap()).collect();
    let mut iterated = Vec::new();
    for _ in 0..count {
        iterated.push(cursor.next_document().unwrap().unwrap());
    }
    assert_eq!(cursor.next_document().unwrap(), None);
    assert_eq!(iterated, snapshot);
    assert_eq!(snapshot[0].get("n"), Some(&Value::Int32(4)));
}

#[test]
fn or_clauses_are_alternatives() {
    let mut conn = Connection::open_in_memory();
    for color in ["red", "green", "blue"] {
        conn.save(
            "items",
            &Document::new().with("kind", "pen").with("color", color),
            false,
        )
        .unwrap();
    }
    conn.save(
        "items",
        &Document::new().with("kind", "cup").with("color", "red"),
        false,
    )
    .unwrap();

    let query = Query::builder()
        .filter(Document::new().with("kind", "pen"))
        .or(Document::new().with("color", "red"))
        .or(Document::new().with("color", "blue"))
        .build()
        .unwrap();
    let mut cursor = conn.find("items", &query).unwrap();
    let colors: Vec<Value> = cursor
        .iter()
        .map(|doc| doc.unwrap().get("color").cloned().unwrap())
        .collect();
    assert_eq!(colors, vec![Value::from("red"), Value::from("blue")]);
}

#[test]
fn more_than_eight_or_clauses() {
    let mut conn = Connection::open_in_memory();
    for i in 0..20i32 {
        conn.save("nums", &Document::new().with("n", i), false).unwrap();
    }
    let query = (0..12i32)
        .fold(Query::builder(), |b, i| b.or(Document::new().with("n", i)))
        .build()
        .unwrap();
    assert!(query.or_clauses().is_spilled());
    let cursor = conn.find("nums", &query).unwrap();
    assert_eq!(cursor.count().unwrap(), 12);
}

#[test]
fn hints_and_count_only() {
    let mut conn = Connection::open_in_memory();
    for i in 0..10i32 {
        conn.save("nums", &Document::new().with("n", i).with("sq", i * i), false)
            .unwrap();
    }

    let query = Query::builder()
        .hints(
            Hints::new()
                .order_by("n", true)
                .skip(2)
                .max(3)
                .include("sq"),
        )
        .build()
        .unwrap();
    let cursor = conn.find("nums", &query).unwrap();
    assert_eq!(cursor.count().unwrap(), 3);
    let first = cursor.object(0).unwrap();
    assert_eq!(first.get("sq"), Some(&Value::Int32(4)));
    assert_eq!(first.get("n"), None);
    assert!(first.contains_key("_id"));

    let counted = Query::builder()
        .filter(Document::new().with("n", Document::new().with("$gte", 5i32)))
        .count_only()
        .build()
        .unwrap();
    let mut cursor = conn.find("nums", &counted).unwrap();
    assert!(cursor.is_count_only());
    assert_eq!(cursor.count().unwrap(), 5);
    assert_eq!(
        cursor.next_document().unwrap_err().kind(),
        ErrorKind::InvalidOperation
    );

    let hinted = Query::builder()
        .hints(Hints::new().only_count(true))
        .build()
        .unwrap();
    let cursor = conn.find("nums", &hinted).unwrap();
    assert!(cursor.is_count_only());
    assert_eq!(cursor.count().unwrap(), 10);
}

#[test]
fn partial_field_access() {
    let mut conn = Connection::open_in_memory();
    conn.save(
        "people",
        &Document::new()
            .with("name", "ada")
            .with("address", Document::new().with("city", "London"))
            .with("tags", vec!["math", "engines"]),
        false,
    )
    .unwrap();
    let cursor = conn.find("people", &Query::all()).unwrap();
    assert_eq!(cursor.field(0, "name").unwrap(), Value::from("ada"));
    assert_eq!(
        cursor.field_path(0, "address.city").unwrap(),
        Value::from("London")
    );
    assert_eq!(cursor.field_path(0, "tags.1").unwrap(), Value::from("engines"));
    assert_eq!(
        cursor.field(0, "age").unwrap_err().kind(),
        ErrorKind::FieldNotFound
    );
    assert_eq!(cursor.position().unwrap(), 0);
}

#[test]
fn host_values_round_trip_through_the_store() {
    let mut conn = Connection::open_in_memory();
    let tags = HostTable::sequence();
    tags.push("a");
    tags.push("b");
    let root = HostTable::new();
    root.set("name", "pen");
    root.set("qty", 5i64);
    root.set("tags", tags);
    let oid = conn
        .save_host("items", &HostValue::Table(root), false)
        .unwrap();

    let doc = conn.load("items", &oid).unwrap().unwrap();
    assert_eq!(doc.get("qty"), Some(&Value::Int32(5)));
    assert_eq!(
        doc.get("tags"),
        Some(&Value::Array(vec![Value::from("a"), Value::from("b")]))
    );
}

#[test]
fn raw_documents() {
    let mut conn = Connection::open_in_memory();
    let doc = ejdb_bson::to_bson(&Document::new().with("name", "pen")).unwrap();
    let oid = conn.save_raw("items", &doc, false).unwrap();

    let query = ejdb_bson::to_bson(&Document::new().with("name", "pen")).unwrap();
    let or = ejdb_bson::to_bson(&Document::new().with("_id", oid.as_str())).unwrap();
    let hints = ejdb_bson::to_bson(&Document::new()).unwrap();
    let cursor = conn
        .find_raw("items", &query, &[or.as_slice()], &hints)
        .unwrap();
    assert_eq!(cursor.count().unwrap(), 1);
}

#[test]
fn reopen_read_only() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("db");
    let oid = {
        let mut conn = Connection::open(&path, "wc").unwrap();
        let oid = conn
            .save("items", &Document::new().with("name", "pen"), false)
            .unwrap();
        conn.close().unwrap();
        oid
    };

    let mut conn = Connection::open(&path, "r").unwrap();
    assert_eq!(conn.mode(), OpenMode::READER);
    assert_eq!(conn.path(), Some(path.as_path()));
    let doc = conn.load("items", &oid).unwrap().unwrap();
    assert_eq!(doc.get("name"), Some(&Value::from("pen")));

    let err = conn
        .save("items", &Document::new().with("name", "cup"), false)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Engine);
}
