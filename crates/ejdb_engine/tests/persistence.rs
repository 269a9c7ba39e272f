//! On-disk behavior of the embedded engine.

use ejdb_bson::{from_bson, to_bson, Document, Value};
use ejdb_engine::error::{TCEINVALID, TCELOCK, TCERHEAD};
use ejdb_engine::{Config, DocumentEngine, EmbeddedEngine, OpenMode, QueryFlags, QueryOutput};
use std::fs::OpenOptions;
use std::io::Write;
use tempfile::tempdir;

fn bytes(doc: &Document) -> Vec<u8> {
    to_bson(doc).unwrap()
}

fn all(engine: &EmbeddedEngine, coll: &str) -> Vec<Document> {
    let id = engine.get_collection(coll).unwrap().unwrap();
    let empty = bytes(&Document::new());
    let q = engine.prepare(&empty, &[], &empty).unwrap();
    match engine.execute(id, &q, QueryFlags::NONE).unwrap() {
        QueryOutput::Documents(buf) => buf.iter().map(|b| from_bson(b).unwrap()).collect(),
        QueryOutput::Count(_) => unreachable!(),
    }
}

#[test]
fn documents_survive_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("db");

    let oid = {
        let mut engine = EmbeddedEngine::open(&path, Config::default()).unwrap();
        let items = engine.ensure_collection("items").unwrap();
        let oid = engine
            .save(items, &bytes(&Document::new().with("name", "pen")), false)
            .unwrap();
        engine.close().unwrap();
        oid
    };

    let engine = EmbeddedEngine::open(&path, Config::new().mode(OpenMode::READER)).unwrap();
    assert_eq!(engine.collection_names().unwrap(), vec!["items".to_string()]);
    let docs = all(&engine, "items");
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].get("_id"), Some(&Value::ObjectId(oid)));
    assert_eq!(docs[0].get("name"), Some(&Value::from("pen")));
}

#[test]
fn updates_replace_in_place_after_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("db");
    {
        let mut engine = EmbeddedEngine::open(&path, Config::default()).unwrap();
        let items = engine.ensure_collection("items").unwrap();
        let first = engine
            .save(items, &bytes(&Document::new().with("n", 1i32)), false)
            .unwrap();
        engine
            .save(items, &bytes(&Document::new().with("n", 2i32)), false)
            .unwrap();
        engine
            .save(items, &bytes(&Document::new().with("_id", first).with("n", 10i32)), false)
            .unwrap();
    }

    let engine = EmbeddedEngine::open(&path, Config::default()).unwrap();
    let ns: Vec<_> = all(&engine, "items")
        .iter()
        .map(|d| d.get("n").cloned().unwrap())
        .collect();
    assert_eq!(ns, vec![Value::Int32(10), Value::Int32(2)]);
}

#[test]
fn reader_cannot_write() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("db");
    {
        let mut engine = EmbeddedEngine::open(&path, Config::default()).unwrap();
        engine.ensure_collection("items").unwrap();
    }

    let mut engine = EmbeddedEngine::open(&path, Config::new().mode(OpenMode::READER)).unwrap();
    let items = engine.get_collection("items").unwrap().unwrap();
    assert_eq!(engine.ensure_collection("other").unwrap_err().code(), TCEINVALID);
    let err = engine
        .save(items, &bytes(&Document::new().with("a", 1i32)), false)
        .unwrap_err();
    assert_eq!(err.code(), TCEINVALID);
}

#[test]
fn truncate_discards_data() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("db");
    {
        let mut engine = EmbeddedEngine::open(&path, Config::default()).unwrap();
        let items = engine.ensure_collection("items").unwrap();
        engine
            .save(items, &bytes(&Document::new().with("a", 1i32)), false)
            .unwrap();
    }

    let engine = EmbeddedEngine::open(
        &path,
        Config::new().mode(OpenMode::DEFAULT | OpenMode::TRUNCATE),
    )
    .unwrap();
    assert!(engine.collection_names().unwrap().is_empty());
}

#[test]
fn torn_tail_is_recovered() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("db");
    {
        let mut engine = EmbeddedEngine::open(&path, Config::default()).unwrap();
        let items = engine.ensure_collection("items").unwrap();
        engine
            .save(items, &bytes(&Document::new().with("a", 1i32)), false)
            .unwrap();
    }

    let log_path = dir.path().join("db_items");
    let clean_len = std::fs::metadata(&log_path).unwrap().len();
    {
        let mut file = OpenOptions::new().append(true).open(&log_path).unwrap();
        file.write_all(&[64, 0, 0, 0, 1, 2, 3]).unwrap();
    }

    {
        let mut engine = EmbeddedEngine::open(&path, Config::default()).unwrap();
        assert_eq!(all(&engine, "items").len(), 1);
        let items = engine.get_collection("items").unwrap().unwrap();
        engine
            .save(items, &bytes(&Document::new().with("a", 2i32)), false)
            .unwrap();
    }
    assert!(std::fs::metadata(&log_path).unwrap().len() > clean_len);

    let engine = EmbeddedEngine::open(&path, Config::default()).unwrap();
    assert_eq!(all(&engine, "items").len(), 2);
}

#[test]
fn corrupt_record_is_reported() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("db");
    {
        let mut engine = EmbeddedEngine::open(&path, Config::default()).unwrap();
        let items = engine.ensure_collection("items").unwrap();
        engine
            .save(items, &bytes(&Document::new().with("a", 1i32)), false)
            .unwrap();
    }

    let log_path = dir.path().join("db_items");
    let mut data = std::fs::read(&log_path).unwrap();
    data[8] ^= 0xFF;
    std::fs::write(&log_path, data).unwrap();

    let err = EmbeddedEngine::open(&path, Config::default()).unwrap_err();
    assert_eq!(err.code(), TCERHEAD);
}

#[test]
fn second_writer_fails_fast_with_nonblocking_lock() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("db");
    let config = Config::new().mode(OpenMode::DEFAULT | OpenMode::LOCK_NONBLOCKING);

    let mut first = EmbeddedEngine::open(&path, config.clone()).unwrap();
    let err = EmbeddedEngine::open(&path, config.clone()).unwrap_err();
    assert_eq!(err.code(), TCELOCK);

    first.close().unwrap();
    assert!(EmbeddedEngine::open(&path, config).is_ok());
}

#[test]
fn no_lock_mode_allows_shared_open() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("db");
    let _first = EmbeddedEngine::open(&path, Config::default()).unwrap();
    let reader = EmbeddedEngine::open(
        &path,
        Config::new().mode(OpenMode::READER | OpenMode::NO_LOCK),
    )
    .unwrap();
    assert!(reader.is_open());
}
