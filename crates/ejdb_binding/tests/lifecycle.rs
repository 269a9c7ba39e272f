//! Release-once guarantees for connections and cursors.

mod common;

use common::CountingEngine;
use ejdb_binding::{Connection, ErrorKind, OpenMode, Query};
use ejdb_bson::Document;
use ejdb_engine::error::TCECLOSE;
use proptest::prelude::*;

fn seeded(engine: CountingEngine) -> Connection {
    let mut conn = Connection::with_engine(Box::new(engine), OpenMode::DEFAULT);
    for i in 0..3i32 {
        conn.save("items", &Document::new().with("n", i), false)
            .unwrap();
    }
    conn
}

#[test]
fn close_releases_once() {
    let engine = CountingEngine::new();
    let calls = engine.calls();
    let mut conn = seeded(engine);

    conn.close().unwrap();
    conn.close().unwrap();
    conn.finalize();
    drop(conn);
    assert_eq!(calls.closes(), 1);
}

#[test]
fn drop_finalizes_an_open_connection() {
    let engine = CountingEngine::new();
    let calls = engine.calls();
    let conn = seeded(engine);
    drop(conn);
    assert_eq!(calls.closes(), 1);
}

#[test]
fn failing_close_is_reported_once() {
    let engine = CountingEngine::new().failing_close();
    let calls = engine.calls();
    let mut conn = seeded(engine);

    let err = conn.close().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Engine);
    assert_eq!(err.engine_code(), Some(TCECLOSE));
    assert!(!conn.is_open());

    conn.close().unwrap();
    drop(conn);
    assert_eq!(calls.closes(), 1);
}

#[test]
fn finalize_swallows_close_failures() {
    let engine = CountingEngine::new().failing_close();
    let calls = engine.calls();
    let mut conn = seeded(engine);
    conn.finalize();
    assert!(!conn.is_open());
    drop(conn);
    assert_eq!(calls.closes(), 1);
}

#[test]
fn every_result_buffer_is_released_once() {
    let engine = CountingEngine::new();
    let tracker = engine.tracker();
    let mut conn = seeded(engine);

    let mut iterated = conn.find("items", &Query::all()).unwrap();
    let disposed = conn.find("items", &Query::all()).unwrap();
    let dropped = conn.find("items", &Query::all()).unwrap();
    let untouched = conn.find("items", &Query::all()).unwrap();
    assert_eq!(tracker.live(), 4);
    assert_eq!(conn.open_cursors(), 4);

    while iterated.next_document().unwrap().is_some() {}
    iterated.dispose();
    disposed.dispose();
    disposed.dispose();
    drop(dropped);
    assert_eq!(tracker.live(), 1);
    assert_eq!(conn.open_cursors(), 1);

    conn.close().unwrap();
    assert_eq!(tracker.live(), 0);
    assert!(untouched.is_disposed());
    untouched.dispose();
    drop(untouched);
    drop(iterated);
    drop(disposed);
    assert_eq!(tracker.live(), 0);
    assert_eq!(tracker.issued(), 4);
}

#[test]
fn cursors_outlive_a_dropped_connection_as_disposed() {
    let engine = CountingEngine::new();
    let tracker = engine.tracker();
    let mut conn = seeded(engine);
    let cursor = conn.find("items", &Query::all()).unwrap();
    drop(conn);

    assert!(cursor.is_disposed());
    assert_eq!(tracker.live(), 0);
    assert_eq!(cursor.object(0).unwrap_err().kind(), ErrorKind::InvalidHandle);
}

#[test]
fn count_only_cursors_hold_no_buffer() {
    let engine = CountingEngine::new();
    let tracker = engine.tracker();
    let mut conn = seeded(engine);
    let query = Query::builder().count_only().build().unwrap();
    let cursor = conn.find("items", &query).unwrap();
    assert_eq!(cursor.count().unwrap(), 3);
    assert_eq!(tracker.issued(), 0);
    assert_eq!(conn.open_cursors(), 1);
    cursor.dispose();
    assert_eq!(cursor.count().unwrap_err().kind(), ErrorKind::InvalidHandle);
}

#[derive(Debug, Clone)]
enum Step {
    Find,
    Dispose(usize),
    Drop(usize),
    Close,
    Finalize,
}

fn step() -> impl Strategy<Value = Step> {
    prop_oneof![
        3 => Just(Step::Find),
        2 => (0..8usize).prop_map(Step::Dispose),
        1 => (0..8usize).prop_map(Step::Drop),
        1 => Just(Step::Close),
        1 => Just(Step::Finalize),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn any_release_order_releases_once(steps in prop::collection::vec(step(), 0..24)) {
        let engine = CountingEngine::new();
        let calls = engine.calls();
        let tracker = engine.tracker();
        let mut conn = seeded(engine);
        let mut cursors = Vec::new();

        for step in steps {
            match step {
                Step::Find => {
                    if let Ok(cursor) = conn.find("items", &Query::all()) {
                        cursors.push(cursor);
                    }
                }
                Step::Dispose(i) => {
                    if let Some(cursor) = cursors.get(i) {
                        cursor.dispose();
                    }
                }
                Step::Drop(i) => {
                    if i < cursors.len() {
                        drop(cursors.remove(i));
                    }
                }
                Step::Close => {
                    prop_assert!(conn.close().is_ok());
                }
                Step::Finalize => conn.finalize(),
            }
            let live = cursors.iter().filter(|c| !c.is_disposed()).count();
            prop_assert_eq!(tracker.live(), live);
            prop_assert!(calls.closes() <= 1);
        }

        drop(conn);
        prop_assert_eq!(calls.closes(), 1);
        prop_assert_eq!(tracker.live(), 0);
        prop_assert!(cursors.iter().all(|c| c.is_disposed()));
    }
}
