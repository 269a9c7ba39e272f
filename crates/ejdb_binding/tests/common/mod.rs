//! Engine test double shared by the integration tests.

#![allow(dead_code)]

use ejdb_bson::ObjectId;
use ejdb_engine::error::{TCECLOSE, JBEQUPDFAILED};
use ejdb_engine::{
    CollectionId, DocumentEngine, EmbeddedEngine, EngineError, EngineResult, PreparedQuery,
    QueryFlags, QueryOutput, ResultTracker,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Calls observed by a [`CountingEngine`].
#[derive(Debug, Clone, Default)]
pub struct Calls {
    pub closes: Arc<AtomicUsize>,
    pub saves: Arc<AtomicUsize>,
    pub prepares: Arc<AtomicUsize>,
}

impl Calls {
    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn prepares(&self) -> usize {
        self.prepares.load(Ordering::SeqCst)
    }
}

/// Wraps an in-memory engine, counts calls and injects failures.
pub struct CountingEngine {
    inner: EmbeddedEngine,
    calls: Calls,
    fail_close: bool,
    fail_save: bool,
}

impl CountingEngine {
    pub fn new() -> Self {
        Self {
            inner: EmbeddedEngine::in_memory(),
            calls: Calls::default(),
            fail_close: false,
            fail_save: false,
        }
    }

    pub fn failing_close(mut self) -> Self {
        self.fail_close = true;
        self
    }

    pub fn failing_save(mut self) -> Self {
        self.fail_save = true;
        self
    }

    pub fn calls(&self) -> Calls {
        self.calls.clone()
    }

    pub fn tracker(&self) -> ResultTracker {
        self.inner.result_tracker()
    }
}

impl DocumentEngine for CountingEngine {
    fn ensure_collection(&mut self, name: &str) -> EngineResult<CollectionId> {
        self.inner.ensure_collection(name)
    }

    fn get_collection(&self, name: &str) -> EngineResult<Option<CollectionId>> {
        self.inner.get_collection(name)
    }

    fn collection_names(&self) -> EngineResult<Vec<String>> {
        self.inner.collection_names()
    }

    fn save(&mut self, coll: CollectionId, document: &[u8], merge: bool) -> EngineResult<ObjectId> {
        self.calls.saves.fetch_add(1, Ordering::SeqCst);
        if self.fail_save {
            return Err(EngineError::from_code(JBEQUPDFAILED));
        }
        self.inner.save(coll, document, merge)
    }

    fn load(&self, coll: CollectionId, oid: &ObjectId) -> EngineResult<Option<Vec<u8>>> {
        self.inner.load(coll, oid)
    }

    fn prepare(&self, query: &[u8], ors: &[&[u8]], hints: &[u8]) -> EngineResult<PreparedQuery> {
        self.calls.prepares.fetch_add(1, Ordering::SeqCst);
        self.inner.prepare(query, ors, hints)
    }

    fn execute(
        &self,
        coll: CollectionId,
        query: &PreparedQuery,
        flags: QueryFlags,
    ) -> EngineResult<QueryOutput> {
        self.inner.execute(coll, query, flags)
    }

    fn sync(&mut self) -> EngineResult<()> {
        self.inner.sync()
    }

    fn close(&mut self) -> EngineResult<()> {
        self.calls.closes.fetch_add(1, Ordering::SeqCst);
        self.inner.close()?;
        if self.fail_close {
            return Err(EngineError::from_code(TCECLOSE));
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.inner.is_open()
    }
}
