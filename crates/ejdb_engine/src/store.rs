//! In-memory view of one collection, backed by its log.

use crate::error::EngineResult;
use crate::log::{replay, LogBackend, LogRecord};
use bytes::Bytes;
use ejdb_bson::ObjectId;
use std::collections::HashMap;

/// Documents of one collection in first-insertion order.
pub struct CollectionStore {
    name: String,
    order: Vec<ObjectId>,
    docs: HashMap<ObjectId, Bytes>,
    log: Box<dyn LogBackend>,
}

impl std::fmt::Debug for CollectionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectionStore")
            .field("name", &self.name)
            .field("len", &self.order.len())
            .finish_non_exhaustive()
    }
}

impl CollectionStore {
    /// Loads a collection by replaying `log`.
    ///
    /// A torn tail record is dropped with a warning and, if `writable`,
    /// truncated away so later appends start on a record boundary.
    ///
    /// # Errors
    ///
    /// Returns an error if the log cannot be read or holds a corrupt record.
    pub fn open(
        name: impl Into<String>,
        mut log: Box<dyn LogBackend>,
        writable: bool,
    ) -> EngineResult<Self> {
        let name = name.into();
        let replayed = replay(&log.read_all()?)?;
        if replayed.valid_len < log.size() {
            tracing::warn!(
                collection = %name,
                valid_len = replayed.valid_len,
                size = log.size(),
                "dropping torn record at end of collection log"
            );
            if writable {
                log.truncate(replayed.valid_len)?;
            }
        }

        let mut store = Self {
            name,
            order: Vec::new(),
            docs: HashMap::new(),
            log,
        };
        for record in replayed.records {
            store.apply(record.oid, Bytes::from(record.payload));
        }
        Ok(store)
    }

    fn apply(&mut self, oid: ObjectId, payload: Bytes) {
        if self.docs.insert(oid, payload).is_none() {
            self.order.push(oid);
        }
    }

    /// Collection name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of documents.
    #[must_use]
    pub fn document_count(&self) -> usize {
        self.order.len()
    }

    /// Looks up a document by id.
    #[must_use]
    pub fn get(&self, oid: &ObjectId) -> Option<&Bytes> {
        self.docs.get(oid)
    }

    /// Iterates documents in first-insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&ObjectId, &Bytes)> + '_ {
        self.order
            .iter()
            .filter_map(|oid| self.docs.get(oid).map(|doc| (oid, doc)))
    }

    /// Persists and applies a document version.
    ///
    /// On error neither the log nor the in-memory view changes.
    pub fn put(&mut self, oid: ObjectId, payload: Vec<u8>, sync: bool) -> EngineResult<()> {
        let record = LogRecord::new(oid, payload);
        let offset = self.log.append(&record.encode()?)?;
        if sync {
            if let Err(e) = self.log.sync() {
                if let Err(undo) = self.log.truncate(offset) {
                    tracing::warn!(
                        collection = %self.name,
                        offset,
                        error = %undo,
                        "cannot cut unsynced record from collection log"
                    );
                }
                return Err(e);
            }
        }
        self.apply(oid, Bytes::from(record.payload));
        Ok(())
    }

    /// Syncs the log.
    pub fn sync(&mut self) -> EngineResult<()> {
        self.log.sync()
    }
}
