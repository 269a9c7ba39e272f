//! The embedded reference engine.

use crate::config::Config;
use crate::engine::{DocumentEngine, PreparedQuery};
use crate::error::{
    EngineError, EngineResult, JBEINVALIDBSONPK, JBEINVALIDCOLNAME, JBEMAXNUMCOLS, TCEINVALID,
};
use crate::flags::{OpenMode, QueryFlags};
use crate::log::{FileLog, LogBackend, MemoryLog};
use crate::meta::{DatabaseFiles, Meta};
use crate::results::{QueryOutput, ResultBuilder, ResultTracker};
use crate::store::CollectionStore;
use crate::types::{is_valid_collection_name, CollectionId};
use ejdb_bson::{from_bson, to_bson, Document, ObjectId, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// A file-backed or in-memory document store.
///
/// # Example
///
/// ```rust,no_run
/// use ejdb_engine::{Config, DocumentEngine, EmbeddedEngine};
/// use std::path::Path;
///
/// let mut engine = EmbeddedEngine::open(Path::new("data/db"), Config::default())?;
/// let items = engine.ensure_collection("items")?;
/// # let _ = items;
/// engine.close()?;
/// # Ok::<(), ejdb_engine::EngineError>(())
/// ```
#[derive(Debug)]
pub struct EmbeddedEngine {
    config: Config,
    files: Option<DatabaseFiles>,
    meta: Meta,
    collections: Vec<CollectionStore>,
    by_name: HashMap<String, CollectionId>,
    tracker: ResultTracker,
    open: bool,
}

impl EmbeddedEngine {
    /// Opens a database at `path`.
    ///
    /// # Errors
    ///
    /// - `TCEINVALID` if the mode has neither `READER` nor `WRITER`
    /// - `TCENOFILE` if the database is missing and may not be created
    /// - `TCELOCK` if the lock is held and `LOCK_NONBLOCKING` is set
    /// - `TCEMETA` / `TCERHEAD` for corrupt files
    pub fn open(path: &Path, config: Config) -> EngineResult<Self> {
        let mode = config.mode;
        if !mode.is_reader() {
            return Err(EngineError::invalid(format!(
                "open mode {mode} has neither reader nor writer access"
            )));
        }

        let (files, meta) = DatabaseFiles::open(path, mode)?;
        let mut engine = Self {
            config,
            files: None,
            meta: Meta::default(),
            collections: Vec::new(),
            by_name: HashMap::new(),
            tracker: ResultTracker::new(),
            open: true,
        };
        for name in &meta.collections {
            let log = Self::open_log(&files.collection_path(name), mode)?;
            engine.register(CollectionStore::open(name.clone(), log, mode.is_writer())?);
        }
        engine.meta = meta;
        engine.files = Some(files);

        tracing::debug!(
            path = %path.display(),
            mode = %mode,
            collections = engine.collections.len(),
            "opened database"
        );
        Ok(engine)
    }

    /// Creates a transient database that lives only in memory.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::in_memory_with(Config::default())
    }

    /// Creates a transient database with the given configuration.
    #[must_use]
    pub fn in_memory_with(config: Config) -> Self {
        Self {
            config,
            files: None,
            meta: Meta::default(),
            collections: Vec::new(),
            by_name: HashMap::new(),
            tracker: ResultTracker::new(),
            open: true,
        }
    }

    fn open_log(path: &Path, mode: OpenMode) -> EngineResult<Box<dyn LogBackend>> {
        if mode.is_writer() {
            return Ok(Box::new(FileLog::open_writable(path)?));
        }
        match FileLog::open_readonly(path) {
            Ok(log) => Ok(Box::new(log)),
            Err(_) if !path.exists() => Ok(Box::new(MemoryLog::new())),
            Err(e) => Err(e),
        }
    }

    fn register(&mut self, store: CollectionStore) -> CollectionId {
        let id = CollectionId::new(u32::try_from(self.collections.len()).unwrap_or(u32::MAX));
        self.by_name.insert(store.name().to_string(), id);
        self.collections.push(store);
        id
    }

    /// The open mode.
    #[must_use]
    pub fn mode(&self) -> OpenMode {
        self.config.mode
    }

    /// Path of the database, if file-backed.
    #[must_use]
    pub fn path(&self) -> Option<PathBuf> {
        self.files.as_ref().map(|f| f.path().to_path_buf())
    }

    /// Shared counter of live result buffers.
    #[must_use]
    pub fn result_tracker(&self) -> ResultTracker {
        self.tracker.clone()
    }

    /// Number of result buffers issued and not yet released.
    #[must_use]
    pub fn live_result_sets(&self) -> usize {
        self.tracker.live()
    }

    fn ensure_open(&self) -> EngineResult<()> {
        if self.open {
            Ok(())
        } else {
            Err(EngineError::invalid("database is closed"))
        }
    }

    fn ensure_writer(&self) -> EngineResult<()> {
        self.ensure_open()?;
        if self.config.mode.is_writer() {
            Ok(())
        } else {
            Err(EngineError::invalid("database is opened read-only"))
        }
    }

    fn store(&self, coll: CollectionId) -> EngineResult<&CollectionStore> {
        self.ensure_open()?;
        self.collections
            .get(coll.index())
            .ok_or_else(|| EngineError::new(TCEINVALID, format!("unknown collection {coll}")))
    }

    fn store_mut(&mut self, coll: CollectionId) -> EngineResult<&mut CollectionStore> {
        self.ensure_writer()?;
        self.collections
            .get_mut(coll.index())
            .ok_or_else(|| EngineError::new(TCEINVALID, format!("unknown collection {coll}")))
    }

    fn prepare_document(
        &self,
        coll: CollectionId,
        document: &[u8],
        merge: bool,
    ) -> EngineResult<(ObjectId, Vec<u8>)> {
        let mut doc = from_bson(document)?;
        let oid = match doc.get("_id") {
            Some(Value::ObjectId(oid)) => *oid,
            Some(other) => {
                return Err(EngineError::new(
                    JBEINVALIDBSONPK,
                    format!("_id must be an object id, found {}", other.element_type()),
                ))
            }
            None => {
                let oid = ObjectId::new();
                doc.insert_first("_id", oid);
                oid
            }
        };

        if merge {
            if let Some(existing) = self.store(coll)?.get(&oid) {
                let mut merged = from_bson(existing)?;
                for (key, value) in doc {
                    merged.insert(key, value);
                }
                doc = merged;
            }
        }
        Ok((oid, to_bson(&doc)?))
    }
}

impl DocumentEngine for EmbeddedEngine {
    fn ensure_collection(&mut self, name: &str) -> EngineResult<CollectionId> {
        self.ensure_open()?;
        if let Some(id) = self.by_name.get(name) {
            return Ok(*id);
        }
        if !is_valid_collection_name(name) {
            return Err(EngineError::new(
                JBEINVALIDCOLNAME,
                format!("invalid collection name {name:?}"),
            ));
        }
        self.ensure_writer()?;
        if self.collections.len() >= self.config.max_collections {
            return Err(EngineError::from_code(JBEMAXNUMCOLS));
        }

        let log: Box<dyn LogBackend> = match &self.files {
            Some(files) => Box::new(FileLog::open_writable(&files.collection_path(name))?),
            None => Box::new(MemoryLog::new()),
        };
        let id = self.register(CollectionStore::open(name, log, true)?);
        self.meta.collections.push(name.to_string());
        if let Some(files) = &self.files {
            files.save_meta(&self.meta)?;
        }
        tracing::debug!(collection = name, id = id.as_u32(), "created collection");
        Ok(id)
    }

    fn get_collection(&self, name: &str) -> EngineResult<Option<CollectionId>> {
        self.ensure_open()?;
        Ok(self.by_name.get(name).copied())
    }

    fn collection_names(&self) -> EngineResult<Vec<String>> {
        self.ensure_open()?;
        Ok(self.meta.collections.clone())
    }

    fn save(&mut self, coll: CollectionId, document: &[u8], merge: bool) -> EngineResult<ObjectId> {
        self.ensure_writer()?;
        let (oid, payload) = self.prepare_document(coll, document, merge)?;
        let sync = self.config.sync_on_save();
        let store = self.store_mut(coll)?;
        store.put(oid, payload, sync)?;
        tracing::debug!(
            collection = store.name(),
            oid = %oid,
            merge,
            documents = store.document_count(),
            "saved document"
        );
        Ok(oid)
    }

    fn load(&self, coll: CollectionId, oid: &ObjectId) -> EngineResult<Option<Vec<u8>>> {
        Ok(self.store(coll)?.get(oid).map(|b| b.to_vec()))
    }

    fn execute(
        &self,
        coll: CollectionId,
        query: &PreparedQuery,
        flags: QueryFlags,
    ) -> EngineResult<QueryOutput> {
        let store = self.store(coll)?;
        let hints = query.hints();

        let mut matched: Vec<(Document, &[u8])> = Vec::new();
        for (_, bytes) in store.iter() {
            let doc = from_bson(bytes)?;
            if query.matches(&doc) {
                matched.push((doc, bytes.as_ref()));
            }
        }

        if flags.contains(QueryFlags::COUNT_ONLY) || hints.only_count {
            let count = hints.window(matched.len()).len();
            tracing::debug!(collection = store.name(), count, "counted documents");
            return Ok(QueryOutput::Count(count));
        }

        if !hints.order_by.is_empty() {
            matched.sort_by(|a, b| hints.compare(&a.0, &b.0));
        }

        let mut builder = ResultBuilder::new();
        for (doc, bytes) in matched.drain(hints.window(matched.len())) {
            if hints.fields.is_some() {
                builder.push(&to_bson(&hints.project(doc))?);
            } else {
                builder.push(bytes);
            }
        }
        let buffer = builder.finish(&self.tracker);
        tracing::debug!(
            collection = store.name(),
            count = buffer.len(),
            ors = query.or_count(),
            "executed query"
        );
        Ok(QueryOutput::Documents(buffer))
    }

    fn sync(&mut self) -> EngineResult<()> {
        self.ensure_writer()?;
        for store in &mut self.collections {
            store.sync()?;
        }
        Ok(())
    }

    fn close(&mut self) -> EngineResult<()> {
        if !self.open {
            return Ok(());
        }
        self.open = false;

        let mut result = Ok(());
        if self.config.mode.is_writer() {
            for store in &mut self.collections {
                if let Err(e) = store.sync() {
                    result = result.and(Err(e));
                }
            }
        }
        self.collections.clear();
        self.by_name.clear();
        if let Some(mut files) = self.files.take() {
            if let Err(e) = files.unlock() {
                result = result.and(Err(e));
            }
            tracing::debug!(path = %files.path().display(), "closed database");
        }
        result
    }

    fn is_open(&self) -> bool {
        self.open
    }
}

impl Drop for EmbeddedEngine {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::warn!(error = %e, "error closing database on drop");
        }
    }
}
