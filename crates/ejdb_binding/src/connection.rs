//! Database connections.
//!
//! A [`Connection`] owns exactly one engine instance. Closing releases it
//! once; later closes are no-ops, and every other operation on a closed
//! connection fails with `InvalidHandle`. Dropping an open connection closes
//! it and logs, rather than returns, any failure.

use crate::collection::CollectionHandle;
use crate::cursor::{dispose_slot, slot_is_live, Cursor, CursorSlot};
use crate::error::{Error, Result};
use crate::mode::ModeArg;
use crate::query::Query;
use ejdb_bson::host::{encode_host, HostValue};
use ejdb_bson::{from_bson, to_bson, validate, Document, ObjectId};
use ejdb_engine::{
    CollectionId, Config, DocumentEngine, EmbeddedEngine, OpenMode, QueryOutput, ResultBuilder,
    ResultTracker,
};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// An open database.
///
/// A connection is not synchronized; share it between threads only behind
/// a lock.
///
/// # Example
///
/// ```
/// use ejdb_binding::{Connection, Query};
/// use ejdb_bson::Document;
///
/// let mut conn = Connection::open_in_memory();
/// let oid = conn.save("items", &Document::new().with("name", "pen"), false)?;
/// assert_eq!(oid.len(), 24);
///
/// let query = Query::builder()
///     .filter(Document::new().with("name", "pen"))
///     .build()?;
/// let cursor = conn.find("items", &query)?;
/// assert_eq!(cursor.count()?, 1);
/// conn.close()?;
/// # Ok::<(), ejdb_binding::Error>(())
/// ```
pub struct Connection {
    id: u64,
    mode: OpenMode,
    path: Option<PathBuf>,
    engine: Option<Box<dyn DocumentEngine>>,
    cursors: Vec<CursorSlot>,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("mode", &self.mode)
            .field("path", &self.path)
            .field("open", &self.is_open())
            .field("open_cursors", &self.open_cursors())
            .finish()
    }
}

impl Connection {
    /// Opens the database at `path`.
    ///
    /// `mode` is a bitmask or a flag string, see [`ModeArg`].
    ///
    /// # Errors
    ///
    /// `Open` with the engine's code if the database cannot be opened.
    pub fn open(path: impl AsRef<Path>, mode: impl Into<ModeArg>) -> Result<Self> {
        let path = path.as_ref();
        let mode = mode.into().resolve();
        let engine = EmbeddedEngine::open(path, Config::new().mode(mode)).map_err(|source| {
            Error::Open {
                path: path.to_path_buf(),
                source,
            }
        })?;
        let conn = Self::from_parts(Box::new(engine), mode, Some(path.to_path_buf()));
        tracing::debug!(connection = conn.id, path = %path.display(), mode = %mode, "opened connection");
        Ok(conn)
    }

    /// Opens a transient in-memory database.
    #[must_use]
    pub fn open_in_memory() -> Self {
        let engine = EmbeddedEngine::in_memory();
        let mode = engine.mode();
        Self::from_parts(Box::new(engine), mode, None)
    }

    /// Wraps an already open engine.
    #[must_use]
    pub fn with_engine(engine: Box<dyn DocumentEngine>, mode: OpenMode) -> Self {
        Self::from_parts(engine, mode, None)
    }

    fn from_parts(engine: Box<dyn DocumentEngine>, mode: OpenMode, path: Option<PathBuf>) -> Self {
        Self {
            id: NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
            mode,
            path,
            engine: Some(engine),
            cursors: Vec::new(),
        }
    }

    /// Returns true until the connection is closed.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.engine.is_some()
    }

    /// The resolved open mode.
    #[must_use]
    pub fn mode(&self) -> OpenMode {
        self.mode
    }

    /// The database path; `None` for in-memory databases.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Number of cursors from this connection that still hold results.
    #[must_use]
    pub fn open_cursors(&self) -> usize {
        self.cursors.iter().filter(|slot| slot_is_live(slot)).count()
    }

    fn engine(&self) -> Result<&dyn DocumentEngine> {
        self.engine.as_deref().ok_or_else(closed)
    }

    fn engine_mut(&mut self) -> Result<&mut dyn DocumentEngine> {
        match self.engine.as_deref_mut() {
            Some(engine) => Ok(engine),
            None => Err(closed()),
        }
    }

    fn check_handle(&self, handle: &CollectionHandle) -> Result<()> {
        if handle.connection_id != self.id {
            return Err(Error::invalid_handle(format!(
                "collection handle {handle} belongs to another connection"
            )));
        }
        if !self.is_open() {
            return Err(Error::invalid_handle(format!(
                "collection handle {handle} outlived its connection"
            )));
        }
        Ok(())
    }

    /// Closes the connection.
    ///
    /// Outstanding cursors are disposed first. Closing an already closed
    /// connection succeeds and does nothing.
    ///
    /// # Errors
    ///
    /// `Engine` if the engine fails to release its resources. The
    /// connection is closed regardless.
    pub fn close(&mut self) -> Result<()> {
        let Some(mut engine) = self.engine.take() else {
            return Ok(());
        };
        let disposed = self.cursors.drain(..).filter(dispose_slot).count();
        let result = engine.close();
        drop(engine);
        tracing::debug!(
            connection = self.id,
            disposed_cursors = disposed,
            ok = result.is_ok(),
            "closed connection"
        );
        result.map_err(Error::from)
    }

    /// Closes the connection, logging instead of returning any failure.
    pub fn finalize(&mut self) {
        if let Err(e) = self.close() {
            tracing::warn!(connection = self.id, error = %e, "error closing connection during finalization");
        }
    }

    /// Names of all collections.
    ///
    /// # Errors
    ///
    /// `InvalidHandle` if closed, `Engine` on engine failure.
    pub fn collection_names(&self) -> Result<Vec<String>> {
        Ok(self.engine()?.collection_names()?)
    }

    /// Returns the collection `name`, creating it if it does not exist.
    ///
    /// # Errors
    ///
    /// `InvalidHandle` if closed, `Engine` for invalid names or when the
    /// engine cannot create the collection.
    pub fn ensure_collection(&mut self, name: &str) -> Result<CollectionHandle> {
        let id = self.ensure_collection_id(name)?;
        Ok(CollectionHandle::new(self.id, id, name))
    }

    fn ensure_collection_id(&mut self, name: &str) -> Result<CollectionId> {
        let engine = self.engine_mut()?;
        let id = engine.ensure_collection(name)?;
        Ok(id)
    }

    /// Saves `document` into `collection` and returns its id as 24 hex
    /// characters.
    ///
    /// The collection is created on first use. A document without `_id`
    /// gets a new one. With `merge`, fields of the stored document that
    /// `document` does not mention are kept; otherwise it is replaced.
    ///
    /// # Errors
    ///
    /// `UnsupportedType` before touching the engine if the document cannot
    /// be encoded, `InvalidHandle` if closed, `Engine` on engine failure.
    pub fn save(&mut self, collection: &str, document: &Document, merge: bool) -> Result<String> {
        let bytes = to_bson(document)?;
        self.save_encoded(collection, &bytes, merge)
    }

    /// Saves an already encoded document.
    ///
    /// # Errors
    ///
    /// `MalformedDocument` before touching the engine if `bytes` is not a
    /// document, otherwise as [`Connection::save`].
    pub fn save_raw(&mut self, collection: &str, bytes: &[u8], merge: bool) -> Result<String> {
        validate(bytes)?;
        self.save_encoded(collection, bytes, merge)
    }

    /// Saves a host value tree. The root must be a table.
    ///
    /// # Errors
    ///
    /// `UnsupportedType` for cyclic tables, non-table roots and opaque host
    /// objects, otherwise as [`Connection::save`].
    pub fn save_host(&mut self, collection: &str, value: &HostValue, merge: bool) -> Result<String> {
        let document = encode_host(value)?;
        self.save(collection, &document, merge)
    }

    /// Saves into a collection handle from [`Connection::ensure_collection`].
    ///
    /// # Errors
    ///
    /// `InvalidHandle` if the handle is not from this open connection,
    /// otherwise as [`Connection::save`].
    pub fn save_into(
        &mut self,
        handle: &CollectionHandle,
        document: &Document,
        merge: bool,
    ) -> Result<String> {
        let bytes = to_bson(document)?;
        self.check_handle(handle)?;
        self.store(handle.id, handle.name(), &bytes, merge)
    }

    fn save_encoded(&mut self, collection: &str, bytes: &[u8], merge: bool) -> Result<String> {
        let id = self.ensure_collection_id(collection)?;
        self.store(id, collection, bytes, merge)
    }

    fn store(&mut self, id: CollectionId, name: &str, bytes: &[u8], merge: bool) -> Result<String> {
        let connection = self.id;
        let oid = self.engine_mut()?.save(id, bytes, merge)?;
        tracing::debug!(connection, collection = name, oid = %oid, merge, "saved document");
        Ok(oid.to_hex())
    }

    /// Loads one document by its hex id.
    ///
    /// Returns `Ok(None)` if the collection or the document does not exist.
    ///
    /// # Errors
    ///
    /// `InvalidOperation` if `oid` is not 24 hex characters,
    /// `InvalidHandle` if closed, `Engine` on engine failure.
    pub fn load(&self, collection: &str, oid: &str) -> Result<Option<Document>> {
        let oid = ObjectId::parse_hex(oid)
            .map_err(|e| Error::invalid_operation(format!("cannot load {oid:?}: {e}")))?;
        let engine = self.engine()?;
        let Some(id) = engine.get_collection(collection)? else {
            return Ok(None);
        };
        match engine.load(id, &oid)? {
            Some(bytes) => Ok(Some(from_bson(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Runs `query` against `collection`.
    ///
    /// A collection that does not exist yields an empty cursor and is not
    /// created; the query is still validated.
    ///
    /// # Errors
    ///
    /// `InvalidHandle` if closed, `Engine` if the engine rejects the query.
    /// No cursor is created on error.
    pub fn find(&mut self, collection: &str, query: &Query) -> Result<Cursor> {
        let engine = self.engine()?;
        let id = engine.get_collection(collection)?;
        self.run(id, collection, query)
    }

    /// Runs a query given as encoded documents.
    ///
    /// # Errors
    ///
    /// `MalformedDocument` before touching the engine if any part is not a
    /// document, otherwise as [`Connection::find`].
    pub fn find_raw(
        &mut self,
        collection: &str,
        query: &[u8],
        ors: &[&[u8]],
        hints: &[u8],
    ) -> Result<Cursor> {
        let query = ors
            .iter()
            .fold(
                Query::builder().filter_raw(query.to_vec()),
                |builder, or| builder.or_raw(or.to_vec()),
            )
            .hints_raw(hints.to_vec())
            .build()?;
        self.find(collection, &query)
    }

    /// Runs `query` against a collection handle.
    ///
    /// # Errors
    ///
    /// `InvalidHandle` if the handle is not from this open connection,
    /// otherwise as [`Connection::find`].
    pub fn find_in(&mut self, handle: &CollectionHandle, query: &Query) -> Result<Cursor> {
        self.check_handle(handle)?;
        self.run(Some(handle.id), handle.name(), query)
    }

    fn run(&mut self, id: Option<CollectionId>, name: &str, query: &Query) -> Result<Cursor> {
        let engine = self.engine()?;
        let prepared = query
            .or_clauses()
            .with_slices(|ors| engine.prepare(query.primary(), ors, query.hints()))?;
        let output = match id {
            Some(id) => engine.execute(id, &prepared, query.flags())?,
            None if query.flags().is_empty() && !prepared.hints().only_count => {
                QueryOutput::Documents(ResultBuilder::new().finish(&ResultTracker::new()))
            }
            None => QueryOutput::Count(0),
        };
        tracing::debug!(
            connection = self.id,
            collection = name,
            ors = query.or_clauses().len(),
            count = output.count(),
            "find"
        );

        let cursor = Cursor::new(output);
        self.cursors.retain(slot_is_live);
        self.cursors.push(cursor.slot());
        Ok(cursor)
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.finalize();
    }
}

fn closed() -> Error {
    Error::invalid_handle("connection is closed")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use ejdb_bson::Value;

    fn pen() -> Document {
        Document::new().with("name", "pen").with("qty", 5i32)
    }

    #[test]
    fn save_then_find() {
        let mut conn = Connection::open_in_memory();
        let oid = conn.save("items", &pen(), false).unwrap();
        assert_eq!(oid.len(), 24);

        let query = Query::builder()
            .filter(Document::new().with("name", "pen"))
            .build()
            .unwrap();
        let cursor = conn.find("items", &query).unwrap();
        assert_eq!(cursor.count().unwrap(), 1);
        let doc = cursor.object(0).unwrap();
        assert_eq!(doc.get("_id"), Some(&Value::ObjectId(oid.parse().unwrap())));
        assert_eq!(doc.get("qty"), Some(&Value::Int32(5)));
    }

    #[test]
    fn find_on_missing_collection_is_empty() {
        let mut conn = Connection::open_in_memory();
        let mut cursor = conn.find("nothing", &Query::all()).unwrap();
        assert_eq!(cursor.count().unwrap(), 0);
        assert_eq!(cursor.next_document().unwrap(), None);
        assert!(conn.collection_names().unwrap().is_empty());

        let counted = Query::builder().count_only().build().unwrap();
        let cursor = conn.find("nothing", &counted).unwrap();
        assert!(cursor.is_count_only());
        assert_eq!(cursor.count().unwrap(), 0);
    }

    #[test]
    fn find_on_missing_collection_still_validates() {
        let mut conn = Connection::open_in_memory();
        let query = Query::builder()
            .filter(Document::new().with("$bogus", 1i32))
            .build()
            .unwrap();
        let err = conn.find("nothing", &query).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Engine);
    }

    #[test]
    fn load_by_hex_id() {
        let mut conn = Connection::open_in_memory();
        let oid = conn.save("items", &pen(), false).unwrap();
        let doc = conn.load("items", &oid).unwrap().unwrap();
        assert_eq!(doc.get("name"), Some(&Value::from("pen")));
        assert_eq!(conn.load("other", &oid).unwrap(), None);
        let err = conn.load("items", "xyz").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidOperation);
    }

    #[test]
    fn handles_are_scoped_to_their_connection() {
        let mut a = Connection::open_in_memory();
        let mut b = Connection::open_in_memory();
        let items = a.ensure_collection("items").unwrap();
        assert_eq!(items.name(), "items");
        b.ensure_collection("items").unwrap();

        let err = b.save_into(&items, &pen(), false).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidHandle);
        a.save_into(&items, &pen(), false).unwrap();

        a.close().unwrap();
        let err = a.find_in(&items, &Query::all()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidHandle);
    }

    #[test]
    fn close_disposes_cursors() {
        let mut conn = Connection::open_in_memory();
        conn.save("items", &pen(), false).unwrap();
        let first = conn.find("items", &Query::all()).unwrap();
        let second = conn.find("items", &Query::all()).unwrap();
        assert_eq!(conn.open_cursors(), 2);
        second.dispose();
        assert_eq!(conn.open_cursors(), 1);

        conn.close().unwrap();
        assert!(first.is_disposed());
        assert_eq!(first.count().unwrap_err().kind(), ErrorKind::InvalidHandle);
        assert_eq!(conn.open_cursors(), 0);
    }

    #[test]
    fn closed_connection_rejects_operations() {
        let mut conn = Connection::open_in_memory();
        conn.close().unwrap();
        conn.close().unwrap();
        assert!(!conn.is_open());
        for err in [
            conn.save("items", &pen(), false).unwrap_err(),
            conn.find("items", &Query::all()).unwrap_err(),
            conn.ensure_collection("items").unwrap_err(),
            conn.collection_names().unwrap_err(),
        ] {
            assert_eq!(err.kind(), ErrorKind::InvalidHandle);
        }
    }

    #[test]
    fn save_raw_checks_bytes_first() {
        let mut conn = Connection::open_in_memory();
        let err = conn.save_raw("items", &[7, 0, 0], false).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedDocument);
        assert!(conn.collection_names().unwrap().is_empty());
    }

    #[test]
    fn debug_output() {
        let conn = Connection::open_in_memory();
        let rendered = format!("{conn:?}");
        assert!(rendered.contains("open: true"));
    }
}
