//! The engine seam used by the bindings.

use crate::error::EngineResult;
use crate::flags::QueryFlags;
use crate::hints::Hints;
use crate::matcher::Matcher;
use crate::results::QueryOutput;
use crate::types::CollectionId;
use ejdb_bson::{from_bson, Document, ObjectId};

/// A validated, compiled query: primary match, OR alternatives and hints.
///
/// A document matches when it matches the primary query and, if any OR
/// clauses are present, at least one of them.
#[derive(Debug, Clone, Default)]
pub struct PreparedQuery {
    primary: Matcher,
    ors: Vec<Matcher>,
    hints: Hints,
}

impl PreparedQuery {
    /// Compiles encoded query, OR and hints documents.
    ///
    /// # Errors
    ///
    /// Returns `JBEINVALIDBSON` for malformed documents and the matching
    /// query error code for invalid queries or hints.
    pub fn compile(query: &[u8], ors: &[&[u8]], hints: &[u8]) -> EngineResult<Self> {
        let primary = Matcher::compile(&from_bson(query)?)?;
        let ors = ors
            .iter()
            .map(|or| Matcher::compile(&from_bson(or)?))
            .collect::<EngineResult<Vec<_>>>()?;
        let hints = Hints::parse(&from_bson(hints)?)?;
        Ok(Self {
            primary,
            ors,
            hints,
        })
    }

    /// Evaluates the query against a decoded document.
    #[must_use]
    pub fn matches(&self, doc: &Document) -> bool {
        self.primary.matches(doc) && (self.ors.is_empty() || self.ors.iter().any(|m| m.matches(doc)))
    }

    /// Number of OR clauses.
    #[must_use]
    pub fn or_count(&self) -> usize {
        self.ors.len()
    }

    /// The parsed hints.
    #[must_use]
    pub fn hints(&self) -> &Hints {
        &self.hints
    }
}

/// An embedded document store addressed by collection name.
///
/// Implementations own their native resources. `close` must be idempotent;
/// every other operation on a closed engine fails with `TCEINVALID`.
pub trait DocumentEngine: Send {
    /// Returns the collection named `name`, creating it if needed.
    fn ensure_collection(&mut self, name: &str) -> EngineResult<CollectionId>;

    /// Returns the collection named `name` if it exists.
    fn get_collection(&self, name: &str) -> EngineResult<Option<CollectionId>>;

    /// Names of all collections in creation order.
    fn collection_names(&self) -> EngineResult<Vec<String>>;

    /// Stores a document and returns its id.
    ///
    /// A missing `_id` is generated. With `merge`, fields of an existing
    /// document with the same id that `document` does not mention are kept.
    fn save(&mut self, coll: CollectionId, document: &[u8], merge: bool) -> EngineResult<ObjectId>;

    /// Loads a document by id.
    fn load(&self, coll: CollectionId, oid: &ObjectId) -> EngineResult<Option<Vec<u8>>>;

    /// Validates and compiles a query.
    fn prepare(&self, query: &[u8], ors: &[&[u8]], hints: &[u8]) -> EngineResult<PreparedQuery> {
        PreparedQuery::compile(query, ors, hints)
    }

    /// Runs a prepared query against a collection.
    fn execute(
        &self,
        coll: CollectionId,
        query: &PreparedQuery,
        flags: QueryFlags,
    ) -> EngineResult<QueryOutput>;

    /// Flushes pending writes to disk.
    fn sync(&mut self) -> EngineResult<()>;

    /// Releases the engine. Idempotent.
    fn close(&mut self) -> EngineResult<()>;

    /// Returns true until `close` has been called.
    fn is_open(&self) -> bool;
}
