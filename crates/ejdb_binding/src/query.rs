//! Query assembly.
//!
//! A [`Query`] bundles the encoded primary match document, the encoded OR
//! alternatives and the encoded hints. Assembly is structural only: the
//! engine interprets and validates the contents when the query runs.
//!
//! Each OR clause stays a separate document. Up to eight are stored inline;
//! more spill to the heap.

use crate::error::Result;
use bytes::Bytes;
use ejdb_bson::{to_bson, validate, Document, Value};
use ejdb_engine::QueryFlags;

/// Number of OR clauses stored without a heap allocation.
pub const INLINE_OR_CLAUSES: usize = 8;

/// Encoding of an empty document.
const EMPTY_DOCUMENT: &[u8] = &[5, 0, 0, 0, 0];

/// The OR alternatives of a query.
#[derive(Debug, Clone)]
#[allow(clippy::large_enum_variant)]
pub enum OrClauses {
    /// At most [`INLINE_OR_CLAUSES`] clauses, stored in place.
    Inline {
        /// Slots; the first `len` are occupied.
        slots: [Option<Bytes>; INLINE_OR_CLAUSES],
        /// Number of occupied slots.
        len: usize,
    },
    /// More clauses than fit inline.
    Spilled(Vec<Bytes>),
}

impl Default for OrClauses {
    fn default() -> Self {
        Self::Inline {
            slots: Default::default(),
            len: 0,
        }
    }
}

impl OrClauses {
    /// No alternatives.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an encoded clause.
    pub fn push(&mut self, clause: Bytes) {
        match self {
            Self::Inline { slots, len } if *len < INLINE_OR_CLAUSES => {
                slots[*len] = Some(clause);
                *len += 1;
            }
            Self::Inline { slots, .. } => {
                let mut spilled = Vec::with_capacity(INLINE_OR_CLAUSES * 2);
                spilled.extend(slots.iter_mut().filter_map(Option::take));
                spilled.push(clause);
                tracing::trace!(clauses = spilled.len(), "OR clauses spilled to the heap");
                *self = Self::Spilled(spilled);
            }
            Self::Spilled(clauses) => clauses.push(clause),
        }
    }

    /// Number of clauses.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Inline { len, .. } => *len,
            Self::Spilled(clauses) => clauses.len(),
        }
    }

    /// Returns true if there are no clauses.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns true once the clauses live on the heap.
    #[must_use]
    pub fn is_spilled(&self) -> bool {
        matches!(self, Self::Spilled(_))
    }

    /// Iterates the encoded clauses in order.
    pub fn iter(&self) -> impl Iterator<Item = &Bytes> + '_ {
        let (inline, spilled): (&[Option<Bytes>], &[Bytes]) = match self {
            Self::Inline { slots, len } => (&slots[..*len], &[]),
            Self::Spilled(clauses) => (&[], clauses),
        };
        inline.iter().flatten().chain(spilled)
    }

    /// Calls `f` with the clauses as byte slices.
    ///
    /// Inline clauses are lent through an array on the stack.
    pub fn with_slices<R>(&self, f: impl FnOnce(&[&[u8]]) -> R) -> R {
        match self {
            Self::Inline { slots, len } => {
                let empty: &[u8] = EMPTY_DOCUMENT;
                let mut refs = [empty; INLINE_OR_CLAUSES];
                for (slot, clause) in refs.iter_mut().zip(slots.iter().flatten()) {
                    *slot = clause.as_ref();
                }
                f(&refs[..*len])
            }
            Self::Spilled(clauses) => {
                let refs: Vec<&[u8]> = clauses.iter().map(|c| c.as_ref()).collect();
                f(&refs)
            }
        }
    }
}

/// An assembled query. Immutable once built.
#[derive(Debug, Clone)]
pub struct Query {
    primary: Bytes,
    ors: OrClauses,
    hints: Bytes,
    flags: QueryFlags,
}

impl Query {
    /// Starts building a query.
    #[must_use]
    pub fn builder() -> QueryBuilder {
        QueryBuilder::new()
    }

    /// A query matching every document.
    #[must_use]
    pub fn all() -> Self {
        Self {
            primary: Bytes::from_static(EMPTY_DOCUMENT),
            ors: OrClauses::new(),
            hints: Bytes::from_static(EMPTY_DOCUMENT),
            flags: QueryFlags::NONE,
        }
    }

    /// Encoded primary match document.
    #[must_use]
    pub fn primary(&self) -> &[u8] {
        &self.primary
    }

    /// The OR alternatives.
    #[must_use]
    pub fn or_clauses(&self) -> &OrClauses {
        &self.ors
    }

    /// Encoded hints document.
    #[must_use]
    pub fn hints(&self) -> &[u8] {
        &self.hints
    }

    /// Execution flags.
    #[must_use]
    pub fn flags(&self) -> QueryFlags {
        self.flags
    }
}

#[derive(Debug, Clone)]
enum Source {
    Document(Document),
    Raw(Bytes),
}

impl Source {
    fn encode(self) -> Result<Bytes> {
        match self {
            Self::Document(doc) => Ok(Bytes::from(to_bson(&doc)?)),
            Self::Raw(bytes) => {
                validate(&bytes)?;
                Ok(bytes)
            }
        }
    }
}

/// Builds a [`Query`].
///
/// # Example
///
/// ```
/// use ejdb_binding::{Hints, Query};
/// use ejdb_bson::Document;
///
/// let query = Query::builder()
///     .filter(Document::new().with("kind", "pen"))
///     .or(Document::new().with("color", "red"))
///     .or(Document::new().with("color", "blue"))
///     .hints(Hints::new().order_by("qty", false).max(10))
///     .build()?;
/// assert_eq!(query.or_clauses().len(), 2);
/// # Ok::<(), ejdb_binding::Error>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct QueryBuilder {
    primary: Option<Source>,
    ors: Vec<Source>,
    hints: Option<Source>,
    flags: QueryFlags,
}

impl QueryBuilder {
    /// An empty builder; the result matches every document.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the primary match document.
    #[must_use]
    pub fn filter(mut self, query: Document) -> Self {
        self.primary = Some(Source::Document(query));
        self
    }

    /// Sets an already encoded primary match document.
    #[must_use]
    pub fn filter_raw(mut self, query: impl Into<Bytes>) -> Self {
        self.primary = Some(Source::Raw(query.into()));
        self
    }

    /// Adds an OR alternative.
    #[must_use]
    pub fn or(mut self, clause: Document) -> Self {
        self.ors.push(Source::Document(clause));
        self
    }

    /// Adds an already encoded OR alternative.
    #[must_use]
    pub fn or_raw(mut self, clause: impl Into<Bytes>) -> Self {
        self.ors.push(Source::Raw(clause.into()));
        self
    }

    /// Sets the hints.
    #[must_use]
    pub fn hints(mut self, hints: impl Into<Document>) -> Self {
        self.hints = Some(Source::Document(hints.into()));
        self
    }

    /// Sets an already encoded hints document.
    #[must_use]
    pub fn hints_raw(mut self, hints: impl Into<Bytes>) -> Self {
        self.hints = Some(Source::Raw(hints.into()));
        self
    }

    /// Only count matches.
    #[must_use]
    pub fn count_only(mut self) -> Self {
        self.flags |= QueryFlags::COUNT_ONLY;
        self
    }

    /// Encodes every part.
    ///
    /// # Errors
    ///
    /// `MalformedDocument` for raw parts that are not documents and
    /// `UnsupportedType` for documents that cannot be encoded.
    pub fn build(self) -> Result<Query> {
        let empty = || Bytes::from_static(EMPTY_DOCUMENT);
        let primary = self.primary.map_or_else(|| Ok(empty()), Source::encode)?;
        let mut ors = OrClauses::new();
        for clause in self.ors {
            ors.push(clause.encode()?);
        }
        let hints = self.hints.map_or_else(|| Ok(empty()), Source::encode)?;
        Ok(Query {
            primary,
            ors,
            hints,
            flags: self.flags,
        })
    }
}

/// Typed builder for the hints document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Hints {
    order_by: Vec<(String, bool)>,
    skip: Option<u64>,
    max: Option<u64>,
    fields: Vec<(String, bool)>,
    only_count: bool,
}

impl Hints {
    /// No hints.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sorts by `field`, ascending or descending. Later calls break ties.
    #[must_use]
    pub fn order_by(mut self, field: impl Into<String>, ascending: bool) -> Self {
        self.order_by.push((field.into(), ascending));
        self
    }

    /// Skips the first `n` matches.
    #[must_use]
    pub fn skip(mut self, n: u64) -> Self {
        self.skip = Some(n);
        self
    }

    /// Returns at most `n` matches.
    #[must_use]
    pub fn max(mut self, n: u64) -> Self {
        self.max = Some(n);
        self
    }

    /// Keeps only the listed fields (and `_id`).
    #[must_use]
    pub fn include(mut self, field: impl Into<String>) -> Self {
        self.fields.push((field.into(), true));
        self
    }

    /// Drops a field from the results.
    #[must_use]
    pub fn exclude(mut self, field: impl Into<String>) -> Self {
        self.fields.push((field.into(), false));
        self
    }

    /// Only count matches.
    #[must_use]
    pub fn only_count(mut self, only_count: bool) -> Self {
        self.only_count = only_count;
        self
    }

    /// Renders the hints document.
    #[must_use]
    pub fn to_document(&self) -> Document {
        let mut doc = Document::new();
        if !self.order_by.is_empty() {
            let order: Document = self
                .order_by
                .iter()
                .map(|(field, asc)| (field.clone(), if *asc { 1i32 } else { -1 }))
                .collect();
            doc.insert("$orderby", order);
        }
        if let Some(n) = self.skip {
            doc.insert("$skip", count_value(n));
        }
        if let Some(n) = self.max {
            doc.insert("$max", count_value(n));
        }
        if !self.fields.is_empty() {
            let fields: Document = self
                .fields
                .iter()
                .map(|(field, on)| (field.clone(), i32::from(*on)))
                .collect();
            doc.insert("$fields", fields);
        }
        if self.only_count {
            doc.insert("$onlycount", true);
        }
        doc
    }
}

fn count_value(n: u64) -> Value {
    i64::try_from(n).map_or(Value::Int64(i64::MAX), Value::Int64)
}

impl From<Hints> for Document {
    fn from(hints: Hints) -> Self {
        hints.to_document()
    }
}
