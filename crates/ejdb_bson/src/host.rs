//! Bridge between dynamic host values and typed documents.
//!
//! Host environments hand the binding loosely typed value trees: scalars
//! plus shared, mutable tables that double as arrays and maps. This module
//! is the single place where such trees become [`Document`]s and back.

use crate::document::Document;
use crate::encoder::MAX_DEPTH;
use crate::error::{BsonError, BsonResult};
use crate::oid::ObjectId;
use crate::value::{Binary, Regex, Value};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// A table key: host tables are keyed by integers or strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TableKey {
    /// Integer key (arrays use 1..n).
    Int(i64),
    /// String key.
    Str(String),
}

impl From<i64> for TableKey {
    fn from(n: i64) -> Self {
        TableKey::Int(n)
    }
}

impl From<&str> for TableKey {
    fn from(s: &str) -> Self {
        TableKey::Str(s.to_string())
    }
}

impl From<String> for TableKey {
    fn from(s: String) -> Self {
        TableKey::Str(s)
    }
}

impl fmt::Display for TableKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableKey::Int(n) => write!(f, "{n}"),
            TableKey::Str(s) => f.write_str(s),
        }
    }
}

/// A dynamically typed host value.
#[derive(Debug, Clone, PartialEq)]
pub enum HostValue {
    /// Absent value. Never stored inside a table.
    Nil,
    /// Boolean.
    Boolean(bool),
    /// Integer; stored as a 32-bit int when it fits, otherwise 64-bit.
    Integer(i64),
    /// Integer that is always stored with the 64-bit tag.
    Long(i64),
    /// Floating point number.
    Number(f64),
    /// String.
    String(String),
    /// Byte string with its binary subtype.
    Binary(Binary),
    /// Shared table.
    Table(HostTable),
    /// Object identifier.
    ObjectId(ObjectId),
    /// Date in milliseconds since the epoch.
    Date(i64),
    /// Regular expression.
    Regex(Regex),
    /// JavaScript code.
    Code(String),
    /// Symbol.
    Symbol(String),
    /// Explicit undefined marker.
    Undefined,
    /// Explicit null marker (distinct from `Nil`).
    Null,
    /// A host object with no document representation (functions, threads,
    /// userdata). Carries the host type name for error messages.
    Opaque(String),
}

impl HostValue {
    /// Host-facing type name.
    #[must_use]
    pub fn type_name(&self) -> &str {
        match self {
            HostValue::Nil => "nil",
            HostValue::Boolean(_) => "boolean",
            HostValue::Integer(_) | HostValue::Long(_) | HostValue::Number(_) => "number",
            HostValue::String(_) => "string",
            HostValue::Binary(_) => "binary",
            HostValue::Table(_) => "table",
            HostValue::ObjectId(_) => "oid",
            HostValue::Date(_) => "date",
            HostValue::Regex(_) => "regex",
            HostValue::Code(_) => "code",
            HostValue::Symbol(_) => "symbol",
            HostValue::Undefined => "undefined",
            HostValue::Null => "null",
            HostValue::Opaque(name) => name,
        }
    }
}

impl From<&str> for HostValue {
    fn from(s: &str) -> Self {
        HostValue::String(s.to_string())
    }
}

impl From<i64> for HostValue {
    fn from(n: i64) -> Self {
        HostValue::Integer(n)
    }
}

impl From<f64> for HostValue {
    fn from(n: f64) -> Self {
        HostValue::Number(n)
    }
}

impl From<bool> for HostValue {
    fn from(b: bool) -> Self {
        HostValue::Boolean(b)
    }
}

impl From<HostTable> for HostValue {
    fn from(t: HostTable) -> Self {
        HostValue::Table(t)
    }
}

#[derive(Debug, Default)]
struct TableInner {
    entries: Vec<(TableKey, HostValue)>,
    sequence: bool,
}

/// A shared, mutable, insertion-ordered host table.
///
/// Clones share storage, so a table can be placed inside itself; the
/// encoder detects such cycles.
#[derive(Clone, Default)]
pub struct HostTable(Rc<RefCell<TableInner>>);

impl HostTable {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty table that encodes as an array even while empty.
    #[must_use]
    pub fn sequence() -> Self {
        let table = Self::new();
        table.0.borrow_mut().sequence = true;
        table
    }

    /// Set `key` to `value`. Setting `Nil` removes the key.
    pub fn set(&self, key: impl Into<TableKey>, value: impl Into<HostValue>) {
        let key = key.into();
        let value = value.into();
        let mut inner = self.0.borrow_mut();
        let existing = inner.entries.iter().position(|(k, _)| *k == key);
        match (existing, value) {
            (Some(i), HostValue::Nil) => {
                inner.entries.remove(i);
            }
            (None, HostValue::Nil) => {}
            (Some(i), value) => inner.entries[i].1 = value,
            (None, value) => inner.entries.push((key, value)),
        }
    }

    /// Append at integer key `len + 1`.
    pub fn push(&self, value: impl Into<HostValue>) {
        let next = i64::try_from(self.len()).unwrap_or(i64::MAX - 1) + 1;
        self.set(next, value);
    }

    /// Look up a key.
    #[must_use]
    pub fn get(&self, key: impl Into<TableKey>) -> Option<HostValue> {
        let key = key.into();
        self.0
            .borrow()
            .entries
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.clone())
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.borrow().entries.len()
    }

    /// Returns true if the table has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.borrow().entries.is_empty()
    }

    /// Snapshot of the entries in insertion order.
    #[must_use]
    pub fn entries(&self) -> Vec<(TableKey, HostValue)> {
        self.0.borrow().entries.clone()
    }

    /// Returns true if both handles share the same storage.
    #[must_use]
    pub fn ptr_eq(&self, other: &HostTable) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Values ordered by key if the keys are exactly `1..=n`.
    fn as_sequence(&self) -> Option<Vec<HostValue>> {
        let inner = self.0.borrow();
        if inner.entries.is_empty() {
            return inner.sequence.then(Vec::new);
        }
        let n = inner.entries.len();
        let mut slots: Vec<Option<HostValue>> = vec![None; n];
        for (key, value) in &inner.entries {
            let TableKey::Int(k) = key else {
                return None;
            };
            let index = usize::try_from(*k).ok()?.checked_sub(1)?;
            let slot = slots.get_mut(index)?;
            *slot = Some(value.clone());
        }
        slots.into_iter().collect()
    }
}

impl PartialEq for HostTable {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other) || self.0.borrow().entries == other.0.borrow().entries
    }
}

impl fmt::Debug for HostTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.try_borrow() {
            Ok(inner) => f
                .debug_map()
                .entries(inner.entries.iter().map(|(k, v)| (k, v)))
                .finish(),
            Err(_) => f.write_str("HostTable(<borrowed>)"),
        }
    }
}

/// Convert a host table into a document.
///
/// # Errors
///
/// Returns [`BsonError::UnsupportedType`] if the root is not a table, if the
/// tree contains a cycle or nests deeper than [`MAX_DEPTH`] tables, or if it
/// contains opaque host objects.
pub fn encode_host(value: &HostValue) -> BsonResult<Document> {
    let HostValue::Table(table) = value else {
        return Err(BsonError::unsupported_type(format!(
            "{} (documents must be tables)",
            value.type_name()
        )));
    };
    let mut path = Vec::new();
    enter(table, &mut path)?;
    let doc = table_to_document(table, &mut path)?;
    path.pop();
    Ok(doc)
}

fn enter(table: &HostTable, path: &mut Vec<HostTable>) -> BsonResult<()> {
    if path.len() >= MAX_DEPTH {
        return Err(BsonError::unsupported_type(format!(
            "document nested deeper than {MAX_DEPTH} levels"
        )));
    }
    if path.iter().any(|t| t.ptr_eq(table)) {
        return Err(BsonError::unsupported_type("cyclic table"));
    }
    path.push(table.clone());
    Ok(())
}

fn table_to_document(table: &HostTable, path: &mut Vec<HostTable>) -> BsonResult<Document> {
    let mut doc = Document::with_capacity(table.len());
    for (key, item) in table.entries() {
        doc.insert(key.to_string(), host_to_value(&item, path)?);
    }
    Ok(doc)
}

fn table_to_value(table: &HostTable, path: &mut Vec<HostTable>) -> BsonResult<Value> {
    enter(table, path)?;
    let value = match table.as_sequence() {
        Some(items) => Value::Array(
            items
                .iter()
                .map(|item| host_to_value(item, path))
                .collect::<BsonResult<_>>()?,
        ),
        None => Value::Document(table_to_document(table, path)?),
    };
    path.pop();
    Ok(value)
}

fn host_to_value(value: &HostValue, path: &mut Vec<HostTable>) -> BsonResult<Value> {
    Ok(match value {
        HostValue::Nil => Value::Null,
        HostValue::Boolean(b) => Value::Boolean(*b),
        HostValue::Integer(n) => match i32::try_from(*n) {
            Ok(small) => Value::Int32(small),
            Err(_) => Value::Int64(*n),
        },
        HostValue::Long(n) => Value::Int64(*n),
        HostValue::Number(f) => Value::Double(*f),
        HostValue::String(s) => Value::String(s.clone()),
        HostValue::Binary(b) => Value::Binary(b.clone()),
        HostValue::Table(t) => table_to_value(t, path)?,
        HostValue::ObjectId(oid) => Value::ObjectId(*oid),
        HostValue::Date(ms) => Value::DateTime(*ms),
        HostValue::Regex(re) => Value::Regex(re.clone()),
        HostValue::Code(s) => Value::Code(s.clone()),
        HostValue::Symbol(s) => Value::Symbol(s.clone()),
        HostValue::Undefined => Value::Undefined,
        HostValue::Null => Value::Null,
        HostValue::Opaque(name) => return Err(BsonError::unsupported_type(name.clone())),
    })
}

/// Convert a document into a fresh host table.
///
/// Arrays become sequence tables keyed `1..n`. 64-bit integers that fit in
/// 32 bits come back as [`HostValue::Long`] so re-encoding keeps their width.
#[must_use]
pub fn decode_host(document: &Document) -> HostValue {
    HostValue::Table(document_to_table(document))
}

fn document_to_table(document: &Document) -> HostTable {
    let table = HostTable::new();
    for (key, value) in document.iter() {
        table.set(key, value_to_host(value));
    }
    table
}

fn value_to_host(value: &Value) -> HostValue {
    match value {
        Value::Double(f) => HostValue::Number(*f),
        Value::String(s) => HostValue::String(s.clone()),
        Value::Document(doc) => HostValue::Table(document_to_table(doc)),
        Value::Array(items) => {
            let table = HostTable::sequence();
            for item in items {
                table.push(value_to_host(item));
            }
            HostValue::Table(table)
        }
        Value::Binary(b) => HostValue::Binary(b.clone()),
        Value::Undefined => HostValue::Undefined,
        Value::ObjectId(oid) => HostValue::ObjectId(*oid),
        Value::Boolean(b) => HostValue::Boolean(*b),
        Value::DateTime(ms) => HostValue::Date(*ms),
        Value::Null => HostValue::Null,
        Value::Regex(re) => HostValue::Regex(re.clone()),
        Value::Code(s) => HostValue::Code(s.clone()),
        Value::Symbol(s) => HostValue::Symbol(s.clone()),
        Value::Int32(n) => HostValue::Integer(i64::from(*n)),
        Value::Int64(n) if i32::try_from(*n).is_ok() => HostValue::Long(*n),
        Value::Int64(n) => HostValue::Integer(*n),
    }
}
