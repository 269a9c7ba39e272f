//! Dynamic document value type.

use crate::document::Document;
use crate::oid::ObjectId;
use crate::types::ElementType;
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

/// A binary blob with its subtype byte.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Binary {
    /// Subtype byte (0 = generic).
    pub subtype: u8,
    /// Payload.
    pub bytes: Vec<u8>,
}

/// A regular expression as stored in a document.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Regex {
    /// The pattern.
    pub pattern: String,
    /// Option letters (`i`, `m`, `s`, `x`, ...).
    pub options: String,
}

/// A typed document value.
///
/// One variant per element type tag. 32-bit and 64-bit integers are kept
/// apart so that a decoded value has the width it was written with.
#[derive(Debug, Clone)]
pub enum Value {
    /// 64-bit float.
    Double(f64),
    /// UTF-8 string.
    String(String),
    /// Embedded document.
    Document(Document),
    /// Array.
    Array(Vec<Value>),
    /// Binary blob.
    Binary(Binary),
    /// Undefined (deprecated, still readable).
    Undefined,
    /// Object identifier.
    ObjectId(ObjectId),
    /// Boolean.
    Boolean(bool),
    /// Milliseconds since the Unix epoch.
    DateTime(i64),
    /// Null.
    Null,
    /// Regular expression.
    Regex(Regex),
    /// JavaScript code.
    Code(String),
    /// Symbol.
    Symbol(String),
    /// 32-bit integer.
    Int32(i32),
    /// 64-bit integer.
    Int64(i64),
}

impl Value {
    /// Returns the element type tag this value encodes with.
    #[must_use]
    pub fn element_type(&self) -> ElementType {
        match self {
            Value::Double(_) => ElementType::Double,
            Value::String(_) => ElementType::String,
            Value::Document(_) => ElementType::Object,
            Value::Array(_) => ElementType::Array,
            Value::Binary(_) => ElementType::Binary,
            Value::Undefined => ElementType::Undefined,
            Value::ObjectId(_) => ElementType::ObjectId,
            Value::Boolean(_) => ElementType::Boolean,
            Value::DateTime(_) => ElementType::Date,
            Value::Null => ElementType::Null,
            Value::Regex(_) => ElementType::Regex,
            Value::Code(_) => ElementType::Code,
            Value::Symbol(_) => ElementType::Symbol,
            Value::Int32(_) => ElementType::Int32,
            Value::Int64(_) => ElementType::Int64,
        }
    }

    /// Check if this value is null.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Get this value as a boolean, if it is one.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Get this value as a string slice, if it is a string.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get this value as an embedded document, if it is one.
    #[must_use]
    pub fn as_document(&self) -> Option<&Document> {
        match self {
            Value::Document(d) => Some(d),
            _ => None,
        }
    }

    /// Get this value as an array, if it is one.
    #[must_use]
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Get this value as an object id, if it is one.
    #[must_use]
    pub fn as_object_id(&self) -> Option<ObjectId> {
        match self {
            Value::ObjectId(id) => Some(*id),
            _ => None,
        }
    }

    /// Returns the value as an `i64` if it is an integer of either width.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int32(n) => Some(i64::from(*n)),
            Value::Int64(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the value as an `f64` if it is numeric.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Double(d) => Some(*d),
            Value::Int32(n) => Some(f64::from(*n)),
            Value::Int64(n) => Some(*n as f64),
            _ => None,
        }
    }

    /// Returns true for doubles and integers.
    #[must_use]
    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Double(_) | Value::Int32(_) | Value::Int64(_))
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            // Bitwise so NaN payloads and signed zeros survive comparison.
            (Value::Double(a), Value::Double(b)) => a.to_bits() == b.to_bits(),
            (Value::String(a), Value::String(b))
            | (Value::Code(a), Value::Code(b))
            | (Value::Symbol(a), Value::Symbol(b)) => a == b,
            (Value::Document(a), Value::Document(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Binary(a), Value::Binary(b)) => a == b,
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::ObjectId(a), Value::ObjectId(b)) => a == b,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::DateTime(a), Value::DateTime(b)) | (Value::Int64(a), Value::Int64(b)) => a == b,
            (Value::Regex(a), Value::Regex(b)) => a == b,
            (Value::Int32(a), Value::Int32(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl From<f64> for Value {
    fn from(d: f64) -> Self {
        Value::Double(d)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int32(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int64(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Document> for Value {
    fn from(d: Document) -> Self {
        Value::Document(d)
    }
}

impl From<ObjectId> for Value {
    fn from(id: ObjectId) -> Self {
        Value::ObjectId(id)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::Array(v.into_iter().map(Into::into).collect())
    }
}

impl From<()> for Value {
    fn from((): ()) -> Self {
        Value::Null
    }
}

fn single<S: Serializer, V: Serialize + ?Sized>(
    serializer: S,
    key: &str,
    value: &V,
) -> Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(Some(1))?;
    map.serialize_entry(key, value)?;
    map.end()
}

/// Extended-JSON style view: scalars map to native JSON types, engine-specific
/// types become single-key `$`-tagged objects.
impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Double(d) => serializer.serialize_f64(*d),
            Value::String(s) => serializer.serialize_str(s),
            Value::Document(doc) => doc.serialize(serializer),
            Value::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Binary(bin) => {
                let hex: String = bin.bytes.iter().map(|b| format!("{b:02x}")).collect();
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("$binary", &hex)?;
                map.serialize_entry("$type", &bin.subtype)?;
                map.end()
            }
            Value::Undefined => single(serializer, "$undefined", &true),
            Value::ObjectId(id) => single(serializer, "$oid", &id.to_hex()),
            Value::Boolean(b) => serializer.serialize_bool(*b),
            Value::DateTime(ms) => single(serializer, "$date", ms),
            Value::Null => serializer.serialize_unit(),
            Value::Regex(re) => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("$regex", &re.pattern)?;
                map.serialize_entry("$options", &re.options)?;
                map.end()
            }
            Value::Code(code) => single(serializer, "$code", code),
            Value::Symbol(sym) => single(serializer, "$symbol", sym),
            Value::Int32(n) => serializer.serialize_i32(*n),
            Value::Int64(n) => serializer.serialize_i64(*n),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doubles_compare_bitwise() {
        assert_eq!(Value::Double(f64::NAN), Value::Double(f64::NAN));
        assert_ne!(Value::Double(0.0), Value::Double(-0.0));
        assert_eq!(Value::Double(1.5), Value::Double(1.5));
    }

    #[test]
    fn integer_widths_are_distinct() {
        assert_ne!(Value::Int32(5), Value::Int64(5));
        assert_eq!(Value::Int32(5).as_i64(), Value::Int64(5).as_i64());
    }

    #[test]
    fn element_types() {
        assert_eq!(Value::from(1.0).element_type(), ElementType::Double);
        assert_eq!(Value::from("x").element_type(), ElementType::String);
        assert_eq!(Value::from(1i32).element_type(), ElementType::Int32);
        assert_eq!(Value::from(1i64).element_type(), ElementType::Int64);
        assert_eq!(Value::from(()).element_type(), ElementType::Null);
        assert_eq!(
            Value::from(vec![1i32, 2]).element_type(),
            ElementType::Array
        );
    }

    #[test]
    fn accessors() {
        assert_eq!(Value::Boolean(true).as_bool(), Some(true));
        assert_eq!(Value::from("pen").as_str(), Some("pen"));
        assert_eq!(Value::Int32(7).as_f64(), Some(7.0));
        assert!(Value::Int64(7).is_numeric());
        assert!(!Value::Null.is_numeric());
        assert!(Value::Null.is_null());
    }

    #[test]
    fn serializes_extended_json() {
        let id = ObjectId::from_bytes([1; 12]);
        let json = serde_json::to_string(&Value::ObjectId(id)).unwrap();
        assert_eq!(json, r#"{"$oid":"010101010101010101010101"}"#);

        let json = serde_json::to_string(&Value::DateTime(1000)).unwrap();
        assert_eq!(json, r#"{"$date":1000}"#);

        let json = serde_json::to_string(&Value::from(vec![1i32, 2])).unwrap();
        assert_eq!(json, "[1,2]");
    }
}
