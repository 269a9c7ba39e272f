//! Binary document encoder.

use crate::document::Document;
use crate::error::{BsonError, BsonResult};
use crate::value::Value;
use bytes::BufMut;

/// Maximum nesting depth accepted by the encoder and decoder.
pub const MAX_DEPTH: usize = 100;

/// Encode a document to its binary form.
///
/// Field order is preserved. Arrays are written as embedded documents keyed
/// `"0"`, `"1"`, ... in element order.
///
/// # Errors
///
/// Returns [`BsonError::InvalidKey`] if a key or regex component contains a
/// NUL byte, and [`BsonError::UnsupportedType`] if the document nests deeper
/// than [`MAX_DEPTH`] or exceeds the 32-bit length prefix.
pub fn to_bson(document: &Document) -> BsonResult<Vec<u8>> {
    let mut encoder = BsonEncoder::new();
    encoder.encode_document(document)?;
    Ok(encoder.into_bytes())
}

/// A binary document encoder writing into a growable buffer.
#[derive(Debug, Default)]
pub struct BsonEncoder {
    buffer: Vec<u8>,
    depth: usize,
}

impl BsonEncoder {
    /// Create a new encoder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume the encoder and return the bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    /// Encode a whole document (length prefix, elements, terminator).
    pub fn encode_document(&mut self, document: &Document) -> BsonResult<()> {
        self.encode_container(document.iter().map(|(k, v)| (Key::Borrowed(k), v)))
    }

    fn encode_array(&mut self, items: &[Value]) -> BsonResult<()> {
        self.encode_container(
            items
                .iter()
                .enumerate()
                .map(|(i, v)| (Key::Index(i), v)),
        )
    }

    fn encode_container<'a, I>(&mut self, elements: I) -> BsonResult<()>
    where
        I: Iterator<Item = (Key<'a>, &'a Value)>,
    {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(BsonError::unsupported_type(format!(
                "document nested deeper than {MAX_DEPTH} levels"
            )));
        }

        let start = self.buffer.len();
        self.buffer.put_i32_le(0);
        for (key, value) in elements {
            self.buffer.put_u8(value.element_type().tag());
            match key {
                Key::Borrowed(k) => self.put_cstring(k)?,
                Key::Index(i) => self.put_cstring(&i.to_string())?,
            }
            self.encode_value(value)?;
        }
        self.buffer.put_u8(0);
        self.patch_length(start)?;

        self.depth -= 1;
        Ok(())
    }

    fn encode_value(&mut self, value: &Value) -> BsonResult<()> {
        match value {
            Value::Double(f) => self.buffer.put_f64_le(*f),
            Value::String(s) | Value::Code(s) | Value::Symbol(s) => self.put_string(s)?,
            Value::Document(doc) => self.encode_document(doc)?,
            Value::Array(items) => self.encode_array(items)?,
            Value::Binary(bin) => {
                self.buffer.put_i32_le(length_prefix(bin.bytes.len())?);
                self.buffer.put_u8(bin.subtype);
                self.buffer.put_slice(&bin.bytes);
            }
            Value::Undefined | Value::Null => {}
            Value::ObjectId(oid) => self.buffer.put_slice(oid.bytes()),
            Value::Boolean(b) => self.buffer.put_u8(u8::from(*b)),
            Value::DateTime(ms) => self.buffer.put_i64_le(*ms),
            Value::Regex(re) => {
                self.put_cstring(&re.pattern)?;
                self.put_cstring(&re.options)?;
            }
            Value::Int32(n) => self.buffer.put_i32_le(*n),
            Value::Int64(n) => self.buffer.put_i64_le(*n),
        }
        Ok(())
    }

    fn put_cstring(&mut self, s: &str) -> BsonResult<()> {
        if s.as_bytes().contains(&0) {
            return Err(BsonError::InvalidKey { key: s.to_string() });
        }
        self.buffer.put_slice(s.as_bytes());
        self.buffer.put_u8(0);
        Ok(())
    }

    fn put_string(&mut self, s: &str) -> BsonResult<()> {
        self.buffer.put_i32_le(length_prefix(s.len() + 1)?);
        self.buffer.put_slice(s.as_bytes());
        self.buffer.put_u8(0);
        Ok(())
    }

    fn patch_length(&mut self, start: usize) -> BsonResult<()> {
        let len = length_prefix(self.buffer.len() - start)?;
        self.buffer[start..start + 4].copy_from_slice(&len.to_le_bytes());
        Ok(())
    }
}

enum Key<'a> {
    Borrowed(&'a str),
    Index(usize),
}

fn length_prefix(len: usize) -> BsonResult<i32> {
    i32::try_from(len).map_err(|_| BsonError::unsupported_type("document larger than 2 GiB"))
}
