//! Binary document decoder.

use crate::document::Document;
use crate::encoder::MAX_DEPTH;
use crate::error::{BsonError, BsonResult};
use crate::oid::ObjectId;
use crate::types::ElementType;
use crate::value::{Binary, Regex, Value};

/// Decode a document from its binary form.
///
/// The declared length must equal `bytes.len()` exactly.
///
/// # Errors
///
/// Returns a malformed-document error for any structural problem: bad
/// length prefix, missing terminator, truncated value, invalid UTF-8,
/// unknown type tag or nesting deeper than [`MAX_DEPTH`].
pub fn from_bson(bytes: &[u8]) -> BsonResult<Document> {
    let mut decoder = BsonDecoder::new(bytes);
    let doc = decoder.decode_document()?;
    if !decoder.is_empty() {
        return Err(BsonError::malformed("trailing bytes after document"));
    }
    Ok(doc)
}

/// Check that `bytes` hold exactly one well-formed document.
///
/// # Errors
///
/// Same as [`from_bson`].
pub fn validate(bytes: &[u8]) -> BsonResult<()> {
    from_bson(bytes).map(|_| ())
}

/// Read the little-endian length prefix of a document without validating
/// the rest of it.
///
/// # Errors
///
/// Returns an error if fewer than four bytes are available or the prefix is
/// smaller than the minimum document size.
pub fn document_length(bytes: &[u8]) -> BsonResult<usize> {
    let prefix: [u8; 4] = bytes
        .get(..4)
        .and_then(|b| b.try_into().ok())
        .ok_or(BsonError::UnexpectedEof)?;
    let len = i32::from_le_bytes(prefix);
    match usize::try_from(len) {
        Ok(len) if len >= 5 => Ok(len),
        _ => Err(BsonError::malformed(format!("invalid document length {len}"))),
    }
}

/// Decode a single element value of type `ty` stored at the start of `bytes`.
pub(crate) fn decode_value(ty: ElementType, bytes: &[u8]) -> BsonResult<Value> {
    BsonDecoder::new(bytes).decode_value(ty)
}

/// A strict binary document decoder.
pub struct BsonDecoder<'a> {
    data: &'a [u8],
    pos: usize,
    depth: usize,
}

impl<'a> BsonDecoder<'a> {
    /// Create a new decoder for the given bytes.
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            depth: 0,
        }
    }

    /// Check if all bytes have been consumed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    /// Decode the next embedded document.
    pub fn decode_document(&mut self) -> BsonResult<Document> {
        let mut doc = Document::new();
        self.decode_container(|key, value| {
            doc.insert(key, value);
        })?;
        Ok(doc)
    }

    fn decode_array(&mut self) -> BsonResult<Vec<Value>> {
        let mut items = Vec::new();
        self.decode_container(|_, value| items.push(value))?;
        Ok(items)
    }

    fn decode_container(&mut self, mut sink: impl FnMut(&str, Value)) -> BsonResult<()> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(BsonError::malformed(format!(
                "document nested deeper than {MAX_DEPTH} levels"
            )));
        }

        let start = self.pos;
        let len = document_length(&self.data[start..])?;
        let end = start
            .checked_add(len)
            .filter(|end| *end <= self.data.len())
            .ok_or_else(|| BsonError::malformed("document length exceeds input"))?;
        if self.data[end - 1] != 0 {
            return Err(BsonError::malformed("document is not NUL-terminated"));
        }
        self.pos += 4;

        let outer = self.data;
        self.data = &outer[..end];
        loop {
            let tag = self.read_byte()?;
            if tag == 0 {
                break;
            }
            let ty = ElementType::from_tag(tag).ok_or(BsonError::UnknownTypeTag { tag })?;
            let key = self.read_cstring()?;
            let value = self.decode_value(ty)?;
            sink(key, value);
        }
        self.data = outer;

        if self.pos != end {
            return Err(BsonError::malformed("document length does not match contents"));
        }
        self.depth -= 1;
        Ok(())
    }

    fn decode_value(&mut self, ty: ElementType) -> BsonResult<Value> {
        Ok(match ty {
            ElementType::Eoo => return Err(BsonError::malformed("unexpected end-of-object tag")),
            ElementType::Double => Value::Double(f64::from_le_bytes(self.read_array()?)),
            ElementType::String => Value::String(self.read_string()?.to_string()),
            ElementType::Code => Value::Code(self.read_string()?.to_string()),
            ElementType::Symbol => Value::Symbol(self.read_string()?.to_string()),
            ElementType::Object => Value::Document(self.decode_document()?),
            ElementType::Array => Value::Array(self.decode_array()?),
            ElementType::Binary => {
                let len = self.read_i32()?;
                let len = usize::try_from(len)
                    .map_err(|_| BsonError::malformed("negative binary length"))?;
                let subtype = self.read_byte()?;
                Value::Binary(Binary {
                    subtype,
                    bytes: self.read_bytes(len)?.to_vec(),
                })
            }
            ElementType::Undefined => Value::Undefined,
            ElementType::Null => Value::Null,
            ElementType::ObjectId => Value::ObjectId(ObjectId::from_bytes(self.read_array()?)),
            ElementType::Boolean => match self.read_byte()? {
                0 => Value::Boolean(false),
                1 => Value::Boolean(true),
                other => {
                    return Err(BsonError::malformed(format!("invalid boolean byte {other}")))
                }
            },
            ElementType::Date => Value::DateTime(i64::from_le_bytes(self.read_array()?)),
            ElementType::Regex => Value::Regex(Regex {
                pattern: self.read_cstring()?.to_string(),
                options: self.read_cstring()?.to_string(),
            }),
            ElementType::Int32 => Value::Int32(self.read_i32()?),
            ElementType::Int64 => Value::Int64(i64::from_le_bytes(self.read_array()?)),
        })
    }

    fn read_byte(&mut self) -> BsonResult<u8> {
        let byte = *self.data.get(self.pos).ok_or(BsonError::UnexpectedEof)?;
        self.pos += 1;
        Ok(byte)
    }

    fn read_bytes(&mut self, len: usize) -> BsonResult<&'a [u8]> {
        let end = self.pos.checked_add(len).ok_or(BsonError::UnexpectedEof)?;
        let bytes = self.data.get(self.pos..end).ok_or(BsonError::UnexpectedEof)?;
        self.pos = end;
        Ok(bytes)
    }

    fn read_array<const N: usize>(&mut self) -> BsonResult<[u8; N]> {
        let bytes = self.read_bytes(N)?;
        bytes.try_into().map_err(|_| BsonError::UnexpectedEof)
    }

    fn read_i32(&mut self) -> BsonResult<i32> {
        Ok(i32::from_le_bytes(self.read_array()?))
    }

    fn read_cstring(&mut self) -> BsonResult<&'a str> {
        let rest = self.data.get(self.pos..).ok_or(BsonError::UnexpectedEof)?;
        let nul = rest
            .iter()
            .position(|b| *b == 0)
            .ok_or(BsonError::UnexpectedEof)?;
        let s = std::str::from_utf8(&rest[..nul]).map_err(|_| BsonError::InvalidUtf8)?;
        self.pos += nul + 1;
        Ok(s)
    }

    fn read_string(&mut self) -> BsonResult<&'a str> {
        let len = self.read_i32()?;
        let len = usize::try_from(len)
            .ok()
            .filter(|len| *len >= 1)
            .ok_or_else(|| BsonError::malformed(format!("invalid string length {len}")))?;
        let bytes = self.read_bytes(len)?;
        let (body, terminator) = bytes.split_at(len - 1);
        if terminator != [0] {
            return Err(BsonError::malformed("string is not NUL-terminated"));
        }
        std::str::from_utf8(body).map_err(|_| BsonError::InvalidUtf8)
    }
}
