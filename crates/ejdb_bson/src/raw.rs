//! Borrowed views over encoded documents.
//!
//! A [`RawDocument`] walks element headers without materialising values, so
//! a single field can be pulled out of a large document cheaply.

use crate::decoder::{decode_value, document_length};
use crate::error::{BsonError, BsonResult};
use crate::types::ElementType;
use crate::value::Value;

/// A length-checked view over one encoded document.
#[derive(Debug, Clone, Copy)]
pub struct RawDocument<'a> {
    bytes: &'a [u8],
}

/// One element of a [`RawDocument`].
#[derive(Debug, Clone, Copy)]
pub struct RawElement<'a> {
    key: &'a str,
    element_type: ElementType,
    value: &'a [u8],
}

impl<'a> RawDocument<'a> {
    /// Wrap `bytes`, checking the outer length prefix and terminator.
    ///
    /// Elements are only validated as they are visited.
    ///
    /// # Errors
    ///
    /// Returns a malformed-document error if the prefix does not match the
    /// buffer length or the terminator is missing.
    pub fn new(bytes: &'a [u8]) -> BsonResult<Self> {
        let len = document_length(bytes)?;
        if len != bytes.len() {
            return Err(BsonError::malformed(format!(
                "declared length {len} but {} bytes supplied",
                bytes.len()
            )));
        }
        if bytes[len - 1] != 0 {
            return Err(BsonError::malformed("document is not NUL-terminated"));
        }
        Ok(Self { bytes })
    }

    /// The underlying bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &'a [u8] {
        self.bytes
    }

    /// Iterate the elements in order.
    #[must_use]
    pub fn iter(&self) -> RawIter<'a> {
        RawIter {
            bytes: self.bytes,
            pos: 4,
            done: false,
        }
    }

    /// Find a top-level element by key.
    pub fn element(&self, key: &str) -> BsonResult<Option<RawElement<'a>>> {
        for element in self.iter() {
            let element = element?;
            if element.key == key {
                return Ok(Some(element));
            }
        }
        Ok(None)
    }

    /// Decode only the named top-level field.
    pub fn get(&self, key: &str) -> BsonResult<Option<Value>> {
        self.element(key)?.map(|e| e.value()).transpose()
    }

    /// Decode only the field at a dotted path, descending through embedded
    /// documents and arrays without decoding siblings.
    pub fn get_path(&self, path: &str) -> BsonResult<Option<Value>> {
        let mut segments = path.split('.').peekable();
        let mut current = *self;
        while let Some(segment) = segments.next() {
            let Some(element) = current.element(segment)? else {
                return Ok(None);
            };
            if segments.peek().is_none() {
                return element.value().map(Some);
            }
            match element.element_type {
                ElementType::Object | ElementType::Array => {
                    current = element.as_document()?;
                }
                _ => return Ok(None),
            }
        }
        Ok(None)
    }
}

impl<'a> RawElement<'a> {
    /// The element key.
    #[must_use]
    pub fn key(&self) -> &'a str {
        self.key
    }

    /// The element type.
    #[must_use]
    pub fn element_type(&self) -> ElementType {
        self.element_type
    }

    /// The raw value bytes.
    #[must_use]
    pub fn raw_value(&self) -> &'a [u8] {
        self.value
    }

    /// Decode the value.
    pub fn value(&self) -> BsonResult<Value> {
        decode_value(self.element_type, self.value)
    }

    /// View an embedded document or array value as a raw document.
    pub fn as_document(&self) -> BsonResult<RawDocument<'a>> {
        match self.element_type {
            ElementType::Object | ElementType::Array => RawDocument::new(self.value),
            other => Err(BsonError::malformed(format!(
                "element {:?} is {other}, not a document",
                self.key
            ))),
        }
    }
}

/// Iterator over the elements of a [`RawDocument`].
#[derive(Debug)]
pub struct RawIter<'a> {
    bytes: &'a [u8],
    pos: usize,
    done: bool,
}

impl<'a> RawIter<'a> {
    fn next_element(&mut self) -> BsonResult<Option<RawElement<'a>>> {
        let tag = *self.bytes.get(self.pos).ok_or(BsonError::UnexpectedEof)?;
        if tag == 0 {
            return Ok(None);
        }
        let element_type = ElementType::from_tag(tag).ok_or(BsonError::UnknownTypeTag { tag })?;
        let key_start = self.pos + 1;
        let key_len = self.bytes[key_start..]
            .iter()
            .position(|b| *b == 0)
            .ok_or(BsonError::UnexpectedEof)?;
        let key = std::str::from_utf8(&self.bytes[key_start..key_start + key_len])
            .map_err(|_| BsonError::InvalidUtf8)?;
        let value_start = key_start + key_len + 1;
        let rest = self.bytes.get(value_start..).ok_or(BsonError::UnexpectedEof)?;
        let value_len = value_len(element_type, rest)?;
        // The final byte is the document terminator; values may not reach it.
        if value_start + value_len >= self.bytes.len() {
            return Err(BsonError::UnexpectedEof);
        }
        self.pos = value_start + value_len;
        Ok(Some(RawElement {
            key,
            element_type,
            value: &rest[..value_len],
        }))
    }
}

impl<'a> Iterator for RawIter<'a> {
    type Item = BsonResult<RawElement<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.next_element() {
            Ok(Some(element)) => Some(Ok(element)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

fn read_len(bytes: &[u8]) -> BsonResult<usize> {
    let prefix: [u8; 4] = bytes
        .get(..4)
        .and_then(|b| b.try_into().ok())
        .ok_or(BsonError::UnexpectedEof)?;
    usize::try_from(i32::from_le_bytes(prefix))
        .map_err(|_| BsonError::malformed("negative length prefix"))
}

fn cstring_len(bytes: &[u8]) -> BsonResult<usize> {
    bytes
        .iter()
        .position(|b| *b == 0)
        .map(|n| n + 1)
        .ok_or(BsonError::UnexpectedEof)
}

/// Number of bytes the value of type `ty` occupies at the start of `bytes`.
fn value_len(ty: ElementType, bytes: &[u8]) -> BsonResult<usize> {
    let len = match ty {
        ElementType::Eoo => return Err(BsonError::malformed("unexpected end-of-object tag")),
        ElementType::Undefined | ElementType::Null => 0,
        ElementType::Boolean => 1,
        ElementType::Int32 => 4,
        ElementType::Double | ElementType::Date | ElementType::Int64 => 8,
        ElementType::ObjectId => 12,
        ElementType::String | ElementType::Code | ElementType::Symbol => 4 + read_len(bytes)?,
        ElementType::Object | ElementType::Array => document_length(bytes)?,
        ElementType::Binary => 5 + read_len(bytes)?,
        ElementType::Regex => {
            let pattern = cstring_len(bytes)?;
            pattern + cstring_len(&bytes[pattern..])?
        }
    };
    if len > bytes.len() {
        return Err(BsonError::UnexpectedEof);
    }
    Ok(len)
}
