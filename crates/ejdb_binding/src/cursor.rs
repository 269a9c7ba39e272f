//! Result cursors.
//!
//! A [`Cursor`] owns the engine's result buffer for one find call. The
//! buffer is released exactly once: on [`Cursor::dispose`], when the owning
//! connection closes, or when the cursor is dropped, whichever comes first.

use crate::error::{Error, Result};
use ejdb_bson::{from_bson, Document, RawDocument, Value};
use ejdb_engine::{QueryOutput, ResultBuffer};
use parking_lot::Mutex;
use std::sync::{Arc, Weak};

#[derive(Debug)]
pub(crate) enum CursorState {
    Results {
        buffer: ResultBuffer,
        position: usize,
    },
    CountOnly(usize),
    Disposed,
}

impl CursorState {
    /// Releases the buffer. Returns false if it was already released.
    pub(crate) fn dispose(&mut self) -> bool {
        if matches!(self, Self::Disposed) {
            return false;
        }
        *self = Self::Disposed;
        true
    }

    fn is_live(&self) -> bool {
        !matches!(self, Self::Disposed)
    }
}

/// Shared slot the owning connection keeps to dispose the cursor on close.
pub(crate) type CursorSlot = Weak<Mutex<CursorState>>;

/// Returns true if the cursor behind `slot` still holds its buffer.
pub(crate) fn slot_is_live(slot: &CursorSlot) -> bool {
    slot.upgrade().is_some_and(|state| state.lock().is_live())
}

/// Disposes the cursor behind `slot`. Returns true if it was live.
pub(crate) fn dispose_slot(slot: &CursorSlot) -> bool {
    slot.upgrade().is_some_and(|state| state.lock().dispose())
}

/// Iterates the results of one find call.
///
/// Positions are 0-based. [`Cursor::next_document`] advances through the
/// results; [`Cursor::field`] and [`Cursor::object`] read any position
/// without moving it.
#[derive(Debug)]
pub struct Cursor {
    state: Arc<Mutex<CursorState>>,
}

impl Cursor {
    pub(crate) fn new(output: QueryOutput) -> Self {
        let state = match output {
            QueryOutput::Documents(buffer) => CursorState::Results {
                buffer,
                position: 0,
            },
            QueryOutput::Count(n) => CursorState::CountOnly(n),
        };
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    pub(crate) fn slot(&self) -> CursorSlot {
        Arc::downgrade(&self.state)
    }

    fn with_results<R>(
        &self,
        op: &str,
        f: impl FnOnce(&ResultBuffer, &mut usize) -> Result<R>,
    ) -> Result<R> {
        match &mut *self.state.lock() {
            CursorState::Results { buffer, position } => f(buffer, position),
            CursorState::CountOnly(_) => Err(Error::invalid_operation(format!(
                "{op} is not available on a count-only cursor"
            ))),
            CursorState::Disposed => Err(disposed()),
        }
    }

    /// Number of matched documents.
    ///
    /// # Errors
    ///
    /// `InvalidHandle` once disposed.
    pub fn count(&self) -> Result<usize> {
        match &*self.state.lock() {
            CursorState::Results { buffer, .. } => Ok(buffer.len()),
            CursorState::CountOnly(n) => Ok(*n),
            CursorState::Disposed => Err(disposed()),
        }
    }

    /// Position of the next document [`Cursor::next_document`] returns.
    ///
    /// # Errors
    ///
    /// `InvalidHandle` once disposed, `InvalidOperation` on a count-only
    /// cursor.
    pub fn position(&self) -> Result<usize> {
        self.with_results("position", |_, position| Ok(*position))
    }

    /// Documents not yet returned by [`Cursor::next_document`].
    ///
    /// # Errors
    ///
    /// Same as [`Cursor::position`].
    pub fn remaining(&self) -> Result<usize> {
        self.with_results("remaining", |buffer, position| {
            Ok(buffer.len().saturating_sub(*position))
        })
    }

    /// Decodes the document at the current position and advances.
    ///
    /// Returns `Ok(None)` once every document has been returned.
    ///
    /// # Errors
    ///
    /// `InvalidHandle` once disposed, `InvalidOperation` on a count-only
    /// cursor, `MalformedDocument` if the stored bytes do not decode. The
    /// position advances past a document that fails to decode.
    pub fn next_document(&mut self) -> Result<Option<Document>> {
        self.with_results("next", |buffer, position| {
            let Some(bytes) = buffer.get(*position) else {
                return Ok(None);
            };
            *position += 1;
            tracing::trace!(position = *position, total = buffer.len(), "cursor advanced");
            Ok(Some(from_bson(bytes)?))
        })
    }

    /// Iterates the remaining documents.
    pub fn iter(&mut self) -> Documents<'_> {
        Documents { cursor: self }
    }

    /// Decodes only the field `name` of the document at `position`.
    ///
    /// # Errors
    ///
    /// `FieldNotFound` if the document has no such field,
    /// `InvalidOperation` if `position` is out of range, plus the errors of
    /// [`Cursor::position`].
    pub fn field(&self, position: usize, name: &str) -> Result<Value> {
        self.with_results("field", |buffer, _| {
            let raw = RawDocument::new(document_at(buffer, position)?)?;
            raw.get(name)?.ok_or_else(|| Error::FieldNotFound {
                position,
                name: name.to_string(),
            })
        })
    }

    /// Like [`Cursor::field`], for a dotted path such as `"address.city"`.
    ///
    /// # Errors
    ///
    /// Same as [`Cursor::field`].
    pub fn field_path(&self, position: usize, path: &str) -> Result<Value> {
        self.with_results("field", |buffer, _| {
            let raw = RawDocument::new(document_at(buffer, position)?)?;
            raw.get_path(path)?.ok_or_else(|| Error::FieldNotFound {
                position,
                name: path.to_string(),
            })
        })
    }

    /// Decodes the whole document at `position`.
    ///
    /// # Errors
    ///
    /// `InvalidOperation` if `position` is out of range, plus the errors of
    /// [`Cursor::position`].
    pub fn object(&self, position: usize) -> Result<Document> {
        self.with_results("object", |buffer, _| {
            Ok(from_bson(document_at(buffer, position)?)?)
        })
    }

    /// Returns true if the engine only returned a count.
    #[must_use]
    pub fn is_count_only(&self) -> bool {
        matches!(&*self.state.lock(), CursorState::CountOnly(_))
    }

    /// Returns true once the cursor is disposed.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        !self.state.lock().is_live()
    }

    /// Releases the result buffer. Idempotent.
    pub fn dispose(&self) {
        if self.state.lock().dispose() {
            tracing::trace!("cursor disposed");
        }
    }
}

impl Drop for Cursor {
    fn drop(&mut self) {
        self.dispose();
    }
}

fn disposed() -> Error {
    Error::invalid_handle("cursor is disposed")
}

fn document_at(buffer: &ResultBuffer, position: usize) -> Result<&[u8]> {
    buffer.get(position).ok_or_else(|| {
        Error::invalid_operation(format!(
            "position {position} is out of range for {} results",
            buffer.len()
        ))
    })
}

/// Iterator over the remaining documents of a [`Cursor`].
///
/// Yields `Err` for every step on a disposed or count-only cursor, so
/// collect into a `Result` or stop at the first error.
#[derive(Debug)]
pub struct Documents<'a> {
    cursor: &'a mut Cursor,
}

impl Iterator for Documents<'_> {
    type Item = Result<Document>;

    fn next(&mut self) -> Option<Self::Item> {
        self.cursor.next_document().transpose()
    }
}

impl<'a> IntoIterator for &'a mut Cursor {
    type Item = Result<Document>;
    type IntoIter = Documents<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
