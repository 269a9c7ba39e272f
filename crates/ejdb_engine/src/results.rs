//! Query result buffers.
//!
//! A result set is one contiguous byte buffer holding the matched documents
//! back to back, plus their offsets. Every live buffer holds a lease on the
//! engine's [`ResultTracker`], so the number of unreleased result sets is
//! observable at any time.

use bytes::{BufMut, Bytes, BytesMut};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Counts live result buffers of one engine.
#[derive(Debug, Clone, Default)]
pub struct ResultTracker {
    live: Arc<AtomicUsize>,
    issued: Arc<AtomicUsize>,
}

impl ResultTracker {
    /// Creates a tracker with no live buffers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of buffers issued and not yet released.
    #[must_use]
    pub fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    /// Total number of buffers ever issued.
    #[must_use]
    pub fn issued(&self) -> usize {
        self.issued.load(Ordering::SeqCst)
    }

    fn lease(&self) -> Lease {
        self.live.fetch_add(1, Ordering::SeqCst);
        self.issued.fetch_add(1, Ordering::SeqCst);
        Lease {
            live: Arc::clone(&self.live),
        }
    }
}

#[derive(Debug)]
struct Lease {
    live: Arc<AtomicUsize>,
}

impl Drop for Lease {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

/// An engine-owned buffer of encoded result documents.
///
/// Dropping the buffer releases it. It cannot be cloned, so a release
/// happens exactly once.
#[derive(Debug)]
pub struct ResultBuffer {
    data: Bytes,
    offsets: Vec<(usize, usize)>,
    _lease: Lease,
}

impl ResultBuffer {
    /// Number of documents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    /// Returns true if there are no documents.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// Encoded bytes of the document at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&[u8]> {
        let &(start, end) = self.offsets.get(index)?;
        Some(&self.data[start..end])
    }

    /// Iterates encoded documents in order.
    pub fn iter(&self) -> impl Iterator<Item = &[u8]> + '_ {
        self.offsets.iter().map(|&(s, e)| &self.data[s..e])
    }

    /// Total size in bytes.
    #[must_use]
    pub fn byte_len(&self) -> usize {
        self.data.len()
    }
}

/// Accumulates encoded documents into a [`ResultBuffer`].
#[derive(Debug, Default)]
pub struct ResultBuilder {
    data: BytesMut,
    offsets: Vec<(usize, usize)>,
}

impl ResultBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one encoded document.
    pub fn push(&mut self, doc: &[u8]) {
        let start = self.data.len();
        self.data.put_slice(doc);
        self.offsets.push((start, self.data.len()));
    }

    /// Freezes the buffer and registers it with `tracker`.
    #[must_use]
    pub fn finish(self, tracker: &ResultTracker) -> ResultBuffer {
        ResultBuffer {
            data: self.data.freeze(),
            offsets: self.offsets,
            _lease: tracker.lease(),
        }
    }
}

/// Output of executing a query.
#[derive(Debug)]
pub enum QueryOutput {
    /// Matched documents.
    Documents(ResultBuffer),
    /// Only the number of matches was requested.
    Count(usize),
}

impl QueryOutput {
    /// Number of matched documents.
    #[must_use]
    pub fn count(&self) -> usize {
        match self {
            QueryOutput::Documents(buf) => buf.len(),
            QueryOutput::Count(n) => *n,
        }
    }
}
