//! Core type definitions.

use std::fmt;

/// Identifier of an open collection within one engine instance.
///
/// Identifiers are dense indices assigned in creation order and are only
/// meaningful to the engine that issued them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CollectionId(pub u32);

impl CollectionId {
    /// Creates a new collection ID.
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for CollectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "coll:{}", self.0)
    }
}

/// Maximum length of a collection name in bytes.
pub const MAX_COLLECTION_NAME_LEN: usize = 128;

/// Checks a collection name.
///
/// Names must be non-empty, at most [`MAX_COLLECTION_NAME_LEN`] bytes, must
/// not contain path separators or NUL, and must not be `.` or `..`.
#[must_use]
pub fn is_valid_collection_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= MAX_COLLECTION_NAME_LEN
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', '\0'])
}
