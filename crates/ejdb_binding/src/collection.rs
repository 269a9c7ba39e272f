//! Collection handles.

use ejdb_engine::CollectionId;
use std::fmt;

/// A collection of one [`Connection`](crate::Connection).
///
/// Handles are only valid on the connection that produced them and only
/// while it is open; anything else fails with `InvalidHandle`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionHandle {
    pub(crate) connection_id: u64,
    pub(crate) id: CollectionId,
    name: String,
}

impl CollectionHandle {
    pub(crate) fn new(connection_id: u64, id: CollectionId, name: &str) -> Self {
        Self {
            connection_id,
            id,
            name: name.to_string(),
        }
    }

    /// The collection name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The engine's id for the collection.
    #[must_use]
    pub fn id(&self) -> CollectionId {
        self.id
    }
}

impl fmt::Display for CollectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.id)
    }
}
