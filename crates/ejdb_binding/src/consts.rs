//! Constants exposed to host code.
//!
//! The table is built once per process on first use and never changes.

use ejdb_bson::ElementType;
use ejdb_engine::{IndexFlags, OpenMode, QueryFlags};
use std::sync::OnceLock;

/// The immutable table of exposed constants, in declaration order.
#[derive(Debug)]
pub struct Constants {
    entries: Vec<(&'static str, u32)>,
}

impl Constants {
    fn build() -> Self {
        let mut entries = vec![
            ("JBOREADER", OpenMode::READER.bits()),
            ("JBOWRITER", OpenMode::WRITER.bits()),
            ("JBOCREAT", OpenMode::CREATE.bits()),
            ("JBOTRUNC", OpenMode::TRUNCATE.bits()),
            ("JBONOLCK", OpenMode::NO_LOCK.bits()),
            ("JBOLCKNB", OpenMode::LOCK_NONBLOCKING.bits()),
            ("JBOTSYNC", OpenMode::SYNC.bits()),
            ("DEFAULT_OPEN_MODE", OpenMode::DEFAULT.bits()),
            ("JBIDXDROP", IndexFlags::DROP.bits()),
            ("JBIDXDROPALL", IndexFlags::DROP_ALL.bits()),
            ("JBIDXOP", IndexFlags::OP.bits()),
            ("JBIDXREBLD", IndexFlags::REBUILD.bits()),
            ("JBIDXNUM", IndexFlags::NUMBER.bits()),
            ("JBIDXSTR", IndexFlags::STRING.bits()),
            ("JBIDXISTR", IndexFlags::ISTRING.bits()),
            ("JBIDXARR", IndexFlags::ARRAY.bits()),
            ("JBQRYCOUNT", QueryFlags::COUNT_ONLY.bits()),
        ];
        entries.extend(
            ElementType::ALL
                .iter()
                .map(|ty| (ty.constant_name(), u32::from(ty.tag()))),
        );
        tracing::trace!(count = entries.len(), "built constant table");
        Self { entries }
    }

    /// Looks up a constant by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<u32> {
        self.entries
            .iter()
            .find(|(n, _)| *n == name)
            .map(|&(_, value)| value)
    }

    /// Iterates `(name, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, u32)> + '_ {
        self.entries.iter().copied()
    }

    /// Number of constants.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Always false; the table is never empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Returns the process-wide constant table.
#[must_use]
pub fn constants() -> &'static Constants {
    static TABLE: OnceLock<Constants> = OnceLock::new();
    TABLE.get_or_init(Constants::build)
}

/// Looks up one constant by name.
#[must_use]
pub fn constant(name: &str) -> Option<u32> {
    constants().get(name)
}
