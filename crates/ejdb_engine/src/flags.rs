//! Bitmask flag sets: open modes, query flags and index flags.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

macro_rules! flag_set {
    ($name:ident) => {
        impl $name {
            /// No flags set.
            pub const NONE: Self = Self(0);

            /// Creates flags from raw bits.
            #[must_use]
            pub const fn from_bits(bits: u32) -> Self {
                Self(bits)
            }

            /// Returns the raw bits.
            #[must_use]
            pub const fn bits(self) -> u32 {
                self.0
            }

            /// Checks whether every flag in `other` is set.
            #[must_use]
            pub const fn contains(self, other: Self) -> bool {
                self.0 & other.0 == other.0
            }

            /// Checks whether any flag in `other` is set.
            #[must_use]
            pub const fn intersects(self, other: Self) -> bool {
                self.0 & other.0 != 0
            }

            /// Returns true if no flag is set.
            #[must_use]
            pub const fn is_empty(self) -> bool {
                self.0 == 0
            }

            /// Returns the union of both sets.
            #[must_use]
            pub const fn union(self, other: Self) -> Self {
                Self(self.0 | other.0)
            }
        }

        impl BitOr for $name {
            type Output = Self;

            fn bitor(self, rhs: Self) -> Self {
                self.union(rhs)
            }
        }

        impl BitOrAssign for $name {
            fn bitor_assign(&mut self, rhs: Self) {
                self.0 |= rhs.0;
            }
        }

        impl From<u32> for $name {
            fn from(bits: u32) -> Self {
                Self(bits)
            }
        }

        impl From<$name> for u32 {
            fn from(flags: $name) -> u32 {
                flags.0
            }
        }
    };
}

/// Database open mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct OpenMode(u32);

flag_set!(OpenMode);

impl OpenMode {
    /// Open for reading.
    pub const READER: Self = Self(1 << 0);
    /// Open for writing.
    pub const WRITER: Self = Self(1 << 1);
    /// Create the database if it does not exist.
    pub const CREATE: Self = Self(1 << 2);
    /// Discard any existing data.
    pub const TRUNCATE: Self = Self(1 << 3);
    /// Do not take a file lock.
    pub const NO_LOCK: Self = Self(1 << 4);
    /// Fail instead of waiting when the lock is held.
    pub const LOCK_NONBLOCKING: Self = Self(1 << 5);
    /// Sync to disk after every write.
    pub const SYNC: Self = Self(1 << 6);

    /// Mode used when the caller does not give one.
    pub const DEFAULT: Self = Self(Self::WRITER.0 | Self::CREATE.0 | Self::SYNC.0);

    /// Returns true if the mode allows writes.
    #[must_use]
    pub const fn is_writer(self) -> bool {
        self.contains(Self::WRITER)
    }

    /// Returns true if the mode allows reads.
    #[must_use]
    pub const fn is_reader(self) -> bool {
        self.intersects(Self::READER.union(Self::WRITER))
    }
}

impl fmt::Display for OpenMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [(OpenMode, char); 7] = [
            (OpenMode::READER, 'r'),
            (OpenMode::WRITER, 'w'),
            (OpenMode::CREATE, 'c'),
            (OpenMode::TRUNCATE, 't'),
            (OpenMode::NO_LOCK, 'l'),
            (OpenMode::LOCK_NONBLOCKING, 'n'),
            (OpenMode::SYNC, 's'),
        ];
        for (flag, c) in NAMES {
            if self.contains(flag) {
                write!(f, "{c}")?;
            }
        }
        Ok(())
    }
}

/// Flags passed to query execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct QueryFlags(u32);

flag_set!(QueryFlags);

impl QueryFlags {
    /// Only count matching documents.
    pub const COUNT_ONLY: Self = Self(1);
}

/// Index operation flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct IndexFlags(u32);

flag_set!(IndexFlags);

impl IndexFlags {
    /// Drop the index.
    pub const DROP: Self = Self(1 << 0);
    /// Drop every index of the field.
    pub const DROP_ALL: Self = Self(1 << 1);
    /// Optimize the index.
    pub const OP: Self = Self(1 << 2);
    /// Rebuild the index.
    pub const REBUILD: Self = Self(1 << 3);
    /// Numeric index.
    pub const NUMBER: Self = Self(1 << 4);
    /// String index.
    pub const STRING: Self = Self(1 << 5);
    /// Array token index.
    pub const ARRAY: Self = Self(1 << 6);
    /// Case-insensitive string index.
    pub const ISTRING: Self = Self(1 << 7);
}
