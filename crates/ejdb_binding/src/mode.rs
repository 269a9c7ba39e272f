//! Open mode arguments.
//!
//! A mode is either a raw bitmask or a string of flag characters:
//!
//! | char | flag       |
//! |------|------------|
//! | `w`  | `WRITER`   |
//! | `c`  | `CREATE`   |
//! | `t`  | `TRUNCATE` |
//! | `s`  | `SYNC`     |
//!
//! A string always implies `READER`. Other characters are ignored.

use crate::connection::Connection;
use crate::error::Result;
use ejdb_engine::OpenMode;
use std::path::{Path, PathBuf};

/// A mode given as bits or as flag characters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModeArg {
    /// Raw bitmask, used as is.
    Bits(u32),
    /// Flag characters such as `"wct"`.
    Chars(String),
}

impl ModeArg {
    /// Translates the argument into an open mode.
    #[must_use]
    pub fn resolve(&self) -> OpenMode {
        match self {
            Self::Bits(bits) => OpenMode::from_bits(*bits),
            Self::Chars(chars) => parse_mode(chars),
        }
    }
}

impl Default for ModeArg {
    fn default() -> Self {
        Self::Bits(OpenMode::DEFAULT.bits())
    }
}

impl From<u32> for ModeArg {
    fn from(bits: u32) -> Self {
        Self::Bits(bits)
    }
}

impl From<&str> for ModeArg {
    fn from(chars: &str) -> Self {
        Self::Chars(chars.to_string())
    }
}

impl From<String> for ModeArg {
    fn from(chars: String) -> Self {
        Self::Chars(chars)
    }
}

impl From<OpenMode> for ModeArg {
    fn from(mode: OpenMode) -> Self {
        Self::Bits(mode.bits())
    }
}

/// Parses flag characters.
#[must_use]
pub fn parse_mode(chars: &str) -> OpenMode {
    let mut mode = OpenMode::READER;
    for c in chars.chars() {
        match c {
            'w' => mode |= OpenMode::WRITER,
            'c' => mode |= OpenMode::CREATE,
            't' => mode |= OpenMode::TRUNCATE,
            's' => mode |= OpenMode::SYNC,
            _ => {}
        }
    }
    mode
}

/// Options for opening a [`Connection`].
///
/// # Example
///
/// ```no_run
/// use ejdb_binding::OpenOptions;
///
/// let conn = OpenOptions::new("data/app.db").mode("wcs").open()?;
/// # Ok::<(), ejdb_binding::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct OpenOptions {
    path: PathBuf,
    mode: ModeArg,
}

impl OpenOptions {
    /// Options for `path` with the default mode.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            mode: ModeArg::default(),
        }
    }

    /// Sets the mode.
    #[must_use]
    pub fn mode(mut self, mode: impl Into<ModeArg>) -> Self {
        self.mode = mode.into();
        self
    }

    /// The database path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The resolved mode.
    #[must_use]
    pub fn resolved_mode(&self) -> OpenMode {
        self.mode.resolve()
    }

    /// Opens the connection.
    ///
    /// # Errors
    ///
    /// See [`Connection::open`].
    pub fn open(&self) -> Result<Connection> {
        Connection::open(&self.path, self.mode.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn chars_map_to_flags() {
        let mode = parse_mode("wct");
        assert_eq!(
            mode,
            OpenMode::READER | OpenMode::WRITER | OpenMode::CREATE | OpenMode::TRUNCATE
        );
        assert_eq!(parse_mode("s"), OpenMode::READER | OpenMode::SYNC);
    }

    #[test]
    fn reader_is_always_implied() {
        assert_eq!(parse_mode(""), OpenMode::READER);
        assert_eq!(parse_mode("r"), OpenMode::READER);
    }

    #[test]
    fn unknown_chars_are_ignored() {
        assert_eq!(parse_mode("wxyz"), parse_mode("w"));
        assert_eq!(parse_mode("W"), OpenMode::READER);
        assert_eq!(parse_mode("ln"), OpenMode::READER);
    }

    #[test]
    fn bits_are_used_as_is() {
        assert_eq!(ModeArg::from(2u32).resolve(), OpenMode::WRITER);
        assert_eq!(ModeArg::from(0u32).resolve(), OpenMode::NONE);
        assert_eq!(ModeArg::default().resolve(), OpenMode::DEFAULT);
        assert_eq!(
            ModeArg::from(OpenMode::DEFAULT).resolve(),
            OpenMode::WRITER | OpenMode::CREATE | OpenMode::SYNC
        );
    }

    #[test]
    fn options_builder() {
        let options = OpenOptions::new("a.db").mode("wc");
        assert_eq!(options.path(), Path::new("a.db"));
        assert_eq!(
            options.resolved_mode(),
            OpenMode::READER | OpenMode::WRITER | OpenMode::CREATE
        );
    }

    proptest! {
        #[test]
        fn any_string_is_a_reader(chars in ".{0,16}") {
            let mode = parse_mode(&chars);
            prop_assert!(mode.contains(OpenMode::READER));
            prop_assert!(!mode.contains(OpenMode::NO_LOCK));
            prop_assert!(!mode.contains(OpenMode::LOCK_NONBLOCKING));
        }

        #[test]
        fn order_does_not_matter(chars in "[wcts]{0,8}") {
            let reversed: String = chars.chars().rev().collect();
            prop_assert_eq!(parse_mode(&chars), parse_mode(&reversed));
        }
    }
}
