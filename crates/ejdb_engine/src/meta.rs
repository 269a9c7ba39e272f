//! Database files, metadata and locking.
//!
//! A database opened at `<path>` is laid out next to it:
//!
//! ```text
//! <path>              # metadata (format version, collection names)
//! <path>.lock         # advisory lock
//! <path>_<name>       # append-only log of collection <name>
//! ```

use crate::error::{EngineError, EngineResult, TCELOCK, TCEMETA, TCENOFILE};
use crate::flags::OpenMode;
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Magic bytes for the metadata file.
pub const META_MAGIC: [u8; 4] = *b"EJDM";

/// Current metadata version.
pub const META_VERSION: u16 = 1;

/// Database metadata: the registered collections in creation order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Meta {
    /// Collection names in creation order.
    pub collections: Vec<String>,
}

impl Meta {
    /// Encodes the metadata to bytes.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&META_MAGIC);
        buf.extend_from_slice(&META_VERSION.to_le_bytes());
        let count = u32::try_from(self.collections.len()).unwrap_or(u32::MAX);
        buf.extend_from_slice(&count.to_le_bytes());
        for name in &self.collections {
            let name_bytes = name.as_bytes();
            let name_len = u16::try_from(name_bytes.len()).unwrap_or(u16::MAX);
            buf.extend_from_slice(&name_len.to_le_bytes());
            buf.extend_from_slice(&name_bytes[..usize::from(name_len)]);
        }
        buf
    }

    /// Decodes metadata from bytes.
    ///
    /// # Errors
    ///
    /// Returns `TCEMETA` if the bytes are not a metadata file.
    pub fn decode(data: &[u8]) -> EngineResult<Self> {
        let mut cursor = 0usize;

        if take(data, &mut cursor, 4)? != META_MAGIC {
            return Err(EngineError::new(TCEMETA, "invalid metadata magic"));
        }
        let version = take(data, &mut cursor, 2)?;
        let version = u16::from_le_bytes([version[0], version[1]]);
        if version > META_VERSION {
            return Err(EngineError::new(
                TCEMETA,
                format!("unsupported metadata version: {version}"),
            ));
        }
        let count = take(data, &mut cursor, 4)?;
        let count = u32::from_le_bytes([count[0], count[1], count[2], count[3]]);

        let mut collections = Vec::new();
        for _ in 0..count {
            let len = take(data, &mut cursor, 2)?;
            let len = usize::from(u16::from_le_bytes([len[0], len[1]]));
            let name = std::str::from_utf8(take(data, &mut cursor, len)?)
                .map_err(|_| EngineError::new(TCEMETA, "collection name is not UTF-8"))?;
            collections.push(name.to_string());
        }
        Ok(Self { collections })
    }
}

fn take<'a>(data: &'a [u8], cursor: &mut usize, n: usize) -> EngineResult<&'a [u8]> {
    let bytes = data
        .get(*cursor..*cursor + n)
        .ok_or_else(|| EngineError::new(TCEMETA, "metadata too short"))?;
    *cursor += n;
    Ok(bytes)
}

/// The files of one open database and the lock held on them.
#[derive(Debug)]
pub struct DatabaseFiles {
    path: PathBuf,
    lock_file: Option<File>,
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

impl DatabaseFiles {
    /// Opens the database at `path` and loads its metadata.
    ///
    /// # Errors
    ///
    /// - `TCENOFILE` if the database does not exist and `mode` lacks
    ///   `WRITER | CREATE`
    /// - `TCELOCK` if `LOCK_NONBLOCKING` is set and the lock is held
    /// - `TCEMETA` if the metadata is unreadable
    pub fn open(path: &Path, mode: OpenMode) -> EngineResult<(Self, Meta)> {
        let exists = path.exists();
        let may_create = mode.contains(OpenMode::WRITER | OpenMode::CREATE);
        if !exists && !may_create {
            return Err(EngineError::new(
                TCENOFILE,
                format!("database does not exist: {}", path.display()),
            ));
        }
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if may_create {
                fs::create_dir_all(parent)?;
            }
        }

        let lock_file = if mode.contains(OpenMode::NO_LOCK) {
            None
        } else {
            Some(Self::lock(path, mode)?)
        };
        let files = Self {
            path: path.to_path_buf(),
            lock_file,
        };

        let truncate = mode.is_writer() && mode.contains(OpenMode::TRUNCATE);
        let meta = if exists && !truncate {
            Meta::decode(&fs::read(path)?)?
        } else {
            if exists {
                files.discard(&Meta::decode(&fs::read(path)?).unwrap_or_default())?;
            }
            let meta = Meta::default();
            files.save_meta(&meta)?;
            meta
        };
        Ok((files, meta))
    }

    fn lock(path: &Path, mode: OpenMode) -> EngineResult<File> {
        let lock_path = sibling(path, ".lock");
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)?;
        let exclusive = mode.is_writer();
        let result = match (exclusive, mode.contains(OpenMode::LOCK_NONBLOCKING)) {
            (true, true) => FileExt::try_lock_exclusive(&file),
            (true, false) => FileExt::lock_exclusive(&file),
            (false, true) => FileExt::try_lock_shared(&file),
            (false, false) => FileExt::lock_shared(&file),
        };
        result.map_err(|e| {
            EngineError::new(TCELOCK, format!("{}: {e}", lock_path.display()))
        })?;
        Ok(file)
    }

    /// Returns the metadata path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the log path of collection `name`.
    #[must_use]
    pub fn collection_path(&self, name: &str) -> PathBuf {
        sibling(&self.path, &format!("_{name}"))
    }

    /// Saves the metadata atomically (write temp file, sync, rename).
    pub fn save_meta(&self, meta: &Meta) -> EngineResult<()> {
        let temp_path = sibling(&self.path, ".tmp");
        let mut file = File::create(&temp_path)?;
        file.write_all(&meta.encode())?;
        file.sync_all()?;
        drop(file);
        fs::rename(&temp_path, &self.path)?;
        Ok(())
    }

    fn discard(&self, meta: &Meta) -> EngineResult<()> {
        for name in &meta.collections {
            match fs::remove_file(self.collection_path(name)) {
                Err(e) if e.kind() != std::io::ErrorKind::NotFound => return Err(e.into()),
                _ => {}
            }
        }
        Ok(())
    }

    /// Releases the lock.
    pub fn unlock(&mut self) -> EngineResult<()> {
        if let Some(file) = self.lock_file.take() {
            file.unlock()?;
        }
        Ok(())
    }
}
