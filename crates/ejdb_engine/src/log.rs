//! Append-only collection logs.
//!
//! Each collection persists its documents as a sequence of records:
//!
//! ```text
//! | record_len: u32 | oid: [u8; 12] | payload | crc32: u32 |
//! ```
//!
//! `record_len` counts the whole record including itself and the checksum.
//! The checksum covers every byte before it. A later record for the same
//! object id supersedes earlier ones.

use crate::error::{EngineError, EngineResult, TCEREAD, TCERHEAD, TCESYNC, TCEWRITE};
use ejdb_bson::ObjectId;
use parking_lot::RwLock;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// One persisted document version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    /// Document identifier.
    pub oid: ObjectId,
    /// Encoded document.
    pub payload: Vec<u8>,
}

impl LogRecord {
    /// Header size: record_len (4) + oid (12).
    const HEADER_SIZE: usize = 16;
    /// CRC size.
    const CRC_SIZE: usize = 4;

    /// Creates a record.
    #[must_use]
    pub fn new(oid: ObjectId, payload: Vec<u8>) -> Self {
        Self { oid, payload }
    }

    /// Returns the encoded size of this record.
    #[must_use]
    pub fn encoded_size(&self) -> usize {
        Self::HEADER_SIZE + self.payload.len() + Self::CRC_SIZE
    }

    /// Encodes the record to bytes.
    ///
    /// # Errors
    ///
    /// Fails if the record does not fit a 32-bit length.
    pub fn encode(&self) -> EngineResult<Vec<u8>> {
        let record_len = u32::try_from(self.encoded_size())
            .map_err(|_| EngineError::invalid_bson("document too large"))?;
        let mut buf = Vec::with_capacity(self.encoded_size());
        buf.extend_from_slice(&record_len.to_le_bytes());
        buf.extend_from_slice(self.oid.bytes());
        buf.extend_from_slice(&self.payload);
        let crc = crc32fast::hash(&buf);
        buf.extend_from_slice(&crc.to_le_bytes());
        Ok(buf)
    }

    /// Decodes the record at the start of `data`.
    ///
    /// Returns `Ok(None)` when `data` ends before the record does, which is
    /// how a torn final write looks.
    ///
    /// # Errors
    ///
    /// Returns `TCERHEAD` for an impossible length or a checksum mismatch.
    pub fn decode(data: &[u8]) -> EngineResult<Option<(Self, usize)>> {
        let Some(prefix) = data.get(..4) else {
            return Ok(None);
        };
        let record_len = u32::from_le_bytes([prefix[0], prefix[1], prefix[2], prefix[3]]) as usize;
        if record_len < Self::HEADER_SIZE + Self::CRC_SIZE {
            return Err(EngineError::new(
                TCERHEAD,
                format!("record length {record_len} below minimum"),
            ));
        }
        let Some(record) = data.get(..record_len) else {
            return Ok(None);
        };

        let crc_at = record_len - Self::CRC_SIZE;
        let stored_crc = u32::from_le_bytes([
            record[crc_at],
            record[crc_at + 1],
            record[crc_at + 2],
            record[crc_at + 3],
        ]);
        let computed_crc = crc32fast::hash(&record[..crc_at]);
        if stored_crc != computed_crc {
            return Err(EngineError::new(
                TCERHEAD,
                format!("checksum mismatch: expected {stored_crc:08x}, got {computed_crc:08x}"),
            ));
        }

        let mut oid = [0u8; 12];
        oid.copy_from_slice(&record[4..Self::HEADER_SIZE]);
        let payload = record[Self::HEADER_SIZE..crc_at].to_vec();
        Ok(Some((Self::new(ObjectId::from_bytes(oid), payload), record_len)))
    }
}

/// Result of replaying a log.
#[derive(Debug, Default)]
pub struct Replay {
    /// Records in log order.
    pub records: Vec<LogRecord>,
    /// Length of the valid prefix. Anything after it is a torn tail.
    pub valid_len: u64,
}

/// Replays every complete record in `data`.
///
/// # Errors
///
/// Returns `TCERHEAD` if a complete record is corrupt.
pub fn replay(data: &[u8]) -> EngineResult<Replay> {
    let mut out = Replay::default();
    let mut pos = 0usize;
    while pos < data.len() {
        match LogRecord::decode(&data[pos..])? {
            Some((record, len)) => {
                out.records.push(record);
                pos += len;
            }
            None => break,
        }
    }
    out.valid_len = pos as u64;
    Ok(out)
}

/// A byte store backing one collection log.
///
/// Backends are opaque: they append, read back and truncate bytes without
/// understanding records.
pub trait LogBackend: Send {
    /// Reads the whole log.
    fn read_all(&self) -> EngineResult<Vec<u8>>;

    /// Appends data and returns the offset it was written at.
    fn append(&mut self, data: &[u8]) -> EngineResult<u64>;

    /// Makes appended data durable.
    fn sync(&mut self) -> EngineResult<()>;

    /// Current size in bytes.
    fn size(&self) -> u64;

    /// Truncates to `new_size` bytes.
    fn truncate(&mut self, new_size: u64) -> EngineResult<()>;
}

fn io_error(code: i32, path: &Path, e: &io::Error) -> EngineError {
    EngineError::new(code, format!("{}: {e}", path.display()))
}

/// A file-backed log.
#[derive(Debug)]
pub struct FileLog {
    path: PathBuf,
    file: RwLock<File>,
    size: u64,
}

impl FileLog {
    /// Opens or creates the log file for writing.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn open_writable(path: &Path) -> EngineResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        Self::from_file(path, file)
    }

    /// Opens an existing log file read-only.
    ///
    /// # Errors
    ///
    /// Returns an error if the file does not exist or cannot be opened.
    pub fn open_readonly(path: &Path) -> EngineResult<Self> {
        let file = OpenOptions::new().read(true).open(path)?;
        Self::from_file(path, file)
    }

    fn from_file(path: &Path, file: File) -> EngineResult<Self> {
        let size = file.metadata()?.len();
        Ok(Self {
            path: path.to_path_buf(),
            file: RwLock::new(file),
            size,
        })
    }

    /// Returns the path of the log file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LogBackend for FileLog {
    fn read_all(&self) -> EngineResult<Vec<u8>> {
        let mut file = self.file.write();
        let mut buf = Vec::with_capacity(usize::try_from(self.size).unwrap_or(0));
        file.seek(SeekFrom::Start(0))
            .and_then(|_| file.read_to_end(&mut buf))
            .map_err(|e| io_error(TCEREAD, &self.path, &e))?;
        Ok(buf)
    }

    fn append(&mut self, data: &[u8]) -> EngineResult<u64> {
        let offset = self.size;
        let mut file = self.file.write();
        let written = file
            .seek(SeekFrom::Start(offset))
            .and_then(|_| file.write_all(data));
        if let Err(e) = written {
            // Later appends start at `offset` again, overwriting any torn bytes.
            if let Err(undo) = file.set_len(offset) {
                tracing::warn!(
                    path = %self.path.display(),
                    offset,
                    error = %undo,
                    "cannot cut partial record from collection log"
                );
            }
            return Err(io_error(TCEWRITE, &self.path, &e));
        }
        self.size += data.len() as u64;
        Ok(offset)
    }

    fn sync(&mut self) -> EngineResult<()> {
        let mut file = self.file.write();
        file.flush()
            .and_then(|()| file.sync_data())
            .map_err(|e| io_error(TCESYNC, &self.path, &e))
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn truncate(&mut self, new_size: u64) -> EngineResult<()> {
        self.file
            .write()
            .set_len(new_size)
            .map_err(|e| io_error(TCEWRITE, &self.path, &e))?;
        self.size = new_size;
        Ok(())
    }
}

/// An in-memory log for tests and transient databases.
#[derive(Debug, Default)]
pub struct MemoryLog {
    data: Vec<u8>,
}

impl MemoryLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl LogBackend for MemoryLog {
    fn read_all(&self) -> EngineResult<Vec<u8>> {
        Ok(self.data.clone())
    }

    fn append(&mut self, data: &[u8]) -> EngineResult<u64> {
        let offset = self.data.len() as u64;
        self.data.extend_from_slice(data);
        Ok(offset)
    }

    fn sync(&mut self) -> EngineResult<()> {
        Ok(())
    }

    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    fn truncate(&mut self, new_size: u64) -> EngineResult<()> {
        self.data.truncate(usize::try_from(new_size).unwrap_or(usize::MAX));
        Ok(())
    }
}
