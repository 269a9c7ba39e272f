//! Error types for the bindings.
//!
//! Every public operation returns [`Result`]. An [`Error`] always carries a
//! kind and a message so a host adapter can raise it as a single failure.

use ejdb_bson::BsonError;
use ejdb_engine::EngineError;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for binding operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Broad classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The database could not be opened.
    Open,
    /// The storage engine reported a failure.
    Engine,
    /// A byte stream is not a well-formed document.
    MalformedDocument,
    /// A value cannot be encoded.
    UnsupportedType,
    /// A connection, collection handle or cursor is no longer usable.
    InvalidHandle,
    /// The operation is not valid for this object.
    InvalidOperation,
    /// A document has no field with the requested name.
    FieldNotFound,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Open => "open error",
            Self::Engine => "engine error",
            Self::MalformedDocument => "malformed document",
            Self::UnsupportedType => "unsupported type",
            Self::InvalidHandle => "invalid handle",
            Self::InvalidOperation => "invalid operation",
            Self::FieldNotFound => "field not found",
        })
    }
}

/// Errors returned by the bindings.
#[derive(Debug, Error)]
pub enum Error {
    /// Opening the database failed; no connection was created.
    #[error("open error: cannot open {}: {source}", path.display())]
    Open {
        /// Path passed to open.
        path: PathBuf,
        /// The engine's failure.
        #[source]
        source: EngineError,
    },

    /// The engine failed; code and message are passed through verbatim.
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// A document byte stream is inconsistent.
    #[error("malformed document: {message}")]
    MalformedDocument {
        /// What is wrong with it.
        message: String,
    },

    /// A value has no document representation.
    #[error("unsupported type: {message}")]
    UnsupportedType {
        /// What could not be encoded.
        message: String,
    },

    /// The handle was closed or disposed, or belongs to another connection.
    #[error("invalid handle: {message}")]
    InvalidHandle {
        /// Which handle and why.
        message: String,
    },

    /// The operation does not apply.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Why it was rejected.
        message: String,
    },

    /// The document at `position` has no field `name`.
    #[error("field not found: {name:?} in document {position}")]
    FieldNotFound {
        /// Cursor position of the document.
        position: usize,
        /// The requested field name or path.
        name: String,
    },
}

impl Error {
    /// Creates an invalid handle error.
    pub fn invalid_handle(message: impl Into<String>) -> Self {
        Self::InvalidHandle {
            message: message.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// The kind of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Open { .. } => ErrorKind::Open,
            Self::Engine(_) => ErrorKind::Engine,
            Self::MalformedDocument { .. } => ErrorKind::MalformedDocument,
            Self::UnsupportedType { .. } => ErrorKind::UnsupportedType,
            Self::InvalidHandle { .. } => ErrorKind::InvalidHandle,
            Self::InvalidOperation { .. } => ErrorKind::InvalidOperation,
            Self::FieldNotFound { .. } => ErrorKind::FieldNotFound,
        }
    }

    /// The engine's numeric error code, if the engine produced this error.
    #[must_use]
    pub fn engine_code(&self) -> Option<i32> {
        match self {
            Self::Open { source, .. } | Self::Engine(source) => Some(source.code()),
            _ => None,
        }
    }
}

impl From<BsonError> for Error {
    fn from(e: BsonError) -> Self {
        if e.is_malformed() {
            Self::MalformedDocument {
                message: e.to_string(),
            }
        } else {
            Self::UnsupportedType {
                message: e.to_string(),
            }
        }
    }
}
