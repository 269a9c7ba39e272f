//! Error types for the codec crate.

use thiserror::Error;

/// Result type for codec operations.
pub type BsonResult<T> = Result<T, BsonError>;

/// Errors that can occur during encoding or decoding.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BsonError {
    /// The byte stream is not a well-formed document.
    #[error("malformed document: {message}")]
    MalformedDocument {
        /// Description of the structural error.
        message: String,
    },

    /// An element carries a type tag this codec does not recognise.
    #[error("unrecognized element type tag 0x{tag:02x}")]
    UnknownTypeTag {
        /// The offending tag byte.
        tag: u8,
    },

    /// Unexpected end of input.
    #[error("unexpected end of input")]
    UnexpectedEof,

    /// Invalid UTF-8 in a string or key.
    #[error("invalid UTF-8 string")]
    InvalidUtf8,

    /// The value cannot be represented as a document.
    #[error("unsupported type: {type_name}")]
    UnsupportedType {
        /// Name of the unsupported type or construct.
        type_name: String,
    },

    /// A key or regex component contains an interior NUL byte.
    #[error("invalid key {key:?}: keys must not contain NUL bytes")]
    InvalidKey {
        /// The offending key.
        key: String,
    },

    /// An object identifier could not be parsed.
    #[error("invalid object id: {message}")]
    InvalidObjectId {
        /// Why parsing failed.
        message: String,
    },
}

impl BsonError {
    /// Create a malformed document error.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedDocument {
            message: message.into(),
        }
    }

    /// Create an unsupported type error.
    pub fn unsupported_type(type_name: impl Into<String>) -> Self {
        Self::UnsupportedType {
            type_name: type_name.into(),
        }
    }

    /// Create an invalid object id error.
    pub fn invalid_object_id(message: impl Into<String>) -> Self {
        Self::InvalidObjectId {
            message: message.into(),
        }
    }

    /// Returns true if this error describes a broken byte stream
    /// (as opposed to a value that cannot be encoded).
    #[must_use]
    pub fn is_malformed(&self) -> bool {
        matches!(
            self,
            Self::MalformedDocument { .. }
                | Self::UnknownTypeTag { .. }
                | Self::UnexpectedEof
                | Self::InvalidUtf8
        )
    }
}
