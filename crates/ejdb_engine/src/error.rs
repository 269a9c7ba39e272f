//! Error types for the storage engine.
//!
//! Engine errors carry the engine's numeric error code verbatim so callers
//! can match on it and render the canonical `EJDB ERROR <code>|<message>`
//! form.

use ejdb_bson::BsonError;
use std::io;
use thiserror::Error;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Invalid operation.
pub const TCEINVALID: i32 = 2;
/// File not found.
pub const TCENOFILE: i32 = 3;
/// No permission.
pub const TCENOPERM: i32 = 4;
/// Invalid meta data.
pub const TCEMETA: i32 = 5;
/// Invalid record header.
pub const TCERHEAD: i32 = 6;
/// Open error.
pub const TCEOPEN: i32 = 7;
/// Close error.
pub const TCECLOSE: i32 = 8;
/// Sync error.
pub const TCESYNC: i32 = 10;
/// Read error.
pub const TCEREAD: i32 = 13;
/// Write error.
pub const TCEWRITE: i32 = 14;
/// Lock error.
pub const TCELOCK: i32 = 16;
/// Miscellaneous error.
pub const TCEMISC: i32 = 9999;

/// Invalid collection name.
pub const JBEINVALIDCOLNAME: i32 = 9000;
/// Invalid document.
pub const JBEINVALIDBSON: i32 = 9001;
/// Invalid document primary key.
pub const JBEINVALIDBSONPK: i32 = 9002;
/// Invalid query control field.
pub const JBEQINVALIDQCONTROL: i32 = 9003;
/// Operator requires an array value.
pub const JBEQINOPNOTARRAY: i32 = 9004;
/// Inconsistent database metadata.
pub const JBEMETANVALID: i32 = 9005;
/// Invalid field path.
pub const JBEFPATHINVALID: i32 = 9006;
/// Invalid query regular expression.
pub const JBEQINVALIDQRX: i32 = 9007;
/// Result set sorting error.
pub const JBEQRSSORTING: i32 = 9008;
/// Generic query error.
pub const JBEQERROR: i32 = 9009;
/// Record update failed.
pub const JBEQUPDFAILED: i32 = 9010;
/// `$fields` mixes include and exclude.
pub const JBEQINCEXCL: i32 = 9012;
/// Too many collections.
pub const JBEMAXNUMCOLS: i32 = 9014;

/// Canonical message for an engine error code.
#[must_use]
pub fn error_message(code: i32) -> &'static str {
    match code {
        0 => "success",
        TCEINVALID => "invalid operation",
        TCENOFILE => "file not found",
        TCENOPERM => "no permission",
        TCEMETA => "invalid meta data",
        TCERHEAD => "invalid record header",
        TCEOPEN => "open error",
        TCECLOSE => "close error",
        TCESYNC => "sync error",
        TCEREAD => "read error",
        TCEWRITE => "write error",
        TCELOCK => "lock error",
        JBEINVALIDCOLNAME => "invalid collection name",
        JBEINVALIDBSON => "invalid bson object",
        JBEINVALIDBSONPK => "invalid bson object id",
        JBEQINVALIDQCONTROL => "invalid query control field starting with '$'",
        JBEQINOPNOTARRAY => "$in, $nin and $bt require a non-empty array value",
        JBEMETANVALID => "inconsistent database metadata",
        JBEFPATHINVALID => "invalid field path value",
        JBEQINVALIDQRX => "invalid query regexp value",
        JBEQRSSORTING => "result set sorting error",
        JBEQERROR => "query generic error",
        JBEQUPDFAILED => "bson record update failed",
        JBEQINCEXCL => "$fields hint cannot mix include and exclude fields",
        JBEMAXNUMCOLS => "exceeded the maximum number of collections per database",
        _ => "miscellaneous error",
    }
}

/// An error reported by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("EJDB ERROR {code}|{message}")]
pub struct EngineError {
    /// Numeric engine code.
    pub code: i32,
    /// Human-readable detail.
    pub message: String,
}

impl EngineError {
    /// Create an error with an explicit message.
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Create an error carrying the canonical message for `code`.
    #[must_use]
    pub fn from_code(code: i32) -> Self {
        Self::new(code, error_message(code))
    }

    /// Invalid operation (closed handle, write on a reader, ...).
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::new(TCEINVALID, message)
    }

    /// Invalid document.
    pub fn invalid_bson(message: impl Into<String>) -> Self {
        Self::new(JBEINVALIDBSON, message)
    }

    /// Query error with a specific code.
    pub fn query(code: i32, message: impl Into<String>) -> Self {
        Self::new(code, message)
    }

    /// Returns the numeric code.
    #[must_use]
    pub const fn code(&self) -> i32 {
        self.code
    }
}

impl From<io::Error> for EngineError {
    fn from(e: io::Error) -> Self {
        let code = match e.kind() {
            io::ErrorKind::NotFound => TCENOFILE,
            io::ErrorKind::PermissionDenied => TCENOPERM,
            _ => TCEMISC,
        };
        Self::new(code, format!("{}: {e}", error_message(code)))
    }
}

impl From<BsonError> for EngineError {
    fn from(e: BsonError) -> Self {
        Self::invalid_bson(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_format() {
        let err = EngineError::from_code(JBEINVALIDCOLNAME);
        assert_eq!(err.to_string(), "EJDB ERROR 9000|invalid collection name");
    }

    #[test]
    fn io_errors_map_to_codes() {
        let err: EngineError = io::Error::new(io::ErrorKind::NotFound, "gone").into();
        assert_eq!(err.code(), TCENOFILE);
        let err: EngineError = io::Error::new(io::ErrorKind::PermissionDenied, "no").into();
        assert_eq!(err.code(), TCENOPERM);
        let err: EngineError = io::Error::new(io::ErrorKind::Other, "?").into();
        assert_eq!(err.code(), TCEMISC);
    }

    #[test]
    fn bson_errors_are_invalid_bson() {
        let err: EngineError = BsonError::UnexpectedEof.into();
        assert_eq!(err.code(), JBEINVALIDBSON);
    }

    #[test]
    fn unknown_codes_are_miscellaneous() {
        assert_eq!(error_message(12345), "miscellaneous error");
        assert_eq!(error_message(TCEMISC), "miscellaneous error");
    }
}
