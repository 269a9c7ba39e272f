//! # EJDB BSON
//!
//! Binary document codec for the EJDB bindings.
//!
//! Documents are ordered maps of typed values. The wire form is the
//! length-prefixed, little-endian, self-describing layout the engine stores:
//!
//! - every document starts with its total length as an `i32`
//! - each element is a type tag, a NUL-terminated key and the value
//! - arrays are documents keyed `"0"`, `"1"`, ...
//! - a single `0x00` byte terminates the document
//!
//! ## Usage
//!
//! ```
//! use ejdb_bson::{from_bson, to_bson, Document, Value};
//!
//! let doc = Document::new().with("name", "pen").with("qty", 5i32);
//! let bytes = to_bson(&doc).unwrap();
//! let decoded = from_bson(&bytes).unwrap();
//! assert_eq!(decoded.get("qty"), Some(&Value::Int32(5)));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod decoder;
mod document;
mod encoder;
mod error;
pub mod host;
mod oid;
mod raw;
mod types;
mod value;

pub use decoder::{document_length, from_bson, validate, BsonDecoder};
pub use document::Document;
pub use encoder::{to_bson, BsonEncoder, MAX_DEPTH};
pub use error::{BsonError, BsonResult};
pub use host::{decode_host, encode_host, HostTable, HostValue, TableKey};
pub use oid::{ObjectId, OBJECT_ID_HEX_LEN};
pub use raw::{RawDocument, RawElement, RawIter};
pub use types::ElementType;
pub use value::{Binary, Regex, Value};
