//! # EJDB Engine
//!
//! The embedded document store the EJDB bindings talk to.
//!
//! The bindings only depend on the [`DocumentEngine`] trait. This crate also
//! ships [`EmbeddedEngine`], a small file-backed implementation:
//!
//! - metadata at the database path, one append-only log per collection
//! - advisory locking through `fs2`
//! - a query matcher supporting the common comparison, set, string and
//!   regular-expression operators plus sort, paging and projection hints
//!
//! ## Usage
//!
//! ```
//! use ejdb_bson::{to_bson, Document};
//! use ejdb_engine::{DocumentEngine, EmbeddedEngine, QueryFlags};
//!
//! let mut engine = EmbeddedEngine::in_memory();
//! let items = engine.ensure_collection("items").unwrap();
//! let doc = to_bson(&Document::new().with("name", "pen")).unwrap();
//! engine.save(items, &doc, false).unwrap();
//!
//! let empty = to_bson(&Document::new()).unwrap();
//! let query = engine.prepare(&empty, &[], &empty).unwrap();
//! let output = engine.execute(items, &query, QueryFlags::NONE).unwrap();
//! assert_eq!(output.count(), 1);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod embedded;
mod engine;
pub mod error;
mod flags;
mod hints;
mod log;
mod matcher;
mod meta;
mod results;
mod store;
mod types;

pub use config::{Config, DEFAULT_MAX_COLLECTIONS};
pub use embedded::EmbeddedEngine;
pub use engine::{DocumentEngine, PreparedQuery};
pub use error::{error_message, EngineError, EngineResult};
pub use flags::{IndexFlags, OpenMode, QueryFlags};
pub use hints::{Hints, Projection};
pub use log::{FileLog, LogBackend, LogRecord, MemoryLog};
pub use matcher::Matcher;
pub use results::{QueryOutput, ResultBuffer, ResultBuilder, ResultTracker};
pub use types::{is_valid_collection_name, CollectionId, MAX_COLLECTION_NAME_LEN};
