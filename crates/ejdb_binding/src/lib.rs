//! # EJDB Binding
//!
//! Handle-safe access to an embedded EJDB document store.
//!
//! - [`Connection`] owns one open database and releases it exactly once
//! - [`Query`] bundles a match document, OR alternatives and hints
//! - [`Cursor`] owns the results of one find call
//! - [`constants`] exposes the flag and type-tag values host code needs
//!
//! Every operation returns [`Result`]; an [`Error`] carries its
//! [`ErrorKind`] and, for engine failures, the engine's numeric code.
//!
//! ## Usage
//!
//! ```
//! use ejdb_binding::{Connection, Hints, Query};
//! use ejdb_bson::Document;
//!
//! let mut conn = Connection::open_in_memory();
//! conn.save("items", &Document::new().with("name", "pen").with("qty", 5i32), false)?;
//! conn.save("items", &Document::new().with("name", "cup").with("qty", 2i32), false)?;
//!
//! let query = Query::builder()
//!     .hints(Hints::new().order_by("qty", true))
//!     .build()?;
//! let mut cursor = conn.find("items", &query)?;
//! assert_eq!(cursor.count()?, 2);
//! assert_eq!(cursor.field(0, "name")?.as_str(), Some("cup"));
//! for doc in &mut cursor {
//!     assert!(doc?.contains_key("_id"));
//! }
//! # Ok::<(), ejdb_binding::Error>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod collection;
mod connection;
mod consts;
mod cursor;
mod error;
mod mode;
mod query;

pub use collection::CollectionHandle;
pub use connection::Connection;
pub use consts::{constant, constants, Constants};
pub use cursor::{Cursor, Documents};
pub use error::{Error, ErrorKind, Result};
pub use mode::{parse_mode, ModeArg, OpenOptions};
pub use query::{Hints, OrClauses, Query, QueryBuilder, INLINE_OR_CLAUSES};

pub use ejdb_engine::{IndexFlags, OpenMode, QueryFlags};
