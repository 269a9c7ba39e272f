//! Save command implementation.

use super::CommandResult;
use crate::json::parse_document;
use ejdb_binding::Connection;
use std::io::Write;

/// Saves one JSON document and prints its id.
pub fn run(
    conn: &mut Connection,
    collection: &str,
    document: &str,
    merge: bool,
    out: &mut dyn Write,
) -> CommandResult {
    let doc = parse_document(document)?;
    let oid = conn.save(collection, &doc, merge)?;
    writeln!(out, "{oid}")?;
    Ok(())
}
