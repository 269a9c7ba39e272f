//! Inspect command implementation.

use super::CommandResult;
use ejdb_binding::{Connection, Query};
use serde::Serialize;
use std::io::Write;

/// Database inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Database path.
    pub path: String,
    /// Open mode flags.
    pub mode: String,
    /// Per-collection statistics.
    pub collections: Vec<CollectionStats>,
}

/// Statistics for a single collection.
#[derive(Debug, Serialize)]
pub struct CollectionStats {
    /// Collection name.
    pub name: String,
    /// Number of stored documents.
    pub documents: usize,
}

/// Collects statistics about an open database.
pub fn inspect(conn: &mut Connection) -> Result<InspectResult, ejdb_binding::Error> {
    let count_all = Query::builder().count_only().build()?;
    let mut collections = Vec::new();
    for name in conn.collection_names()? {
        let documents = conn.find(&name, &count_all)?.count()?;
        collections.push(CollectionStats { name, documents });
    }
    Ok(InspectResult {
        path: conn
            .path()
            .map_or_else(|| ":memory:".to_string(), |p| p.display().to_string()),
        mode: conn.mode().to_string(),
        collections,
    })
}

/// Runs the inspect command.
pub fn run(conn: &mut Connection, format: &str, out: &mut dyn Write) -> CommandResult {
    let result = inspect(conn)?;
    match format {
        "json" => writeln!(out, "{}", serde_json::to_string_pretty(&result)?)?,
        _ => print_text_output(&result, out)?,
    }
    Ok(())
}

fn print_text_output(result: &InspectResult, out: &mut dyn Write) -> std::io::Result<()> {
    writeln!(out, "EJDB Database Inspection")?;
    writeln!(out, "========================")?;
    writeln!(out)?;
    writeln!(out, "Path: {}", result.path)?;
    writeln!(out, "Mode: {}", result.mode)?;
    writeln!(out)?;
    writeln!(out, "Collections: {}", result.collections.len())?;
    let width = result
        .collections
        .iter()
        .map(|c| c.name.len())
        .max()
        .unwrap_or(0);
    for coll in &result.collections {
        writeln!(
            out,
            "  {:<width$}  {} documents",
            coll.name, coll.documents
        )?;
    }
    Ok(())
}
