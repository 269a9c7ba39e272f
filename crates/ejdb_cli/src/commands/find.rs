//! Find command implementation.

use super::CommandResult;
use crate::json::parse_document;
use ejdb_binding::{Connection, Query};
use std::io::Write;

/// Arguments of the find command.
#[derive(Debug, Default)]
pub struct FindArgs<'a> {
    /// Collection to search.
    pub collection: &'a str,
    /// Primary match document as JSON.
    pub query: &'a str,
    /// OR alternatives as JSON.
    pub ors: &'a [String],
    /// Hints as JSON.
    pub hints: Option<&'a str>,
    /// Only print the number of matches.
    pub count: bool,
    /// Pretty-print documents.
    pub pretty: bool,
}

/// Runs a query and prints the matches, one JSON document per line.
pub fn run(conn: &mut Connection, args: &FindArgs<'_>, out: &mut dyn Write) -> CommandResult {
    let mut builder = Query::builder().filter(parse_document(args.query)?);
    for or in args.ors {
        builder = builder.or(parse_document(or)?);
    }
    if let Some(hints) = args.hints {
        builder = builder.hints(parse_document(hints)?);
    }
    if args.count {
        builder = builder.count_only();
    }
    let query = builder.build()?;

    let mut cursor = conn.find(args.collection, &query)?;
    if cursor.is_count_only() {
        writeln!(out, "{}", cursor.count()?)?;
        return Ok(());
    }
    for doc in &mut cursor {
        let doc = doc?;
        if args.pretty {
            writeln!(out, "{}", serde_json::to_string_pretty(&doc)?)?;
        } else {
            writeln!(out, "{}", serde_json::to_string(&doc)?)?;
        }
    }
    cursor.dispose();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ejdb_bson::Document;

    fn seeded() -> Connection {
        let mut conn = Connection::open_in_memory();
        for (name, qty) in [("pen", 5), ("cup", 2), ("ink", 9)] {
            conn.save(
                "items",
                &Document::new().with("name", name).with("qty", qty),
                false,
            )
            .unwrap();
        }
        conn
    }

    fn lines(conn: &mut Connection, args: &FindArgs<'_>) -> Vec<serde_json::Value> {
        let mut out = Vec::new();
        run(conn, args, &mut out).unwrap();
        String::from_utf8(out)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[test]
    fn prints_matches_in_hint_order() {
        let mut conn = seeded();
        let args = FindArgs {
            collection: "items",
            query: r#"{"qty": {"$gt": 3}}"#,
            hints: Some(r#"{"$orderby": {"qty": -1}, "$fields": {"name": 1}}"#),
            ..FindArgs::default()
        };
        let docs = lines(&mut conn, &args);
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0]["name"], "ink");
        assert_eq!(docs[1]["name"], "pen");
        assert!(docs[0].get("qty").is_none());
        assert!(docs[0]["_id"]["$oid"].is_string());
    }

    #[test]
    fn or_clauses_and_count() {
        let mut conn = seeded();
        let ors = vec![r#"{"name": "pen"}"#.to_string(), r#"{"name": "cup"}"#.to_string()];
        let args = FindArgs {
            collection: "items",
            query: "{}",
            ors: &ors,
            count: true,
            ..FindArgs::default()
        };
        let mut out = Vec::new();
        run(&mut conn, &args, &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "2\n");
    }

    #[test]
    fn bad_queries_fail() {
        let mut conn = seeded();
        let args = FindArgs {
            collection: "items",
            query: r#"{"$nope": 1}"#,
            ..FindArgs::default()
        };
        assert!(run(&mut conn, &args, &mut Vec::new()).is_err());
    }
}
