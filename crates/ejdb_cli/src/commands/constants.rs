//! Constants command implementation.

use super::CommandResult;
use ejdb_binding::constants;
use serde_json::{Map, Value};
use std::io::Write;

/// Prints every exposed constant.
pub fn run(format: &str, out: &mut dyn Write) -> CommandResult {
    let table = constants();
    if format == "json" {
        let map: Map<String, Value> = table
            .iter()
            .map(|(name, value)| (name.to_string(), Value::from(value)))
            .collect();
        writeln!(out, "{}", serde_json::to_string_pretty(&map)?)?;
        return Ok(());
    }

    let width = table.iter().map(|(name, _)| name.len()).max().unwrap_or(0);
    for (name, value) in table.iter() {
        writeln!(out, "{name:<width$} = {value}")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_lists_every_constant() {
        let mut out = Vec::new();
        run("text", &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.lines().count(), constants().len());
        assert!(text.lines().any(|l| l.starts_with("JBQRYCOUNT") && l.ends_with("= 1")));
    }

    #[test]
    fn json_is_an_object() {
        let mut out = Vec::new();
        run("json", &mut out).unwrap();
        let json: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(json["BSON_LONG"], 18);
        assert_eq!(json["DEFAULT_OPEN_MODE"], 70);
    }
}
