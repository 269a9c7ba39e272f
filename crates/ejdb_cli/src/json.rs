//! JSON input for documents.
//!
//! Plain JSON maps onto document values; the `$`-tagged objects the output
//! uses (`{"$oid": ..}`, `{"$date": ..}`, `{"$regex": .., "$options": ..}`)
//! are read back as their typed values.

use ejdb_bson::{Document, ObjectId, Regex, Value};
use serde_json::{Map, Value as Json};
use thiserror::Error;

/// Errors converting JSON text into documents.
#[derive(Debug, Error)]
pub enum JsonError {
    /// The text is not JSON.
    #[error("invalid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    /// A document was expected.
    #[error("expected a JSON object, found {found}")]
    NotAnObject {
        /// JSON type that was found.
        found: &'static str,
    },

    /// A `$`-tagged object has the wrong shape.
    #[error("invalid {tag} value: {message}")]
    Tagged {
        /// The tag, such as `$oid`.
        tag: &'static str,
        /// What is wrong with it.
        message: String,
    },
}

/// Parses JSON text into a document.
pub fn parse_document(text: &str) -> Result<Document, JsonError> {
    let json: Json = serde_json::from_str(text)?;
    match json {
        Json::Object(map) => to_document(map),
        other => Err(JsonError::NotAnObject {
            found: json_type(&other),
        }),
    }
}

fn to_document(map: Map<String, Json>) -> Result<Document, JsonError> {
    let mut doc = Document::with_capacity(map.len());
    for (key, value) in map {
        doc.insert(key, to_value(value)?);
    }
    Ok(doc)
}

fn to_value(json: Json) -> Result<Value, JsonError> {
    Ok(match json {
        Json::Null => Value::Null,
        Json::Bool(b) => Value::Boolean(b),
        Json::Number(n) => match n.as_i64() {
            Some(i) => i32::try_from(i).map_or(Value::Int64(i), Value::Int32),
            None => Value::Double(n.as_f64().unwrap_or(f64::NAN)),
        },
        Json::String(s) => Value::String(s),
        Json::Array(items) => Value::Array(
            items
                .into_iter()
                .map(to_value)
                .collect::<Result<_, _>>()?,
        ),
        Json::Object(map) => match tagged(&map)? {
            Some(value) => value,
            None => Value::Document(to_document(map)?),
        },
    })
}

fn tagged(map: &Map<String, Json>) -> Result<Option<Value>, JsonError> {
    if map.len() == 1 {
        if let Some(oid) = map.get("$oid") {
            let hex = oid.as_str().ok_or_else(|| tag_error("$oid", "expected a string"))?;
            let id = ObjectId::parse_hex(hex).map_err(|e| tag_error("$oid", e.to_string()))?;
            return Ok(Some(Value::ObjectId(id)));
        }
        if let Some(date) = map.get("$date") {
            let ms = date
                .as_i64()
                .ok_or_else(|| tag_error("$date", "expected integer milliseconds"))?;
            return Ok(Some(Value::DateTime(ms)));
        }
    }
    if let Some(pattern) = map.get("$regex") {
        let options = map.get("$options").and_then(Json::as_str).unwrap_or("");
        if map.len() > 2 || (map.len() == 2 && !map.contains_key("$options")) {
            return Ok(None);
        }
        let pattern = pattern
            .as_str()
            .ok_or_else(|| tag_error("$regex", "expected a string"))?;
        return Ok(Some(Value::Regex(Regex {
            pattern: pattern.to_string(),
            options: options.to_string(),
        })));
    }
    Ok(None)
}

fn tag_error(tag: &'static str, message: impl Into<String>) -> JsonError {
    JsonError::Tagged {
        tag,
        message: message.into(),
    }
}

fn json_type(json: &Json) -> &'static str {
    match json {
        Json::Null => "null",
        Json::Bool(_) => "a boolean",
        Json::Number(_) => "a number",
        Json::String(_) => "a string",
        Json::Array(_) => "an array",
        Json::Object(_) => "an object",
    }
}
