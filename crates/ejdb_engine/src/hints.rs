//! Query hints: ordering, paging, projection and count-only mode.

use crate::error::{EngineError, EngineResult, JBEQERROR, JBEQINCEXCL, JBEQINVALIDQCONTROL};
use crate::matcher::{compare, parse_path};
use ejdb_bson::{Document, Value};
use std::cmp::Ordering;

/// Parsed hints document.
///
/// ```text
/// { $orderby: {field: 1 | -1, ...},
///   $skip: n, $max: n,
///   $fields: {field: 1 | 0, ...},
///   $onlycount: bool }
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Hints {
    /// Sort keys in priority order; `true` means ascending.
    pub order_by: Vec<(String, bool)>,
    /// Number of leading results to drop.
    pub skip: usize,
    /// Maximum number of results.
    pub max: Option<usize>,
    /// Projection.
    pub fields: Option<Projection>,
    /// Only count matches.
    pub only_count: bool,
}

/// A `$fields` projection over top-level fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Projection {
    /// Keep only the listed fields (and `_id` unless `keep_id` is false).
    Include {
        /// Fields to keep.
        fields: Vec<String>,
        /// Whether `_id` is kept.
        keep_id: bool,
    },
    /// Drop the listed fields.
    Exclude(Vec<String>),
}

impl Hints {
    /// Parses a hints document.
    ///
    /// # Errors
    ///
    /// - `JBEQINVALIDQCONTROL` for unknown hint keys
    /// - `JBEQINCEXCL` when `$fields` mixes include and exclude
    /// - `JBEQERROR` for values of the wrong type
    pub fn parse(doc: &Document) -> EngineResult<Self> {
        let mut hints = Self::default();
        for (key, value) in doc.iter() {
            match key {
                "$orderby" => hints.order_by = parse_order_by(value)?,
                "$skip" => hints.skip = parse_count(key, value)?,
                "$max" => hints.max = Some(parse_count(key, value)?),
                "$fields" => hints.fields = parse_fields(value)?,
                "$onlycount" => {
                    hints.only_count = value
                        .as_bool()
                        .ok_or_else(|| hint_error(key, value))?;
                }
                other => {
                    return Err(EngineError::query(
                        JBEQINVALIDQCONTROL,
                        format!("unknown query hint {other}"),
                    ))
                }
            }
        }
        Ok(hints)
    }

    /// Compares two documents by the `$orderby` keys.
    #[must_use]
    pub fn compare(&self, a: &Document, b: &Document) -> Ordering {
        for (path, ascending) in &self.order_by {
            let ord = order_values(a.get_path(path), b.get_path(path));
            let ord = if *ascending { ord } else { ord.reverse() };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }

    /// Applies `$skip` and `$max` to a result count, returning the range to keep.
    #[must_use]
    pub fn window(&self, len: usize) -> std::ops::Range<usize> {
        let start = self.skip.min(len);
        let end = match self.max {
            Some(max) => start.saturating_add(max).min(len),
            None => len,
        };
        start..end
    }

    /// Applies `$fields` to one document.
    #[must_use]
    pub fn project(&self, doc: Document) -> Document {
        match &self.fields {
            None => doc,
            Some(Projection::Include { fields, keep_id }) => doc
                .into_iter()
                .filter(|(k, _)| (*keep_id && k == "_id") || fields.iter().any(|f| f == k))
                .collect(),
            Some(Projection::Exclude(fields)) => doc
                .into_iter()
                .filter(|(k, _)| !fields.iter().any(|f| f == k))
                .collect(),
        }
    }
}

fn hint_error(key: &str, value: &Value) -> EngineError {
    EngineError::query(
        JBEQERROR,
        format!("invalid value of type {} for {key}", value.element_type()),
    )
}

fn parse_count(key: &str, value: &Value) -> EngineResult<usize> {
    let n = match value {
        Value::Double(f) if f.fract() == 0.0 && *f >= 0.0 => Some(*f as i64),
        other => other.as_i64(),
    };
    n.and_then(|n| usize::try_from(n).ok())
        .ok_or_else(|| hint_error(key, value))
}

fn direction(value: &Value) -> Option<bool> {
    match value.as_f64()? {
        n if n > 0.0 => Some(true),
        n if n < 0.0 => Some(false),
        _ => None,
    }
}

fn parse_order_by(value: &Value) -> EngineResult<Vec<(String, bool)>> {
    let doc = value
        .as_document()
        .ok_or_else(|| hint_error("$orderby", value))?;
    let mut keys = Vec::with_capacity(doc.len());
    for (path, dir) in doc.iter() {
        parse_path(path)?;
        let ascending = direction(dir).ok_or_else(|| hint_error("$orderby", dir))?;
        keys.push((path.to_string(), ascending));
    }
    Ok(keys)
}

fn parse_fields(value: &Value) -> EngineResult<Option<Projection>> {
    let doc = value
        .as_document()
        .ok_or_else(|| hint_error("$fields", value))?;
    let mut include = Vec::new();
    let mut exclude = Vec::new();
    let mut keep_id = true;
    for (path, flag) in doc.iter() {
        let top = parse_path(path)?.swap_remove(0);
        let on = match flag {
            Value::Boolean(b) => *b,
            other => other.as_f64().ok_or_else(|| hint_error("$fields", other))? != 0.0,
        };
        match (top.as_str(), on) {
            ("_id", false) => keep_id = false,
            (_, true) => include.push(top),
            (_, false) => exclude.push(top),
        }
    }
    if !include.is_empty() && !exclude.is_empty() {
        return Err(EngineError::from_code(JBEQINCEXCL));
    }
    Ok(if !include.is_empty() {
        Some(Projection::Include {
            fields: include,
            keep_id,
        })
    } else if !exclude.is_empty() || !keep_id {
        if !keep_id {
            exclude.push("_id".to_string());
        }
        Some(Projection::Exclude(exclude))
    } else {
        None
    })
}

/// Total order used for sorting: missing values first, then comparable
/// values, then by type tag.
fn order_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(x), Some(y)) => compare(x, y)
            .unwrap_or_else(|| x.element_type().tag().cmp(&y.element_type().tag())),
    }
}
