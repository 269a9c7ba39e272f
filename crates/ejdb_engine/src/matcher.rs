//! Query matching.
//!
//! A query document is compiled once into a list of field conditions and
//! then evaluated against decoded documents.
//!
//! Supported forms, per field path:
//!
//! - `{field: value}` equality; array fields match if any element is equal
//! - `{field: /re/opts}` regular expression over string values
//! - `{field: {$gt|$gte|$lt|$lte|$ne: v}}` comparisons
//! - `{field: {$in|$nin: [..]}}`, `{field: {$bt: [lo, hi]}}`
//! - `{field: {$exists: bool}}`, `{field: {$begin: "prefix"}}`
//! - `{field: {$icase: "str" | {$in: [..]}}}`, `{field: {$not: ...}}`
//!
//! Paths are dotted (`address.city`, `tags.0`). `_id` accepts either an
//! object id or its 24-character hex form.

use crate::error::{
    EngineError, EngineResult, JBEFPATHINVALID, JBEQERROR, JBEQINOPNOTARRAY,
    JBEQINVALIDQCONTROL, JBEQINVALIDQRX,
};
use ejdb_bson::{Document, ObjectId, Value};
use regex::{Regex, RegexBuilder};
use std::cmp::Ordering;

/// A compiled query document.
#[derive(Debug, Clone, Default)]
pub struct Matcher {
    conditions: Vec<Condition>,
}

#[derive(Debug, Clone)]
struct Condition {
    path: Vec<String>,
    op: Op,
}

#[derive(Debug, Clone)]
enum Op {
    Eq(Value),
    Cmp(Ordering, bool, Value),
    Ne(Value),
    In(Vec<Value>),
    Nin(Vec<Value>),
    Between(Value, Value),
    Exists(bool),
    Begin(String),
    ICaseEq(String),
    ICaseIn(Vec<String>),
    Regex(Regex),
    Not(Box<Op>),
    All(Vec<Op>),
}

impl Matcher {
    /// Compiles a query document.
    ///
    /// # Errors
    ///
    /// - `JBEQINVALIDQCONTROL` for top-level `$` keys
    /// - `JBEFPATHINVALID` for empty path segments
    /// - `JBEQINOPNOTARRAY` when `$in`, `$nin` or `$bt` lack an array
    /// - `JBEQINVALIDQRX` for regular expressions that do not compile
    /// - `JBEQERROR` for unknown operators or operands of the wrong type
    pub fn compile(query: &Document) -> EngineResult<Self> {
        let mut conditions = Vec::with_capacity(query.len());
        for (key, value) in query.iter() {
            if key.starts_with('$') {
                return Err(EngineError::query(
                    JBEQINVALIDQCONTROL,
                    format!("unsupported query control field {key}"),
                ));
            }
            let path = parse_path(key)?;
            let is_id = key == "_id";
            conditions.push(Condition {
                path,
                op: compile_value(value, is_id)?,
            });
        }
        Ok(Self { conditions })
    }

    /// Returns true if the query has no conditions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Evaluates the query against a document.
    #[must_use]
    pub fn matches(&self, doc: &Document) -> bool {
        self.conditions.iter().all(|c| {
            let mut found = Vec::new();
            collect(doc, &c.path, &mut found);
            eval(&c.op, &found)
        })
    }
}

/// Splits a dotted path.
pub(crate) fn parse_path(key: &str) -> EngineResult<Vec<String>> {
    let path: Vec<String> = key.split('.').map(str::to_string).collect();
    if path.iter().any(String::is_empty) {
        return Err(EngineError::query(
            JBEFPATHINVALID,
            format!("invalid field path {key:?}"),
        ));
    }
    Ok(path)
}

fn compile_value(value: &Value, is_id: bool) -> EngineResult<Op> {
    match value {
        Value::Regex(re) => Ok(Op::Regex(compile_regex(&re.pattern, &re.options)?)),
        Value::Document(doc) if is_operator_doc(doc) => {
            let mut ops = Vec::with_capacity(doc.len());
            for (op, operand) in doc.iter() {
                ops.push(compile_operator(op, operand, is_id)?);
            }
            Ok(if ops.len() == 1 {
                ops.remove(0)
            } else {
                Op::All(ops)
            })
        }
        other => Ok(Op::Eq(normalize(other, is_id))),
    }
}

fn is_operator_doc(doc: &Document) -> bool {
    !doc.is_empty() && doc.keys().all(|k| k.starts_with('$'))
}

fn compile_operator(op: &str, operand: &Value, is_id: bool) -> EngineResult<Op> {
    Ok(match op {
        "$gt" => Op::Cmp(Ordering::Greater, false, normalize(operand, is_id)),
        "$gte" => Op::Cmp(Ordering::Greater, true, normalize(operand, is_id)),
        "$lt" => Op::Cmp(Ordering::Less, false, normalize(operand, is_id)),
        "$lte" => Op::Cmp(Ordering::Less, true, normalize(operand, is_id)),
        "$ne" => Op::Ne(normalize(operand, is_id)),
        "$in" => Op::In(array_operand(op, operand, is_id)?),
        "$nin" => Op::Nin(array_operand(op, operand, is_id)?),
        "$bt" => {
            let mut bounds = array_operand(op, operand, is_id)?;
            if bounds.len() != 2 {
                return Err(EngineError::query(
                    JBEQINOPNOTARRAY,
                    "$bt requires an array of two bounds",
                ));
            }
            let hi = bounds.remove(1);
            let lo = bounds.remove(0);
            Op::Between(lo, hi)
        }
        "$exists" => Op::Exists(truthy(operand).ok_or_else(|| operand_error(op, operand))?),
        "$begin" => Op::Begin(
            operand
                .as_str()
                .ok_or_else(|| operand_error(op, operand))?
                .to_string(),
        ),
        "$icase" => match operand {
            Value::String(s) => Op::ICaseEq(s.to_lowercase()),
            Value::Document(doc) => match doc.get("$in") {
                Some(Value::Array(items)) if doc.len() == 1 && !items.is_empty() => Op::ICaseIn(
                    items
                        .iter()
                        .map(|v| v.as_str().map(str::to_lowercase))
                        .collect::<Option<_>>()
                        .ok_or_else(|| operand_error(op, operand))?,
                ),
                Some(_) => {
                    return Err(EngineError::query(
                        JBEQINOPNOTARRAY,
                        "$icase $in requires a non-empty array of strings",
                    ))
                }
                None => return Err(operand_error(op, operand)),
            },
            _ => return Err(operand_error(op, operand)),
        },
        "$not" => Op::Not(Box::new(compile_value(operand, is_id)?)),
        other => {
            return Err(EngineError::query(
                JBEQERROR,
                format!("unknown query operator {other}"),
            ))
        }
    })
}

fn array_operand(op: &str, operand: &Value, is_id: bool) -> EngineResult<Vec<Value>> {
    match operand {
        Value::Array(items) if !items.is_empty() => {
            Ok(items.iter().map(|v| normalize(v, is_id)).collect())
        }
        _ => Err(EngineError::query(
            JBEQINOPNOTARRAY,
            format!("{op} requires a non-empty array value"),
        )),
    }
}

fn operand_error(op: &str, operand: &Value) -> EngineError {
    EngineError::query(
        JBEQERROR,
        format!("invalid operand of type {} for {op}", operand.element_type()),
    )
}

fn truthy(value: &Value) -> Option<bool> {
    match value {
        Value::Boolean(b) => Some(*b),
        Value::Int32(n) => Some(*n != 0),
        Value::Int64(n) => Some(*n != 0),
        _ => None,
    }
}

/// `_id` operands given as hex strings are compared as object ids.
fn normalize(value: &Value, is_id: bool) -> Value {
    match value {
        Value::String(s) if is_id => ObjectId::parse_hex(s)
            .map(Value::ObjectId)
            .unwrap_or_else(|_| value.clone()),
        _ => value.clone(),
    }
}

/// Builds a regex honouring the `i`, `m`, `s` and `x` option letters.
pub(crate) fn compile_regex(pattern: &str, options: &str) -> EngineResult<Regex> {
    let mut builder = RegexBuilder::new(pattern);
    for opt in options.chars() {
        match opt {
            'i' => builder.case_insensitive(true),
            'm' => builder.multi_line(true),
            's' => builder.dot_matches_new_line(true),
            'x' => builder.ignore_whitespace(true),
            _ => &mut builder,
        };
    }
    builder.build().map_err(|e| {
        EngineError::query(JBEQINVALIDQRX, format!("invalid regex /{pattern}/: {e}"))
    })
}

/// Collects every value reachable at `path`, fanning out over arrays.
fn collect<'a>(doc: &'a Document, path: &[String], out: &mut Vec<&'a Value>) {
    let Some((head, rest)) = path.split_first() else {
        return;
    };
    if let Some(value) = doc.get(head) {
        descend(value, rest, out);
    }
}

fn descend<'a>(value: &'a Value, rest: &[String], out: &mut Vec<&'a Value>) {
    let Some((head, tail)) = rest.split_first() else {
        out.push(value);
        return;
    };
    match value {
        Value::Document(doc) => {
            if let Some(next) = doc.get(head) {
                descend(next, tail, out);
            }
        }
        Value::Array(items) => {
            if let Some(next) = head.parse::<usize>().ok().and_then(|i| items.get(i)) {
                descend(next, tail, out);
            }
            for item in items {
                if let Value::Document(doc) = item {
                    if let Some(next) = doc.get(head) {
                        descend(next, tail, out);
                    }
                }
            }
        }
        _ => {}
    }
}

/// Candidate values: each found value, plus array elements.
fn candidates<'a>(found: &'a [&'a Value]) -> impl Iterator<Item = &'a Value> + 'a {
    found.iter().flat_map(|&v: &&'a Value| {
        let elements: &'a [Value] = match v {
            Value::Array(items) => items,
            _ => &[],
        };
        std::iter::once(v).chain(elements.iter())
    })
}

fn eval(op: &Op, found: &[&Value]) -> bool {
    match op {
        Op::Eq(expected) => candidates(found).any(|v| values_equal(v, expected)),
        Op::Cmp(dir, inclusive, bound) => candidates(found).any(|v| {
            compare(v, bound).is_some_and(|o| o == *dir || (*inclusive && o == Ordering::Equal))
        }),
        Op::Ne(expected) => !candidates(found).any(|v| values_equal(v, expected)),
        Op::In(set) => candidates(found).any(|v| set.iter().any(|e| values_equal(v, e))),
        Op::Nin(set) => !candidates(found).any(|v| set.iter().any(|e| values_equal(v, e))),
        Op::Between(lo, hi) => candidates(found).any(|v| {
            compare(v, lo).is_some_and(|o| o != Ordering::Less)
                && compare(v, hi).is_some_and(|o| o != Ordering::Greater)
        }),
        Op::Exists(expected) => found.is_empty() != *expected,
        Op::Begin(prefix) => {
            candidates(found).any(|v| v.as_str().is_some_and(|s| s.starts_with(prefix.as_str())))
        }
        Op::ICaseEq(expected) => {
            candidates(found).any(|v| v.as_str().is_some_and(|s| s.to_lowercase() == *expected))
        }
        Op::ICaseIn(set) => candidates(found).any(|v| {
            v.as_str()
                .is_some_and(|s| set.contains(&s.to_lowercase()))
        }),
        Op::Regex(re) => candidates(found).any(|v| v.as_str().is_some_and(|s| re.is_match(s))),
        Op::Not(inner) => !eval(inner, found),
        Op::All(ops) => ops.iter().all(|op| eval(op, found)),
    }
}

/// Equality with numeric values compared across widths.
pub(crate) fn values_equal(a: &Value, b: &Value) -> bool {
    if a.is_numeric() && b.is_numeric() {
        return compare(a, b) == Some(Ordering::Equal);
    }
    a == b
}

/// Orders two values of compatible types.
pub(crate) fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Int32(_) | Value::Int64(_), Value::Int32(_) | Value::Int64(_)) => {
            Some(a.as_i64()?.cmp(&b.as_i64()?))
        }
        _ if a.is_numeric() && b.is_numeric() => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::DateTime(x), Value::DateTime(y)) => Some(x.cmp(y)),
        (Value::ObjectId(x), Value::ObjectId(y)) => Some(x.cmp(y)),
        (Value::Boolean(x), Value::Boolean(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ejdb_bson::Regex as BsonRegex;

    fn item() -> Document {
        Document::new()
            .with("_id", ObjectId::from_bytes([1; 12]))
            .with("name", "Pen")
            .with("qty", 5i32)
            .with("price", 2.5f64)
            .with("tags", vec!["red", "blue"])
            .with(
                "dims",
                Document::new().with("w", 10i64).with("h", 3i32),
            )
            .with(
                "parts",
                vec![
                    Value::Document(Document::new().with("sku", "a1")),
                    Value::Document(Document::new().with("sku", "b2")),
                ],
            )
    }

    fn matches(query: Document) -> bool {
        Matcher::compile(&query).unwrap().matches(&item())
    }

    fn op(name: &str, operand: impl Into<Value>) -> Document {
        Document::new().with(name, operand)
    }

    #[test]
    fn empty_query_matches_everything() {
        assert!(Matcher::compile(&Document::new()).unwrap().is_empty());
        assert!(matches(Document::new()));
    }

    #[test]
    fn equality() {
        assert!(matches(Document::new().with("name", "Pen")));
        assert!(!matches(Document::new().with("name", "pen")));
        assert!(matches(Document::new().with("qty", 5i64)));
        assert!(matches(Document::new().with("qty", 5.0f64)));
        assert!(!matches(Document::new().with("missing", 1i32)));
    }

    #[test]
    fn arrays_match_any_element() {
        assert!(matches(Document::new().with("tags", "blue")));
        assert!(matches(Document::new().with("tags", vec!["red", "blue"])));
        assert!(matches(Document::new().with("tags.0", "red")));
        assert!(matches(Document::new().with("parts.sku", "b2")));
    }

    #[test]
    fn dotted_paths() {
        assert!(matches(Document::new().with("dims.w", 10i32)));
        assert!(!matches(Document::new().with("dims.w", 11i32)));
    }

    #[test]
    fn comparisons() {
        assert!(matches(Document::new().with("qty", op("$gt", 4i32))));
        assert!(!matches(Document::new().with("qty", op("$gt", 5i32))));
        assert!(matches(Document::new().with("qty", op("$gte", 5i32))));
        assert!(matches(Document::new().with("price", op("$lt", 3i32))));
        assert!(matches(Document::new().with("price", op("$lte", 2.5f64))));
        assert!(matches(
            Document::new().with("qty", op("$gt", 1i32).with("$lt", 10i32))
        ));
        assert!(matches(Document::new().with("qty", op("$ne", 4i32))));
        assert!(matches(Document::new().with("missing", op("$ne", 4i32))));
    }

    #[test]
    fn set_operators() {
        assert!(matches(Document::new().with("qty", op("$in", vec![1i32, 5i32]))));
        assert!(!matches(Document::new().with("qty", op("$nin", vec![5i32]))));
        assert!(matches(Document::new().with("tags", op("$in", vec!["blue"]))));
        assert!(matches(Document::new().with("qty", op("$bt", vec![5i32, 6i32]))));
        assert!(!matches(Document::new().with("qty", op("$bt", vec![6i32, 9i32]))));
    }

    #[test]
    fn string_operators() {
        assert!(matches(Document::new().with("name", op("$begin", "Pe"))));
        assert!(matches(Document::new().with("name", op("$icase", "PEN"))));
        assert!(matches(
            Document::new().with("name", op("$icase", op("$in", vec!["x", "pEn"])))
        ));
        let re = Value::Regex(BsonRegex {
            pattern: "^p".into(),
            options: "i".into(),
        });
        assert!(matches(Document::new().with("name", re)));
    }

    #[test]
    fn exists_and_not() {
        assert!(matches(Document::new().with("qty", op("$exists", true))));
        assert!(matches(Document::new().with("nope", op("$exists", false))));
        assert!(matches(Document::new().with("qty", op("$not", op("$gt", 10i32)))));
        assert!(!matches(Document::new().with("name", op("$not", "Pen"))));
    }

    #[test]
    fn id_accepts_hex() {
        let hex = ObjectId::from_bytes([1; 12]).to_hex();
        assert!(matches(Document::new().with("_id", hex)));
        assert!(matches(
            Document::new().with("_id", op("$in", vec![ObjectId::from_bytes([1; 12])]))
        ));
    }

    #[test]
    fn compile_errors() {
        let code = |q: Document| Matcher::compile(&q).unwrap_err().code();
        assert_eq!(code(Document::new().with("$foo", 1i32)), JBEQINVALIDQCONTROL);
        assert_eq!(code(Document::new().with("a..b", 1i32)), JBEFPATHINVALID);
        assert_eq!(code(Document::new().with("a", op("$in", 1i32))), JBEQINOPNOTARRAY);
        assert_eq!(
            code(Document::new().with("a", op("$bt", vec![1i32]))),
            JBEQINOPNOTARRAY
        );
        assert_eq!(code(Document::new().with("a", op("$bogus", 1i32))), JBEQERROR);
        assert_eq!(code(Document::new().with("a", op("$begin", 1i32))), JBEQERROR);
        let bad = Value::Regex(BsonRegex {
            pattern: "(".into(),
            options: String::new(),
        });
        assert_eq!(code(Document::new().with("a", bad)), JBEQINVALIDQRX);
    }

    #[test]
    fn compare_orders_mixed_numbers() {
        assert_eq!(compare(&Value::Int32(2), &Value::Int64(3)), Some(Ordering::Less));
        assert_eq!(compare(&Value::Double(2.5), &Value::Int32(2)), Some(Ordering::Greater));
        assert_eq!(compare(&Value::from("a"), &Value::Int32(1)), None);
    }
}
