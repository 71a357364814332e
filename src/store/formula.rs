//! Formula filters for record queries.
//!
//! A `Formula` mirrors the hosted store's `filterByFormula` language closely
//! enough to render to it (for logs and remote stores) while also being
//! evaluated locally by `MemoryStore` and `SqliteStore`.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;
use std::fmt;

use super::Record;

/// Normalize a human key for comparison: trimmed and case-folded.
pub fn normalize_key(s: &str) -> String {
    s.trim().to_lowercase()
}

/// A filter over the fields of a record.
#[derive(Debug, Clone, PartialEq)]
pub enum Formula {
    /// Matches every record
    All,
    /// `{field} = value`
    Eq(String, Value),
    /// `LOWER(TRIM({field})) = 'value'`, compared after normalizing both sides
    NormalizedEq(String, String),
    /// Linked-record field contains the given record id
    Links(String, String),
    /// `IS_AFTER({field}, time)`, strictly after
    After(String, DateTime<Utc>),
    /// `IS_BEFORE({field}, time)`, strictly before
    Before(String, DateTime<Utc>),
    /// `RECORD_ID() = 'id'`
    RecordId(String),
    And(Vec<Formula>),
    Or(Vec<Formula>),
}

impl Formula {
    pub fn eq(field: &str, value: impl Into<Value>) -> Self {
        Formula::Eq(field.to_string(), value.into())
    }

    pub fn normalized_eq(field: &str, value: &str) -> Self {
        Formula::NormalizedEq(field.to_string(), normalize_key(value))
    }

    pub fn links(field: &str, id: &str) -> Self {
        Formula::Links(field.to_string(), id.to_string())
    }

    pub fn after(field: &str, time: DateTime<Utc>) -> Self {
        Formula::After(field.to_string(), time)
    }

    pub fn before(field: &str, time: DateTime<Utc>) -> Self {
        Formula::Before(field.to_string(), time)
    }

    /// Match any of the given record ids.
    pub fn any_id<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Formula::Or(ids.into_iter().map(|id| Formula::RecordId(id.into())).collect())
    }

    /// Evaluate against a record.
    pub fn matches(&self, record: &Record) -> bool {
        match self {
            Formula::All => true,
            Formula::Eq(field, expected) => match record.fields.get(field) {
                Some(actual) => actual == expected,
                None => expected.is_null() || *expected == Value::Bool(false),
            },
            Formula::NormalizedEq(field, expected) => record
                .fields
                .get(field)
                .and_then(Value::as_str)
                .is_some_and(|actual| normalize_key(actual) == normalize_key(expected)),
            Formula::Links(field, id) => match record.fields.get(field) {
                Some(Value::Array(items)) => items.iter().any(|v| v.as_str() == Some(id)),
                Some(Value::String(s)) => s == id,
                _ => false,
            },
            Formula::After(field, time) => field_time(record, field).is_some_and(|t| t > *time),
            Formula::Before(field, time) => field_time(record, field).is_some_and(|t| t < *time),
            Formula::RecordId(id) => record.id == *id,
            Formula::And(parts) => parts.iter().all(|f| f.matches(record)),
            // An empty OR matches nothing, like the store's OR() with no arguments
            Formula::Or(parts) => parts.iter().any(|f| f.matches(record)),
        }
    }
}

fn field_time(record: &Record, field: &str) -> Option<DateTime<Utc>> {
    let raw = record.fields.get(field)?.as_str()?;
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn quote(s: &str) -> String {
    format!("'{}'", s.replace('\\', "\\\\").replace('\'', "\\'"))
}

fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => quote(s),
        Value::Bool(true) => "TRUE()".to_string(),
        Value::Bool(false) => "FALSE()".to_string(),
        Value::Null => "BLANK()".to_string(),
        other => other.to_string(),
    }
}

fn render_list(f: &mut fmt::Formatter<'_>, name: &str, parts: &[Formula]) -> fmt::Result {
    write!(f, "{}(", name)?;
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", part)?;
    }
    write!(f, ")")
}

impl fmt::Display for Formula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Formula::All => write!(f, "TRUE()"),
            Formula::Eq(field, value) => write!(f, "{{{}}} = {}", field, render_value(value)),
            Formula::NormalizedEq(field, value) => {
                write!(f, "LOWER(TRIM({{{}}})) = {}", field, quote(value))
            }
            Formula::Links(field, id) => {
                write!(f, "FIND({}, ARRAYJOIN({{{}}}))", quote(id), field)
            }
            Formula::After(field, time) => write!(
                f,
                "IS_AFTER({{{}}}, {})",
                field,
                quote(&time.to_rfc3339_opts(SecondsFormat::Secs, true))
            ),
            Formula::Before(field, time) => write!(
                f,
                "IS_BEFORE({{{}}}, {})",
                field,
                quote(&time.to_rfc3339_opts(SecondsFormat::Secs, true))
            ),
            Formula::RecordId(id) => write!(f, "RECORD_ID() = {}", quote(id)),
            Formula::And(parts) => render_list(f, "AND", parts),
            Formula::Or(parts) => render_list(f, "OR", parts),
        }
    }
}
