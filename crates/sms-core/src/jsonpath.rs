//! Dotted-path lookup into a JSON tree, for KPI measurements that pull a
//! value out of an arbitrary web endpoint's response.
//!
//! Supported syntax: `field1.field2[0].field3`. An index segment may also be
//! written as its own token (`field.[0]` is equivalent to `field[0]`), and a
//! path may start with an index when the root is an array (`[2].name`).

use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

fn indexed_token() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^([A-Za-z0-9_-]+)\[(\d+)\]$").unwrap())
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Key(String),
    Index(usize),
}

fn parse_path(path: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    for token in path.split('.').filter(|t| !t.is_empty()) {
        if let Some(caps) = indexed_token().captures(token) {
            segments.push(Segment::Key(caps[1].to_string()));
            // unwrap: the regex only matches digit runs
            segments.push(Segment::Index(caps[2].parse().unwrap()));
        } else if let Some(inner) = token
            .strip_prefix('[')
            .and_then(|t| t.strip_suffix(']'))
        {
            match inner.parse() {
                Ok(index) => segments.push(Segment::Index(index)),
                Err(_) => segments.push(Segment::Key(token.to_string())),
            }
        } else {
            segments.push(Segment::Key(token.to_string()));
        }
    }
    segments
}

/// Resolve `path` inside `value`. Returns `None` when any segment is missing
/// or of the wrong shape; never an error.
pub fn resolve_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    if path.trim().is_empty() {
        return None;
    }
    let mut current = value;
    for segment in parse_path(path) {
        current = match segment {
            Segment::Key(key) => current.get(key.as_str())?,
            Segment::Index(index) => current.get(index)?,
        };
    }
    Some(current)
}

/// Render a resolved leaf as the string stored in "Measured value".
/// Strings are taken verbatim; numbers and booleans via their JSON rendering.
/// Arrays and objects are not measurable values.
pub fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}
