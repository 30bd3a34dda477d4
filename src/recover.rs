//! Multi-strategy recovery of flight records from malformed JSON text.
//!
//! VRA exports arrive with inconsistent quirks: missing enclosing
//! brackets, objects concatenated without separators, stray BOMs and
//! trailing commas. Each strategy below is tried in order and the first
//! one that yields a non-empty sequence of objects wins. Nothing in this
//! module returns an error; an unrecoverable file becomes an empty
//! sequence plus a warning diagnostic.

use regex::Regex;
use serde_json::{Map, Value};
use tracing::debug;

/// A single flat record as recovered from the input: field name → scalar.
pub type RawRecord = Map<String, Value>;

/// Which recovery strategy produced the records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Content was a proper JSON array of objects.
    Array,
    /// Newline-delimited JSON, one object per line.
    Lines,
    /// One object per line with trailing commas, re-joined and wrapped.
    LineRepair,
    /// Glued `}{` objects separated, brackets added, trailing comma removed.
    StructuralRepair,
    /// Last resort: every single-level `{...}` substring collected.
    Extraction,
}

/// Outcome of a recovery attempt over one piece of text.
#[derive(Debug, Default)]
pub struct Recovery {
    pub records: Vec<RawRecord>,
    pub strategy: Option<Strategy>,
    pub warnings: Vec<String>,
}

impl Recovery {
    fn from(records: Vec<RawRecord>, strategy: Strategy) -> Self {
        Recovery {
            records,
            strategy: Some(strategy),
            warnings: Vec::new(),
        }
    }

    fn unrecoverable(warning: String) -> Self {
        Recovery {
            records: Vec::new(),
            strategy: None,
            warnings: vec![warning],
        }
    }
}

/// Recovers an ordered sequence of flat records from `text`.
///
/// Never fails: a file that defeats every strategy yields an empty
/// `Recovery` carrying a warning string instead.
pub fn recover_records(text: &str) -> Recovery {
    let raw = text.trim_start_matches('\u{feff}').trim();
    if raw.is_empty() {
        return Recovery::default();
    }

    // 1. Proper JSON array.
    if let Ok(value) = serde_json::from_str::<Value>(raw) {
        if let Value::Array(items) = value {
            match into_objects(items) {
                Some(records) if !records.is_empty() => {
                    return Recovery::from(records, Strategy::Array);
                }
                Some(_) => {} // empty array, let later strategies confirm
                None => {
                    // A valid array of scalars is not a record set.
                    return Recovery::unrecoverable(
                        "parsed as a JSON array but its elements are not objects".to_string(),
                    );
                }
            }
        }
        // A top-level object or scalar falls through to the line-based
        // strategies, which handle the one-object case.
    }

    // 2. NDJSON: every non-empty line is an object.
    if let Some(records) = try_lines(raw) {
        return Recovery::from(records, Strategy::Lines);
    }

    // 3. One object per line with trailing commas, missing the array.
    if let Some(records) = try_line_repair(raw) {
        return Recovery::from(records, Strategy::LineRepair);
    }

    // 4. Glued objects and missing brackets.
    if let Some(records) = try_structural_repair(raw) {
        return Recovery::from(records, Strategy::StructuralRepair);
    }

    // 5. Extract whatever single-level objects remain.
    if let Some(records) = try_extraction(raw) {
        return Recovery::from(records, Strategy::Extraction);
    }

    debug!(len = raw.len(), "all recovery strategies exhausted");
    Recovery::unrecoverable(
        "content could not be interpreted as flight records by any recovery strategy".to_string(),
    )
}

/// Converts array items into records, or `None` if any item is not an object.
fn into_objects(items: Vec<Value>) -> Option<Vec<RawRecord>> {
    items
        .into_iter()
        .map(|v| match v {
            Value::Object(map) => Some(map),
            _ => None,
        })
        .collect()
}

fn parse_as_records(candidate: &str) -> Option<Vec<RawRecord>> {
    let value: Value = serde_json::from_str(candidate).ok()?;
    match value {
        Value::Array(items) => into_objects(items).filter(|r| !r.is_empty()),
        _ => None,
    }
}

fn try_lines(raw: &str) -> Option<Vec<RawRecord>> {
    let mut records = Vec::new();
    for line in raw.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<Value>(line) {
            Ok(Value::Object(map)) => records.push(map),
            _ => return None,
        }
    }
    if records.is_empty() { None } else { Some(records) }
}

fn try_line_repair(raw: &str) -> Option<Vec<RawRecord>> {
    // Applies to line-delimited text missing its enclosing array.
    if !raw.contains("\n{") || raw.starts_with('[') {
        return None;
    }
    let lines: Vec<&str> = raw
        .lines()
        .map(|l| l.trim().trim_end_matches(','))
        .filter(|l| !l.is_empty())
        .collect();
    if lines.is_empty() || !lines.iter().all(|l| l.starts_with('{') && l.ends_with('}')) {
        return None;
    }
    let candidate = format!("[{}]", lines.join(","));
    parse_as_records(&candidate)
}

fn try_structural_repair(raw: &str) -> Option<Vec<RawRecord>> {
    let glued = Regex::new(r"\}\s*\{").unwrap();
    let mut fixed = glued.replace_all(raw, "},{").into_owned();
    if !fixed.starts_with('[') {
        fixed.insert(0, '[');
    }
    if !fixed.ends_with(']') {
        fixed.push(']');
    }
    let trailing = Regex::new(r",\s*\]").unwrap();
    let fixed = trailing.replace_all(&fixed, "]").into_owned();
    parse_as_records(&fixed)
}

fn try_extraction(raw: &str) -> Option<Vec<RawRecord>> {
    let object = Regex::new(r"\{[^{}]*\}").unwrap();
    let objects: Vec<&str> = object.find_iter(raw).map(|m| m.as_str()).collect();
    if objects.is_empty() {
        return None;
    }
    let candidate = format!("[{}]", objects.join(","));
    parse_as_records(&candidate)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field_i64(record: &RawRecord, key: &str) -> i64 {
        record.get(key).and_then(Value::as_i64).unwrap()
    }

    #[test]
    fn test_empty_input_returns_empty() {
        let rec = recover_records("");
        assert!(rec.records.is_empty());
        assert!(rec.strategy.is_none());
        assert!(rec.warnings.is_empty());
    }

    #[test]
    fn test_whitespace_only_returns_empty() {
        let rec = recover_records("  \n\t  \n");
        assert!(rec.records.is_empty());
        assert!(rec.warnings.is_empty());
    }

    #[test]
    fn test_valid_array_round_trips() {
        let input = r#"[{"a":1,"b":"x"},{"a":2,"b":"y"},{"a":3,"b":"z"}]"#;
        let rec = recover_records(input);
        assert_eq!(rec.strategy, Some(Strategy::Array));
        assert_eq!(rec.records.len(), 3);
        assert_eq!(field_i64(&rec.records[0], "a"), 1);
        assert_eq!(rec.records[2].get("b").unwrap(), "z");
    }

    #[test]
    fn test_ndjson_one_object_per_line() {
        let input = "{\"a\":1}\n{\"a\":2}\n\n{\"a\":3}\n";
        let rec = recover_records(input);
        assert_eq!(rec.strategy, Some(Strategy::Lines));
        assert_eq!(rec.records.len(), 3);
        assert_eq!(field_i64(&rec.records[1], "a"), 2);
    }

    #[test]
    fn test_single_object_recovered_as_one_record() {
        let rec = recover_records(r#"{"a":1}"#);
        assert_eq!(rec.records.len(), 1);
        assert_eq!(field_i64(&rec.records[0], "a"), 1);
    }

    #[test]
    fn test_lines_with_trailing_commas_repaired() {
        let input = "{\"a\":1},\n{\"a\":2},\n{\"a\":3}";
        let rec = recover_records(input);
        assert_eq!(rec.strategy, Some(Strategy::LineRepair));
        assert_eq!(rec.records.len(), 3);
    }

    #[test]
    fn test_glued_objects_without_array() {
        let rec = recover_records(r#"{"a":1}{"a":2}"#);
        assert_eq!(rec.strategy, Some(Strategy::StructuralRepair));
        assert_eq!(rec.records.len(), 2);
        assert_eq!(field_i64(&rec.records[0], "a"), 1);
        assert_eq!(field_i64(&rec.records[1], "a"), 2);
    }

    #[test]
    fn test_array_with_trailing_comma_repaired() {
        let input = r#"[{"a":1},{"a":2},]"#;
        let rec = recover_records(input);
        assert_eq!(rec.strategy, Some(Strategy::StructuralRepair));
        assert_eq!(rec.records.len(), 2);
    }

    #[test]
    fn test_bom_is_stripped() {
        let input = "\u{feff}[{\"a\":1}]";
        let rec = recover_records(input);
        assert_eq!(rec.strategy, Some(Strategy::Array));
        assert_eq!(rec.records.len(), 1);
    }

    #[test]
    fn test_extraction_from_surrounding_noise() {
        let input = "garbage before {\"a\":1} middle {\"a\":2} after";
        let rec = recover_records(input);
        assert_eq!(rec.strategy, Some(Strategy::Extraction));
        assert_eq!(rec.records.len(), 2);
    }

    #[test]
    fn test_scalar_array_is_invalid_with_warning() {
        let rec = recover_records("[1,2,3]");
        assert!(rec.records.is_empty());
        assert_eq!(rec.warnings.len(), 1);
        assert!(rec.warnings[0].contains("not objects"));
    }

    #[test]
    fn test_unrecoverable_garbage_warns_and_returns_empty() {
        let rec = recover_records("not json at all");
        assert!(rec.records.is_empty());
        assert!(rec.strategy.is_none());
        assert_eq!(rec.warnings.len(), 1);
    }

    #[test]
    fn test_recovery_is_deterministic() {
        let input = "{\"a\":1},\n{\"b\":2},\n{\"c\":3}";
        let first = recover_records(input);
        let second = recover_records(input);
        assert_eq!(first.strategy, second.strategy);
        assert_eq!(first.records, second.records);
    }

    #[test]
    fn test_field_values_unchanged_after_recovery() {
        let input = r#"[{"ICAOAeródromoOrigem":"SBSP","NúmeroVoo":1234,"taxa":0.5}]"#;
        let rec = recover_records(input);
        let r = &rec.records[0];
        assert_eq!(r.get("ICAOAeródromoOrigem").unwrap(), "SBSP");
        assert_eq!(field_i64(r, "NúmeroVoo"), 1234);
        assert_eq!(r.get("taxa").unwrap().as_f64().unwrap(), 0.5);
    }
}
