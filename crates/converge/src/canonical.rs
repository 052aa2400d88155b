//! Canonical form for opaque JSON documents
//!
//! Two documents are equal when their canonical forms are byte-identical.
//! The canonical form sorts object keys, drops insignificant whitespace and
//! renders integral floats as integers, so the remote service re-encoding a
//! document never reads as a change.
//!
//! Elision rules make a field holding a default value equivalent to the
//! field being absent. They only ever affect comparison; the value that gets
//! recorded is untouched.

use crate::error::{Error, Result};
use serde_json::{Number, Value};
use std::fmt;

/// Deterministic serialization of a document
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanonicalForm(String);

impl CanonicalForm {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CanonicalForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Key(String),
    Each,
}

/// "A field at `path` equal to `value` is the same as the field being absent"
///
/// Paths are dot-separated keys; `[]` steps into every element of an
/// array. `"[].is_enabled"` addresses the `is_enabled` field of each
/// element of a top-level array, `"retry.enabled"` a nested field.
#[derive(Debug, Clone, PartialEq)]
pub struct ElisionRule {
    path: Vec<Segment>,
    value: Value,
}

impl ElisionRule {
    pub fn new(path: &str, value: Value) -> Self {
        let mut segments = Vec::new();
        for part in path.split('.').filter(|p| !p.is_empty()) {
            let mut key = part;
            let mut each = 0;
            while let Some(stripped) = key.strip_suffix("[]") {
                key = stripped;
                each += 1;
            }
            if !key.is_empty() {
                segments.push(Segment::Key(key.to_string()));
            }
            segments.extend(std::iter::repeat_n(Segment::Each, each));
        }
        Self {
            path: segments,
            value,
        }
    }

    /// Remove every field this rule matches from `document`
    pub fn apply(&self, document: &mut Value) {
        elide(document, &self.path, &self.value);
    }
}

fn elide(node: &mut Value, path: &[Segment], target: &Value) {
    match path {
        [] | [Segment::Each] => {}
        [Segment::Key(key)] => {
            if let Value::Object(map) = node
                && map.get(key).is_some_and(|v| same_value(v, target))
            {
                map.remove(key);
            }
        }
        [Segment::Key(key), rest @ ..] => {
            if let Some(child) = node.as_object_mut().and_then(|m| m.get_mut(key)) {
                elide(child, rest, target);
            }
        }
        [Segment::Each, rest @ ..] => {
            if let Value::Array(items) = node {
                for item in items {
                    elide(item, rest, target);
                }
            }
        }
    }
}

fn same_value(a: &Value, b: &Value) -> bool {
    canonicalize(a) == canonicalize(b)
}

/// Parse opaque-json text belonging to `attribute`
pub fn parse_document(attribute: &str, text: &str) -> Result<Value> {
    serde_json::from_str(text).map_err(|source| Error::MalformedDocument {
        attribute: attribute.to_string(),
        source,
    })
}

/// Interpret an attribute value as a document
///
/// A JSON string is document text and gets parsed; any other value is
/// already a structured document.
pub fn document_of(attribute: &str, value: &Value) -> Result<Value> {
    match value {
        Value::String(text) => parse_document(attribute, text),
        other => Ok(other.clone()),
    }
}

/// Text to record for a document value
///
/// Text is kept verbatim; structured values are serialized compactly.
pub fn document_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Canonical form of a document with no elision applied
pub fn canonicalize(value: &Value) -> CanonicalForm {
    let mut out = String::new();
    write_canonical(value, &mut out);
    CanonicalForm(out)
}

/// Canonical form of a document after applying `rules`
pub fn canonicalize_with(value: &Value, rules: &[ElisionRule]) -> CanonicalForm {
    if rules.is_empty() {
        return canonicalize(value);
    }
    let mut elided = value.clone();
    for rule in rules {
        rule.apply(&mut elided);
    }
    canonicalize(&elided)
}

/// Semantic equality of two structured documents under `rules`
pub fn equal(a: &Value, b: &Value, rules: &[ElisionRule]) -> bool {
    canonicalize_with(a, rules) == canonicalize_with(b, rules)
}

/// Semantic equality of two attribute values holding documents
///
/// Fails with `MalformedDocument` if either side is unparseable text.
pub fn equal_values(attribute: &str, a: &Value, b: &Value, rules: &[ElisionRule]) -> Result<bool> {
    let a = document_of(attribute, a)?;
    let b = document_of(attribute, b)?;
    Ok(equal(&a, &b, rules))
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(true) => out.push_str("true"),
        Value::Bool(false) => out.push_str("false"),
        Value::Number(n) => out.push_str(&canonical_number(n)),
        Value::String(_) => out.push_str(&value.to_string()),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (i, (key, item)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::from(key.as_str()).to_string());
                out.push(':');
                write_canonical(item, out);
            }
            out.push('}');
        }
    }
}

// Largest magnitude below which every integer is exactly representable
const EXACT_INTEGER_LIMIT: f64 = 9_007_199_254_740_992.0;

#[allow(clippy::float_cmp)]
fn canonical_number(n: &Number) -> String {
    if n.is_f64()
        && let Some(f) = n.as_f64()
        && f.is_finite()
        && f.trunc() == f
        && f.abs() < EXACT_INTEGER_LIMIT
    {
        return format!("{}", f as i64);
    }
    n.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(text: &str) -> Value {
        parse_document("doc", text).unwrap()
    }

    #[test]
    fn test_key_order_and_whitespace_are_ignored() {
        let prior = parse(r#"{"retry":{"attempts":3},"cache":{"mode":"simple"}}"#);
        let observed = parse(r#"{"cache": {"mode": "simple"}, "retry": {"attempts": 3}}"#);
        assert!(equal(&prior, &observed, &[]));
        assert_eq!(
            canonicalize(&prior).as_str(),
            r#"{"cache":{"mode":"simple"},"retry":{"attempts":3}}"#
        );
    }

    #[test]
    fn test_real_change_is_not_equal() {
        let prior = parse(r#"{"retry":{"attempts":3}}"#);
        let observed = parse(r#"{"retry":{"attempts":5}}"#);
        assert!(!equal(&prior, &observed, &[]));
    }

    #[test]
    fn test_array_order_is_significant() {
        assert!(!equal(&json!([1, 2]), &json!([2, 1]), &[]));
    }

    #[test]
    fn test_integral_floats_match_integers() {
        assert!(equal(&parse(r#"{"limit": 3.0}"#), &parse(r#"{"limit": 3}"#), &[]));
        assert!(!equal(&parse(r#"{"limit": 3.5}"#), &parse(r#"{"limit": 3}"#), &[]));
    }

    #[test]
    fn test_enabled_default_is_elided() {
        let rules = [ElisionRule::new("[].is_enabled", json!(true))];
        let prior = parse(r#"[{"id":"x","is_enabled":true}]"#);
        let observed = parse(r#"[{"id":"x"}]"#);
        assert!(equal(&prior, &observed, &rules));
    }

    #[test]
    fn test_disabled_flag_is_not_elided() {
        let rules = [ElisionRule::new("[].is_enabled", json!(true))];
        let prior = parse(r#"[{"id":"x","is_enabled":false}]"#);
        let observed = parse(r#"[{"id":"x"}]"#);
        assert!(!equal(&prior, &observed, &rules));
    }

    #[test]
    fn test_elision_does_not_touch_input() {
        let rules = [ElisionRule::new("[].is_enabled", json!(true))];
        let prior = parse(r#"[{"id":"x","is_enabled":true}]"#);
        let _ = canonicalize_with(&prior, &rules);
        assert_eq!(prior, json!([{"id": "x", "is_enabled": true}]));
    }

    #[test]
    fn test_nested_elision_path() {
        let rule = ElisionRule::new("hooks[].options.strict", json!(false));
        let mut doc = json!({"hooks": [{"options": {"strict": false, "n": 1}}, {"options": {"strict": true}}]});
        rule.apply(&mut doc);
        assert_eq!(
            doc,
            json!({"hooks": [{"options": {"n": 1}}, {"options": {"strict": true}}]})
        );
    }

    #[test]
    fn test_malformed_document() {
        let err = parse_document("checks", "[{\"id\": ").unwrap_err();
        assert!(matches!(err, Error::MalformedDocument { ref attribute, .. } if attribute == "checks"));
    }

    #[test]
    fn test_document_of_accepts_structured_values() {
        let structured = json!({"a": 1});
        assert_eq!(document_of("config", &structured).unwrap(), structured);
        assert_eq!(
            document_of("config", &json!("{\"a\": 1}")).unwrap(),
            structured
        );
    }

    #[test]
    fn test_document_text_keeps_original_formatting() {
        let text = "{ \"a\" : 1 }";
        assert_eq!(document_text(&json!(text)), text);
        assert_eq!(document_text(&json!({"a": 1})), r#"{"a":1}"#);
    }

    #[test]
    fn test_equal_values_reports_bad_text() {
        let err = equal_values("config", &json!("{"), &json!({}), &[]).unwrap_err();
        assert!(matches!(err, Error::MalformedDocument { .. }));
    }

    #[test]
    fn test_string_escaping_is_canonical() {
        let a = parse(r#"{"msg":"line\nbreak é"}"#);
        let b = json!({"msg": "line\nbreak é"});
        assert!(equal(&a, &b, &[]));
    }
}
