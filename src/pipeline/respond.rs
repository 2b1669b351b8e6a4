//! Response parsing: turn model text into structured values, or say why not.
//!
//! [`parse`] is the strict half: locate the payload, parse JSON, check the
//! top-level shape, deserialise. It returns a [`ParseError`] describing the
//! first thing that went wrong. [`parse_or_else`] is the absorbing half used
//! by transformers: it logs the error and substitutes the caller's fallback.

use crate::error::ParseError;
use crate::progress::Stage;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::warn;

/// The JSON type expected at the top level of a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Object,
    Array,
}

impl Shape {
    fn name(self) -> &'static str {
        match self {
            Shape::Object => "object",
            Shape::Array => "array",
        }
    }

    fn matches(self, value: &Value) -> bool {
        match self {
            Shape::Object => value.is_object(),
            Shape::Array => value.is_array(),
        }
    }
}

// Any language tag (json, JSON, javascript, …) or none; contents up to the
// first closing fence.
static RE_FENCED_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```[A-Za-z0-9_+-]*[ \t]*\r?\n?(.*?)```").expect("valid regex"));

/// The part of a response that should contain the structured data: the
/// contents of the first fenced code block if there is one, else the whole
/// response, trimmed either way.
pub fn extract_payload(response: &str) -> &str {
    match RE_FENCED_BLOCK.captures(response).and_then(|c| c.get(1)) {
        Some(m) => m.as_str().trim(),
        None => response.trim(),
    }
}

/// Parse a model response into `T`, requiring the given top-level shape.
pub fn parse<T: DeserializeOwned>(response: &str, shape: Shape) -> Result<T, ParseError> {
    let payload = extract_payload(response);
    if payload.is_empty() {
        return Err(ParseError::EmptyResponse);
    }

    let value: Value = serde_json::from_str(payload).map_err(|e| ParseError::InvalidJson {
        detail: e.to_string(),
    })?;

    if !shape.matches(&value) {
        return Err(ParseError::WrongShape {
            expected: shape.name(),
            found: json_type_name(&value),
        });
    }

    serde_json::from_value(value).map_err(|e| ParseError::Schema {
        detail: e.to_string(),
    })
}

/// [`parse`], with any [`ParseError`] logged and replaced by `fallback()`.
pub fn parse_or_else<T, F>(response: &str, shape: Shape, stage: Stage, fallback: F) -> T
where
    T: DeserializeOwned,
    F: FnOnce() -> T,
{
    match parse(response, shape) {
        Ok(value) => value,
        Err(e) => {
            warn!("{}: unusable model response, using fallback: {}", stage, e);
            warn!("{}: response text: {}", stage, truncate(response, 500));
            fallback()
        }
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}\u{2026}", &s[..idx]),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn payload_from_json_fence() {
        let r = "Here you go:\n```json\n{\"a\": 1}\n```\nThanks";
        assert_eq!(extract_payload(r), "{\"a\": 1}");
    }

    #[test]
    fn payload_from_bare_fence() {
        assert_eq!(extract_payload("```\n[1, 2]\n```"), "[1, 2]");
        assert_eq!(extract_payload("```[1]```"), "[1]");
    }

    #[test]
    fn payload_without_fence_is_trimmed_raw() {
        assert_eq!(extract_payload("  {\"a\": 1}\n"), "{\"a\": 1}");
    }

    #[test]
    fn parse_object() {
        let m: BTreeMap<String, u32> = parse("```json\n{\"a\": 1}\n```", Shape::Object).unwrap();
        assert_eq!(m["a"], 1);
    }

    #[test]
    fn parse_errors() {
        assert_eq!(
            parse::<Value>("   ", Shape::Object).unwrap_err(),
            ParseError::EmptyResponse
        );
        assert!(matches!(
            parse::<Value>("I could not find any sections.", Shape::Object).unwrap_err(),
            ParseError::InvalidJson { .. }
        ));
        assert_eq!(
            parse::<Value>("{\"a\": 1}", Shape::Array).unwrap_err(),
            ParseError::WrongShape {
                expected: "array",
                found: "object"
            }
        );
        assert!(matches!(
            parse::<Vec<u8>>("[\"x\"]", Shape::Array).unwrap_err(),
            ParseError::Schema { .. }
        ));
    }

    #[test]
    fn parse_or_else_uses_fallback() {
        let v: Vec<u8> = parse_or_else("nope", Shape::Array, Stage::RuleChecks, || vec![7]);
        assert_eq!(v, vec![7]);
        let v: Vec<u8> = parse_or_else("[1]", Shape::Array, Stage::RuleChecks, || vec![7]);
        assert_eq!(v, vec![1]);
    }

    #[test]
    fn truncate_is_char_safe() {
        assert_eq!(truncate("\u{e9}\u{e9}\u{e9}", 2), "\u{e9}\u{e9}\u{2026}");
        assert_eq!(truncate("ab", 5), "ab");
    }
}
