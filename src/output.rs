//! Result types produced by an analysis run.
//!
//! Model output is untrusted, so the deserialisers here are deliberately
//! forgiving: a section given as a list of strings, a status spelled
//! `"Passed"` or a confidence of `"87.5"` are all accepted and normalised.
//! Anything that still does not fit is rejected and handled by the
//! transformer's fallback.

use crate::prompts::LEGAL_DOCUMENT_RULES;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::path::PathBuf;

/// Evidence text used for rule checks the model did not (usably) answer.
pub const FALLBACK_EVIDENCE: &str = "Could not process";

/// The seven fixed sections of an Act. Every key is always present.
///
/// Deserialisation reads a JSON object key by key: missing keys become "",
/// unknown keys are dropped, and for `record_keeping` the first non-empty
/// value among its spellings wins.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SectionMap {
    pub definitions: String,
    pub obligations: String,
    pub responsibilities: String,
    pub eligibility: String,
    pub payments: String,
    pub penalties: String,
    pub record_keeping: String,
}

const RECORD_KEEPING_KEYS: [&str; 4] = [
    "record_keeping",
    "record_keepin",
    "record-keeping",
    "recordkeeping",
];

impl<'de> Deserialize<'de> for SectionMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mut map = Map::<String, Value>::deserialize(deserializer)?;
        let mut take = |keys: &[&str]| -> String {
            keys.iter()
                .filter_map(|key| map.remove(*key))
                .map(value_to_text)
                .find(|text| !text.trim().is_empty())
                .unwrap_or_default()
        };

        Ok(Self {
            definitions: take(&["definitions"]),
            obligations: take(&["obligations"]),
            responsibilities: take(&["responsibilities"]),
            eligibility: take(&["eligibility"]),
            payments: take(&["payments"]),
            penalties: take(&["penalties"]),
            record_keeping: take(&RECORD_KEEPING_KEYS),
        })
    }
}

impl SectionMap {
    /// `(key, content)` pairs in report order.
    pub fn entries(&self) -> [(&'static str, &str); 7] {
        [
            ("definitions", &self.definitions),
            ("obligations", &self.obligations),
            ("responsibilities", &self.responsibilities),
            ("eligibility", &self.eligibility),
            ("payments", &self.payments),
            ("penalties", &self.penalties),
            ("record_keeping", &self.record_keeping),
        ]
    }

    /// Number of sections with non-empty content.
    pub fn filled(&self) -> usize {
        self.entries()
            .iter()
            .filter(|(_, v)| !v.trim().is_empty())
            .count()
    }
}

/// Verdict of a single rule check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleStatus {
    Pass,
    Fail,
}

impl<'de> Deserialize<'de> for RuleStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(match value {
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "pass" | "passed" | "passes" => RuleStatus::Pass,
                _ => RuleStatus::Fail,
            },
            Value::Bool(true) => RuleStatus::Pass,
            _ => RuleStatus::Fail,
        })
    }
}

/// One rule-compliance verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleCheck {
    #[serde(default, deserialize_with = "lenient_text")]
    pub rule: String,
    #[serde(default = "default_status")]
    pub status: RuleStatus,
    #[serde(default, deserialize_with = "lenient_text")]
    pub evidence: String,
    #[serde(default, deserialize_with = "lenient_confidence")]
    pub confidence: u8,
}

impl RuleCheck {
    /// The record substituted when the model gave no usable verdict.
    pub fn fallback(rule: &str) -> Self {
        Self {
            rule: rule.to_string(),
            status: RuleStatus::Fail,
            evidence: FALLBACK_EVIDENCE.to_string(),
            confidence: 0,
        }
    }

    /// Six failed records, one per fixed rule, in rule order.
    pub fn fallback_set() -> Vec<Self> {
        LEGAL_DOCUMENT_RULES
            .iter()
            .map(|rule| Self::fallback(rule))
            .collect()
    }
}

fn default_status() -> RuleStatus {
    RuleStatus::Fail
}

/// Timing and provenance of one run. Not part of the exported report.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisStats {
    /// Characters of raw extracted text.
    pub raw_chars: usize,
    /// Characters after cleaning.
    pub cleaned_chars: usize,
    /// Number of chunks the cleaned text was split into.
    pub chunk_count: usize,
    /// Chunk summaries were read from the cache.
    pub cache_hit: bool,
    /// Cache file consulted for this run, if caching was enabled.
    pub cache_path: Option<PathBuf>,
    /// Number of LLM calls made, excluding retries.
    pub llm_calls: usize,
    /// Wall-clock time of the whole run.
    pub total_duration_ms: u64,
    /// Time spent extracting text from the PDF (0 for `analyze_text`).
    pub extract_duration_ms: u64,
}

/// Everything one analysis run produces.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// Executive summary combined from the chunk summaries.
    pub summary: String,
    pub sections: SectionMap,
    pub rule_checks: Vec<RuleCheck>,
    /// One summary per chunk, in chunk order.
    pub chunk_summaries: Vec<String>,
    pub stats: AnalysisStats,
}

impl AnalysisResult {
    /// The view written to the report file.
    pub fn report(&self) -> Report<'_> {
        Report {
            summary: &self.summary,
            sections: &self.sections,
            rule_checks: &self.rule_checks,
        }
    }
}

/// The exported report: exactly `summary`, `sections` and `rule_checks`.
#[derive(Debug, Serialize)]
pub struct Report<'a> {
    pub summary: &'a str,
    pub sections: &'a SectionMap,
    pub rule_checks: &'a [RuleCheck],
}

// ── Lenient field readers ────────────────────────────────────────────────

fn lenient_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(value_to_text(Value::deserialize(deserializer)?))
}

fn value_to_text(value: Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s,
        Value::Array(items) => items
            .into_iter()
            .map(value_to_text)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("\n"),
        other => other.to_string(),
    }
}

fn lenient_confidence<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u8, D::Error> {
    let value = Value::deserialize(deserializer)?;
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().trim_end_matches('%').trim().parse::<f64>().ok(),
        _ => None,
    };
    Ok(number
        .filter(|n| n.is_finite())
        .map(|n| n.round().clamp(0.0, 100.0) as u8)
        .unwrap_or(0))
}
