//! Rule checks: one compliance verdict per fixed rule.
//!
//! ## Reconciliation
//!
//! Models reorder, rename, drop and invent rules. Under
//! [`SchemaPolicy::Reconcile`] the parsed records are mapped back onto the
//! six fixed rules:
//!
//! 1. a record whose rule text matches (ignoring case, whitespace runs and
//!    trailing punctuation) is used, with its `rule` set to the canonical text;
//! 2. failing that, if exactly six records came back, the one at the same
//!    position is used;
//! 3. otherwise the rule gets the fallback record.
//!
//! Each record is used at most once. The result is always six records in
//! rule order.
//!
//! Array elements are read one by one, so a stray note or `null` in the
//! array costs only that element.

use crate::config::SchemaPolicy;
use crate::error::DigestError;
use crate::output::{RuleCheck, RuleStatus};
use crate::pipeline::llm::{generate, CallPolicy, LlmClient};
use crate::pipeline::respond::{parse_or_else, Shape};
use crate::progress::Stage;
use crate::prompts::{rule_check_prompt, LEGAL_DOCUMENT_RULES};
use serde_json::Value;
use tracing::{debug, info, warn};

/// Check the cleaned document text against the fixed rules.
pub async fn apply_rule_checks(
    client: &dyn LlmClient,
    text: &str,
    policy: &CallPolicy,
    schema: SchemaPolicy,
) -> Result<Vec<RuleCheck>, DigestError> {
    info!("Checking {} rules", LEGAL_DOCUMENT_RULES.len());
    let response = generate(client, &rule_check_prompt(text), policy, Stage::RuleChecks).await?;

    let parsed: Option<Vec<Value>> =
        parse_or_else(&response, Shape::Array, Stage::RuleChecks, || None);

    let checks = match parsed {
        None => RuleCheck::fallback_set(),
        Some(items) => {
            let records = records_from(items);
            match schema {
                SchemaPolicy::Reconcile => reconcile(records),
                SchemaPolicy::PassThrough => records,
            }
        }
    };
    info!(
        "Rule checks: {}/{} pass",
        checks
            .iter()
            .filter(|c| c.status == RuleStatus::Pass)
            .count(),
        checks.len()
    );
    Ok(checks)
}

/// Convert array elements to records one at a time. Elements that are not
/// records (notes, `null`, bare strings) are skipped.
pub fn records_from(items: Vec<Value>) -> Vec<RuleCheck> {
    let total = items.len();
    let records: Vec<RuleCheck> = items
        .into_iter()
        .enumerate()
        .filter_map(|(idx, item)| {
            if !item.is_object() {
                warn!("Rule check element {} is not an object, skipping", idx + 1);
                return None;
            }
            match serde_json::from_value::<RuleCheck>(item) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!("Rule check element {} unreadable ({}), skipping", idx + 1, e);
                    None
                }
            }
        })
        .collect();
    if records.len() < total {
        debug!("Kept {}/{} rule check elements", records.len(), total);
    }
    records
}

/// Map model records onto the fixed rules; see the module docs.
pub fn reconcile(records: Vec<RuleCheck>) -> Vec<RuleCheck> {
    let positional = records.len() == LEGAL_DOCUMENT_RULES.len();
    let keys: Vec<String> = records.iter().map(|r| rule_key(&r.rule)).collect();
    let mut slots: Vec<Option<RuleCheck>> = records.into_iter().map(Some).collect();

    LEGAL_DOCUMENT_RULES
        .iter()
        .enumerate()
        .map(|(idx, rule)| {
            let wanted = rule_key(rule);
            let by_text = keys
                .iter()
                .enumerate()
                .position(|(i, k)| *k == wanted && slots[i].is_some());

            let taken = match by_text {
                Some(i) => slots[i].take(),
                None if positional && !LEGAL_DOCUMENT_RULES.iter().any(|r| rule_key(r) == keys[idx]) => {
                    debug!("Rule {} matched by position", idx + 1);
                    slots[idx].take()
                }
                None => None,
            };

            match taken {
                Some(mut record) => {
                    record.rule = rule.to_string();
                    record
                }
                None => {
                    warn!("No verdict for rule '{}', using fallback", rule);
                    RuleCheck::fallback(rule)
                }
            }
        })
        .collect()
}

/// Comparison key for rule text: lowercase, single spaces, no trailing
/// punctuation.
fn rule_key(rule: &str) -> String {
    rule.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim_end_matches(|c: char| c.is_ascii_punctuation())
        .trim_end()
        .to_lowercase()
}
