//! Offline pipeline tests: the full `analyze_text` flow against a scripted
//! in-memory LLM client. No API key, no pdfium.

use async_trait::async_trait;
use legis_digest::{
    analyze_text, AnalysisConfig, AnalysisProgressCallback, CacheKeying, DigestError, LlmClient,
    RuleCheck, RuleStatus, SchemaPolicy, SectionMap, Stage,
};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio_test::{assert_err, assert_ok};

// ── Scripted client ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Chunk,
    Combine,
    Sections,
    Rules,
}

fn kind_of(prompt: &str) -> Kind {
    if prompt.starts_with("Summarize the following text") {
        Kind::Chunk
    } else if prompt.starts_with("Using these sub-summaries") {
        Kind::Combine
    } else if prompt.starts_with("Extract the following") {
        Kind::Sections
    } else if prompt.starts_with("Analyze the following legal document") {
        Kind::Rules
    } else {
        panic!("unrecognised prompt: {prompt:.80}")
    }
}

const SECTIONS_JSON: &str = r#"```json
{
  "definitions": "\"Minister\" means the Minister responsible for social security.",
  "obligations": ["Employers must register", "Employers must contribute monthly"],
  "responsibilities": "The Minister shall maintain the Fund.",
  "eligibility": "Residents aged 18 or over.",
  "payments": "Benefit equals 40% of average insurable earnings.",
  "penalties": "A fine not exceeding 5000 dollars.",
  "record_keepin": "Employers keep wage records for six years."
}
```"#;

fn rules_json() -> String {
    let records: Vec<_> = legis_digest::prompts::LEGAL_DOCUMENT_RULES
        .iter()
        .rev()
        .map(|rule| {
            serde_json::json!({
                "rule": rule,
                "status": "pass",
                "evidence": format!("Evidence for: {rule}"),
                "confidence": 90,
            })
        })
        .collect();
    format!(
        "Here are the results:\n```json\n{}\n```",
        serde_json::to_string_pretty(&records).unwrap()
    )
}

struct ScriptedClient {
    sections: String,
    rules: String,
    /// Number of rule-check calls that fail before one succeeds.
    rule_failures: AtomicUsize,
    calls: Mutex<Vec<(Kind, String, f32)>>,
}

impl ScriptedClient {
    fn new() -> Self {
        Self {
            sections: SECTIONS_JSON.to_string(),
            rules: rules_json(),
            rule_failures: AtomicUsize::new(0),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn with_sections(mut self, response: &str) -> Self {
        self.sections = response.to_string();
        self
    }

    fn with_rules(mut self, response: &str) -> Self {
        self.rules = response.to_string();
        self
    }

    fn failing_rules(self, times: usize) -> Self {
        self.rule_failures.store(times, Ordering::SeqCst);
        self
    }

    fn prompts(&self, kind: Kind) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(k, _, _)| *k == kind)
            .map(|(_, p, _)| p.clone())
            .collect()
    }
}

#[async_trait]
impl LlmClient for ScriptedClient {
    async fn complete(&self, prompt: &str, temperature: f32) -> Result<String, DigestError> {
        let kind = kind_of(prompt);
        self.calls
            .lock()
            .unwrap()
            .push((kind, prompt.to_string(), temperature));

        match kind {
            Kind::Chunk => {
                let chunk = prompt.lines().nth(2).unwrap_or_default();
                Ok(format!("- {}", chunk.split_whitespace().next().unwrap_or("")))
            }
            Kind::Combine => Ok("- Purpose: social security\n- Enforcement: fines".to_string()),
            Kind::Sections => Ok(self.sections.clone()),
            Kind::Rules => {
                let left = self.rule_failures.load(Ordering::SeqCst);
                if left > 0 {
                    self.rule_failures.store(left - 1, Ordering::SeqCst);
                    return Err(DigestError::Internal("503 Service Unavailable".into()));
                }
                Ok(self.rules.clone())
            }
        }
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

const ACT_TEXT: &str = "Page 1 of 3\nSOCIAL SECURITY ACT\n\n\nAlpha section one text.\n\n2\n\n\
                        Bravo section two text.\nPage 2 of 3\nCharlie section three text.\n\
                        Delta section four text.\nPage 3 of 3";

fn config_for(client: &Arc<ScriptedClient>, cache: &Path) -> legis_digest::AnalysisConfigBuilder {
    AnalysisConfig::builder()
        .provider(client.clone() as Arc<dyn LlmClient>)
        .chunk_size(24)
        .cache_path(cache)
}

fn read_json(path: &Path) -> serde_json::Value {
    serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn full_run_summarises_every_chunk_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let cache = dir.path().join("chunk_summaries.json");
    let output = dir.path().join("output.json");
    let client = Arc::new(ScriptedClient::new());
    let config = assert_ok!(config_for(&client, &cache).build());

    let result = assert_ok!(analyze_text(ACT_TEXT, &output, &config).await);

    let cleaned = legis_digest::pipeline::text::clean(ACT_TEXT);
    let chunks = legis_digest::pipeline::text::chunk(&cleaned, 24);
    assert!(chunks.len() > 2);
    assert_eq!(result.stats.chunk_count, chunks.len());
    assert_eq!(client.prompts(Kind::Chunk).len(), chunks.len());
    assert!(!result.stats.cache_hit);
    assert_eq!(result.stats.llm_calls, chunks.len() + 3);

    let expected: Vec<String> = chunks
        .iter()
        .map(|c| format!("- {}", c.split_whitespace().next().unwrap_or("")))
        .collect();
    assert_eq!(result.chunk_summaries, expected);

    // The cache holds exactly what was summarised, in chunk order.
    let cached = read_json(&cache);
    assert_eq!(cached["chunk_summaries"], serde_json::json!(expected));

    // Every call used the configured temperature.
    assert!(client
        .calls
        .lock()
        .unwrap()
        .iter()
        .all(|(_, _, t)| (*t - 0.3).abs() < f32::EPSILON));
}

#[tokio::test]
async fn cached_summaries_skip_chunk_calls() {
    let dir = tempfile::tempdir().unwrap();
    let cache = dir.path().join("chunk_summaries.json");
    let output = dir.path().join("output.json");
    std::fs::write(&cache, r#"{"chunk_summaries": ["a", "b"]}"#).unwrap();

    let client = Arc::new(ScriptedClient::new());
    let config = assert_ok!(config_for(&client, &cache).build());
    let result = assert_ok!(analyze_text(ACT_TEXT, &output, &config).await);

    assert!(client.prompts(Kind::Chunk).is_empty());
    let combine = client.prompts(Kind::Combine);
    assert_eq!(combine.len(), 1);
    assert!(combine[0].contains("a\n\nb"));
    assert!(result.stats.cache_hit);
    assert_eq!(result.chunk_summaries, vec!["a", "b"]);
    assert_eq!(result.stats.llm_calls, 3);
}

#[tokio::test]
async fn report_has_three_fields_and_normalised_content() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("reports/output.json");
    let client = Arc::new(ScriptedClient::new());
    let config = assert_ok!(AnalysisConfig::builder()
        .provider(client.clone() as Arc<dyn LlmClient>)
        .no_cache()
        .build());

    let result = assert_ok!(analyze_text(ACT_TEXT, &output, &config).await);

    let report = read_json(&output);
    let obj = report.as_object().unwrap();
    assert_eq!(obj.len(), 3);
    assert!(obj.contains_key("summary"));
    assert!(obj.contains_key("sections"));
    assert!(obj.contains_key("rule_checks"));

    assert_eq!(
        report["sections"]["record_keeping"],
        "Employers keep wage records for six years."
    );
    assert_eq!(
        result.sections.obligations,
        "Employers must register\nEmployers must contribute monthly"
    );

    // The model answered in reverse order; the report is in rule order.
    let rules: Vec<&str> = result.rule_checks.iter().map(|c| c.rule.as_str()).collect();
    assert_eq!(rules, legis_digest::prompts::LEGAL_DOCUMENT_RULES.to_vec());
    assert!(result
        .rule_checks
        .iter()
        .all(|c| c.status == RuleStatus::Pass && c.confidence == 90));
    assert_eq!(report["rule_checks"][0]["status"], "pass");
}

#[tokio::test]
async fn unparseable_responses_fall_back() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("output.json");
    let client = Arc::new(
        ScriptedClient::new()
            .with_sections("I could not find any sections.")
            .with_rules("{\"rule\": \"not an array\"}"),
    );
    let config = assert_ok!(AnalysisConfig::builder()
        .provider(client.clone() as Arc<dyn LlmClient>)
        .no_cache()
        .build());

    let result = assert_ok!(analyze_text(ACT_TEXT, &output, &config).await);

    assert_eq!(result.sections, SectionMap::default());
    assert_eq!(result.rule_checks, RuleCheck::fallback_set());

    let report = read_json(&output);
    assert_eq!(report["sections"]["definitions"], "");
    assert_eq!(report["rule_checks"].as_array().unwrap().len(), 6);
    assert_eq!(report["rule_checks"][5]["evidence"], "Could not process");
    assert_eq!(report["rule_checks"][5]["confidence"], 0);
}

#[tokio::test]
async fn pass_through_keeps_model_array() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("output.json");
    let client = Arc::new(ScriptedClient::new().with_rules(
        r#"[{"rule": "Act must define key terms", "status": "PASSED", "evidence": "s.2", "confidence": "75%"},
            {"rule": "Something else entirely", "status": "fail", "evidence": "", "confidence": 10}]"#,
    ));
    let config = assert_ok!(AnalysisConfig::builder()
        .provider(client.clone() as Arc<dyn LlmClient>)
        .schema_policy(SchemaPolicy::PassThrough)
        .no_cache()
        .build());

    let result = assert_ok!(analyze_text(ACT_TEXT, &output, &config).await);

    assert_eq!(result.rule_checks.len(), 2);
    assert_eq!(result.rule_checks[0].status, RuleStatus::Pass);
    assert_eq!(result.rule_checks[0].confidence, 75);
    assert_eq!(result.rule_checks[1].rule, "Something else entirely");
}

#[tokio::test]
async fn llm_failure_is_fatal() {
    for parallel in [true, false] {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("output.json");
        let client = Arc::new(ScriptedClient::new().failing_rules(1));
        let config = assert_ok!(AnalysisConfig::builder()
            .provider(client.clone() as Arc<dyn LlmClient>)
            .parallel_stages(parallel)
            .no_cache()
            .build());

        let err = assert_err!(analyze_text(ACT_TEXT, &output, &config).await);
        match err {
            DigestError::LlmApiError { stage, message } => {
                assert_eq!(stage, Stage::RuleChecks);
                assert!(message.contains("503"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(!output.exists(), "no report on failure");
    }
}

#[tokio::test]
async fn transient_failure_recovers_with_retries() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("output.json");
    let client = Arc::new(ScriptedClient::new().failing_rules(2));
    let config = assert_ok!(AnalysisConfig::builder()
        .provider(client.clone() as Arc<dyn LlmClient>)
        .max_retries(2)
        .retry_backoff_ms(1)
        .no_cache()
        .build());

    let result = assert_ok!(analyze_text(ACT_TEXT, &output, &config).await);
    assert_eq!(client.prompts(Kind::Rules).len(), 3);
    assert_eq!(result.rule_checks.len(), 6);
    assert!(output.exists());
}

#[tokio::test]
async fn content_hash_cache_is_per_document() {
    let dir = tempfile::tempdir().unwrap();
    let base = dir.path().join("chunk_summaries.json");
    let output = dir.path().join("output.json");
    let client = Arc::new(ScriptedClient::new());
    let config = assert_ok!(config_for(&client, &base)
        .cache_keying(CacheKeying::ContentHash)
        .build());

    let first = assert_ok!(analyze_text(ACT_TEXT, &output, &config).await);
    let second = assert_ok!(analyze_text(ACT_TEXT, &output, &config).await);
    let other = assert_ok!(analyze_text("A different Act entirely.", &output, &config).await);

    assert!(!first.stats.cache_hit);
    assert!(second.stats.cache_hit);
    assert!(!other.stats.cache_hit);
    assert_eq!(first.stats.cache_path, second.stats.cache_path);
    assert_ne!(first.stats.cache_path, other.stats.cache_path);
    assert!(!base.exists(), "the unsuffixed path is never written");
}

#[tokio::test]
async fn empty_document_still_produces_a_report() {
    let dir = tempfile::tempdir().unwrap();
    let cache = dir.path().join("chunk_summaries.json");
    let output = dir.path().join("output.json");
    let client = Arc::new(ScriptedClient::new());
    let config = assert_ok!(config_for(&client, &cache).build());

    let result = assert_ok!(analyze_text("Page 1 of 1\n\n\n  7  \n", &output, &config).await);

    assert_eq!(result.stats.chunk_count, 0);
    assert!(result.chunk_summaries.is_empty());
    assert!(client.prompts(Kind::Chunk).is_empty());
    assert_eq!(read_json(&cache)["chunk_summaries"], serde_json::json!([]));
    assert!(output.exists());
}

#[tokio::test]
async fn stats_count_characters_not_bytes() {
    let dir = tempfile::tempdir().unwrap();
    let cache = dir.path().join("chunk_summaries.json");
    let output = dir.path().join("output.json");
    let client = Arc::new(ScriptedClient::new());
    let config = assert_ok!(config_for(&client, &cache).build());

    let raw = "Loi sur la sécurité sociale : « prestations » pour l’année 2024.";
    let result = assert_ok!(analyze_text(raw, &output, &config).await);

    assert_eq!(result.stats.raw_chars, raw.chars().count());
    assert!(result.stats.raw_chars < raw.len());
    assert_eq!(
        result.stats.cleaned_chars,
        legis_digest::pipeline::text::clean(raw).chars().count()
    );
}

// ── Progress events ──────────────────────────────────────────────────────────

#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<String>>,
}

impl AnalysisProgressCallback for Recorder {
    fn on_analysis_start(&self, total_chunks: usize, cached: bool) {
        self.events
            .lock()
            .unwrap()
            .push(format!("start {total_chunks} {cached}"));
    }
    fn on_stage_complete(&self, stage: Stage) {
        self.events.lock().unwrap().push(format!("done {stage}"));
    }
    fn on_chunk_complete(&self, chunk_num: usize, _total: usize, _len: usize) {
        self.events.lock().unwrap().push(format!("chunk {chunk_num}"));
    }
    fn on_analysis_complete(&self) {
        self.events.lock().unwrap().push("complete".to_string());
    }
}

#[tokio::test]
async fn sequential_run_reports_progress_in_stage_order() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("output.json");
    let client = Arc::new(ScriptedClient::new());
    let recorder = Arc::new(Recorder::default());
    let config = assert_ok!(AnalysisConfig::builder()
        .provider(client.clone() as Arc<dyn LlmClient>)
        .progress_callback(recorder.clone() as Arc<dyn AnalysisProgressCallback>)
        .chunk_size(10_000)
        .parallel_stages(false)
        .concurrency(1)
        .no_cache()
        .build());

    assert_ok!(analyze_text(ACT_TEXT, &output, &config).await);

    let events = recorder.events.lock().unwrap().clone();
    assert_eq!(
        events,
        vec![
            "done text cleaning",
            "done chunking",
            "start 1 false",
            "chunk 1",
            "done chunk summarisation",
            "done summary combination",
            "done section extraction",
            "done rule checks",
            "done export",
            "complete",
        ]
    );
}

#[test]
fn callback_and_client_are_send_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<ScriptedClient>();
    assert_send_sync::<Recorder>();
    assert_send_sync::<AnalysisConfig>();
}

#[tokio::test]
async fn analysis_can_be_spawned() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("output.json");
    let client = Arc::new(ScriptedClient::new());
    let config = assert_ok!(AnalysisConfig::builder()
        .provider(client as Arc<dyn LlmClient>)
        .no_cache()
        .build());

    let handle = tokio::spawn(async move { analyze_text(ACT_TEXT, &output, &config).await });
    let result = assert_ok!(handle.await.unwrap());
    assert_eq!(result.rule_checks.len(), 6);
}
