//! Analysis entry points.
//!
//! [`analyze`] runs the whole pipeline over a PDF path or URL;
//! [`analyze_text`] starts from text that was already extracted;
//! [`extract_text`] stops after cleaning and needs no LLM provider.
//!
//! ## Stage Scheduling
//!
//! After chunking, three branches are independent of each other:
//!
//! ```text
//! cleaned text ─┬─ chunks → [cache | summarise] → combine ── summary
//!               ├─ sections ─────────────────────────────── sections
//!               └─ rule checks ──────────────────────────── rule_checks
//! ```
//!
//! With `parallel_stages` (the default) they are driven together by
//! `try_join!` and the first fatal error cancels the others. Otherwise they
//! run one after another in the order shown.

use crate::config::AnalysisConfig;
use crate::error::DigestError;
use crate::output::{AnalysisResult, AnalysisStats};
use crate::pipeline::llm::{self, CallPolicy, LlmClient};
use crate::pipeline::{cache, export, extract, input, rules, sections, summarize, text};
use crate::progress::{ProgressCallback, Stage};
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Analyse a PDF file or URL and export the report to `output_path`.
///
/// # Errors
/// Fatal errors only: unreadable input, no usable LLM provider, a failed
/// or timed-out LLM call, or a cache/report write failure. Model responses
/// that cannot be parsed are replaced by fallbacks and never fail the run.
pub async fn analyze(
    input: impl AsRef<str>,
    output_path: impl AsRef<Path>,
    config: &AnalysisConfig,
) -> Result<AnalysisResult, DigestError> {
    let started = Instant::now();
    let input = input.as_ref();
    info!("Starting analysis: {}", input);
    let progress = config.progress_callback.as_ref();

    // ── Step 1: Resolve input ────────────────────────────────────────────
    let resolved = input::resolve_input(input, config.download_timeout_secs).await?;

    // ── Step 2: Resolve LLM client ───────────────────────────────────────
    let client = llm::resolve_client(config)?;
    info!("Using LLM client: {}", client.name());

    // ── Step 3: Extract text ─────────────────────────────────────────────
    let extract_start = Instant::now();
    let raw = staged(
        progress,
        Stage::Extract,
        extract::extract_text(resolved.path(), config.password.as_deref()),
    )
    .await?;
    let extract_duration_ms = extract_start.elapsed().as_millis() as u64;

    run(
        client,
        &raw,
        output_path.as_ref(),
        config,
        started,
        extract_duration_ms,
    )
    .await
}

/// Analyse already-extracted document text and export the report.
pub async fn analyze_text(
    raw_text: impl AsRef<str>,
    output_path: impl AsRef<Path>,
    config: &AnalysisConfig,
) -> Result<AnalysisResult, DigestError> {
    let started = Instant::now();
    let client = llm::resolve_client(config)?;
    info!("Using LLM client: {}", client.name());
    run(
        client,
        raw_text.as_ref(),
        output_path.as_ref(),
        config,
        started,
        0,
    )
    .await
}

/// Synchronous wrapper around [`analyze`].
///
/// Creates a temporary tokio runtime internally.
pub fn analyze_sync(
    input: impl AsRef<str>,
    output_path: impl AsRef<Path>,
    config: &AnalysisConfig,
) -> Result<AnalysisResult, DigestError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| DigestError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(analyze(input, output_path, config))
}

/// Extract and clean the text of a PDF file or URL.
///
/// Does not require an LLM provider or API key.
pub async fn extract_text(
    input: impl AsRef<str>,
    config: &AnalysisConfig,
) -> Result<String, DigestError> {
    let resolved = input::resolve_input(input.as_ref(), config.download_timeout_secs).await?;
    let raw = extract::extract_text(resolved.path(), config.password.as_deref()).await?;
    Ok(text::clean(&raw))
}

/// Steps after extraction: clean, chunk, the three branches, export.
async fn run(
    client: Arc<dyn LlmClient>,
    raw: &str,
    output_path: &Path,
    config: &AnalysisConfig,
    started: Instant,
    extract_duration_ms: u64,
) -> Result<AnalysisResult, DigestError> {
    let progress = config.progress_callback.as_ref();
    let policy = CallPolicy::from_config(config);
    let client = client.as_ref();

    // ── Clean ────────────────────────────────────────────────────────────
    notify(progress, |cb| cb.on_stage_start(Stage::Clean));
    let cleaned = text::clean(raw);
    notify(progress, |cb| cb.on_stage_complete(Stage::Clean));
    info!("Cleaned text: {} → {} chars", raw.len(), cleaned.len());

    // ── Chunk ────────────────────────────────────────────────────────────
    notify(progress, |cb| cb.on_stage_start(Stage::Chunk));
    let chunks = text::chunk(&cleaned, config.chunk_size);
    notify(progress, |cb| cb.on_stage_complete(Stage::Chunk));
    info!(
        "Split into {} chunks of ≤{} chars",
        chunks.len(),
        config.chunk_size
    );

    let cache_path = config.cache_path.as_deref().map(|base| {
        cache::resolve_cache_path(base, config.cache_keying, config.chunk_size, &cleaned)
    });

    // ── Summary, sections, rule checks ───────────────────────────────────
    let summary_branch = summary_branch(client, &chunks, cache_path.as_deref(), &policy, config);
    let sections_branch = staged(
        progress,
        Stage::Sections,
        sections::extract_sections(client, &cleaned, &policy),
    );
    let rules_branch = staged(
        progress,
        Stage::RuleChecks,
        rules::apply_rule_checks(client, &cleaned, &policy, config.schema_policy),
    );

    let (summaries, sections, rule_checks) = if config.parallel_stages {
        futures::try_join!(summary_branch, sections_branch, rules_branch)?
    } else {
        let summaries = summary_branch.await?;
        let sections = sections_branch.await?;
        let rule_checks = rules_branch.await?;
        (summaries, sections, rule_checks)
    };

    let chunk_calls = if summaries.cache_hit { 0 } else { chunks.len() };
    let stats = AnalysisStats {
        raw_chars: raw.chars().count(),
        cleaned_chars: cleaned.chars().count(),
        chunk_count: chunks.len(),
        cache_hit: summaries.cache_hit,
        cache_path,
        llm_calls: chunk_calls + 3,
        total_duration_ms: 0,
        extract_duration_ms,
    };

    let mut result = AnalysisResult {
        summary: summaries.summary,
        sections,
        rule_checks,
        chunk_summaries: summaries.chunk_summaries,
        stats,
    };

    // ── Export ───────────────────────────────────────────────────────────
    staged(
        progress,
        Stage::Export,
        export::export_report(&result, output_path),
    )
    .await?;

    result.stats.total_duration_ms = started.elapsed().as_millis() as u64;
    info!(
        "Analysis complete: {} chunks, {} LLM calls, {}ms total",
        result.stats.chunk_count, result.stats.llm_calls, result.stats.total_duration_ms
    );
    notify(progress, |cb| cb.on_analysis_complete());

    Ok(result)
}

struct Summaries {
    chunk_summaries: Vec<String>,
    summary: String,
    cache_hit: bool,
}

/// Chunk summaries (cached or fresh) and the executive summary built on them.
async fn summary_branch(
    client: &dyn LlmClient,
    chunks: &[String],
    cache_path: Option<&Path>,
    policy: &CallPolicy,
    config: &AnalysisConfig,
) -> Result<Summaries, DigestError> {
    let progress = config.progress_callback.as_ref();

    let cached = match cache_path {
        Some(path) => cache::load(path).await,
        None => None,
    };
    if let Some(ref cached) = cached {
        if cached.len() != chunks.len() {
            warn!(
                "Cached summaries ({}) do not match chunk count ({}); using them anyway. \
                 Delete the cache or enable content-hash keying if the document changed.",
                cached.len(),
                chunks.len()
            );
        }
    }
    notify(progress, |cb| cb.on_analysis_start(chunks.len(), cached.is_some()));

    let (chunk_summaries, cache_hit) = match cached {
        Some(summaries) => {
            info!("Using {} cached chunk summaries", summaries.len());
            (summaries, true)
        }
        None => {
            let summaries = staged(
                progress,
                Stage::Summarize,
                summarize::summarize_chunks(client, chunks, policy, config.concurrency, progress),
            )
            .await?;
            if let Some(path) = cache_path {
                cache::save(&summaries, path).await?;
            }
            (summaries, false)
        }
    };

    let summary = staged(
        progress,
        Stage::Combine,
        summarize::combine_summaries(client, &chunk_summaries, policy),
    )
    .await?;

    Ok(Summaries {
        chunk_summaries,
        summary,
        cache_hit,
    })
}

/// Await `fut` between `on_stage_start` and `on_stage_complete` events.
async fn staged<T, F>(
    progress: Option<&ProgressCallback>,
    stage: Stage,
    fut: F,
) -> Result<T, DigestError>
where
    F: Future<Output = Result<T, DigestError>>,
{
    notify(progress, |cb| cb.on_stage_start(stage));
    let value = fut.await?;
    notify(progress, |cb| cb.on_stage_complete(stage));
    Ok(value)
}

fn notify(progress: Option<&ProgressCallback>, f: impl FnOnce(&ProgressCallback)) {
    if let Some(cb) = progress {
        f(cb);
    }
}
