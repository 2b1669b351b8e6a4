//! CLI binary for legis-digest.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `AnalysisConfig` and prints the report.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use legis_digest::{
    analyze, extract_text, AnalysisConfig, AnalysisProgressCallback, AnalysisResult, CacheKeying,
    ProgressCallback, RuleStatus, SchemaPolicy, Stage,
};
use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers ──────────────────────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Spinner while a stage runs, switching to a bar while chunks are
/// summarised. Chunks may complete out of order.
struct CliProgressCallback {
    bar: ProgressBar,
    stage_starts: Mutex<HashMap<Stage, Instant>>,
    chunk_starts: Mutex<HashMap<usize, Instant>>,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(TICKS),
        );
        bar.set_prefix("Preparing");
        bar.set_message("Opening document…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            stage_starts: Mutex::new(HashMap::new()),
            chunk_starts: Mutex::new(HashMap::new()),
        })
    }

    fn activate_bar(&self, total: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} chunks  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(style);
        self.bar.set_prefix("Summarising");
        self.bar.reset_eta();
    }

    fn elapsed<K: std::hash::Hash + Eq>(map: &Mutex<HashMap<K, Instant>>, key: &K) -> f64 {
        map.lock()
            .ok()
            .and_then(|mut m| m.remove(key))
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl AnalysisProgressCallback for CliProgressCallback {
    fn on_analysis_start(&self, total_chunks: usize, cached: bool) {
        let note = if cached {
            "summaries from cache"
        } else {
            "summarising"
        };
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("{total_chunks} chunks, {note}"))
        ));
        if !cached {
            self.activate_bar(total_chunks);
        }
    }

    fn on_stage_start(&self, stage: Stage) {
        if let Ok(mut m) = self.stage_starts.lock() {
            m.insert(stage, Instant::now());
        }
        if stage != Stage::Summarize {
            self.bar.set_message(format!("{stage}…"));
        }
    }

    fn on_stage_complete(&self, stage: Stage) {
        let secs = Self::elapsed(&self.stage_starts, &stage);
        self.bar.println(format!(
            "  {} {:<22} {}",
            green("✓"),
            stage.to_string(),
            dim(&format!("{secs:.1}s"))
        ));
    }

    fn on_chunk_start(&self, chunk_num: usize, _total: usize) {
        if let Ok(mut m) = self.chunk_starts.lock() {
            m.insert(chunk_num, Instant::now());
        }
        self.bar.set_message(format!("chunk {chunk_num}"));
    }

    fn on_chunk_complete(&self, chunk_num: usize, total: usize, summary_len: usize) {
        let secs = Self::elapsed(&self.chunk_starts, &chunk_num);
        self.bar.println(format!(
            "    {} Chunk {:>3}/{:<3}  {:<8}  {}",
            green("✓"),
            chunk_num,
            total,
            dim(&format!("{summary_len:>5} chars")),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_analysis_complete(&self) {
        self.bar.finish_and_clear();
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Analyse an Act, report to output.json
  legis-digest social_security_act.pdf

  # Choose the report path
  legis-digest act.pdf -o reports/act.json

  # Analyse from a URL with Gemini
  legis-digest --provider gemini https://example.gov/acts/pension-act.pdf

  # Never reuse another document's cached summaries
  legis-digest --cache-by-content act.pdf

  # Just print the cleaned text (no API key needed)
  legis-digest --extract-only act.pdf

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY          Google Gemini API key (default provider when set)
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (gemini, openai, anthropic, ollama)
  EDGEQUAKE_MODEL         Override model ID
  PDFIUM_LIB_PATH         Path to libpdfium if it is not on the system path
  RUST_LOG                Log filter, overrides -v / -q

  Variables may also be set in a .env file in the working directory.
"#;

/// Summarise legislation and check it against drafting rules using an LLM.
#[derive(Parser, Debug)]
#[command(
    name = "legis-digest",
    version,
    about = "Summarise legislation and check it against drafting rules using an LLM",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF file path or HTTP/HTTPS URL.
    input: String,

    /// Report file path.
    #[arg(short, long, env = "LEGIS_DIGEST_OUTPUT", default_value = "output.json")]
    output: PathBuf,

    /// LLM model ID (e.g. gemini-2.5-flash, gpt-4.1-mini).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: gemini, openai, anthropic, ollama.
    #[arg(
        long,
        env = "EDGEQUAKE_PROVIDER",
        long_help = "LLM provider. Auto-detected from API key env vars if not set;\n\
          GEMINI_API_KEY is preferred when present."
    )]
    provider: Option<String>,

    /// Characters per chunk sent to the chunk summariser.
    #[arg(long, env = "LEGIS_DIGEST_CHUNK_SIZE", default_value_t = 6000)]
    chunk_size: usize,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "LEGIS_DIGEST_TEMPERATURE", default_value_t = 0.3)]
    temperature: f32,

    /// Max LLM output tokens per call.
    #[arg(long, env = "LEGIS_DIGEST_MAX_TOKENS", default_value_t = 8192)]
    max_tokens: usize,

    /// Number of chunk summaries requested at once.
    #[arg(short, long, env = "LEGIS_DIGEST_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// Run summary, section extraction and rule checks one after another.
    #[arg(long, env = "LEGIS_DIGEST_SEQUENTIAL")]
    sequential: bool,

    /// Chunk-summary cache file.
    #[arg(long, env = "LEGIS_DIGEST_CACHE", default_value = "chunk_summaries.json")]
    cache_path: PathBuf,

    /// Do not read or write the chunk-summary cache.
    #[arg(long, env = "LEGIS_DIGEST_NO_CACHE")]
    no_cache: bool,

    /// Key the cache file name on a hash of the document text.
    #[arg(long, env = "LEGIS_DIGEST_CACHE_BY_CONTENT")]
    cache_by_content: bool,

    /// Keep the model's rule-check array as-is instead of reconciling it
    /// with the six fixed rules.
    #[arg(long)]
    pass_through_schema: bool,

    /// Retries per LLM call on failure or timeout.
    #[arg(long, env = "LEGIS_DIGEST_MAX_RETRIES", default_value_t = 0)]
    max_retries: u32,

    /// Per-call LLM timeout in seconds (0 = none).
    #[arg(long, env = "LEGIS_DIGEST_API_TIMEOUT", default_value_t = 0)]
    api_timeout: u64,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "LEGIS_DIGEST_PASSWORD")]
    password: Option<String>,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "LEGIS_DIGEST_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Print the full result (including chunk summaries and stats) as JSON.
    #[arg(long)]
    json: bool,

    /// Print the cleaned document text and exit.
    #[arg(long)]
    extract_only: bool,

    /// Disable progress bar.
    #[arg(long, env = "LEGIS_DIGEST_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long)]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long)]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is fine.
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !cli.extract_only;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn AnalysisProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb)?;

    // ── Extract-only mode ────────────────────────────────────────────────
    if cli.extract_only {
        let text = extract_text(&cli.input, &config)
            .await
            .context("Text extraction failed")?;
        println!("{text}");
        return Ok(());
    }

    // ── Run analysis ─────────────────────────────────────────────────────
    let result = analyze(&cli.input, &cli.output, &config)
        .await
        .context("Analysis failed")?;

    if cli.json {
        let json = serde_json::to_string_pretty(&result).context("Failed to serialise result")?;
        println!("{json}");
        return Ok(());
    }

    if !cli.quiet {
        print_report(&result);
        eprintln!(
            "{}  {} chunks{}  {} LLM calls  {}ms  →  {}",
            green("✔"),
            result.stats.chunk_count,
            if result.stats.cache_hit {
                dim(" (cached)")
            } else {
                String::new()
            },
            result.stats.llm_calls,
            result.stats.total_duration_ms,
            bold(&cli.output.display().to_string()),
        );
    }

    Ok(())
}

/// Map CLI args to `AnalysisConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<AnalysisConfig> {
    let mut builder = AnalysisConfig::builder()
        .chunk_size(cli.chunk_size)
        .temperature(cli.temperature)
        .max_tokens(cli.max_tokens)
        .concurrency(cli.concurrency)
        .parallel_stages(!cli.sequential)
        .cache_path(cli.cache_path.clone())
        .cache_keying(if cli.cache_by_content {
            CacheKeying::ContentHash
        } else {
            CacheKeying::Fixed
        })
        .schema_policy(if cli.pass_through_schema {
            SchemaPolicy::PassThrough
        } else {
            SchemaPolicy::Reconcile
        })
        .max_retries(cli.max_retries)
        .api_timeout_secs(cli.api_timeout)
        .download_timeout_secs(cli.download_timeout);

    if cli.no_cache {
        builder = builder.no_cache();
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model.clone());
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider.clone());
    }
    if let Some(ref password) = cli.password {
        builder = builder.password(password.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

fn print_report(result: &AnalysisResult) {
    println!("{}", bold("EXECUTIVE SUMMARY"));
    println!("{}\n", result.summary);

    println!("{}", bold("SECTIONS"));
    for (key, content) in result.sections.entries() {
        if content.trim().is_empty() {
            continue;
        }
        println!("{}", cyan(&key.replace('_', " ").to_uppercase()));
        println!("{content}\n");
    }

    println!("{}", bold("RULE CHECKS"));
    for check in &result.rule_checks {
        let status = match check.status {
            RuleStatus::Pass => green("PASS"),
            RuleStatus::Fail => red("FAIL"),
        };
        println!(
            "  {}  {:<58} {}",
            status,
            check.rule,
            dim(&format!("{:>3}%", check.confidence))
        );
        if !check.evidence.is_empty() {
            println!("        {}", dim(&check.evidence));
        }
    }
}
