//! # legis-digest
//!
//! Summarise a piece of legislation, pull out its key sections and check it
//! against a fixed set of drafting rules, using a text LLM.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF / URL
//!  │
//!  ├─ 1. Input     resolve local file or download from URL
//!  ├─ 2. Extract   page text via pdfium (spawn_blocking)
//!  ├─ 3. Clean     page markers, page numbers, non-ASCII, whitespace
//!  ├─ 4. Chunk     fixed-size character chunks
//!  ├─ 5. Summarise per-chunk bullet summaries (cached) → executive summary
//!  ├─ 6. Sections  definitions, obligations, … as a JSON object
//!  ├─ 7. Rules     six compliance verdicts as a JSON array
//!  └─ 8. Export    {summary, sections, rule_checks} as pretty JSON
//! ```
//!
//! Steps 5–7 only depend on the cleaned text and run concurrently by default.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use legis_digest::{analyze, AnalysisConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from GEMINI_API_KEY / OPENAI_API_KEY / …
//!     let config = AnalysisConfig::default();
//!     let result = analyze("social_security_act.pdf", "output.json", &config).await?;
//!     println!("{}", result.summary);
//!     for check in &result.rule_checks {
//!         println!("{:?}  {}", check.status, check.rule);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Testing Without a Model
//!
//! Every model call goes through the [`LlmClient`] trait. Inject your own
//! implementation with [`AnalysisConfigBuilder::provider`] and call
//! [`analyze_text`] to run the whole pipeline offline.
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `legis-digest` binary (clap + anyhow + tracing-subscriber + indicatif + dotenv) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod analyze;
pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use analyze::{analyze, analyze_sync, analyze_text, extract_text};
pub use config::{AnalysisConfig, AnalysisConfigBuilder, CacheKeying, SchemaPolicy};
pub use error::{DigestError, ParseError};
pub use output::{AnalysisResult, AnalysisStats, Report, RuleCheck, RuleStatus, SectionMap};
pub use pipeline::llm::{LlmClient, ProviderClient};
pub use progress::{AnalysisProgressCallback, NoopProgressCallback, ProgressCallback, Stage};
