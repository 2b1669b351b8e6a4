//! Progress-callback trait for analysis events.
//!
//! Inject an [`Arc<dyn AnalysisProgressCallback>`] via
//! [`crate::config::AnalysisConfigBuilder::progress_callback`] to receive
//! events as the pipeline moves through its stages and summarises each
//! chunk.
//!
//! # Example
//!
//! ```rust
//! use legis_digest::{AnalysisConfig, AnalysisProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     chunks: AtomicUsize,
//! }
//!
//! impl AnalysisProgressCallback for CountingCallback {
//!     fn on_chunk_complete(&self, chunk_num: usize, total_chunks: usize, summary_len: usize) {
//!         self.chunks.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("Chunk {}/{} summarised ({} chars)", chunk_num, total_chunks, summary_len);
//!     }
//! }
//!
//! let config = AnalysisConfig::builder()
//!     .progress_callback(Arc::new(CountingCallback { chunks: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use std::fmt;
use std::sync::Arc;

/// A named step of the analysis pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Extract,
    Clean,
    Chunk,
    Summarize,
    Combine,
    Sections,
    RuleChecks,
    Export,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Extract => "text extraction",
            Stage::Clean => "text cleaning",
            Stage::Chunk => "chunking",
            Stage::Summarize => "chunk summarisation",
            Stage::Combine => "summary combination",
            Stage::Sections => "section extraction",
            Stage::RuleChecks => "rule checks",
            Stage::Export => "export",
        };
        f.write_str(name)
    }
}

/// Called by the analysis pipeline as it progresses.
///
/// Implementations must be `Send + Sync`: chunk summaries, section
/// extraction and rule checks may run concurrently. All methods have no-op
/// defaults so callers only override what they care about.
pub trait AnalysisProgressCallback: Send + Sync {
    /// Called once the document is chunked.
    ///
    /// # Arguments
    /// * `total_chunks`: number of chunks in the cleaned text
    /// * `cached`      : `true` when chunk summaries come from the cache and
    ///   no per-chunk events will follow
    fn on_analysis_start(&self, total_chunks: usize, cached: bool) {
        let _ = (total_chunks, cached);
    }

    /// Called when a stage begins.
    fn on_stage_start(&self, stage: Stage) {
        let _ = stage;
    }

    /// Called when a stage finished without a fatal error.
    fn on_stage_complete(&self, stage: Stage) {
        let _ = stage;
    }

    /// Called just before the LLM request for a chunk is sent.
    ///
    /// # Arguments
    /// * `chunk_num`   : 1-indexed chunk number
    /// * `total_chunks`: total chunks
    fn on_chunk_start(&self, chunk_num: usize, total_chunks: usize) {
        let _ = (chunk_num, total_chunks);
    }

    /// Called when a chunk summary is available.
    fn on_chunk_complete(&self, chunk_num: usize, total_chunks: usize, summary_len: usize) {
        let _ = (chunk_num, total_chunks, summary_len);
    }

    /// Called once after the report has been exported.
    fn on_analysis_complete(&self) {}
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl AnalysisProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::AnalysisConfig`].
pub type ProgressCallback = Arc<dyn AnalysisProgressCallback>;
