//! Pipeline stages for legislation analysis.
//!
//! Each submodule implements exactly one step; [`crate::analyze`] wires them
//! together.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ extract ──▶ text::clean ──┬──▶ text::chunk ──▶ cache? ──▶ summarize ──▶ combine ──┐
//! (path/URL) (pdfium)                 ├──▶ sections ─────────────────────────────────────────┼──▶ export
//!                                     └──▶ rules ────────────────────────────────────────────┘
//! ```
//!
//! 1. [`input`]    : canonicalise the user-supplied path or URL to a local file
//! 2. [`extract`]  : pull the text layer of every page; runs in `spawn_blocking`
//!    because pdfium is not async-safe
//! 3. [`text`]     : deterministic cleanup and fixed-size chunking
//! 4. [`cache`]    : resumable chunk-summary state on disk
//! 5. [`llm`]      : the injected model client, with timeout and retry
//! 6. [`respond`]  : fenced-block extraction, JSON parsing, fallbacks
//! 7. [`summarize`], [`sections`], [`rules`]: the model-backed transformers
//! 8. [`export`]   : the report file

pub mod cache;
pub mod export;
pub mod extract;
pub mod input;
pub mod llm;
pub mod respond;
pub mod rules;
pub mod sections;
pub mod summarize;
pub mod text;
