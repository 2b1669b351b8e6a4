//! Error types for the legis-digest library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`DigestError`]: **Fatal**: the analysis cannot proceed at all
//!   (unreadable document, provider not configured, LLM call failed, report
//!   could not be written). Returned as `Err(DigestError)` from the top-level
//!   `analyze*` functions.
//!
//! * [`ParseError`]: **Non-fatal**: the model answered, but the answer is
//!   not the structure that was asked for. It never leaves the transformer
//!   that produced it; [`crate::pipeline::respond::parse_or_else`] logs it and
//!   substitutes a deterministic fallback value.
//!
//! Cache read problems are neither: a missing or corrupt cache is a cache
//! miss and surfaces only as a log line.

use crate::progress::Stage;
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the legis-digest library.
#[derive(Debug, Error)]
pub enum DigestError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a valid file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' is corrupt: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF '{path}' is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired { path: PathBuf },

    /// A password was provided but it is wrong.
    #[error("Wrong password for PDF '{path}'")]
    WrongPassword { path: PathBuf },

    /// pdfium could not produce the text layer of a page.
    #[error("Text extraction failed for page {page}: {detail}")]
    TextExtractionFailed { page: usize, detail: String },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium, place the library in the working\n\
directory, or install it system-wide.\n"
    )]
    PdfiumBindingFailed(String),

    // ── LLM errors ────────────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// The LLM call itself failed (auth, quota, network, bad request).
    #[error("LLM API error during {stage}: {message}")]
    LlmApiError { stage: Stage, message: String },

    /// The LLM call did not answer within `api_timeout_secs`.
    #[error("LLM call timed out after {secs}s during {stage}")]
    ApiTimeout { stage: Stage, secs: u64 },

    // ── Output errors ─────────────────────────────────────────────────────
    /// Could not create or write the report or the chunk cache.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The result could not be serialised to JSON.
    #[error("Failed to serialise output: {0}")]
    Serialization(#[from] serde_json::Error),

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// The model answered, but not with the structure that was requested.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// Nothing but whitespace came back.
    #[error("empty response")]
    EmptyResponse,

    /// The payload is not JSON at all.
    #[error("response is not valid JSON: {detail}")]
    InvalidJson { detail: String },

    /// Valid JSON, but the top-level value has the wrong type.
    #[error("expected a JSON {expected} at the top level, got {found}")]
    WrongShape {
        expected: &'static str,
        found: &'static str,
    },

    /// Right top-level type, but the contents do not fit the target type.
    #[error("response does not match the expected schema: {detail}")]
    Schema { detail: String },
}
