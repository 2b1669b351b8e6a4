//! Configuration types for legislation analysis.
//!
//! All pipeline behaviour is controlled through [`AnalysisConfig`], built
//! via its [`AnalysisConfigBuilder`]. Every knob lives in one struct so a
//! run can be described completely in a log line.

use crate::error::DigestError;
use crate::pipeline::llm::LlmClient;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Default chunk size in characters.
pub const DEFAULT_CHUNK_SIZE: usize = 6000;

/// Default location of the chunk-summary cache.
pub const DEFAULT_CACHE_FILE: &str = "chunk_summaries.json";

/// Configuration for a legislation analysis run.
///
/// Built via [`AnalysisConfig::builder()`] or using
/// [`AnalysisConfig::default()`].
///
/// # Example
/// ```rust
/// use legis_digest::{AnalysisConfig, CacheKeying};
///
/// let config = AnalysisConfig::builder()
///     .chunk_size(4000)
///     .concurrency(2)
///     .cache_keying(CacheKeying::ContentHash)
///     .model("gemini-2.5-flash")
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct AnalysisConfig {
    /// Maximum characters per chunk sent to the chunk summariser. Default: 6000.
    pub chunk_size: usize,

    /// Sampling temperature for every LLM call. Default: 0.3.
    ///
    /// Low enough that two runs over the same document give near-identical
    /// sections and rule verdicts.
    pub temperature: f32,

    /// Maximum tokens the LLM may generate per call. Default: 8192.
    pub max_tokens: usize,

    /// LLM model identifier, e.g. "gemini-2.5-flash", "gpt-4.1-mini".
    /// If None, a per-provider default is used.
    pub model: Option<String>,

    /// LLM provider name (e.g. "gemini", "openai", "anthropic", "ollama").
    pub provider_name: Option<String>,

    /// Pre-constructed LLM client. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LlmClient>>,

    /// Number of chunk summaries requested at once. Default: 4.
    ///
    /// Summaries are always reassembled in chunk order; 1 gives strictly
    /// sequential calls.
    pub concurrency: usize,

    /// Run the summary branch, section extraction and rule checks
    /// concurrently. Default: true.
    pub parallel_stages: bool,

    /// Where chunk summaries are cached between runs. `None` disables the
    /// cache. Default: `chunk_summaries.json` in the working directory.
    pub cache_path: Option<PathBuf>,

    /// How the cache file name is derived from `cache_path`. Default: [`CacheKeying::Fixed`].
    pub cache_keying: CacheKeying,

    /// What to do with a rule-check array that parsed but does not match the
    /// six fixed rules. Default: [`SchemaPolicy::Reconcile`].
    pub schema_policy: SchemaPolicy,

    /// Retry attempts after a failed or timed-out LLM call. Default: 0.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled per attempt. Default: 500.
    pub retry_backoff_ms: u64,

    /// Per-LLM-call timeout in seconds. Default: None (wait forever).
    pub api_timeout_secs: Option<u64>,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Optional progress callback. Default: None.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            temperature: 0.3,
            max_tokens: 8192,
            model: None,
            provider_name: None,
            provider: None,
            concurrency: 4,
            parallel_stages: true,
            cache_path: Some(PathBuf::from(DEFAULT_CACHE_FILE)),
            cache_keying: CacheKeying::default(),
            schema_policy: SchemaPolicy::default(),
            max_retries: 0,
            retry_backoff_ms: 500,
            api_timeout_secs: None,
            password: None,
            download_timeout_secs: 120,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for AnalysisConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalysisConfig")
            .field("chunk_size", &self.chunk_size)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LlmClient>"))
            .field("concurrency", &self.concurrency)
            .field("parallel_stages", &self.parallel_stages)
            .field("cache_path", &self.cache_path)
            .field("cache_keying", &self.cache_keying)
            .field("schema_policy", &self.schema_policy)
            .field("max_retries", &self.max_retries)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<callback>"),
            )
            .finish()
    }
}

impl AnalysisConfig {
    /// Create a new builder for `AnalysisConfig`.
    pub fn builder() -> AnalysisConfigBuilder {
        AnalysisConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`AnalysisConfig`].
#[derive(Debug)]
pub struct AnalysisConfigBuilder {
    config: AnalysisConfig,
}

impl AnalysisConfigBuilder {
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.config.chunk_size = size;
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LlmClient>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn parallel_stages(mut self, v: bool) -> Self {
        self.config.parallel_stages = v;
        self
    }

    pub fn cache_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.cache_path = Some(path.into());
        self
    }

    /// Disable the chunk-summary cache entirely.
    pub fn no_cache(mut self) -> Self {
        self.config.cache_path = None;
        self
    }

    pub fn cache_keying(mut self, keying: CacheKeying) -> Self {
        self.config.cache_keying = keying;
        self
    }

    pub fn schema_policy(mut self, policy: SchemaPolicy) -> Self {
        self.config.schema_policy = policy;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    /// Per-call timeout; 0 disables it.
    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = (secs > 0).then_some(secs);
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<AnalysisConfig, DigestError> {
        let c = &self.config;
        if c.chunk_size == 0 {
            return Err(DigestError::InvalidConfig(
                "Chunk size must be ≥ 1 character".into(),
            ));
        }
        if c.concurrency == 0 {
            return Err(DigestError::InvalidConfig(
                "Concurrency must be ≥ 1".into(),
            ));
        }
        if c.max_tokens == 0 {
            return Err(DigestError::InvalidConfig(
                "Max tokens must be ≥ 1".into(),
            ));
        }
        if let Some(ref path) = c.cache_path {
            if path.as_os_str().is_empty() {
                return Err(DigestError::InvalidConfig(
                    "Cache path must not be empty (use no_cache() to disable)".into(),
                ));
            }
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// How the chunk-summary cache file is named.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CacheKeying {
    /// Always use `cache_path` as given. Switching documents without
    /// clearing the cache reuses the previous document's summaries. (default)
    #[default]
    Fixed,
    /// Suffix the file stem with a hash of the chunk size and cleaned text,
    /// e.g. `chunk_summaries-3fa1c0d29b7e4410.json`.
    ContentHash,
}

/// Handling of rule-check arrays that parse but do not match the fixed rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SchemaPolicy {
    /// Map parsed records onto the six fixed rules, in order, filling gaps
    /// with fallback records. (default)
    #[default]
    Reconcile,
    /// Return the records read from the model's array, in model order.
    PassThrough,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let c = AnalysisConfig::default();
        assert_eq!(c.chunk_size, 6000);
        assert_eq!(c.temperature, 0.3);
        assert_eq!(c.max_retries, 0);
        assert_eq!(c.api_timeout_secs, None);
        assert_eq!(c.cache_path, Some(PathBuf::from("chunk_summaries.json")));
        assert_eq!(c.cache_keying, CacheKeying::Fixed);
        assert_eq!(c.schema_policy, SchemaPolicy::Reconcile);
    }

    #[test]
    fn zero_chunk_size_is_rejected() {
        let err = AnalysisConfig::builder().chunk_size(0).build().unwrap_err();
        assert!(matches!(err, DigestError::InvalidConfig(_)));
    }

    #[test]
    fn builder_clamps_and_normalises() {
        let c = AnalysisConfig::builder()
            .temperature(5.0)
            .concurrency(0)
            .api_timeout_secs(0)
            .build()
            .unwrap();
        assert_eq!(c.temperature, 2.0);
        assert_eq!(c.concurrency, 1);
        assert_eq!(c.api_timeout_secs, None);
    }

    #[test]
    fn no_cache_clears_path() {
        let c = AnalysisConfig::builder().no_cache().build().unwrap();
        assert!(c.cache_path.is_none());
    }

    #[test]
    fn debug_hides_provider() {
        let c = AnalysisConfig::default();
        let s = format!("{c:?}");
        assert!(s.contains("chunk_size: 6000"));
    }
}
