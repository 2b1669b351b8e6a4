//! Model access: the [`LlmClient`] capability every transformer shares.
//!
//! Transformers never construct clients themselves. One `Arc<dyn LlmClient>`
//! is resolved per run (see [`resolve_client`]) and handed to each of them,
//! which is also what lets tests swap in a scripted client.
//!
//! ## Retry Strategy
//!
//! By default a failed call is fatal on first occurrence. With
//! `max_retries > 0` failed or timed-out calls are retried after
//! `retry_backoff_ms * 2^(attempt-1)`: 500 ms → 1 s → 2 s with the defaults.

use crate::config::AnalysisConfig;
use crate::error::DigestError;
use crate::progress::Stage;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use std::sync::Arc;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, warn};

/// A request/response text-generation capability.
///
/// One prompt in, one completion out. No streaming.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Generate a completion for `prompt` at the given sampling temperature.
    async fn complete(&self, prompt: &str, temperature: f32) -> Result<String, DigestError>;

    /// Short name used in logs.
    fn name(&self) -> String {
        "llm".to_string()
    }
}

/// [`LlmClient`] backed by an `edgequake-llm` provider.
pub struct ProviderClient {
    provider: Arc<dyn LLMProvider>,
    max_tokens: usize,
    label: String,
}

impl ProviderClient {
    pub fn new(provider: Arc<dyn LLMProvider>, max_tokens: usize, label: impl Into<String>) -> Self {
        Self {
            provider,
            max_tokens,
            label: label.into(),
        }
    }
}

#[async_trait]
impl LlmClient for ProviderClient {
    async fn complete(&self, prompt: &str, temperature: f32) -> Result<String, DigestError> {
        let messages = vec![ChatMessage::user(prompt)];
        let options = CompletionOptions {
            temperature: Some(temperature),
            max_tokens: Some(self.max_tokens),
            ..Default::default()
        };

        let response = self
            .provider
            .chat(&messages, Some(&options))
            .await
            .map_err(|e| DigestError::Internal(format!("{}", e)))?;

        debug!(
            "{}: {} input tokens, {} output tokens",
            self.label, response.prompt_tokens, response.completion_tokens
        );
        Ok(response.content)
    }

    fn name(&self) -> String {
        self.label.clone()
    }
}

/// Timeout and retry settings applied around every call.
#[derive(Debug, Clone, Copy)]
pub struct CallPolicy {
    pub temperature: f32,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
    pub timeout_secs: Option<u64>,
}

impl CallPolicy {
    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self {
            temperature: config.temperature,
            max_retries: config.max_retries,
            retry_backoff_ms: config.retry_backoff_ms,
            timeout_secs: config.api_timeout_secs,
        }
    }
}

/// Send `prompt` through `client`, applying the policy's timeout and retries.
///
/// The final failure is reported against `stage`.
pub async fn generate(
    client: &dyn LlmClient,
    prompt: &str,
    policy: &CallPolicy,
    stage: Stage,
) -> Result<String, DigestError> {
    let mut last_err = None;

    for attempt in 0..=policy.max_retries {
        if attempt > 0 {
            let backoff = policy.retry_backoff_ms * 2u64.pow(attempt - 1);
            warn!(
                "{}: retry {}/{} after {}ms",
                stage, attempt, policy.max_retries, backoff
            );
            sleep(Duration::from_millis(backoff)).await;
        }

        let call = client.complete(prompt, policy.temperature);
        let outcome = match policy.timeout_secs {
            Some(secs) => match timeout(Duration::from_secs(secs), call).await {
                Ok(result) => result,
                Err(_) => Err(DigestError::ApiTimeout { stage, secs }),
            },
            None => call.await,
        };

        match outcome {
            Ok(text) => {
                debug!("{}: raw response ({} chars): {}", stage, text.len(), text);
                return Ok(text);
            }
            Err(e) => {
                warn!("{}: attempt {} failed: {}", stage, attempt + 1, e);
                last_err = Some(e);
            }
        }
    }

    Err(match last_err {
        Some(e @ DigestError::ApiTimeout { .. }) => e,
        Some(DigestError::LlmApiError { message, .. }) | Some(DigestError::Internal(message)) => {
            DigestError::LlmApiError { stage, message }
        }
        Some(other) => DigestError::LlmApiError {
            stage,
            message: other.to_string(),
        },
        None => DigestError::LlmApiError {
            stage,
            message: "Unknown error".to_string(),
        },
    })
}

/// Default model for a named provider.
pub fn default_model(provider: &str) -> &'static str {
    match provider {
        "gemini" | "google" => "gemini-2.5-flash",
        "anthropic" => "claude-sonnet-4-20250514",
        "ollama" => "llama3.2",
        _ => "gpt-4.1-mini",
    }
}

fn create_client(
    provider_name: &str,
    model: &str,
    config: &AnalysisConfig,
) -> Result<Arc<dyn LlmClient>, DigestError> {
    let provider = ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        DigestError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })?;
    Ok(Arc::new(ProviderClient::new(
        provider,
        config.max_tokens,
        format!("{provider_name}/{model}"),
    )))
}

/// Resolve the LLM client, from most-specific to least-specific:
///
/// 1. **Injected client** (`config.provider`), used as-is.
/// 2. **Named provider** (`config.provider_name`) with `config.model` or the
///    provider's default model.
/// 3. **Environment pair** `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`.
/// 4. **Gemini key**: `GEMINI_API_KEY` present selects Gemini.
/// 5. **Full auto-detection** via `ProviderFactory::from_env`.
pub fn resolve_client(config: &AnalysisConfig) -> Result<Arc<dyn LlmClient>, DigestError> {
    if let Some(ref client) = config.provider {
        return Ok(Arc::clone(client));
    }

    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or_else(|| default_model(name));
        return create_client(name, model, config);
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_client(&prov, &model, config);
        }
    }

    if std::env::var("GEMINI_API_KEY").is_ok_and(|k| !k.is_empty()) {
        let model = config.model.as_deref().unwrap_or_else(|| default_model("gemini"));
        return create_client("gemini", model, config);
    }

    let (provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| DigestError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set GEMINI_API_KEY, OPENAI_API_KEY or ANTHROPIC_API_KEY, or pass --provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(Arc::new(ProviderClient::new(
        provider,
        config.max_tokens,
        "auto",
    )))
}
