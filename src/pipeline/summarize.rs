//! Summary transformers: per-chunk bullet summaries and the executive
//! summary combined from them. Both are free text, kept exactly as the model
//! returned it; an empty model response is an empty summary.

use crate::error::DigestError;
use crate::pipeline::llm::{generate, CallPolicy, LlmClient};
use crate::progress::{ProgressCallback, Stage};
use crate::prompts::{chunk_summary_prompt, combine_prompt};
use futures::stream::{self, StreamExt, TryStreamExt};
use tracing::{debug, info};

/// Summarise one chunk into a few bullet points.
pub async fn summarize_chunk(
    client: &dyn LlmClient,
    chunk: &str,
    policy: &CallPolicy,
) -> Result<String, DigestError> {
    generate(client, &chunk_summary_prompt(chunk), policy, Stage::Summarize).await
}

/// Summarise every chunk, at most `concurrency` at a time.
///
/// The output is in chunk order whatever order the calls complete in. The
/// first failure aborts the remaining calls.
pub async fn summarize_chunks(
    client: &dyn LlmClient,
    chunks: &[String],
    policy: &CallPolicy,
    concurrency: usize,
    progress: Option<&ProgressCallback>,
) -> Result<Vec<String>, DigestError> {
    let total = chunks.len();
    info!(
        "Summarising {} chunks (concurrency: {})",
        total,
        concurrency.max(1)
    );

    stream::iter(0..total)
        .map(move |idx| async move {
            let chunk = &chunks[idx];
            let chunk_num = idx + 1;
            if let Some(cb) = progress {
                cb.on_chunk_start(chunk_num, total);
            }
            debug!("Chunk {}/{}: {} chars", chunk_num, total, chunk.len());

            let summary = summarize_chunk(client, chunk, policy).await?;

            if let Some(cb) = progress {
                cb.on_chunk_complete(chunk_num, total, summary.len());
            }
            Ok::<_, DigestError>(summary)
        })
        .buffered(concurrency.max(1))
        .try_collect()
        .await
}

/// Combine chunk summaries into the executive summary.
pub async fn combine_summaries(
    client: &dyn LlmClient,
    chunk_summaries: &[String],
    policy: &CallPolicy,
) -> Result<String, DigestError> {
    info!("Combining {} chunk summaries", chunk_summaries.len());
    generate(client, &combine_prompt(chunk_summaries), policy, Stage::Combine).await
}
