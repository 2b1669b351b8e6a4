//! Chunk-summary cache: a JSON file holding the per-chunk summaries of the
//! last run, so re-running over the same document skips the most expensive
//! stage.
//!
//! Reading never fails: anything unusable is a cache miss. Writing is
//! atomic, like the report export.

use crate::config::CacheKeying;
use crate::error::DigestError;
use crate::pipeline::export::write_atomic;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// On-disk layout: `{"chunk_summaries": [...]}`.
#[derive(Debug, Serialize, Deserialize)]
struct CacheFile {
    chunk_summaries: Vec<String>,
}

/// The cache file actually used for a run.
///
/// With [`CacheKeying::ContentHash`] the file stem of `base` gets the first
/// 16 hex chars of SHA-256 over the chunk size and the cleaned text, e.g.
/// `chunk_summaries-3f2a9c0e1b7d4a55.json`.
pub fn resolve_cache_path(
    base: &Path,
    keying: CacheKeying,
    chunk_size: usize,
    cleaned_text: &str,
) -> PathBuf {
    match keying {
        CacheKeying::Fixed => base.to_path_buf(),
        CacheKeying::ContentHash => {
            let mut hasher = Sha256::new();
            hasher.update((chunk_size as u64).to_le_bytes());
            hasher.update(cleaned_text.as_bytes());
            let digest = format!("{:x}", hasher.finalize());

            let stem = base
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "chunk_summaries".to_string());
            let ext = base
                .extension()
                .map(|e| e.to_string_lossy().into_owned())
                .unwrap_or_else(|| "json".to_string());

            base.with_file_name(format!("{}-{}.{}", stem, &digest[..16], ext))
        }
    }
}

/// Read cached chunk summaries, or `None` on any kind of miss.
pub async fn load(path: &Path) -> Option<Vec<String>> {
    let bytes = match tokio::fs::read(path).await {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!("No chunk cache at {}", path.display());
            return None;
        }
        Err(e) => {
            warn!("Chunk cache {} unreadable, ignoring: {}", path.display(), e);
            return None;
        }
    };

    match serde_json::from_slice::<CacheFile>(&bytes) {
        Ok(file) => {
            info!(
                "Loaded {} chunk summaries from {}",
                file.chunk_summaries.len(),
                path.display()
            );
            Some(file.chunk_summaries)
        }
        Err(e) => {
            warn!("Chunk cache {} is corrupt, ignoring: {}", path.display(), e);
            None
        }
    }
}

/// Persist chunk summaries, replacing any previous cache at `path`.
pub async fn save(summaries: &[String], path: &Path) -> Result<(), DigestError> {
    let json = serde_json::to_string_pretty(&CacheFile {
        chunk_summaries: summaries.to_vec(),
    })?;
    write_atomic(path, json.as_bytes()).await?;
    debug!("Saved {} chunk summaries to {}", summaries.len(), path.display());
    Ok(())
}
