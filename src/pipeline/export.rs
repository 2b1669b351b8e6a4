//! Report export: `summary`, `sections` and `rule_checks` as pretty JSON.

use crate::error::DigestError;
use crate::output::AnalysisResult;
use std::path::Path;
use tracing::info;

/// Write the report for `result` to `path`, replacing any existing file.
pub async fn export_report(result: &AnalysisResult, path: &Path) -> Result<(), DigestError> {
    let json = serde_json::to_string_pretty(&result.report())?;
    write_atomic(path, json.as_bytes()).await?;
    info!("Report written to {}", path.display());
    Ok(())
}

/// Write `contents` to `path` via a temp file in the same directory, then
/// rename. Parent directories are created as needed.
pub(crate) async fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), DigestError> {
    let write_err = |source: std::io::Error| DigestError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
        }
    }

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp = path.with_file_name(format!(".{}.tmp", file_name));

    tokio::fs::write(&tmp, contents).await.map_err(write_err)?;
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(write_err(e));
    }
    Ok(())
}
