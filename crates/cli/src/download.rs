//! Saving job outputs to disk.

use std::path::{Path, PathBuf};

use anyhow::Context;
use dubflow_client::{DownloadKind, DubbingApi};
use dubflow_core::types::JobId;
use futures::StreamExt;
use tokio::io::AsyncWriteExt;

/// File name used when the service does not suggest one.
pub fn default_file_name(job_id: &JobId, kind: DownloadKind) -> String {
    match kind {
        DownloadKind::Video => format!("{job_id}_dubbed.mp4"),
        DownloadKind::Subtitles => format!("{job_id}.srt"),
    }
}

/// Stream one output of `job_id` into `dir`, returning the written path.
pub async fn save(
    api: &dyn DubbingApi,
    job_id: &JobId,
    kind: DownloadKind,
    dir: &Path,
) -> anyhow::Result<PathBuf> {
    let mut download = api
        .download(job_id, kind)
        .await
        .with_context(|| format!("downloading {kind:?} for job {job_id}"))?;

    // Only the final component of a suggested name is trusted.
    let file_name = download
        .file_name
        .as_deref()
        .and_then(|n| Path::new(n).file_name())
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| default_file_name(job_id, kind));
    let path = dir.join(file_name);

    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("creating {}", dir.display()))?;
    let mut file = tokio::fs::File::create(&path)
        .await
        .with_context(|| format!("creating {}", path.display()))?;

    let mut written = 0u64;
    while let Some(chunk) = download.stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    file.flush().await?;

    tracing::info!(
        job_id = %job_id,
        path = %path.display(),
        bytes = written,
        "Output saved",
    );
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_names() {
        let id = JobId::new("abc");
        assert_eq!(default_file_name(&id, DownloadKind::Video), "abc_dubbed.mp4");
        assert_eq!(default_file_name(&id, DownloadKind::Subtitles), "abc.srt");
    }
}
