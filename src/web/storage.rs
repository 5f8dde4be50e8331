use std::{
    io,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
use axum::{
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use chrono::Utc;
use tokio::time::sleep;
use tracing::{error, warn};

use crate::error::ApiError;

const WRITE_ATTEMPTS: u32 = 3;
const RETRY_DELAY_MS: u64 = 250;

/// Handle to a persisted journal artifact. The stored name is what the
/// registry records; the path is where it lives on disk.
#[derive(Debug, Clone)]
pub struct StoredArtifact {
    pub stored_name: String,
    pub path: PathBuf,
}

/// Ensure the artifact storage directory exists.
pub async fn ensure_storage_root(path: &str) -> Result<()> {
    tokio::fs::create_dir_all(path)
        .await
        .with_context(|| format!("failed to ensure storage root at {}", path))
}

/// Derive a stored filename from the journal title plus a millisecond
/// timestamp suffix so repeated titles cannot collide. The title is reduced
/// to a safe lowercase charset before use.
pub fn derive_stored_name(title_hint: &str, timestamp_millis: i64) -> String {
    let sanitized: String = sanitize_filename::sanitize(title_hint)
        .to_ascii_lowercase()
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() {
                ch
            } else {
                '-'
            }
        })
        .collect();
    let stem = sanitized.trim_matches('-');
    let stem = if stem.is_empty() { "journal" } else { stem };

    format!("{stem}_{timestamp_millis}.pdf")
}

/// Persist uploaded bytes under a derived name. Transient I/O failures are
/// retried a bounded number of times before surfacing as a storage error.
pub async fn store_pdf(root: &str, title_hint: &str, bytes: &[u8]) -> Result<StoredArtifact, ApiError> {
    tokio::fs::create_dir_all(root)
        .await
        .map_err(ApiError::Storage)?;

    let stored_name = derive_stored_name(title_hint, Utc::now().timestamp_millis());
    let path = Path::new(root).join(&stored_name);

    let mut last_err: Option<io::Error> = None;
    for attempt in 1..=WRITE_ATTEMPTS {
        match tokio::fs::write(&path, bytes).await {
            Ok(()) => {
                return Ok(StoredArtifact { stored_name, path });
            }
            Err(err) => {
                warn!(?err, attempt, file = %path.display(), "artifact write failed");
                last_err = Some(err);
                if attempt < WRITE_ATTEMPTS {
                    sleep(Duration::from_millis(RETRY_DELAY_MS * attempt as u64)).await;
                }
            }
        }
    }

    Err(ApiError::Storage(last_err.unwrap_or_else(|| {
        io::Error::other("artifact write failed with no underlying error")
    })))
}

/// Best-effort removal, used to unwind a creation that failed after the
/// artifact was written. Deleting an already-absent file is not an error.
pub async fn remove_artifact(root: &str, stored_name: &str) {
    let path = Path::new(root).join(stored_name);
    match tokio::fs::remove_file(&path).await {
        Ok(()) => {}
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => {
            error!(?err, file = %path.display(), "failed to remove orphaned artifact");
        }
    }
}

/// Stream a stored PDF with an attachment disposition. Missing files map to
/// not-found rather than a server error: the record outlived its artifact.
pub async fn stream_pdf(root: &str, stored_name: &str, download_name: &str) -> Result<Response, ApiError> {
    let path = Path::new(root).join(stored_name);
    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            error!(file = %path.display(), "journal artifact is missing from storage");
            return Err(ApiError::NotFound("Journal file"));
        }
        Err(err) => return Err(ApiError::Storage(err)),
    };

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/pdf"),
    );
    let disposition = format!("attachment; filename=\"{}\"", download_name);
    let disposition = HeaderValue::from_str(&disposition)
        .unwrap_or_else(|_| HeaderValue::from_static("attachment"));
    headers.insert(header::CONTENT_DISPOSITION, disposition);

    Ok((StatusCode::OK, headers, bytes).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stored_name_uses_safe_charset() {
        let name = derive_stored_name("My Paper", 1700000000000);
        assert_eq!(name, "my-paper_1700000000000.pdf");

        let name = derive_stored_name("Acoustic Niches: A Survey?", 1700000000000);
        assert!(name.ends_with("_1700000000000.pdf"));
        assert!(
            name.chars()
                .all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || "-_.".contains(ch))
        );
    }

    #[test]
    fn stored_name_falls_back_when_title_is_unusable() {
        let name = derive_stored_name("???", 42);
        assert_eq!(name, "journal_42.pdf");
        let name = derive_stored_name("../../etc/passwd", 42);
        assert!(!name.contains('/'));
    }

    #[tokio::test]
    async fn store_and_remove_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = dir.path().to_str().unwrap();

        let artifact = store_pdf(root, "My Paper", b"%PDF-1.4 test")
            .await
            .expect("store should succeed");
        assert!(artifact.path.exists());

        remove_artifact(root, &artifact.stored_name).await;
        assert!(!artifact.path.exists());

        // Removing again must be a no-op.
        remove_artifact(root, &artifact.stored_name).await;
    }

    #[tokio::test]
    async fn stream_missing_artifact_is_not_found() {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = dir.path().to_str().unwrap();

        let result = stream_pdf(root, "gone_1.pdf", "gone.pdf").await;
        assert!(matches!(result, Err(ApiError::NotFound(_))));
    }
}
