//! Input resolution: load a user-supplied path or URL into memory.
//!
//! The pipeline consumes bytes, not paths. Callers that start from a file
//! name or link (the CLI, scripts) go through [`read_source`] first;
//! everything downstream stays filesystem-agnostic.

use crate::error::InputError;
use std::path::PathBuf;
use tracing::{debug, info};

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Read a local file or download a URL.
///
/// With `max_bytes` set, inputs larger than the ceiling are rejected before
/// they are fully read: local files by their metadata, downloads by
/// `Content-Length` and then by the running body size.
pub async fn read_source(
    input: &str,
    timeout_secs: u64,
    max_bytes: Option<u64>,
) -> Result<Vec<u8>, InputError> {
    if is_url(input) {
        download_url(input, timeout_secs, max_bytes).await
    } else {
        read_local(input, max_bytes).await
    }
}

fn check_ceiling(size: u64, max_bytes: Option<u64>) -> Result<(), InputError> {
    match max_bytes {
        Some(limit) if size > limit => Err(InputError::PayloadTooLarge {
            size: usize::try_from(size).unwrap_or(usize::MAX),
            limit_mb: limit / (1024 * 1024),
        }),
        _ => Ok(()),
    }
}

async fn read_local(path_str: &str, max_bytes: Option<u64>) -> Result<Vec<u8>, InputError> {
    let path = PathBuf::from(path_str);

    if let Ok(meta) = tokio::fs::metadata(&path).await {
        check_ceiling(meta.len(), max_bytes)?;
    }

    match tokio::fs::read(&path).await {
        Ok(bytes) => {
            debug!("Read {} bytes from {}", bytes.len(), path.display());
            Ok(bytes)
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            Err(InputError::PermissionDenied { path })
        }
        Err(_) => Err(InputError::FileNotFound { path }),
    }
}

async fn download_url(
    url: &str,
    timeout_secs: u64,
    max_bytes: Option<u64>,
) -> Result<Vec<u8>, InputError> {
    info!("Downloading input from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| InputError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let mut response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            InputError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            InputError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(InputError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    if let Some(len) = response.content_length() {
        check_ceiling(len, max_bytes)?;
    }

    let mut bytes = Vec::new();
    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|e| InputError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?
    {
        bytes.extend_from_slice(&chunk);
        check_ceiling(bytes.len() as u64, max_bytes)?;
    }

    info!("Downloaded {} bytes", bytes.len());
    Ok(bytes)
}

/// Guess a MIME type for a handwriting file from its extension.
///
/// Only a hint: the normaliser sniffs the leading bytes and prefers those.
pub fn mime_from_path(input: &str) -> &'static str {
    let lower = input.to_lowercase();
    if lower.ends_with(".png") {
        "image/png"
    } else if lower.ends_with(".pdf") {
        "application/pdf"
    } else if lower.ends_with(".webp") {
        "image/webp"
    } else {
        "image/jpeg"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/doc.pdf"));
        assert!(is_url("http://example.com/doc.pdf"));
        assert!(!is_url("/tmp/doc.pdf"));
        assert!(!is_url("doc.pdf"));
        assert!(!is_url(""));
    }

    #[test]
    fn test_mime_from_path() {
        assert_eq!(mime_from_path("note.PNG"), "image/png");
        assert_eq!(mime_from_path("scan.pdf"), "application/pdf");
        assert_eq!(mime_from_path("photo.jpeg"), "image/jpeg");
        assert_eq!(mime_from_path("photo"), "image/jpeg");
    }

    #[tokio::test]
    async fn missing_local_file() {
        let err = read_source("/definitely/not/here.pdf", 5, None).await.unwrap_err();
        assert!(matches!(err, InputError::FileNotFound { .. }));
    }

    #[tokio::test]
    async fn reads_local_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("note.png");
        std::fs::write(&path, b"\x89PNG....").unwrap();
        let bytes = read_source(path.to_str().unwrap(), 5, Some(1024)).await.unwrap();
        assert_eq!(&bytes[..4], b"\x89PNG");
    }

    #[tokio::test]
    async fn oversized_local_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("note.jpg");
        std::fs::write(&path, vec![0u8; 2 * 1024 * 1024 + 1]).unwrap();
        let err = read_source(path.to_str().unwrap(), 5, Some(2 * 1024 * 1024))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            InputError::PayloadTooLarge { limit_mb: 2, .. }
        ));
    }

    #[test]
    fn ceiling_is_inclusive() {
        assert!(check_ceiling(10, Some(10)).is_ok());
        assert!(check_ceiling(11, Some(10)).is_err());
        assert!(check_ceiling(u64::MAX, None).is_ok());
    }
}
