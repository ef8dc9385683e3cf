//! Evidence recordings and blob storage upload.
//!
//! The audio collaborator hands the pipeline a finished recording as a local
//! file. This module loads it, names it deterministically (user, timestamp,
//! content hash), and uploads it to blob storage in exchange for a
//! retrievable URL that the alert request carries as its evidence reference.

use std::path::Path;

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use tracing::{debug, info};

use crate::error::{Error, Result};

/// A finished audio recording ready for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recording {
    /// Raw recording bytes.
    pub bytes: Vec<u8>,
    /// MIME content type.
    pub content_type: String,
    /// File extension used when naming the stored object.
    pub extension: String,
}

impl Recording {
    /// Create a recording from raw bytes.
    #[must_use]
    pub fn new(bytes: Vec<u8>, content_type: impl Into<String>, extension: impl Into<String>) -> Self {
        Self {
            bytes,
            content_type: content_type.into(),
            extension: extension.into(),
        }
    }

    /// Load a recording from a finished local file.
    ///
    /// The content type is inferred from the file extension; unknown
    /// extensions fall back to `application/octet-stream`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("bin")
            .to_ascii_lowercase();
        let content_type = match extension.as_str() {
            "wav" => "audio/wav",
            "m4a" => "audio/mp4",
            "mp3" => "audio/mpeg",
            "ogg" => "audio/ogg",
            _ => "application/octet-stream",
        };
        Ok(Self::new(bytes, content_type, extension))
    }

    /// Size of the recording in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Check if the recording is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Storage object name for this recording.
    ///
    /// `user_{id}/{millis}_{hash}.{ext}` keeps objects grouped per user and
    /// collision-free: the hash prefix covers identical-timestamp uploads.
    #[must_use]
    pub fn object_name(&self, user_id: &str) -> String {
        let hash = blake3::hash(&self.bytes).to_hex();
        format!(
            "user_{user_id}/{}_{}.{}",
            Utc::now().timestamp_millis(),
            &hash.as_str()[..16],
            self.extension
        )
    }
}

/// Trait for evidence blob storage.
#[async_trait]
pub trait EvidenceStore: Send + Sync + std::fmt::Debug {
    /// Upload a recording and return a retrievable URL.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EvidenceUpload`] if the storage service rejects the
    /// object or no retrievable URL comes back.
    async fn upload(&self, user_id: &str, recording: &Recording) -> Result<String>;
}

/// Response body from the storage service.
#[derive(Debug, Deserialize)]
struct UploadResponse {
    url: String,
}

/// Evidence store backed by an HTTP object storage service.
#[derive(Debug)]
pub struct HttpEvidenceStore {
    client: reqwest::Client,
    base_url: String,
    bucket: String,
}

impl HttpEvidenceStore {
    /// Create a store against the given storage base URL and bucket.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(
        base_url: impl Into<String>,
        bucket: impl Into<String>,
        timeout: std::time::Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            bucket: bucket.into(),
        })
    }
}

#[async_trait]
impl EvidenceStore for HttpEvidenceStore {
    async fn upload(&self, user_id: &str, recording: &Recording) -> Result<String> {
        let object = recording.object_name(user_id);
        let url = format!("{}/{}/{object}", self.base_url, self.bucket);
        debug!(%object, size = recording.len(), "uploading evidence recording");

        let response = self
            .client
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, &recording.content_type)
            .body(recording.bytes.clone())
            .send()
            .await
            .map_err(|e| Error::evidence_upload(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::evidence_upload(format!(
                "storage returned status {status}"
            )));
        }

        let body: UploadResponse = response
            .json()
            .await
            .map_err(|e| Error::evidence_upload(format!("no retrievable URL returned: {e}")))?;

        info!(%object, "evidence recording uploaded");
        Ok(body.url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_object_name_shape() {
        let recording = Recording::new(vec![1, 2, 3], "audio/wav", "wav");
        let name = recording.object_name("user-42");

        assert!(name.starts_with("user_user-42/"));
        assert!(name.ends_with(".wav"));
    }

    #[test]
    fn test_recording_object_name_depends_on_content() {
        let a = Recording::new(vec![1, 2, 3], "audio/wav", "wav");
        let b = Recording::new(vec![4, 5, 6], "audio/wav", "wav");
        // Hash portions differ even for uploads at the same instant.
        let hash_of = |name: &str| name.split('_').last().unwrap().to_string();
        assert_ne!(
            hash_of(&a.object_name("u")),
            hash_of(&b.object_name("u"))
        );
    }

    #[test]
    fn test_recording_len_and_empty() {
        let recording = Recording::new(vec![0; 128], "audio/wav", "wav");
        assert_eq!(recording.len(), 128);
        assert!(!recording.is_empty());

        let empty = Recording::new(Vec::new(), "audio/wav", "wav");
        assert!(empty.is_empty());
    }

    #[test]
    fn test_recording_from_file() {
        let path = std::env::temp_dir().join(format!("lifeline-{}-rec.wav", std::process::id()));
        std::fs::write(&path, b"RIFF....WAVE").unwrap();

        let recording = Recording::from_file(&path).unwrap();
        assert_eq!(recording.content_type, "audio/wav");
        assert_eq!(recording.extension, "wav");
        assert_eq!(recording.len(), 12);

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_recording_from_file_unknown_extension() {
        let path = std::env::temp_dir().join(format!("lifeline-{}-rec.xyz", std::process::id()));
        std::fs::write(&path, b"data").unwrap();

        let recording = Recording::from_file(&path).unwrap();
        assert_eq!(recording.content_type, "application/octet-stream");

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_recording_from_missing_file() {
        let result = Recording::from_file("/nonexistent/recording.wav");
        assert!(result.is_err());
    }
}
