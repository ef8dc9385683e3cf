//! Error types for lifeline.
//!
//! This module defines all error types used throughout the lifeline crate.
//! Each dispatch failure gets its own variant so callers can render a
//! specific remediation (re-record, re-authenticate, retry later) instead of
//! a generic failure message.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for lifeline operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Dispatch precondition errors ===
    /// No location fix was available at submission time.
    ///
    /// Location is safety-critical; an alert is never submitted with a null
    /// location.
    #[error("no location fix available")]
    MissingLocation,

    /// A full report was requested without a finished recording.
    #[error("no recording available for report submission")]
    MissingEvidence,

    // === Dispatch I/O errors ===
    /// Uploading the evidence recording to blob storage failed.
    #[error("evidence upload failed: {message}")]
    EvidenceUpload {
        /// Description of what went wrong.
        message: String,
    },

    /// Connectivity was reported absent at submission time.
    ///
    /// The primary backend call is skipped entirely; callers surface the
    /// alternate emergency path instead of queuing the alert.
    #[error("no network connectivity")]
    Offline,

    /// The backend rejected the bearer token (HTTP 401).
    ///
    /// Consumed internally by the refresh-and-replay interceptor; it only
    /// escapes as [`Error::SessionExpired`] once recovery is exhausted.
    #[error("access credential rejected by backend")]
    Unauthorized,

    /// Credential refresh was exhausted or rejected.
    ///
    /// Locally stored credentials have been purged; the caller must
    /// re-authenticate.
    #[error("session expired: re-authentication required")]
    SessionExpired,

    /// The backend returned a non-auth failure status.
    #[error("backend request failed with status {status}: {message}")]
    Backend {
        /// HTTP status code returned by the backend.
        status: u16,
        /// Response body or status description.
        message: String,
    },

    /// An HTTP request failed before producing a response.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    // === Credential store errors ===
    /// Reading or writing the credential file failed.
    #[error("credential store error at {path}: {message}")]
    CredentialStore {
        /// Path to the credential file.
        path: PathBuf,
        /// Description of what went wrong.
        message: String,
    },

    // === Configuration errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === I/O errors ===
    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to create a required directory.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Path that couldn't be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Serialization errors ===
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Generic errors ===
    /// An internal error occurred (bug).
    #[error("internal error: {0}")]
    Internal(String),
}

/// A specialized Result type for lifeline operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create a new evidence upload error.
    #[must_use]
    pub fn evidence_upload(message: impl Into<String>) -> Self {
        Self::EvidenceUpload {
            message: message.into(),
        }
    }

    /// Create a new backend error.
    #[must_use]
    pub fn backend(status: u16, message: impl Into<String>) -> Self {
        Self::Backend {
            status,
            message: message.into(),
        }
    }

    /// Create a new credential store error.
    #[must_use]
    pub fn credential_store(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::CredentialStore {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Check if this error is the transport-level authorization failure.
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized)
    }

    /// Check if this error requires the user to re-authenticate.
    #[must_use]
    pub fn is_session_expired(&self) -> bool {
        matches!(self, Self::SessionExpired)
    }

    /// Check if this error is a dispatch precondition failure.
    #[must_use]
    pub fn is_precondition(&self) -> bool {
        matches!(self, Self::MissingLocation | Self::MissingEvidence)
    }

    /// Check if this error means connectivity was absent.
    #[must_use]
    pub fn is_offline(&self) -> bool {
        matches!(self, Self::Offline)
    }
}
