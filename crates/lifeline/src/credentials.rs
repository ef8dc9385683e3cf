//! Credential storage for lifeline.
//!
//! Holds the short-lived access credential and the long-lived refresh
//! credential. The dispatch pipeline only reads credentials and persists a
//! refreshed access token; the refresh step and purge are the only writers.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};

/// A stored credential pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    /// Short-lived bearer token attached to every backend call.
    pub access_token: String,
    /// Long-lived token used to obtain a fresh access token.
    pub refresh_token: String,
    /// When the access token expires, if the backend reported it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_expiry: Option<DateTime<Utc>>,
}

impl Credentials {
    /// Create a new credential pair with no known expiry.
    #[must_use]
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
            access_expiry: None,
        }
    }
}

/// Trait for credential persistence.
///
/// Implementations are shared behind `Arc` across async seams, so interior
/// mutability is on the implementor. The runtime model keeps refresh and
/// replay strictly sequential; no code path races a refresh.
pub trait CredentialStore: Send + Sync + std::fmt::Debug {
    /// Load the stored credentials, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying storage cannot be read.
    fn load(&self) -> Result<Option<Credentials>>;

    /// Persist a full credential pair (login).
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying storage cannot be written.
    fn store(&self, credentials: &Credentials) -> Result<()>;

    /// Persist a refreshed access token, keeping the refresh token.
    ///
    /// # Errors
    ///
    /// Returns an error if no credentials are stored or the storage cannot
    /// be written.
    fn set_access_token(&self, access_token: &str) -> Result<()>;

    /// Remove all stored credentials (forced re-authentication).
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying storage cannot be cleared.
    fn purge(&self) -> Result<()>;
}

/// Credential store backed by a JSON file under the platform data dir.
#[derive(Debug)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    /// Create a store at the given file path.
    ///
    /// The file is created lazily on first write; parent directories are
    /// created as needed.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Get the path to the credential file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write(&self, credentials: &Credentials) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }
        let json = serde_json::to_string_pretty(credentials)?;
        fs::write(&self.path, json)
            .map_err(|e| Error::credential_store(&self.path, e.to_string()))?;
        debug!("credentials written to {}", self.path.display());
        Ok(())
    }
}

impl CredentialStore for FileCredentialStore {
    fn load(&self) -> Result<Option<Credentials>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let json = fs::read_to_string(&self.path)
            .map_err(|e| Error::credential_store(&self.path, e.to_string()))?;
        let credentials = serde_json::from_str(&json)?;
        Ok(Some(credentials))
    }

    fn store(&self, credentials: &Credentials) -> Result<()> {
        self.write(credentials)
    }

    fn set_access_token(&self, access_token: &str) -> Result<()> {
        let Some(mut credentials) = self.load()? else {
            return Err(Error::credential_store(
                &self.path,
                "cannot refresh access token: no credentials stored",
            ));
        };
        credentials.access_token = access_token.to_string();
        credentials.access_expiry = None;
        self.write(&credentials)
    }

    fn purge(&self) -> Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path)
                .map_err(|e| Error::credential_store(&self.path, e.to_string()))?;
            info!("stored credentials purged");
        }
        Ok(())
    }
}

/// In-memory credential store for tests.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    inner: Mutex<Option<Credentials>>,
}

impl MemoryCredentialStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-seeded with credentials.
    #[must_use]
    pub fn with_credentials(credentials: Credentials) -> Self {
        Self {
            inner: Mutex::new(Some(credentials)),
        }
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn load(&self) -> Result<Option<Credentials>> {
        Ok(self
            .inner
            .lock()
            .map_err(|_| Error::internal("credential store lock poisoned"))?
            .clone())
    }

    fn store(&self, credentials: &Credentials) -> Result<()> {
        *self
            .inner
            .lock()
            .map_err(|_| Error::internal("credential store lock poisoned"))? =
            Some(credentials.clone());
        Ok(())
    }

    fn set_access_token(&self, access_token: &str) -> Result<()> {
        let mut guard = self
            .inner
            .lock()
            .map_err(|_| Error::internal("credential store lock poisoned"))?;
        let Some(credentials) = guard.as_mut() else {
            return Err(Error::internal(
                "cannot refresh access token: no credentials stored",
            ));
        };
        credentials.access_token = access_token.to_string();
        credentials.access_expiry = None;
        Ok(())
    }

    fn purge(&self) -> Result<()> {
        *self
            .inner
            .lock()
            .map_err(|_| Error::internal("credential store lock poisoned"))? = None;
        Ok(())
    }
}
