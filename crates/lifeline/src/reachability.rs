//! Network reachability monitoring.
//!
//! The dispatch pipeline consults reachability before issuing its primary
//! backend call: when connectivity is absent the call is skipped entirely
//! and the failure is surfaced, never queued. Platform connectivity
//! monitors are external collaborators; this module provides the seam plus
//! an HTTP probe implementation for environments without one.

use async_trait::async_trait;
use tracing::debug;

/// Trait reporting current connectivity.
#[async_trait]
pub trait Reachability: Send + Sync + std::fmt::Debug {
    /// Whether the network is currently reachable.
    async fn is_connected(&self) -> bool;
}

/// Fixed reachability state, for tests and forced-offline operation.
#[derive(Debug, Clone, Copy)]
pub struct StaticReachability {
    connected: bool,
}

impl StaticReachability {
    /// Reachability that always reports connected.
    #[must_use]
    pub fn connected() -> Self {
        Self { connected: true }
    }

    /// Reachability that always reports offline.
    #[must_use]
    pub fn offline() -> Self {
        Self { connected: false }
    }
}

#[async_trait]
impl Reachability for StaticReachability {
    async fn is_connected(&self) -> bool {
        self.connected
    }
}

/// Probes connectivity with a lightweight HEAD request.
///
/// Any HTTP response counts as connected, including error statuses: the
/// probe answers "is the network up", not "is the backend healthy".
#[derive(Debug)]
pub struct HttpProbe {
    client: reqwest::Client,
    url: String,
}

impl HttpProbe {
    /// Probe timeout; kept short so an offline check never stalls dispatch.
    const PROBE_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(3);

    /// Create a probe against the given URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(url: impl Into<String>) -> Result<Self, crate::error::Error> {
        let client = reqwest::Client::builder()
            .timeout(Self::PROBE_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl Reachability for HttpProbe {
    async fn is_connected(&self) -> bool {
        match self.client.head(&self.url).send().await {
            Ok(_) => true,
            Err(e) => {
                debug!(error = %e, "reachability probe failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_reachability() {
        assert!(StaticReachability::connected().is_connected().await);
        assert!(!StaticReachability::offline().is_connected().await);
    }

    #[tokio::test]
    async fn test_http_probe_reports_offline_for_unreachable_host() {
        // A reserved TEST-NET address never answers.
        let probe = HttpProbe::new("http://192.0.2.1:9/").unwrap();
        assert!(!probe.is_connected().await);
    }
}
