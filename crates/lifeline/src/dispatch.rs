//! Emergency dispatch pipeline.
//!
//! Given a trigger (shake gesture or manual action), assembles an
//! [`AlertRequest`] and delivers it to the backend through the
//! authenticated client. The pipeline is all-or-nothing per attempt:
//! partial success (evidence uploaded, submit failed) is reported as
//! failure, and nothing is queued when connectivity is absent — failure is
//! visible, never swallowed.
//!
//! Within one attempt the steps run strictly in sequence: reachability
//! gate, location precondition, evidence upload, authenticated submit.
//! A second trigger while an attempt is in flight is an independent
//! attempt; the detector cooldown is the only gesture-path duplicate
//! suppression, and the backend owns any deduplication beyond that.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::auth::AuthClient;
use crate::backend::{AlertReceipt, AlertRequest, AlertTransport, Coordinates};
use crate::error::{Error, Result};
use crate::evidence::{EvidenceStore, Recording};
use crate::reachability::Reachability;

/// Trait for the location collaborator.
///
/// Implementations bound their own wait; a fix that does not arrive within
/// that bound is reported as `None`, never waited on indefinitely.
#[async_trait]
pub trait LocationProvider: Send + Sync + std::fmt::Debug {
    /// The most recent position fix, or `None` when unavailable.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider itself fails (as opposed to having
    /// no fix yet).
    async fn current_fix(&self) -> Result<Option<Coordinates>>;
}

/// Location provider with a fixed answer (CLI flags, tests).
#[derive(Debug, Clone, Copy)]
pub struct StaticLocationProvider {
    fix: Option<Coordinates>,
}

impl StaticLocationProvider {
    /// Provider that always returns the given fix.
    #[must_use]
    pub fn fixed(fix: Coordinates) -> Self {
        Self { fix: Some(fix) }
    }

    /// Provider with no fix available.
    #[must_use]
    pub fn unavailable() -> Self {
        Self { fix: None }
    }
}

#[async_trait]
impl LocationProvider for StaticLocationProvider {
    async fn current_fix(&self) -> Result<Option<Coordinates>> {
        Ok(self.fix)
    }
}

/// The dispatch pipeline.
pub struct DispatchPipeline<T> {
    client: AuthClient<T>,
    location: Arc<dyn LocationProvider>,
    evidence: Arc<dyn EvidenceStore>,
    reachability: Arc<dyn Reachability>,
}

impl<T> std::fmt::Debug for DispatchPipeline<T>
where
    T: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchPipeline")
            .field("location", &self.location)
            .field("evidence", &self.evidence)
            .field("reachability", &self.reachability)
            .finish_non_exhaustive()
    }
}

impl<T: AlertTransport> DispatchPipeline<T> {
    /// Create a pipeline over the given collaborators.
    pub fn new(
        client: AuthClient<T>,
        location: Arc<dyn LocationProvider>,
        evidence: Arc<dyn EvidenceStore>,
        reachability: Arc<dyn Reachability>,
    ) -> Self {
        Self {
            client,
            location,
            evidence,
            reachability,
        }
    }

    /// Submit a full report: upload the recording, attach the location fix,
    /// and deliver the alert.
    ///
    /// # Errors
    ///
    /// - [`Error::Offline`] when connectivity is absent (the primary call
    ///   is never issued; surface the alternate emergency path).
    /// - [`Error::MissingLocation`] when no fix is available, raised before
    ///   any network call.
    /// - [`Error::MissingEvidence`] when the recording is empty.
    /// - [`Error::EvidenceUpload`] when blob storage rejects the recording.
    /// - [`Error::SessionExpired`] when auth recovery is exhausted.
    /// - [`Error::Backend`] / [`Error::Http`] on other submit failures.
    pub async fn submit_report(
        &self,
        user_id: &str,
        recording: &Recording,
    ) -> Result<AlertReceipt> {
        if recording.is_empty() {
            return Err(Error::MissingEvidence);
        }

        let location = self.preconditions().await?;

        let evidence_url = self.evidence.upload(user_id, recording).await?;

        let request = AlertRequest::new(location, Some(evidence_url.clone()), user_id.to_string());
        match self.client.submit_report(&request).await {
            Ok(receipt) => {
                info!(user_id, "report submitted");
                Ok(receipt)
            }
            Err(e) => {
                // The uploaded object may be orphaned; storage-side garbage
                // collection owns cleanup.
                warn!(%evidence_url, error = %e, "report submission failed after upload");
                Err(e)
            }
        }
    }

    /// Send a bare emergency alert: location and identity only, no
    /// recording. Evidence failures cannot affect this path.
    ///
    /// # Errors
    ///
    /// Same taxonomy as [`DispatchPipeline::submit_report`] minus the
    /// evidence variants.
    pub async fn send_emergency(&self, user_id: &str) -> Result<AlertReceipt> {
        let location = self.preconditions().await?;

        let request = AlertRequest::new(location, None, user_id.to_string());
        let receipt = self.client.send_emergency(&request).await?;
        info!(user_id, "emergency alert sent");
        Ok(receipt)
    }

    /// Shared gate: connectivity first, then the location precondition.
    /// Both fail before any network call is attempted.
    async fn preconditions(&self) -> Result<Coordinates> {
        if !self.reachability.is_connected().await {
            warn!("connectivity absent; alert not submitted");
            return Err(Error::Offline);
        }

        match self.location.current_fix().await? {
            Some(fix) => Ok(fix),
            None => Err(Error::MissingLocation),
        }
    }
}
