//! Backend alert service wire types and transport.
//!
//! Defines the payloads exchanged with the alert backend and the
//! [`AlertTransport`] seam the dispatch pipeline talks through. The HTTP
//! implementation attaches the current access credential as a bearer token;
//! recovering from a rejected token is the interceptor's job, not the
//! transport's.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

/// Location accuracy reported by the location collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccuracyTier {
    /// GPS-grade fix.
    High,
    /// Network/fused fix.
    Balanced,
    /// Coarse fix (cell tower).
    Low,
}

/// A position fix attached to an alert.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    /// Latitude in decimal degrees.
    pub latitude: f64,
    /// Longitude in decimal degrees.
    pub longitude: f64,
    /// Accuracy tier of the fix.
    #[serde(skip_serializing, default = "default_accuracy")]
    pub accuracy: AccuracyTier,
}

fn default_accuracy() -> AccuracyTier {
    AccuracyTier::High
}

impl Coordinates {
    /// Create a high-accuracy fix.
    #[must_use]
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            accuracy: AccuracyTier::High,
        }
    }
}

/// The alert submitted to the backend.
///
/// Constructed fresh per dispatch attempt and never mutated afterwards: the
/// authorization retry replays this exact value, so the replayed payload is
/// identical to the original.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertRequest {
    /// Position fix. Mandatory; alerts are never submitted without one.
    pub location: Coordinates,
    /// Retrievable reference to the uploaded recording, when present.
    #[serde(rename = "audioUrl", skip_serializing_if = "Option::is_none")]
    pub evidence_url: Option<String>,
    /// Identity of the reporting user (carries the emergency contact).
    pub user_id: String,
    /// When this attempt was assembled.
    #[serde(skip_serializing)]
    pub created_at: DateTime<Utc>,
}

impl AlertRequest {
    /// Build a request for the current attempt.
    #[must_use]
    pub fn new(location: Coordinates, evidence_url: Option<String>, user_id: String) -> Self {
        Self {
            location,
            evidence_url,
            user_id,
            created_at: Utc::now(),
        }
    }
}

/// Backend acknowledgement of a delivered alert.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AlertReceipt {
    /// Human-readable confirmation from the backend.
    pub message: String,
    /// Backend-assigned reference (report id or SMS sid), when returned.
    #[serde(default, alias = "sid")]
    pub reference: Option<String>,
}

/// Refresh request body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

/// Refresh response body.
#[derive(Debug, Deserialize)]
struct RefreshResponse {
    token: String,
}

/// Transport seam to the backend alert service.
///
/// Every call takes the bearer token explicitly so the auth interceptor can
/// decide which token each attempt carries.
#[async_trait]
pub trait AlertTransport: Send + Sync + std::fmt::Debug {
    /// Submit a full report (with evidence reference).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unauthorized`] on HTTP 401, [`Error::Backend`] on
    /// other failure statuses, or [`Error::Http`] on transport failure.
    async fn submit_report(&self, token: &str, request: &AlertRequest) -> Result<AlertReceipt>;

    /// Send a bare emergency alert (no evidence).
    ///
    /// # Errors
    ///
    /// Same taxonomy as [`AlertTransport::submit_report`].
    async fn send_emergency(&self, token: &str, request: &AlertRequest) -> Result<AlertReceipt>;

    /// Exchange the refresh token for a new access token.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unauthorized`] when the refresh token is rejected.
    async fn refresh(&self, refresh_token: &str) -> Result<String>;
}

/// HTTP transport backed by reqwest.
#[derive(Debug)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    /// Create a transport against the given API base URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(base_url: impl Into<String>, timeout: std::time::Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn post_alert(
        &self,
        path: &str,
        token: &str,
        request: &AlertRequest,
    ) -> Result<AlertReceipt> {
        debug!(path, "submitting alert to backend");
        let response = self
            .client
            .post(self.url(path))
            .bearer_auth(token)
            .json(request)
            .send()
            .await?;

        Self::check_status(&response)?;
        Ok(response.json().await?)
    }

    fn check_status(response: &reqwest::Response) -> Result<()> {
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(Error::Unauthorized);
        }
        if !status.is_success() {
            return Err(Error::backend(
                status.as_u16(),
                status.canonical_reason().unwrap_or("request failed"),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl AlertTransport for HttpTransport {
    async fn submit_report(&self, token: &str, request: &AlertRequest) -> Result<AlertReceipt> {
        self.post_alert("/report/submit", token, request).await
    }

    async fn send_emergency(&self, token: &str, request: &AlertRequest) -> Result<AlertReceipt> {
        self.post_alert("/report/emergency", token, request).await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<String> {
        debug!("requesting access token refresh");
        let response = self
            .client
            .post(self.url("/auth/refresh"))
            .json(&RefreshRequest { refresh_token })
            .send()
            .await?;

        Self::check_status(&response)?;
        let body: RefreshResponse = response.json().await?;
        Ok(body.token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alert_request_serializes_backend_fields() {
        let request = AlertRequest::new(
            Coordinates::new(12.97, 77.59),
            Some("https://storage/rec.wav".to_string()),
            "user-42".to_string(),
        );
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["audioUrl"], "https://storage/rec.wav");
        assert_eq!(json["userId"], "user-42");
        assert!((json["location"]["latitude"].as_f64().unwrap() - 12.97).abs() < 1e-9);
        // Internal bookkeeping never crosses the wire.
        assert!(json.get("createdAt").is_none());
        assert!(json.get("created_at").is_none());
        assert!(json["location"].get("accuracy").is_none());
    }

    #[test]
    fn test_alert_request_omits_missing_evidence() {
        let request = AlertRequest::new(Coordinates::new(0.0, 0.0), None, "user-1".to_string());
        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("audioUrl").is_none());
    }

    #[test]
    fn test_alert_receipt_deserializes_report_response() {
        let receipt: AlertReceipt =
            serde_json::from_str(r#"{"message": "Report submitted successfully"}"#).unwrap();
        assert_eq!(receipt.message, "Report submitted successfully");
        assert!(receipt.reference.is_none());
    }

    #[test]
    fn test_alert_receipt_deserializes_sms_response() {
        let receipt: AlertReceipt = serde_json::from_str(
            r#"{"message": "Emergency SMS sent successfully", "sid": "SM123"}"#,
        )
        .unwrap();
        assert_eq!(receipt.reference.as_deref(), Some("SM123"));
    }

    #[test]
    fn test_http_transport_trims_trailing_slash() {
        let transport =
            HttpTransport::new("http://localhost:5000/api/", std::time::Duration::from_secs(10))
                .unwrap();
        assert_eq!(
            transport.url("/report/submit"),
            "http://localhost:5000/api/report/submit"
        );
    }

    #[test]
    fn test_coordinates_deserialize_defaults_accuracy() {
        let fix: Coordinates =
            serde_json::from_str(r#"{"latitude": 1.0, "longitude": 2.0}"#).unwrap();
        assert_eq!(fix.accuracy, AccuracyTier::High);
    }
}
