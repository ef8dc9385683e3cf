//! Credential-refresh-and-replay interceptor.
//!
//! Wraps an [`AlertTransport`] and recovers from exactly one class of
//! failure: an expired access credential. On the first 401 for a logical
//! request it exchanges the refresh token for a new access token, persists
//! it, and replays the identical request once. A second 401, or a failing
//! refresh call, means the refresh credential itself is invalid: stored
//! credentials are purged and the session-expired callback fires so the
//! caller can force re-authentication. The retry happens at most once per
//! logical request, never in a loop.

use std::sync::Arc;

use tracing::{info, warn};

use crate::backend::{AlertReceipt, AlertRequest, AlertTransport};
use crate::credentials::CredentialStore;
use crate::error::{Error, Result};

/// Callback invoked when the session expires and credentials are purged.
///
/// Passed in at construction so session expiry is an explicit event, not a
/// global mutable redirect.
pub type SessionExpiredFn = Box<dyn Fn() + Send + Sync>;

/// Which backend operation a logical request targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AlertCall {
    Report,
    Emergency,
}

/// Authenticated client around an [`AlertTransport`].
pub struct AuthClient<T> {
    transport: T,
    store: Arc<dyn CredentialStore>,
    on_session_expired: SessionExpiredFn,
}

impl<T> std::fmt::Debug for AuthClient<T>
where
    T: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthClient")
            .field("transport", &self.transport)
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

impl<T: AlertTransport> AuthClient<T> {
    /// Create an authenticated client.
    pub fn new(
        transport: T,
        store: Arc<dyn CredentialStore>,
        on_session_expired: SessionExpiredFn,
    ) -> Self {
        Self {
            transport,
            store,
            on_session_expired,
        }
    }

    /// Submit a full report with the single-retry auth recovery.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SessionExpired`] when auth recovery is exhausted,
    /// or any transport/backend error from the underlying call.
    pub async fn submit_report(&self, request: &AlertRequest) -> Result<AlertReceipt> {
        self.call(AlertCall::Report, request).await
    }

    /// Send a bare emergency alert with the single-retry auth recovery.
    ///
    /// # Errors
    ///
    /// Same taxonomy as [`AuthClient::submit_report`].
    pub async fn send_emergency(&self, request: &AlertRequest) -> Result<AlertReceipt> {
        self.call(AlertCall::Emergency, request).await
    }

    async fn call(&self, call: AlertCall, request: &AlertRequest) -> Result<AlertReceipt> {
        let Some(credentials) = self.store.load()? else {
            warn!("no stored credentials; forcing re-authentication");
            return Err(self.expire_session());
        };

        let mut access_token = credentials.access_token.clone();
        let mut retried_after_auth_failure = false;

        loop {
            match self.dispatch(call, &access_token, request).await {
                Err(Error::Unauthorized) if !retried_after_auth_failure => {
                    info!("access credential rejected; attempting refresh");
                    retried_after_auth_failure = true;

                    match self.transport.refresh(&credentials.refresh_token).await {
                        Ok(fresh_token) => {
                            self.store.set_access_token(&fresh_token)?;
                            access_token = fresh_token;
                            // Replay the identical request exactly once.
                        }
                        Err(refresh_err) => {
                            warn!(error = %refresh_err, "credential refresh rejected");
                            return Err(self.expire_session());
                        }
                    }
                }
                Err(Error::Unauthorized) => {
                    // The refreshed token was rejected too: the refresh
                    // credential itself is invalid.
                    warn!("backend rejected refreshed credential");
                    return Err(self.expire_session());
                }
                other => return other,
            }
        }
    }

    async fn dispatch(
        &self,
        call: AlertCall,
        token: &str,
        request: &AlertRequest,
    ) -> Result<AlertReceipt> {
        match call {
            AlertCall::Report => self.transport.submit_report(token, request).await,
            AlertCall::Emergency => self.transport.send_emergency(token, request).await,
        }
    }

    /// Access the wrapped transport (test inspection only).
    #[cfg(test)]
    pub(crate) fn transport(&self) -> &T {
        &self.transport
    }

    /// Purge credentials, fire the session-expired callback, and produce
    /// the error callers propagate.
    fn expire_session(&self) -> Error {
        if let Err(purge_err) = self.store.purge() {
            warn!(error = %purge_err, "failed to purge stored credentials");
        }
        (self.on_session_expired)();
        Error::SessionExpired
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::backend::Coordinates;
    use crate::credentials::{Credentials, MemoryCredentialStore};

    /// Transport with programmed responses that records every call.
    #[derive(Debug, Default)]
    struct MockTransport {
        alert_responses: Mutex<VecDeque<Result<AlertReceipt>>>,
        refresh_responses: Mutex<VecDeque<Result<String>>>,
        alert_calls: Mutex<Vec<(String, AlertRequest)>>,
        refresh_calls: AtomicUsize,
    }

    impl MockTransport {
        fn push_alert(&self, response: Result<AlertReceipt>) {
            self.alert_responses.lock().unwrap().push_back(response);
        }

        fn push_refresh(&self, response: Result<String>) {
            self.refresh_responses.lock().unwrap().push_back(response);
        }

        fn alert_calls(&self) -> Vec<(String, AlertRequest)> {
            self.alert_calls.lock().unwrap().clone()
        }

        fn refresh_count(&self) -> usize {
            self.refresh_calls.load(Ordering::SeqCst)
        }

        fn pop_alert(&self, token: &str, request: &AlertRequest) -> Result<AlertReceipt> {
            self.alert_calls
                .lock()
                .unwrap()
                .push((token.to_string(), request.clone()));
            self.alert_responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| panic!("unexpected alert call"))
        }
    }

    #[async_trait]
    impl AlertTransport for MockTransport {
        async fn submit_report(
            &self,
            token: &str,
            request: &AlertRequest,
        ) -> Result<AlertReceipt> {
            self.pop_alert(token, request)
        }

        async fn send_emergency(
            &self,
            token: &str,
            request: &AlertRequest,
        ) -> Result<AlertReceipt> {
            self.pop_alert(token, request)
        }

        async fn refresh(&self, _refresh_token: &str) -> Result<String> {
            self.refresh_calls.fetch_add(1, Ordering::SeqCst);
            self.refresh_responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| panic!("unexpected refresh call"))
        }
    }

    fn receipt() -> AlertReceipt {
        AlertReceipt {
            message: "ok".to_string(),
            reference: None,
        }
    }

    fn request() -> AlertRequest {
        AlertRequest::new(Coordinates::new(12.9, 77.5), None, "user-1".to_string())
    }

    fn client_with(
        transport: MockTransport,
        store: Arc<dyn CredentialStore>,
    ) -> (AuthClient<MockTransport>, Arc<AtomicUsize>) {
        let expired = Arc::new(AtomicUsize::new(0));
        let expired_hook = Arc::clone(&expired);
        let client = AuthClient::new(
            transport,
            store,
            Box::new(move || {
                expired_hook.fetch_add(1, Ordering::SeqCst);
            }),
        );
        (client, expired)
    }

    fn seeded_store() -> Arc<MemoryCredentialStore> {
        Arc::new(MemoryCredentialStore::with_credentials(Credentials::new(
            "stale-access",
            "refresh-1",
        )))
    }

    #[tokio::test]
    async fn test_success_without_refresh() {
        let transport = MockTransport::default();
        transport.push_alert(Ok(receipt()));
        let store = seeded_store();
        let (client, expired) = client_with(transport, store);

        let result = client.send_emergency(&request()).await;
        assert!(result.is_ok());
        assert_eq!(client.transport.refresh_count(), 0);
        assert_eq!(expired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_single_401_refreshes_once_and_replays_identically() {
        let transport = MockTransport::default();
        transport.push_alert(Err(Error::Unauthorized));
        transport.push_alert(Ok(receipt()));
        transport.push_refresh(Ok("fresh-access".to_string()));
        let store = seeded_store();
        let (client, expired) = client_with(transport, store.clone());

        let original = request();
        let result = client.submit_report(&original).await;
        assert!(result.is_ok());

        // Exactly one refresh for one logical request.
        assert_eq!(client.transport.refresh_count(), 1);

        let calls = client.transport.alert_calls();
        assert_eq!(calls.len(), 2);
        // The replay carries the fresh token but the identical request:
        // no resource re-acquisition on retry.
        assert_eq!(calls[0].0, "stale-access");
        assert_eq!(calls[1].0, "fresh-access");
        assert_eq!(calls[0].1, original);
        assert_eq!(calls[1].1, original);

        // The refreshed token was persisted.
        let stored = store.load().unwrap().unwrap();
        assert_eq!(stored.access_token, "fresh-access");
        assert_eq!(stored.refresh_token, "refresh-1");

        assert_eq!(expired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_second_401_purges_and_signals_session_expiry() {
        let transport = MockTransport::default();
        transport.push_alert(Err(Error::Unauthorized));
        transport.push_alert(Err(Error::Unauthorized));
        transport.push_refresh(Ok("fresh-access".to_string()));
        let store = seeded_store();
        let (client, expired) = client_with(transport, store.clone());

        let result = client.submit_report(&request()).await;
        assert!(matches!(result, Err(Error::SessionExpired)));

        // One refresh, two alert calls, then recovery stops: never a loop.
        assert_eq!(client.transport.refresh_count(), 1);
        assert_eq!(client.transport.alert_calls().len(), 2);

        assert!(store.load().unwrap().is_none());
        assert_eq!(expired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_refresh_purges_without_replay() {
        let transport = MockTransport::default();
        transport.push_alert(Err(Error::Unauthorized));
        transport.push_refresh(Err(Error::Unauthorized));
        let store = seeded_store();
        let (client, expired) = client_with(transport, store.clone());

        let result = client.send_emergency(&request()).await;
        assert!(matches!(result, Err(Error::SessionExpired)));

        // The original request is not attempted again after a failed refresh.
        assert_eq!(client.transport.alert_calls().len(), 1);
        assert!(store.load().unwrap().is_none());
        assert_eq!(expired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_non_auth_backend_error_propagates_without_refresh() {
        let transport = MockTransport::default();
        transport.push_alert(Err(Error::backend(503, "service unavailable")));
        let store = seeded_store();
        let (client, expired) = client_with(transport, store);

        let result = client.submit_report(&request()).await;
        assert!(matches!(result, Err(Error::Backend { status: 503, .. })));
        assert_eq!(client.transport.refresh_count(), 0);
        assert_eq!(expired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_credentials_forces_reauthentication() {
        let transport = MockTransport::default();
        let store: Arc<dyn CredentialStore> = Arc::new(MemoryCredentialStore::new());
        let (client, expired) = client_with(transport, store);

        let result = client.send_emergency(&request()).await;
        assert!(matches!(result, Err(Error::SessionExpired)));
        // No transport traffic without credentials.
        assert!(client.transport.alert_calls().is_empty());
        assert_eq!(client.transport.refresh_count(), 0);
        assert_eq!(expired.load(Ordering::SeqCst), 1);
    }
}
