//! Remote data viewer
//!
//! [`DefaultDataViewer`] forwards every encoded packet to a remote inspection
//! endpoint over the host's [`HttpClient`]. Transmission starts disabled; a
//! successful probe of the endpoint enables it, and any failed delivery turns
//! it off again and fires the on-disable notifications.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use beacon_runtime::viewer::DataViewer;

use crate::http::{HttpClient, HttpRequest};

/// Name every default viewer registers under.
pub const DEFAULT_VIEWER_NAME: &str = "DefaultDataViewer";

pub const HEADER_MACHINE_IDENTIFIER: &str = "Machine-Identifier";
pub const HEADER_CONTENT_TYPE: &str = "Content-Type";
pub const HEADER_APP_NAME: &str = "App-Name";
pub const HEADER_APP_PLATFORM: &str = "App-Platform";
pub const PACKET_CONTENT_TYPE: &str = "Application/bond-compact-binary";

/// Default viewer errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HttpViewerError {
    /// No built-in HTTP stack exists; one must be supplied
    #[error("an HTTP client is required")]
    MissingHttpClient,
    #[error("machine identifier must not be blank")]
    InvalidMachineIdentifier,
    #[error("local viewer is not supported")]
    LocalViewerUnsupported,
}

/// Settings for [`DefaultDataViewer`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultDataViewerConfig {
    /// How long `enable_remote_viewer` waits for the probe response
    pub probe_timeout: Duration,
    /// Value of the `App-Name` header
    pub app_name: String,
    /// Value of the `App-Platform` header
    pub app_platform: String,
}

impl Default for DefaultDataViewerConfig {
    fn default() -> Self {
        let app_name = std::env::current_exe()
            .ok()
            .and_then(|path| path.file_stem().map(|s| s.to_string_lossy().into_owned()))
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| "beacon".to_string());
        Self {
            probe_timeout: Duration::from_secs(5),
            app_name,
            app_platform: std::env::consts::OS.to_string(),
        }
    }
}

type OnDisable = Arc<dyn Fn() + Send + Sync>;

struct ViewerState {
    transmitting: AtomicBool,
    endpoint: Mutex<Option<String>>,
    on_disable: Mutex<Vec<OnDisable>>,
}

impl ViewerState {
    fn endpoint(&self) -> MutexGuard<'_, Option<String>> {
        self.endpoint.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn disable(&self) {
        self.transmitting.store(false, Ordering::SeqCst);
        let notifications: Vec<OnDisable> = self
            .on_disable
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for notify in notifications {
            notify();
        }
    }
}

/// Data viewer that POSTs packets to a remote endpoint.
pub struct DefaultDataViewer {
    client: Arc<dyn HttpClient>,
    machine_identifier: String,
    config: DefaultDataViewerConfig,
    state: Arc<ViewerState>,
}

impl std::fmt::Debug for DefaultDataViewer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DefaultDataViewer")
            .field("machine_identifier", &self.machine_identifier)
            .field("transmitting", &self.is_transmission_enabled())
            .field("endpoint", &self.endpoint())
            .finish()
    }
}

impl DefaultDataViewer {
    /// Create a viewer with the default configuration
    pub fn new(
        client: Arc<dyn HttpClient>,
        machine_identifier: &str,
    ) -> Result<Self, HttpViewerError> {
        Self::builder()
            .http_client(client)
            .machine_identifier(machine_identifier)
            .build()
    }

    /// Create a new builder
    pub fn builder() -> DefaultDataViewerBuilder {
        DefaultDataViewerBuilder::default()
    }

    pub fn machine_identifier(&self) -> &str {
        &self.machine_identifier
    }

    pub fn config(&self) -> &DefaultDataViewerConfig {
        &self.config
    }

    pub fn is_transmission_enabled(&self) -> bool {
        self.state.transmitting.load(Ordering::SeqCst)
    }

    /// Endpoint packets are sent to, once a probe has succeeded
    pub fn endpoint(&self) -> Option<String> {
        self.state.endpoint().clone()
    }

    fn set_transmission_enabled(&self, enabled: bool) {
        self.state.transmitting.store(enabled, Ordering::SeqCst);
    }

    fn packet_request(&self, endpoint: &str, body: Vec<u8>) -> HttpRequest {
        let mut request = self.client.create_request();
        request.method = "POST".to_string();
        request.url = endpoint.to_string();
        request
            .headers
            .set(HEADER_MACHINE_IDENTIFIER, self.machine_identifier.as_str());
        request.headers.set(HEADER_CONTENT_TYPE, PACKET_CONTENT_TYPE);
        request.headers.set(HEADER_APP_NAME, self.config.app_name.as_str());
        request
            .headers
            .set(HEADER_APP_PLATFORM, self.config.app_platform.as_str());
        request.body = body;
        request
    }

    /// Probe `endpoint` with an empty POST and enable transmission on a 200.
    ///
    /// Blocks for at most the configured probe timeout.
    pub fn enable_remote_viewer(&self, endpoint: &str) -> bool {
        let endpoint = endpoint.trim();
        if endpoint.is_empty() {
            tracing::warn!("remote viewer endpoint is empty");
            return false;
        }

        let (tx, rx) = mpsc::channel();
        let probe = self.packet_request(endpoint, Vec::new());
        let probe_id = probe.id().to_string();
        self.client.send_request_async(
            probe,
            Box::new(move |response| {
                // the receiver is gone once the probe has timed out
                let _ = tx.send(response);
            }),
        );

        match rx.recv_timeout(self.config.probe_timeout) {
            Ok(response) if response.is_ok() => {
                *self.state.endpoint() = Some(endpoint.to_string());
                self.set_transmission_enabled(true);
                tracing::info!(endpoint, "remote data viewer enabled");
                true
            }
            Ok(response) => {
                tracing::warn!(endpoint, %response, "remote data viewer probe rejected");
                false
            }
            Err(_) => {
                self.client.cancel_request(&probe_id);
                tracing::warn!(endpoint, timeout = ?self.config.probe_timeout, "remote data viewer probe timed out");
                false
            }
        }
    }

    /// Viewing on the local machine is not available.
    pub fn enable_local_viewer(&self) -> Result<(), HttpViewerError> {
        Err(HttpViewerError::LocalViewerUnsupported)
    }

    /// Stop transmission and fire every on-disable notification.
    pub fn disable_viewer(&self) {
        self.state.disable();
        tracing::info!("remote data viewer disabled");
    }

    /// Register a callback fired whenever the viewer is disabled.
    ///
    /// Callbacks may run on the HTTP client's completion thread, or inside a
    /// collection dispatch when the client completes synchronously; they must
    /// not re-enter the viewer collection.
    pub fn register_on_disable_notification<F>(&self, notification: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.state
            .on_disable
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(notification));
    }
}

impl DataViewer for DefaultDataViewer {
    fn name(&self) -> &str {
        DEFAULT_VIEWER_NAME
    }

    fn receive_data(&self, packet: &[u8]) {
        if !self.is_transmission_enabled() {
            return;
        }
        let Some(endpoint) = self.endpoint() else {
            // enabled without a probe: nowhere to send
            tracing::warn!("remote data viewer has no endpoint");
            self.state.disable();
            return;
        };

        let request = self.packet_request(&endpoint, packet.to_vec());
        let state = self.state.clone();
        self.client.send_request_async(
            request,
            Box::new(move |response| {
                if !response.is_ok() {
                    tracing::warn!(%response, "remote data viewer delivery failed, disabling");
                    state.disable();
                }
            }),
        );
    }
}

/// Builder for DefaultDataViewer
#[derive(Default)]
pub struct DefaultDataViewerBuilder {
    client: Option<Arc<dyn HttpClient>>,
    machine_identifier: String,
    config: DefaultDataViewerConfig,
}

impl DefaultDataViewerBuilder {
    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.client = Some(client);
        self
    }

    pub fn machine_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.machine_identifier = identifier.into();
        self
    }

    pub fn config(mut self, config: DefaultDataViewerConfig) -> Self {
        self.config = config;
        self
    }

    /// Build the viewer
    pub fn build(self) -> Result<DefaultDataViewer, HttpViewerError> {
        let client = self.client.ok_or(HttpViewerError::MissingHttpClient)?;
        if self.machine_identifier.trim().is_empty() {
            return Err(HttpViewerError::InvalidMachineIdentifier);
        }
        Ok(DefaultDataViewer {
            client,
            machine_identifier: self.machine_identifier,
            config: self.config,
            state: Arc::new(ViewerState {
                transmitting: AtomicBool::new(false),
                endpoint: Mutex::new(None),
                on_disable: Mutex::new(Vec::new()),
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    use crate::http::{HttpResponse, HttpResult};
    use crate::mock::MockHttpClient;

    fn viewer_with(client: &Arc<MockHttpClient>) -> DefaultDataViewer {
        DefaultDataViewer::new(client.clone(), "Test").unwrap()
    }

    fn enabled_viewer(client: &Arc<MockHttpClient>) -> DefaultDataViewer {
        let viewer = viewer_with(client);
        viewer.set_transmission_enabled(true);
        *viewer.state.endpoint() = Some("TestEndpoint".to_string());
        viewer
    }

    #[test]
    fn construction_requires_http_client() {
        let result = DefaultDataViewer::builder().machine_identifier("Test").build();
        assert_eq!(result.err(), Some(HttpViewerError::MissingHttpClient));
    }

    #[test]
    fn construction_keeps_machine_identifier() {
        let client = Arc::new(MockHttpClient::new());
        let viewer = viewer_with(&client);
        assert_eq!(viewer.machine_identifier(), "Test");
        assert_eq!(viewer.name(), DEFAULT_VIEWER_NAME);
        assert!(!viewer.is_transmission_enabled());
    }

    #[test]
    fn blank_machine_identifier_rejected() {
        let client = Arc::new(MockHttpClient::new());
        for id in ["", "   "] {
            assert_eq!(
                DefaultDataViewer::new(client.clone(), id).err(),
                Some(HttpViewerError::InvalidMachineIdentifier)
            );
        }
    }

    #[test]
    fn enable_remote_viewer_succeeds_on_200() {
        let client = Arc::new(MockHttpClient::responding_with(200));
        let viewer = viewer_with(&client);

        assert!(viewer.enable_remote_viewer("TestEndpoint"));
        assert!(viewer.is_transmission_enabled());
        assert_eq!(viewer.endpoint().as_deref(), Some("TestEndpoint"));

        let probe = client.last_request().unwrap();
        assert_eq!(probe.method, "POST");
        assert!(probe.body.is_empty());
    }

    #[test]
    fn enable_remote_viewer_fails_on_error_response() {
        let client = Arc::new(MockHttpClient::new().with_responder(|request| {
            let mut response = HttpResponse::new(request.id(), 404);
            response.result = HttpResult::NetworkFailure;
            Some(response)
        }));
        let viewer = viewer_with(&client);

        assert!(!viewer.enable_remote_viewer("TestEndpoint"));
        assert!(!viewer.is_transmission_enabled());
        assert!(viewer.endpoint().is_none());
    }

    #[test]
    fn enable_remote_viewer_times_out_and_cancels_probe() {
        let client = Arc::new(MockHttpClient::new());
        let config = DefaultDataViewerConfig {
            probe_timeout: Duration::from_millis(10),
            ..DefaultDataViewerConfig::default()
        };
        let viewer = DefaultDataViewer::builder()
            .http_client(client.clone())
            .machine_identifier("Test")
            .config(config)
            .build()
            .unwrap();

        assert!(!viewer.enable_remote_viewer("TestEndpoint"));
        assert_eq!(client.pending_count(), 0);
    }

    #[test]
    fn disable_viewer_turns_transmission_off() {
        let client = Arc::new(MockHttpClient::responding_with(200));
        let viewer = enabled_viewer(&client);

        viewer.disable_viewer();
        assert!(!viewer.is_transmission_enabled());
        viewer.disable_viewer();
        assert!(!viewer.is_transmission_enabled());
    }

    #[test]
    fn disable_viewer_fires_every_notification() {
        let client = Arc::new(MockHttpClient::new());
        let viewer = viewer_with(&client);
        let calls = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            let calls = calls.clone();
            viewer.register_on_disable_notification(move || {
                calls.fetch_add(1, Ordering::SeqCst);
            });
        }

        viewer.disable_viewer();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn enable_local_viewer_is_unsupported() {
        let client = Arc::new(MockHttpClient::new());
        assert_eq!(
            viewer_with(&client).enable_local_viewer(),
            Err(HttpViewerError::LocalViewerUnsupported)
        );
    }

    #[test]
    fn receive_data_is_noop_while_disabled() {
        let client = Arc::new(MockHttpClient::responding_with(200));
        let viewer = viewer_with(&client);
        viewer.receive_data(&[]);
        assert_eq!(client.sent_count(), 0);
    }

    #[test]
    fn receive_data_sends_body_and_headers() {
        let client = Arc::new(MockHttpClient::responding_with(200));
        let viewer = enabled_viewer(&client);

        {
            let packet = vec![1u8, 2, 3];
            viewer.receive_data(&packet);
        }

        assert_eq!(client.sent_count(), 1);
        let request = client.last_request().unwrap();
        assert_eq!(request.url, "TestEndpoint");
        assert_eq!(request.body, vec![1u8, 2, 3]);
        assert_eq!(request.headers.get(HEADER_MACHINE_IDENTIFIER), Some("Test"));
        assert_eq!(request.headers.get(HEADER_CONTENT_TYPE), Some(PACKET_CONTENT_TYPE));
        assert!(!request.headers.get(HEADER_APP_NAME).unwrap_or("").is_empty());
        assert!(!request.headers.get(HEADER_APP_PLATFORM).unwrap_or("").is_empty());
        assert!(viewer.is_transmission_enabled());
    }

    #[test]
    fn failed_delivery_disables_transmission() {
        let client = Arc::new(MockHttpClient::responding_with(404));
        let viewer = enabled_viewer(&client);
        let notified = Arc::new(AtomicBool::new(false));
        let flag = notified.clone();
        viewer.register_on_disable_notification(move || flag.store(true, Ordering::SeqCst));

        assert!(viewer.is_transmission_enabled());
        viewer.receive_data(&[1, 2, 3]);
        assert!(!viewer.is_transmission_enabled());
        assert!(notified.load(Ordering::SeqCst));
    }

    #[test]
    fn late_failure_disables_after_the_fact() {
        let client = Arc::new(MockHttpClient::new());
        let viewer = enabled_viewer(&client);

        viewer.receive_data(&[7]);
        assert!(viewer.is_transmission_enabled());

        let id = client.last_request().unwrap().id().to_string();
        client.complete(&id, HttpResponse::new(id.as_str(), 500));
        assert!(!viewer.is_transmission_enabled());
    }
}
