// src/sheets/sync.rs
//! Webhook client for pushing payloads to the external system of record.
//!
//! One blocking POST per send, no retries. Only `https` endpoints are
//! accepted, and TLS is verified against a pinned root CA only; there is no
//! way to turn verification off.

use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Certificate, StatusCode, Url};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info};

use super::payload::Payload;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("webhook URL is not configured")]
    MissingEndpoint,
    #[error("invalid webhook URL '{url}': {reason}")]
    InvalidEndpoint { url: String, reason: String },
    #[error("cannot read CA certificate {path:?}: {source}")]
    CaCertificateIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid CA certificate {path:?}: {source}")]
    CaCertificate {
        path: PathBuf,
        #[source]
        source: reqwest::Error,
    },
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

/// Pinned trust root for the webhook host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsConfig {
    pub ca_cert: PathBuf,
}

impl TlsConfig {
    pub fn new(ca_cert: impl Into<PathBuf>) -> Self {
        Self {
            ca_cert: ca_cert.into(),
        }
    }

    fn load_certificate(&self) -> Result<Certificate, SyncError> {
        let pem = std::fs::read(&self.ca_cert).map_err(|source| SyncError::CaCertificateIo {
            path: self.ca_cert.clone(),
            source,
        })?;
        Certificate::from_pem(&pem).map_err(|source| SyncError::CaCertificate {
            path: self.ca_cert.clone(),
            source,
        })
    }
}

/// Outcome of one send attempt. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncResult {
    pub success: bool,
    /// `None` when no HTTP response was received.
    pub status_code: Option<u16>,
    pub message: String,
}

impl SyncResult {
    pub fn accepted(status_code: u16) -> Self {
        Self {
            success: true,
            status_code: Some(status_code),
            message: "Successfully sent data to the webhook.".to_string(),
        }
    }

    pub fn rejected(status_code: u16, body: &str) -> Self {
        Self {
            success: false,
            status_code: Some(status_code),
            message: format!(
                "Failed to send data. Status code: {}, Response: {}",
                status_code, body
            ),
        }
    }

    pub fn network_failure(detail: impl fmt::Display) -> Self {
        Self {
            success: false,
            status_code: None,
            message: format!("Failed to send data. Network error: {}", detail),
        }
    }
}

impl fmt::Display for SyncResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Anything that can deliver a payload. [`SyncClient`] is the HTTPS
/// implementation.
pub trait WebhookTransport {
    fn send(&self, payload: &Payload) -> SyncResult;
}

pub struct SyncClient {
    endpoint: Url,
    client: Client,
}

impl SyncClient {
    pub fn new(endpoint: &str, tls: &TlsConfig, timeout: Duration) -> Result<Self, SyncError> {
        if endpoint.trim().is_empty() {
            return Err(SyncError::MissingEndpoint);
        }
        let endpoint = Url::parse(endpoint.trim()).map_err(|e| SyncError::InvalidEndpoint {
            url: endpoint.to_string(),
            reason: e.to_string(),
        })?;
        if endpoint.scheme() != "https" {
            return Err(SyncError::InvalidEndpoint {
                url: endpoint.to_string(),
                reason: format!(
                    "scheme '{}' is not allowed, the webhook must use https",
                    endpoint.scheme()
                ),
            });
        }
        let certificate = tls.load_certificate()?;
        let client = Client::builder()
            .https_only(true)
            .tls_built_in_root_certs(false)
            .add_root_certificate(certificate)
            .timeout(timeout)
            .build()
            .map_err(SyncError::Client)?;
        info!(
            "Webhook client ready for {} (CA {:?}, timeout {:?})",
            endpoint.host_str().unwrap_or("<no host>"),
            tls.ca_cert,
            timeout
        );
        Ok(Self { endpoint, client })
    }
}

impl WebhookTransport for SyncClient {
    fn send(&self, payload: &Payload) -> SyncResult {
        let body = match payload.to_body() {
            Ok(body) => body,
            Err(e) => return SyncResult::network_failure(format!("could not encode payload: {}", e)),
        };
        info!("Sending {} payload entries to {}", payload.len(), self.endpoint);

        let response = self
            .client
            .post(self.endpoint.clone())
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send();

        match response {
            Ok(resp) => {
                let status = resp.status();
                let text = resp
                    .text()
                    .unwrap_or_else(|e| format!("<unreadable response body: {}>", e));
                interpret_response(status, &text)
            }
            Err(e) => {
                error!("Webhook request to {} failed: {}", self.endpoint, e);
                SyncResult::network_failure(e)
            }
        }
    }
}

/// 200 is the only accepted status; anything else is surfaced with its body.
pub fn interpret_response(status: StatusCode, body: &str) -> SyncResult {
    if status == StatusCode::OK {
        info!("Webhook accepted payload");
        SyncResult::accepted(status.as_u16())
    } else {
        error!("Webhook rejected payload: {} {}", status.as_u16(), body);
        SyncResult::rejected(status.as_u16(), body)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::cell::RefCell;

    /// Records every payload it is asked to send and answers with a canned
    /// result.
    pub struct RecordingTransport {
        pub reply: SyncResult,
        pub sent: RefCell<Vec<Payload>>,
    }

    impl RecordingTransport {
        pub fn replying(reply: SyncResult) -> Self {
            Self {
                reply,
                sent: RefCell::new(Vec::new()),
            }
        }

        pub fn calls(&self) -> usize {
            self.sent.borrow().len()
        }
    }

    impl WebhookTransport for RecordingTransport {
        fn send(&self, payload: &Payload) -> SyncResult {
            self.sent.borrow_mut().push(payload.clone());
            self.reply.clone()
        }
    }
}
