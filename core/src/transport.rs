// Network boundary
//
// Stores talk to the Argus REST API only through `Transport`, so tests and
// embedders can swap the HTTP client for anything that yields envelopes.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::config::ArgusConfig;
use crate::envelope::{ApiEnvelope, ApiRequest, ApiStatus, HttpMethod};
use crate::{ArgusError, Result};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    /// Issue one request and return the decoded envelope
    ///
    /// `Err` means the call produced no usable envelope (network failure,
    /// non-success status without an error envelope, undecodable body).
    async fn call(&self, request: ApiRequest) -> Result<ApiEnvelope>;
}

/// `reqwest`-backed transport against the Argus base URL
pub struct HttpTransport {
    base_url: String,
    http_client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(config: &ArgusConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| ArgusError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            http_client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url_for(&self, request: &ApiRequest) -> String {
        format!("{}{}", self.base_url, request.path)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn call(&self, request: ApiRequest) -> Result<ApiEnvelope> {
        let url = self.url_for(&request);
        debug!(target: "transport", method = ?request.method, url = %url, "Sending request");

        let builder = match request.method {
            HttpMethod::Get => self.http_client.get(&url),
            HttpMethod::Post => self.http_client.post(&url),
        };
        let builder = builder.query(&request.query);
        let builder = match &request.body {
            Some(body) => builder.json(body),
            None => builder,
        };

        let response = builder.send().await.map_err(|e| {
            warn!(target: "transport", url = %url, error = %e, "Request failed");
            ArgusError::Transport(e.to_string())
        })?;

        let status = response.status();
        let bytes = response.bytes().await.map_err(|e| {
            warn!(target: "transport", url = %url, error = %e, "Failed to read response body");
            ArgusError::Transport(e.to_string())
        })?;

        match serde_json::from_slice::<ApiEnvelope>(&bytes) {
            // The API reports application errors with non-2xx codes too
            Ok(envelope) if status.is_success() || envelope.status == ApiStatus::Error => {
                Ok(envelope)
            }
            Ok(_) => Err(ArgusError::Http {
                status: status.as_u16(),
            }),
            Err(_) if !status.is_success() => {
                warn!(target: "transport", url = %url, status = %status, "API returned error status");
                Err(ArgusError::Http {
                    status: status.as_u16(),
                })
            }
            Err(e) => {
                warn!(target: "transport", url = %url, error = %e, "Failed to parse response");
                Err(ArgusError::MalformedResponse(e.to_string()))
            }
        }
    }
}
