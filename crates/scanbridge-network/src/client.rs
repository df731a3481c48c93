//! HTTP delivery of queued scan events.
//!
//! [`HttpDelivery`] posts one JSON payload per call. A 2xx response is the
//! only success; any other status, a timeout or a transport failure is a
//! [`DeliveryError`]. There is no retry here: the sender owns the retry and
//! circuit-breaker policy.

use crate::error::DeliveryError;
use reqwest::{StatusCode, Url};
use scanbridge_core::constants::REQUEST_TIMEOUT_SECS;
use std::time::Duration;
use tracing::{debug, trace};

/// Parse a delivery URL, accepting only http and https.
pub fn parse_endpoint(url: &str) -> Result<Url, DeliveryError> {
    let parsed = Url::parse(url).map_err(|e| DeliveryError::invalid_url(url, e))?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        other => Err(DeliveryError::invalid_url(
            url,
            format!("unsupported scheme {other}"),
        )),
    }
}

/// Posts payloads to delivery endpoints.
#[derive(Debug, Clone)]
pub struct HttpDelivery {
    client: reqwest::Client,
    timeout: Duration,
}

impl Default for HttpDelivery {
    fn default() -> Self {
        Self::from_reqwest(
            reqwest::Client::new(),
            Duration::from_secs(REQUEST_TIMEOUT_SECS),
        )
    }
}

impl HttpDelivery {
    /// Build a client whose requests give up after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns `DeliveryError::Client` if the TLS backend cannot be
    /// initialized.
    pub fn new(timeout: Duration) -> Result<Self, DeliveryError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("scanbridge/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| DeliveryError::Client(format!("failed to build HTTP client: {e}")))?;
        Ok(Self::from_reqwest(client, timeout))
    }

    /// Wrap an existing client; `timeout` is applied per request.
    pub fn from_reqwest(client: reqwest::Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// POST `payload` as JSON to `url`.
    ///
    /// Returns the 2xx status on success.
    pub async fn post(
        &self,
        url: &str,
        payload: &serde_json::Value,
    ) -> Result<StatusCode, DeliveryError> {
        let endpoint = parse_endpoint(url)?;
        trace!(url = %endpoint, "posting payload");

        let response = self
            .client
            .post(endpoint)
            .timeout(self.timeout)
            .json(payload)
            .send()
            .await
            .map_err(|e| self.classify(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DeliveryError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        debug!(url, status = status.as_u16(), "payload delivered");
        Ok(status)
    }

    fn classify(&self, url: &str, error: reqwest::Error) -> DeliveryError {
        if error.is_timeout() {
            DeliveryError::Timeout {
                url: url.to_string(),
                timeout_ms: self.timeout.as_millis() as u64,
            }
        } else {
            DeliveryError::Request(error)
        }
    }
}
