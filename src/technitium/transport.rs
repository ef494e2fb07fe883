// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! HTTP transport for the Technitium DNS API.
//!
//! The transport knows how to move bytes, nothing more. JSON decoding and
//! status interpretation happen in the zone and record modules.
//!
//! [`DnsApiTransport`] is the seam that lets tests swap in a scripted double;
//! [`HttpTransport`] is the production implementation built on a single
//! pooled `reqwest::Client`.

use async_trait::async_trait;
use reqwest::Client as HttpClient;
use std::fmt::Debug;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use url::Url;

use crate::constants::{
    DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_POOL_IDLE_TIMEOUT_SECS, DEFAULT_POOL_MAX_IDLE_PER_HOST,
    DEFAULT_REQUEST_TIMEOUT_SECS,
};
use crate::errors::TransportError;

/// Primitive operations the zone resolver and record manager need.
///
/// Implementations must be safe to share between concurrent challenges and
/// must return [`TransportError::Cancelled`] promptly once `cancel` fires.
#[async_trait]
pub trait DnsApiTransport: Send + Sync + Debug {
    /// Issue a GET and return the raw response body.
    async fn get_json(
        &self,
        endpoint: &Url,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>, TransportError>;

    /// Issue a form-encoded POST and return the raw response body.
    async fn post_form(
        &self,
        endpoint: &Url,
        fields: &[(&str, &str)],
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>, TransportError>;
}

/// Tunables for [`HttpTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportSettings {
    /// Overall per-request timeout
    pub request_timeout: Duration,
    /// TCP connect plus TLS handshake timeout
    pub connect_timeout: Duration,
    /// Lifetime of idle pooled connections
    pub pool_idle_timeout: Duration,
    /// Idle connections kept per host
    pub pool_max_idle_per_host: usize,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            pool_idle_timeout: Duration::from_secs(DEFAULT_POOL_IDLE_TIMEOUT_SECS),
            pool_max_idle_per_host: DEFAULT_POOL_MAX_IDLE_PER_HOST,
        }
    }
}

/// Production transport backed by one pooled `reqwest::Client`.
///
/// Build it once at startup and share it (it is cheap to clone).
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: HttpClient,
}

impl HttpTransport {
    /// Build the shared client.
    ///
    /// Response compression is disabled; Technitium replies are small JSON
    /// documents.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::ClientBuild`] if the TLS backend cannot be
    /// initialised.
    pub fn new(settings: &TransportSettings) -> Result<Self, TransportError> {
        let client = HttpClient::builder()
            .timeout(settings.request_timeout)
            .connect_timeout(settings.connect_timeout)
            .pool_idle_timeout(settings.pool_idle_timeout)
            .pool_max_idle_per_host(settings.pool_max_idle_per_host)
            .no_gzip()
            .user_agent(concat!(
                env!("CARGO_PKG_NAME"),
                "/",
                env!("CARGO_PKG_VERSION")
            ))
            .build()
            .map_err(|e| TransportError::ClientBuild {
                reason: e.to_string(),
            })?;

        Ok(Self { client })
    }

    /// Send a prepared request, racing it against cancellation.
    ///
    /// The response body is fully read before returning so the pooled
    /// connection is released to the pool by the time the caller sees it.
    async fn execute(
        &self,
        request: reqwest::RequestBuilder,
        endpoint: &Url,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>, TransportError> {
        let path = endpoint.path().to_string();

        let exchange = async {
            let response = request
                .send()
                .await
                .map_err(|e| classify_reqwest_error(&path, e))?;

            let status = response.status();
            if !status.is_success() {
                // Technitium reports failures in the JSON body, usually with 200.
                // Anything else is handed to the caller to decode as it can.
                warn!(endpoint = %path, status = %status, "Non-success HTTP status from DNS API");
            }

            let body = response
                .bytes()
                .await
                .map_err(|e| classify_reqwest_error(&path, e))?;

            debug!(endpoint = %path, status = %status, response_len = body.len(), "DNS API request complete");
            Ok(body.to_vec())
        };

        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(TransportError::Cancelled { endpoint: path.clone() }),
            result = exchange => result,
        }
    }
}

#[async_trait]
impl DnsApiTransport for HttpTransport {
    async fn get_json(
        &self,
        endpoint: &Url,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>, TransportError> {
        let request = self
            .client
            .get(endpoint.clone())
            .header(reqwest::header::ACCEPT, "application/json");
        self.execute(request, endpoint, cancel).await
    }

    async fn post_form(
        &self,
        endpoint: &Url,
        fields: &[(&str, &str)],
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>, TransportError> {
        let request = self
            .client
            .post(endpoint.clone())
            .header(reqwest::header::ACCEPT, "application/json")
            .header(
                reqwest::header::CONTENT_TYPE,
                "application/x-www-form-urlencoded",
            )
            .body(encode_form(fields));
        self.execute(request, endpoint, cancel).await
    }
}

/// Encode `fields` as an `application/x-www-form-urlencoded` body.
#[must_use]
pub fn encode_form(fields: &[(&str, &str)]) -> String {
    url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(fields)
        .finish()
}

/// Map a reqwest error onto the transport taxonomy.
///
/// The URL is stripped first: its query string carries the API token.
fn classify_reqwest_error(endpoint: &str, err: reqwest::Error) -> TransportError {
    let err = err.without_url();
    if err.is_timeout() {
        TransportError::Timeout {
            endpoint: endpoint.to_string(),
        }
    } else if err.is_connect() {
        TransportError::Connection {
            endpoint: endpoint.to_string(),
            reason: error_chain(&err),
        }
    } else {
        TransportError::Request {
            endpoint: endpoint.to_string(),
            reason: error_chain(&err),
        }
    }
}

fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
