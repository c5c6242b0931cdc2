//! HTTP delivery of metric batches to the collector.
//!
//! A batch is serialized once, signed over the JSON bytes, optionally
//! gzip-compressed and POSTed to `/updates`. Only refused connections are
//! retried; any other failure is returned on the first attempt.

use crate::config::AgentConfig;
use async_trait::async_trait;
use reqwest::header::{CONTENT_ENCODING, CONTENT_TYPE};
use reqwest::{Client, StatusCode, Url};
use shared::codec::{self, Signer, SIGNATURE_HEADER};
use shared::models::Metric;
use shared::retry::{is_connection_refused, RetryPolicy, RetryableError};
use std::time::Duration;
use thiserror::Error;

/// Collector path accepting metric batches.
pub const UPDATES_PATH: &str = "/updates";

/// Errors that can occur while delivering a batch.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The collector address cannot be turned into an endpoint URL.
    #[error("Invalid collector address '{0}'")]
    InvalidUrl(String),

    /// The signing key is unusable.
    #[error("Invalid signing key: {0}")]
    InvalidKey(#[from] codec::CodecError),

    /// The batch could not be serialized.
    #[error("Failed to serialize batch: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The batch could not be compressed.
    #[error("Failed to compress batch: {0}")]
    Compress(#[from] std::io::Error),

    /// The request did not complete.
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The collector answered with a non-success status.
    #[error("Collector responded with {status}: {body}")]
    Status {
        /// Response status.
        status: StatusCode,
        /// Response body, for diagnostics.
        body: String,
    },
}

impl RetryableError for DeliveryError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(err) => err.is_connect() && is_connection_refused(err),
            _ => false,
        }
    }
}

/// Destination for metric batches.
#[async_trait]
pub trait BatchSink: Send + Sync {
    /// Delivers one batch.
    async fn deliver(&self, metrics: &[Metric]) -> Result<(), DeliveryError>;
}

/// Delivers batches to a collector over HTTP.
#[derive(Debug, Clone)]
pub struct DeliveryClient {
    client: Client,
    endpoint: Url,
    signer: Option<Signer>,
    gzip: bool,
    retry: RetryPolicy,
}

impl DeliveryClient {
    /// Creates a client posting to `<base_url>/updates`, uncompressed and
    /// unsigned, with the default retry policy.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or the HTTP client cannot be
    /// built.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, DeliveryError> {
        let endpoint = format!("{}{UPDATES_PATH}", base_url.trim_end_matches('/'));
        let endpoint = Url::parse(&endpoint).map_err(|_| DeliveryError::InvalidUrl(endpoint))?;
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            endpoint,
            signer: None,
            gzip: false,
            retry: RetryPolicy::default(),
        })
    }

    /// Creates a client from the agent configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the collector URL or the key is invalid.
    pub fn from_config(config: &AgentConfig) -> Result<Self, DeliveryError> {
        let mut client =
            Self::new(&config.collector_url, config.request_timeout)?.with_gzip(config.gzip);
        if let Some(key) = &config.key {
            client = client.with_signer(Signer::new(key)?);
        }
        Ok(client)
    }

    /// Signs every request body with `signer`.
    #[must_use]
    pub fn with_signer(mut self, signer: Signer) -> Self {
        self.signer = Some(signer);
        self
    }

    /// Enables or disables gzip request bodies.
    #[must_use]
    pub fn with_gzip(mut self, gzip: bool) -> Self {
        self.gzip = gzip;
        self
    }

    /// Replaces the retry policy.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Endpoint batches are posted to.
    #[must_use]
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Serializes, signs, compresses and posts `metrics`.
    ///
    /// # Errors
    ///
    /// Returns the first non-retryable error, or the last connection error once
    /// the retries are exhausted.
    pub async fn send(&self, metrics: &[Metric]) -> Result<(), DeliveryError> {
        let json = serde_json::to_vec(metrics)?;
        let signature = self.signer.as_ref().map(|signer| signer.sign(&json));
        let body = if self.gzip {
            codec::compress(&json)?
        } else {
            json
        };

        self.retry
            .run(|| self.post_once(&body, signature.as_deref()))
            .await
    }

    async fn post_once(&self, body: &[u8], signature: Option<&str>) -> Result<(), DeliveryError> {
        let mut request = self
            .client
            .post(self.endpoint.clone())
            .header(CONTENT_TYPE, "application/json")
            .body(body.to_vec());
        if self.gzip {
            request = request.header(CONTENT_ENCODING, "gzip");
        }
        if let Some(signature) = signature {
            request = request.header(SIGNATURE_HEADER, signature);
        }

        let response = request.send().await?;
        let status = response.status();
        let response_signature = response
            .headers()
            .get(SIGNATURE_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = response.bytes().await?;

        if !status.is_success() {
            return Err(DeliveryError::Status {
                status,
                body: String::from_utf8_lossy(&bytes).into_owned(),
            });
        }

        if let (Some(signer), Some(response_signature)) = (&self.signer, response_signature) {
            if let Err(err) = signer.verify(&bytes, &response_signature) {
                tracing::warn!(error = %err, "Collector response signature does not match");
            }
        }

        Ok(())
    }
}

#[async_trait]
impl BatchSink for DeliveryClient {
    async fn deliver(&self, metrics: &[Metric]) -> Result<(), DeliveryError> {
        self.send(metrics).await
    }
}
