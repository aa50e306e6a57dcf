//! Upstream document transport.
//!
//! The deploy pipeline downloads the item document it is asked to ingest.
//! [`Fetcher`] abstracts that download so the service can be driven by a
//! real HTTP client in production and by an in-memory stub in tests.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::{debug, warn};

use crate::error::FetchError;

/// Default bound on a single upstream request.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(60);

// =============================================================================
// Fetcher Trait
// =============================================================================

/// Source of raw JSON documents addressed by URL.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Download the document at `url`.
    ///
    /// Implementations must return the body only if it parses as JSON and is
    /// not an empty document (see [`check_document`]).
    async fn fetch_json(&self, url: &str) -> Result<Bytes, FetchError>;
}

/// Validate a downloaded body.
///
/// An empty body, or a JSON document that is `null`, `false`, `0`, `""`,
/// `{}` or `[]`, counts as empty. Anything that does not parse is invalid.
pub fn check_document(url: &str, body: &[u8]) -> Result<(), FetchError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(FetchError::EmptyBody(url.to_string()));
    }

    let document: serde_json::Value = serde_json::from_slice(body)
        .map_err(|e| FetchError::InvalidJson(format!("{}: {}", url, e)))?;

    let empty = match &document {
        serde_json::Value::Null => true,
        serde_json::Value::Bool(b) => !b,
        serde_json::Value::Number(n) => n.as_f64() == Some(0.0),
        serde_json::Value::String(s) => s.is_empty(),
        serde_json::Value::Array(items) => items.is_empty(),
        serde_json::Value::Object(members) => members.is_empty(),
    };
    if empty {
        return Err(FetchError::EmptyBody(url.to_string()));
    }
    Ok(())
}

// =============================================================================
// HttpFetcher
// =============================================================================

/// [`Fetcher`] backed by a shared `reqwest` client.
#[derive(Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpFetcher {
    /// Create a fetcher whose requests are bounded by `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::Unreachable(format!("HTTP client: {}", e)))?;
        Ok(Self { client, timeout })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn map_error(&self, url: &str, err: reqwest::Error) -> FetchError {
        if err.is_timeout() {
            FetchError::Timeout(self.timeout.as_secs())
        } else {
            FetchError::Unreachable(format!("{}: {}", url, err))
        }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch_json(&self, url: &str) -> Result<Bytes, FetchError> {
        debug!(url = url, "Fetching upstream document");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| self.map_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            warn!(url = url, status = status.as_u16(), "Upstream returned an error status");
            return Err(FetchError::Unreachable(format!("{}: HTTP {}", url, status)));
        }

        let body = response.bytes().await.map_err(|e| self.map_error(url, e))?;
        check_document(url, &body)?;

        debug!(url = url, bytes = body.len(), "Fetched upstream document");
        Ok(body)
    }
}
