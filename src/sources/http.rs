//! HTTP-backed reference clients for structured sources and the
//! text-completion capability.
//!
//! These speak a plain JSON request/response shape so the engine can be
//! pointed at real endpoints without the embedding application writing
//! its own plumbing. Transient transport failures map to
//! `SourceUnavailable` (retryable); 4xx responses map to `SourceRejected`
//! (not retryable).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::errors::{EngineError, Result};
use crate::sources::{CompletionCapability, SourceClient, SourceRecord};
use crate::types::SourceKind;

/// Request timeout safety net; per-call deadlines are tighter
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Serialize)]
struct QueryRequest<'a> {
    query: &'a str,
    limit: usize,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    records: Vec<SourceRecord>,
}

/// Generic JSON-API client for one structured source endpoint
pub struct HttpSourceClient {
    client: Client,
    endpoint: String,
    kind: SourceKind,
    quota: f64,
    cache_ttl: Duration,
}

impl HttpSourceClient {
    pub fn new(kind: SourceKind, endpoint: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(EngineError::HttpError)?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            kind,
            quota: 5.0,
            cache_ttl: Duration::from_secs(300),
        })
    }

    /// Override the declared quota (requests per second) and cache TTL
    pub fn with_limits(mut self, quota: f64, cache_ttl: Duration) -> Self {
        self.quota = quota;
        self.cache_ttl = cache_ttl;
        self
    }

    fn map_transport_error(&self, err: reqwest::Error) -> EngineError {
        if err.is_timeout() || err.is_connect() {
            EngineError::SourceUnavailable {
                source: self.kind,
                reason: err.to_string(),
            }
        } else {
            EngineError::HttpError(err)
        }
    }
}

#[async_trait]
impl SourceClient for HttpSourceClient {
    fn kind(&self) -> SourceKind {
        self.kind
    }

    fn quota(&self) -> f64 {
        self.quota
    }

    fn cache_ttl(&self) -> Duration {
        self.cache_ttl
    }

    async fn query(&self, text: &str, k: usize) -> Result<Vec<SourceRecord>> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&QueryRequest {
                query: text,
                limit: k,
            })
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        let status = response.status();
        if status.is_server_error() {
            return Err(EngineError::SourceUnavailable {
                source: self.kind,
                reason: format!("HTTP {}", status),
            });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EngineError::SourceRejected {
                source: self.kind,
                reason: format!("HTTP {}: {}", status, body),
            });
        }

        let parsed: QueryResponse = response
            .json()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        Ok(parsed.records)
    }
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    prompt: &'a str,
    context: &'a [String],
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    text: String,
}

/// JSON client for a hosted text-completion endpoint
pub struct HttpCompletionClient {
    client: Client,
    endpoint: String,
}

impl HttpCompletionClient {
    pub fn new(endpoint: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(EngineError::HttpError)?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl CompletionCapability for HttpCompletionClient {
    async fn complete(&self, prompt: &str, context: &[String]) -> Result<String> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&CompletionRequest { prompt, context })
            .send()
            .await
            .map_err(|e| EngineError::CompletionFailed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(EngineError::CompletionFailed(format!(
                "HTTP {}",
                response.status()
            )));
        }

        let parsed: CompletionResponse = response
            .json()
            .await
            .map_err(|e| EngineError::CompletionFailed(e.to_string()))?;

        Ok(parsed.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client =
            HttpSourceClient::new(SourceKind::DrugRecord, "http://127.0.0.1:9200/query").unwrap();
        assert_eq!(client.kind(), SourceKind::DrugRecord);
        assert_eq!(client.quota(), 5.0);
    }

    #[test]
    fn test_with_limits() {
        let client = HttpSourceClient::new(SourceKind::TrialRecord, "http://127.0.0.1:9200")
            .unwrap()
            .with_limits(2.0, Duration::from_secs(60));
        assert_eq!(client.quota(), 2.0);
        assert_eq!(client.cache_ttl(), Duration::from_secs(60));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_transient() {
        // Nothing listens on this port; the connect error must map to a
        // retryable SourceUnavailable.
        let client =
            HttpSourceClient::new(SourceKind::DrugRecord, "http://127.0.0.1:1/query").unwrap();
        let err = client.query("warfarin", 3).await.unwrap_err();
        assert!(err.is_transient(), "connect failure should be transient: {err}");
    }
}
