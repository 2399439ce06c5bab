//! Raw payload retrieval.
//!
//! The pipeline only ever asks a source for the text of one named request.
//! Status handling and timeouts live here; parsing lives in the format modules.

use async_trait::async_trait;
use macrofeed_core::config::FetchConfig;
use macrofeed_core::{Error, Result};
use reqwest::Client;
use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::Duration;
use tracing::debug;

/// One GET request for a raw payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRequest {
    /// Slot name this payload fills (series id, "fiscal", ...).
    pub name: String,
    pub url: String,
    /// Query parameters appended to the URL.
    pub query: Vec<(String, String)>,
}

impl SourceRequest {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            query: Vec::new(),
        }
    }

    /// Append a query parameter.
    pub fn param(mut self, key: &str, value: impl Into<String>) -> Self {
        self.query.push((key.to_string(), value.into()));
        self
    }

    /// Value of a query parameter, if set.
    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Anything that can turn a request into raw payload text.
#[async_trait]
pub trait PayloadSource: Send + Sync {
    /// Fetch the payload; a non-success response is an [`Error::Source`].
    async fn fetch_text(&self, request: &SourceRequest) -> Result<String>;
}

/// HTTP(S) source backed by reqwest.
pub struct HttpSource {
    client: Client,
}

impl HttpSource {
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| Error::config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PayloadSource for HttpSource {
    async fn fetch_text(&self, request: &SourceRequest) -> Result<String> {
        debug!(name = %request.name, url = %request.url, "GET");
        let response = self
            .client
            .get(&request.url)
            .query(&request.query)
            .send()
            .await
            .map_err(|e| Error::source(format!("{}: request failed: {e}", request.name)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::source(format!("{}: HTTP {status}", request.name)));
        }

        response
            .text()
            .await
            .map_err(|e| Error::source(format!("{}: failed to read body: {e}", request.name)))
    }
}

/// In-memory source keyed by request name.
///
/// Used for offline runs over files already on disk, and in tests.
#[derive(Default)]
pub struct MemorySource {
    payloads: BTreeMap<String, String>,
    failures: BTreeMap<String, String>,
    seen: Mutex<Vec<SourceRequest>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `text` for requests named `name`.
    pub fn with_payload(mut self, name: &str, text: impl Into<String>) -> Self {
        self.payloads.insert(name.to_string(), text.into());
        self
    }

    /// Fail requests named `name` with a source error.
    pub fn with_failure(mut self, name: &str, message: impl Into<String>) -> Self {
        self.failures.insert(name.to_string(), message.into());
        self
    }

    /// Requests received so far, in arrival order.
    pub fn seen(&self) -> Vec<SourceRequest> {
        self.seen.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl PayloadSource for MemorySource {
    async fn fetch_text(&self, request: &SourceRequest) -> Result<String> {
        if let Ok(mut seen) = self.seen.lock() {
            seen.push(request.clone());
        }
        if let Some(message) = self.failures.get(&request.name) {
            return Err(Error::source(format!("{}: {message}", request.name)));
        }
        self.payloads
            .get(&request.name)
            .cloned()
            .ok_or_else(|| Error::source(format!("{}: no payload available", request.name)))
    }
}
