//! Key-value store clients.
//!
//! The keeper persists a small amount of state between invocations (the last
//! observed equity-per-share of each strategy). The hosting platform exposes
//! a key-value service over HTTP; [`MemoryKeyValueStore`] stands in for it in
//! local runs and tests.

use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, instrument};

/// String key-value persistence.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read a value. Missing keys yield `None`.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write a value, replacing any previous one.
    async fn put(&self, key: &str, value: &str) -> Result<()>;
}

/// Process-local store.
#[derive(Debug, Clone, Default)]
pub struct MemoryKeyValueStore {
    entries: Arc<DashMap<String, String>>,
}

impl MemoryKeyValueStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store holds no keys.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl KeyValueStore for MemoryKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.get(key).map(|v| v.value().clone()))
    }

    async fn put(&self, key: &str, value: &str) -> Result<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct KvEntry {
    value: Option<String>,
}

#[derive(Debug, Serialize)]
struct KvWrite<'a> {
    value: &'a str,
}

/// HTTP client for the hosted key-value service.
///
/// `GET {base}/kvstore/{key}` returns `{"value": ...}` or 404;
/// `PUT {base}/kvstore/{key}` takes `{"value": ...}`.
#[derive(Clone)]
pub struct HttpKeyValueStore {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl std::fmt::Debug for HttpKeyValueStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpKeyValueStore")
            .field("base_url", &self.base_url)
            .field("authenticated", &self.api_key.is_some())
            .finish()
    }
}

impl HttpKeyValueStore {
    /// Create a client for the service at `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: None,
        }
    }

    /// Authenticate requests with an API key.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    fn url(&self, key: &str) -> String {
        format!("{}/kvstore/{}", self.base_url, key)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.header("X-Api-Key", key),
            None => request,
        }
    }
}

#[async_trait]
impl KeyValueStore for HttpKeyValueStore {
    #[instrument(skip(self))]
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let response = self.authorize(self.client.get(self.url(key))).send().await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            debug!(key = key, "Key not found");
            return Ok(None);
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("KV store error: {} - {}", status, body);
        }

        let entry: KvEntry = response.json().await?;
        Ok(entry.value)
    }

    #[instrument(skip(self, value))]
    async fn put(&self, key: &str, value: &str) -> Result<()> {
        let response = self
            .authorize(self.client.put(self.url(key)))
            .json(&KvWrite { value })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("KV store error: {} - {}", status, body);
        }

        debug!(key = key, "Stored value");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_memory_store_roundtrip() {
        let store = MemoryKeyValueStore::new();
        assert!(store.is_empty());
        assert_eq!(store.get("eps:0xabc").await.unwrap(), None);

        store.put("eps:0xabc", "100").await.unwrap();
        store.put("eps:0xabc", "99").await.unwrap();

        assert_eq!(store.get("eps:0xabc").await.unwrap().as_deref(), Some("99"));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_http_get_existing_key() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/kvstore/eps:0xabc"))
            .and(header("X-Api-Key", "secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "key": "eps:0xabc",
                "value": "1000000000000000000"
            })))
            .mount(&server)
            .await;

        let store = HttpKeyValueStore::new(server.uri()).with_api_key("secret");
        let value = store.get("eps:0xabc").await.unwrap();

        assert_eq!(value.as_deref(), Some("1000000000000000000"));
    }

    #[tokio::test]
    async fn test_http_get_missing_key() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/kvstore/eps:0xdef"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let store = HttpKeyValueStore::new(format!("{}/", server.uri()));
        assert_eq!(store.get("eps:0xdef").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_http_put_sends_value() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/kvstore/eps:0xabc"))
            .and(body_json(serde_json::json!({ "value": "42" })))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let store = HttpKeyValueStore::new(server.uri());
        store.put("eps:0xabc", "42").await.unwrap();
    }

    #[tokio::test]
    async fn test_http_error_is_surfaced() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let store = HttpKeyValueStore::new(server.uri());
        let err = store.get("eps:0xabc").await.unwrap_err();

        assert!(err.to_string().contains("500"));
        assert!(err.to_string().contains("boom"));
    }
}
