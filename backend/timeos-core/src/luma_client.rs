// src/luma_client.rs

use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use url::Url;

pub const DEFAULT_LUMA_API_URL: &str = "http://0.0.0.0:1234";
pub const DEFAULT_LUMA_API_KEY: &str = "dev";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
/// Upper bound for regular collection scans.
pub const FIND_LIMIT: usize = 1000;
/// Upper bound used when wiping a collection.
pub const CLEAR_LIMIT: usize = 10_000;

// --- Collections ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Collection {
    Users,
    Projects,
    Tasks,
    TimeEntries,
    TaskTimeEntries,
    Resources,
    Allocations,
    Approvals,
}

impl Collection {
    pub const ALL: [Collection; 8] = [
        Collection::Users,
        Collection::Projects,
        Collection::Tasks,
        Collection::TimeEntries,
        Collection::TaskTimeEntries,
        Collection::Resources,
        Collection::Allocations,
        Collection::Approvals,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Users => "users",
            Collection::Projects => "projects",
            Collection::Tasks => "tasks",
            Collection::TimeEntries => "time_entries",
            Collection::TaskTimeEntries => "task_time_entries",
            Collection::Resources => "resources",
            Collection::Allocations => "allocations",
            Collection::Approvals => "approvals",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// --- Errors ---

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("HTTP request failed")]
    Request(#[from] reqwest::Error),
    #[error("JSON processing error")]
    Json(#[from] serde_json::Error),
    #[error("URL parsing error")]
    UrlParse(#[from] url::ParseError),
    #[error("Luma API error: Status={status}, Message='{message}'")]
    Api { status: u16, message: String },
    #[error("Configuration error: {0}")]
    Config(String),
}

// --- Wire types ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredDoc<T> {
    pub doc: T,
    pub id: String,
    #[serde(default)]
    pub revision: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PutResponse {
    pub id: String,
    #[serde(default)]
    pub revision: u64,
}

#[derive(Debug, Deserialize)]
struct FindResponse {
    #[serde(default)]
    documents: Vec<StoredDoc<Value>>,
}

#[derive(Debug, Serialize)]
struct FindRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    filter: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct LumaErrorPayload {
    message: Option<String>,
    error: Option<String>,
}

/// Pulls a human readable message out of a Luma error body.
pub fn parse_error_message(body: &str) -> Option<String> {
    let payload: LumaErrorPayload = serde_json::from_str(body).ok()?;
    payload
        .message
        .or(payload.error)
        .filter(|m| !m.trim().is_empty())
}

// --- Store abstraction ---

/// Untyped document access. The data service layers typed models on top.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn find_docs(
        &self,
        collection: Collection,
        filter: Option<Value>,
        limit: Option<usize>,
    ) -> Result<Vec<StoredDoc<Value>>, StoreError>;

    async fn get_doc(
        &self,
        collection: Collection,
        id: &str,
    ) -> Result<Option<StoredDoc<Value>>, StoreError>;

    async fn put_doc(
        &self,
        collection: Collection,
        id: &str,
        doc: Value,
    ) -> Result<PutResponse, StoreError>;

    async fn delete_doc(&self, collection: Collection, id: &str) -> Result<(), StoreError>;
}

// --- Luma HTTP client ---

#[derive(Clone, Debug)]
pub struct LumaConfig {
    pub base_url: String,
    pub api_key: String,
    pub request_timeout_secs: u64,
}

impl Default for LumaConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_LUMA_API_URL.to_string(),
            api_key: DEFAULT_LUMA_API_KEY.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

#[derive(Clone)]
pub struct LumaClient {
    config: Arc<LumaConfig>,
    http_client: Client,
    base_url: Url,
}

impl LumaClient {
    pub fn new(config: LumaConfig) -> Result<Self, StoreError> {
        let base_url = Url::parse(&config.base_url)?;
        if base_url.cannot_be_a_base() {
            return Err(StoreError::Config(format!(
                "Luma API URL '{}' cannot be used as a base URL",
                config.base_url
            )));
        }

        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        info!("Luma client configured for {}", base_url);
        Ok(Self {
            config: Arc::new(config),
            http_client,
            base_url,
        })
    }

    /// Appends percent-encoded path segments to the configured base URL.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, StoreError> {
        let mut url = self.base_url.clone();
        {
            let mut path = url.path_segments_mut().map_err(|_| {
                StoreError::Config(format!("Invalid Luma base URL: {}", self.base_url))
            })?;
            path.pop_if_empty();
            path.extend(segments);
        }
        Ok(url)
    }

    fn doc_endpoint(&self, collection: Collection, id: &str) -> Result<Url, StoreError> {
        self.endpoint(&["v1", "doc", collection.as_str(), id])
    }

    fn build_request(&self, method: Method, url: Url) -> RequestBuilder {
        self.http_client
            .request(method, url)
            .header(AUTHORIZATION, format!("Bearer {}", self.config.api_key))
            .header(ACCEPT, "application/json")
            .header(CONTENT_TYPE, "application/json")
    }

    /// Sends the request and returns the raw body of a 2xx response.
    async fn send(
        &self,
        request_builder: RequestBuilder,
        context_msg: &str,
    ) -> Result<Vec<u8>, StoreError> {
        let request = match request_builder.build() {
            Ok(req) => req,
            Err(e) => {
                error!("Request build failed for '{}': {}", context_msg, e);
                return Err(StoreError::Request(e));
            }
        };
        let request_url = request.url().to_string();
        debug!("Sending request for '{}' to URL: {}", context_msg, request_url);

        let resp = match self.http_client.execute(request).await {
            Ok(resp) => resp,
            Err(e) => {
                error!(
                    "Network error for '{}' (URL: {}): {}",
                    context_msg, request_url, e
                );
                return Err(StoreError::Request(e));
            }
        };

        let status = resp.status();
        debug!(
            "Received response for '{}' (URL: {}): Status={}",
            context_msg, request_url, status
        );

        if status.is_success() {
            let bytes = resp.bytes().await?;
            return Ok(bytes.to_vec());
        }

        let error_body = resp.text().await.unwrap_or_default();
        let message = parse_error_message(&error_body)
            .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));
        warn!(
            "Luma request '{}' failed (URL: {}): Status={}, Message='{}'",
            context_msg, request_url, status, message
        );
        Err(StoreError::Api {
            status: status.as_u16(),
            message,
        })
    }

    async fn send_and_deserialize<T: DeserializeOwned>(
        &self,
        request_builder: RequestBuilder,
        context_msg: &str,
    ) -> Result<T, StoreError> {
        let bytes = self.send(request_builder, context_msg).await?;
        serde_json::from_slice::<T>(&bytes).map_err(|e| {
            error!("JSON deserialization failed for '{}': {}", context_msg, e);
            StoreError::Json(e)
        })
    }
}

#[async_trait]
impl DocumentStore for LumaClient {
    async fn find_docs(
        &self,
        collection: Collection,
        filter: Option<Value>,
        limit: Option<usize>,
    ) -> Result<Vec<StoredDoc<Value>>, StoreError> {
        let url = self.endpoint(&["v1", "doc", collection.as_str(), "find"])?;
        let body = serde_json::to_value(FindRequest { filter, limit })?;
        let context = format!("find {}", collection);
        let response: FindResponse = self
            .send_and_deserialize(self.build_request(Method::POST, url).json(&body), &context)
            .await?;
        debug!(
            "Found {} documents in '{}'",
            response.documents.len(),
            collection
        );
        Ok(response.documents)
    }

    async fn get_doc(
        &self,
        collection: Collection,
        id: &str,
    ) -> Result<Option<StoredDoc<Value>>, StoreError> {
        let url = self.doc_endpoint(collection, id)?;
        let context = format!("get {}/{}", collection, id);
        match self
            .send_and_deserialize::<StoredDoc<Value>>(
                self.build_request(Method::GET, url),
                &context,
            )
            .await
        {
            Ok(doc) => Ok(Some(doc)),
            Err(StoreError::Api { status, .. }) => {
                debug!("Document {}/{} absent (status {})", collection, id, status);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn put_doc(
        &self,
        collection: Collection,
        id: &str,
        doc: Value,
    ) -> Result<PutResponse, StoreError> {
        let url = self.doc_endpoint(collection, id)?;
        let context = format!("put {}/{}", collection, id);
        self.send_and_deserialize(self.build_request(Method::PUT, url).json(&doc), &context)
            .await
    }

    async fn delete_doc(&self, collection: Collection, id: &str) -> Result<(), StoreError> {
        let url = self.doc_endpoint(collection, id)?;
        let context = format!("delete {}/{}", collection, id);
        self.send(self.build_request(Method::DELETE, url), &context)
            .await
            .map(|_| ())
    }
}
