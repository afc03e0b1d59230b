use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Errors returned by [`AdminClient`].
#[derive(Debug)]
pub enum SdkError {
    Http(reqwest::Error),
    Status { status: StatusCode, body: String },
}

impl std::fmt::Display for SdkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SdkError::Http(e) => write!(f, "request failed: {}", e),
            SdkError::Status { status, body } => write!(f, "gateway returned {}: {}", status, body),
        }
    }
}

impl std::error::Error for SdkError {}

impl From<reqwest::Error> for SdkError {
    fn from(e: reqwest::Error) -> Self {
        SdkError::Http(e)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemStatus {
    pub version: String,
    pub status: String,
    pub circuit: String,
    pub health: String,
    pub score: u8,
    pub cached_clients: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStats {
    pub entries: usize,
    pub capacity: usize,
    pub admin_handle_built: bool,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub expirations: u64,
}

pub struct AdminClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl AdminClient {
    pub fn new(base_url: &str, api_key: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    async fn send<T: DeserializeOwned>(&self, method: Method, path: &str, body: Option<Value>) -> Result<T, SdkError> {
        let mut request = self
            .client
            .request(method, format!("{}{}", self.base_url, path))
            .bearer_auth(&self.api_key);
        if let Some(body) = body {
            request = request.json(&body);
        }

        let resp = request.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(SdkError::Status { status, body });
        }
        Ok(resp.json::<T>().await?)
    }

    pub async fn status(&self) -> Result<SystemStatus, SdkError> {
        self.send(Method::GET, "/admin/status", None).await
    }

    /// Network health snapshot as returned by the gateway.
    pub async fn health(&self) -> Result<Value, SdkError> {
        self.send(Method::GET, "/admin/health", None).await
    }

    pub async fn cache(&self) -> Result<CacheStats, SdkError> {
        self.send(Method::GET, "/admin/cache", None).await
    }

    /// Token health report for `token`.
    pub async fn analyze_token(&self, token: &str) -> Result<Value, SdkError> {
        self.send(
            Method::POST,
            "/admin/token/analyze",
            Some(serde_json::json!({ "token": token })),
        )
        .await
    }

    pub async fn reset(&self) -> Result<(), SdkError> {
        self.send::<Value>(Method::POST, "/admin/reset", None).await.map(|_| ())
    }
}
