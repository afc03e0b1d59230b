//! Remote service handles.
//!
//! # Responsibilities
//! - Hold an authenticated HTTP client for one credential
//! - Expose document and account calls for business closures
//! - Normalize every failure into [`RemoteError`] at this boundary
//!
//! # Design Decisions
//! - Building a handle never touches the network; the first call does
//! - Credentials travel as default headers of the per-handle client

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Client, Method, RequestBuilder};
use serde_json::Value;
use url::Url;

use crate::client::credential::Credential;
use crate::error::RemoteError;

const PROJECT_HEADER: &str = "x-project-id";
const API_KEY_HEADER: &str = "x-api-key";

/// Authenticated connection to the remote service.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    http: Client,
    endpoint: Url,
    project_id: String,
}

impl ConnectionHandle {
    pub fn new(credential: &Credential, endpoint: &Url, project_id: &str, timeout: Duration) -> Result<Self, RemoteError> {
        let mut headers = HeaderMap::new();
        headers.insert(PROJECT_HEADER, header_value(project_id)?);
        match credential {
            Credential::Bearer(token) => {
                headers.insert(AUTHORIZATION, header_value(&format!("Bearer {}", token))?);
            }
            Credential::ApiKey(key) => {
                let mut value = header_value(key)?;
                value.set_sensitive(true);
                headers.insert(API_KEY_HEADER, value);
            }
        }

        let http = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        // `join` drops the last path segment unless the base ends with '/'
        let mut endpoint = endpoint.clone();
        if !endpoint.path().ends_with('/') {
            let path = format!("{}/", endpoint.path());
            endpoint.set_path(&path);
        }

        Ok(Self {
            http,
            endpoint,
            project_id: project_id.to_string(),
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, RemoteError> {
        let url = self.endpoint.join(path)?;
        Ok(self.http.request(method, url))
    }

    async fn send_json(&self, request: RequestBuilder) -> Result<Value, RemoteError> {
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = remote_message(&body).unwrap_or_else(|| {
                status.canonical_reason().unwrap_or("request failed").to_string()
            });
            return Err(RemoteError::status(status.as_u16(), message));
        }
        if status == reqwest::StatusCode::NO_CONTENT {
            return Ok(Value::Null);
        }
        Ok(response.json::<Value>().await?)
    }
}

/// Document store operations.
#[derive(Debug, Clone)]
pub struct DocumentHandle {
    connection: ConnectionHandle,
}

impl DocumentHandle {
    pub async fn get_document(&self, collection: &str, id: &str) -> Result<Value, RemoteError> {
        let request = self
            .connection
            .request(Method::GET, &format!("collections/{}/documents/{}", collection, id))?;
        self.connection.send_json(request).await
    }

    pub async fn list_documents(&self, collection: &str, queries: &[(&str, &str)]) -> Result<Value, RemoteError> {
        let request = self
            .connection
            .request(Method::GET, &format!("collections/{}/documents", collection))?
            .query(queries);
        self.connection.send_json(request).await
    }

    pub async fn create_document(&self, collection: &str, data: &Value) -> Result<Value, RemoteError> {
        let request = self
            .connection
            .request(Method::POST, &format!("collections/{}/documents", collection))?
            .json(data);
        self.connection.send_json(request).await
    }
}

/// Account endpoint operations.
#[derive(Debug, Clone)]
pub struct AccountHandle {
    connection: ConnectionHandle,
}

impl AccountHandle {
    /// The account the handle's credential belongs to.
    pub async fn get(&self) -> Result<Value, RemoteError> {
        let request = self.connection.request(Method::GET, "account")?;
        self.connection.send_json(request).await
    }
}

/// Everything the business layer needs to talk to the remote service as one credential.
#[derive(Debug, Clone)]
pub struct ClientHandle {
    pub credential: Credential,
    pub connection: ConnectionHandle,
    pub documents: DocumentHandle,
    pub account: AccountHandle,
}

impl ClientHandle {
    pub fn build(credential: Credential, endpoint: &Url, project_id: &str, timeout: Duration) -> Result<Self, RemoteError> {
        let connection = ConnectionHandle::new(&credential, endpoint, project_id, timeout)?;
        Ok(Self {
            documents: DocumentHandle { connection: connection.clone() },
            account: AccountHandle { connection: connection.clone() },
            connection,
            credential,
        })
    }
}

fn header_value(value: &str) -> Result<HeaderValue, RemoteError> {
    HeaderValue::from_str(value).map_err(|e| RemoteError::request(format!("invalid header value: {}", e)))
}

/// Pull `message` out of a JSON error body, falling back to the raw text.
fn remote_message(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }
    match serde_json::from_str::<Value>(trimmed) {
        Ok(json) => json
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| Some(trimmed.to_string())),
        Err(_) => Some(trimmed.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint() -> Url {
        Url::parse("http://127.0.0.1:9/v1").unwrap()
    }

    #[test]
    fn test_build_does_not_connect() {
        let handle = ClientHandle::build(
            Credential::Bearer("a.b.c".into()),
            &endpoint(),
            "demo",
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(handle.connection.endpoint().as_str(), "http://127.0.0.1:9/v1/");
        assert_eq!(handle.connection.project_id(), "demo");
    }

    #[test]
    fn test_invalid_header_is_request_error() {
        let err = ClientHandle::build(
            Credential::ApiKey("bad\nkey".into()),
            &endpoint(),
            "demo",
            Duration::from_secs(5),
        )
        .unwrap_err();
        assert_eq!(err.kind, crate::error::RemoteErrorKind::Request);
    }

    #[test]
    fn test_remote_message_extraction() {
        assert_eq!(remote_message(r#"{"message":"Document not found","code":404}"#).as_deref(), Some("Document not found"));
        assert_eq!(remote_message("plain failure").as_deref(), Some("plain failure"));
        assert_eq!(remote_message("  "), None);
    }
}
