//! Remote Access Collaborator: GET/POST/PUT/DELETE against API paths.

use async_trait::async_trait;
use reqwest::{Client, Method};
use serde::Serialize;
use serde_json::Value;
use shared::error::ApiException;
use tracing::{debug, warn};

use crate::error::FetchFailure;

/// JSON-in/JSON-out access to the API. Implementations return the parsed
/// body on 2xx (`Value::Null` for an empty body) and a [`FetchFailure`] for
/// everything else.
#[async_trait]
pub trait RemoteAccess: Send + Sync {
    async fn get(&self, path: &str) -> Result<Value, FetchFailure>;
    async fn post(&self, path: &str, body: Option<Value>) -> Result<Value, FetchFailure>;
    async fn put(&self, path: &str, body: Value) -> Result<Value, FetchFailure>;
    async fn delete(&self, path: &str) -> Result<Value, FetchFailure>;
}

pub struct HttpRemote {
    http: Client,
    base_url: String,
}

impl HttpRemote {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(http: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { http, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn execute(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value, FetchFailure> {
        let mut request = self.http.request(method.clone(), self.url(path));
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await.map_err(|err| {
            warn!(%method, path, error = %err, "remote: request failed");
            FetchFailure::new(method.as_str(), path, err.to_string())
        })?;

        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|err| FetchFailure::new(method.as_str(), path, err.to_string()))?;

        if !status.is_success() {
            let exception = ApiException::from_body(status.as_u16(), &bytes);
            warn!(%method, path, status = status.as_u16(), "remote: non-success status");
            return Err(FetchFailure::new(
                method.as_str(),
                path,
                exception.to_string(),
            ));
        }

        debug!(%method, path, status = status.as_u16(), bytes = bytes.len(), "remote: ok");
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Null);
        }

        serde_json::from_slice(&bytes).map_err(|err| {
            FetchFailure::new(method.as_str(), path, format!("invalid JSON body: {err}"))
        })
    }
}

#[async_trait]
impl RemoteAccess for HttpRemote {
    async fn get(&self, path: &str) -> Result<Value, FetchFailure> {
        self.execute(Method::GET, path, None).await
    }

    async fn post(&self, path: &str, body: Option<Value>) -> Result<Value, FetchFailure> {
        self.execute(Method::POST, path, body).await
    }

    async fn put(&self, path: &str, body: Value) -> Result<Value, FetchFailure> {
        self.execute(Method::PUT, path, Some(body)).await
    }

    async fn delete(&self, path: &str) -> Result<Value, FetchFailure> {
        self.execute(Method::DELETE, path, None).await
    }
}

/// Serializes a typed request payload into the JSON body a [`RemoteAccess`]
/// call takes.
pub fn json_body<T: Serialize>(
    method: &str,
    path: &str,
    payload: &T,
) -> Result<Value, FetchFailure> {
    serde_json::to_value(payload)
        .map_err(|err| FetchFailure::new(method, path, format!("unencodable body: {err}")))
}

#[cfg(test)]
#[path = "tests/remote_tests.rs"]
mod tests;
