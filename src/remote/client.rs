//! HTTP implementation of [`RemoteApi`] backed by reqwest.

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, instrument};

use super::types::BackupEnvelope;
use super::{FullBackup, HttpMethod, RemoteApi, RemoteError, RemoteRequest, RemoteResponse};
use crate::config::RemoteConfig;
use crate::error::SyncError;

const FULL_BACKUP_PATH: &str = "/api/sync/full-backup";
const HEALTH_PATH: &str = "/api/health";

/// Client for the bookkeeping backend.
#[derive(Debug, Clone)]
pub struct HttpRemote {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl HttpRemote {
    /// Build a client from remote settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is empty or the HTTP client cannot be built.
    pub fn new(config: &RemoteConfig) -> Result<Self, SyncError> {
        let base_url = config.base_url.trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(SyncError::Config("remote.base_url is empty".to_string()));
        }

        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .user_agent(concat!("binar-sync/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| SyncError::Config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url,
            token: config.auth_token.clone(),
        })
    }

    /// The base URL requests are resolved against.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn execute(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<&Value>,
    ) -> Result<RemoteResponse, RemoteError> {
        let method = match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Patch => reqwest::Method::PATCH,
            HttpMethod::Delete => reqwest::Method::DELETE,
        };

        let mut builder = self.client.request(method, self.url(path));
        if let Some(body) = body {
            builder = builder.json(body);
        }
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token);
        }

        let response = builder.send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;

        // Bodies are optional and not always JSON
        let body = if bytes.is_empty() {
            None
        } else {
            serde_json::from_slice::<Value>(&bytes).ok()
        };

        debug!(status = status.as_u16(), path, "remote response");

        if status.is_success() {
            Ok(RemoteResponse {
                status: status.as_u16(),
                body,
            })
        } else {
            Err(RemoteError::from_status(status.as_u16(), body))
        }
    }
}

#[async_trait]
impl RemoteApi for HttpRemote {
    #[instrument(skip(self, request), fields(method = %request.method, path = %request.path))]
    async fn send(&self, request: RemoteRequest) -> Result<RemoteResponse, RemoteError> {
        self.execute(request.method, &request.path, request.body.as_ref())
            .await
    }

    #[instrument(skip(self))]
    async fn full_backup(&self) -> Result<FullBackup, RemoteError> {
        let response = self.execute(HttpMethod::Get, FULL_BACKUP_PATH, None).await?;
        let body = response
            .body
            .ok_or_else(|| RemoteError::Protocol("Backup response is empty".to_string()))?;

        let envelope: BackupEnvelope = serde_json::from_value(body)
            .map_err(|e| RemoteError::Protocol(format!("Malformed backup response: {e}")))?;

        envelope.into_backup()
    }

    async fn ping(&self) -> Result<(), RemoteError> {
        match self.execute(HttpMethod::Get, HEALTH_PATH, None).await {
            // Any HTTP answer proves the backend is reachable
            Ok(_) | Err(RemoteError::Server { .. } | RemoteError::Validation { .. }) => Ok(()),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_trims_trailing_slash() {
        let config = RemoteConfig {
            base_url: "https://binar.example.com/".to_string(),
            ..RemoteConfig::default()
        };

        let remote = HttpRemote::new(&config).unwrap();
        assert_eq!(remote.base_url(), "https://binar.example.com");
        assert_eq!(remote.url("/api/health"), "https://binar.example.com/api/health");
    }

    #[test]
    fn test_new_rejects_empty_url() {
        let config = RemoteConfig {
            base_url: String::new(),
            ..RemoteConfig::default()
        };

        assert!(matches!(HttpRemote::new(&config), Err(SyncError::Config(_))));
    }
}
