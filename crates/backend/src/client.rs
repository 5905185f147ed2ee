//! HTTP client wrapper for the managed backend.

use crate::config::BackendConfig;
use journal_core::{Error, Result};
use parking_lot::RwLock;
use reqwest::{Method, RequestBuilder, Response};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Shared, cheaply cloneable backend client.
///
/// The access token is swapped on sign-in / sign-out; every clone sees the
/// current identity.
#[derive(Clone)]
pub struct BackendClient {
    http: reqwest::Client,
    config: Arc<BackendConfig>,
    storage_host: Option<String>,
    access_token: Arc<RwLock<Option<String>>>,
}

impl BackendClient {
    pub fn new(config: BackendConfig) -> Result<Self> {
        let parsed = url::Url::parse(config.base_url())
            .map_err(|e| Error::config(format!("invalid backend url '{}': {}", config.url, e)))?;

        let storage_host = config
            .storage_host
            .clone()
            .or_else(|| parsed.host_str().map(str::to_string));

        let mut builder = reqwest::Client::builder();
        if let Some(secs) = config.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let http = builder
            .build()
            .map_err(|e| Error::config(format!("failed to build HTTP client: {}", e)))?;

        info!(
            url = %config.base_url(),
            storage_host = storage_host.as_deref().unwrap_or("none"),
            "Created backend client"
        );

        Ok(Self {
            http,
            config: Arc::new(config),
            storage_host,
            access_token: Arc::new(RwLock::new(None)),
        })
    }

    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    /// Host whose URLs are treated as storage references.
    pub fn storage_host(&self) -> Option<&str> {
        self.storage_host.as_deref()
    }

    /// Switches the identity used for subsequent requests.
    pub fn set_access_token(&self, token: Option<String>) {
        debug!(signed_in = token.is_some(), "Backend access token changed");
        *self.access_token.write() = token;
    }

    pub fn has_access_token(&self) -> bool {
        self.access_token.read().is_some()
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url(), path)
    }

    /// Builds a request carrying the project key and current bearer.
    pub(crate) fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let bearer = self
            .access_token
            .read()
            .clone()
            .unwrap_or_else(|| self.config.anon_key.clone());

        self.http
            .request(method, self.url(path))
            .header("apikey", &self.config.anon_key)
            .bearer_auth(bearer)
    }
}

/// Sends a request, mapping transport failures to `Error::Network`.
pub(crate) async fn send(request: RequestBuilder) -> Result<Response> {
    request
        .send()
        .await
        .map_err(|e| Error::network(e.to_string()))
}

/// Turns a non-success response into `Error::Backend`, preferring the JSON
/// `message` / `error` field over the raw body.
pub(crate) async fn error_from_response(response: Response) -> Error {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();

    let message = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|v| {
            v.get("message")
                .or_else(|| v.get("error"))
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or(body);

    Error::backend(status, message)
}
