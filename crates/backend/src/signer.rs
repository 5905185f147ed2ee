//! Signed URLs for private storage objects.

use crate::client::{error_from_response, send, BackendClient};
use async_trait::async_trait;
use journal_core::{Error, Result};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use telemetry::health;
use tracing::{debug, warn};

/// Anything that can mint a time-limited read URL for `bucket/path`.
#[async_trait]
pub trait UrlSigner: Send + Sync {
    async fn create_signed_url(
        &self,
        bucket: &str,
        path: &str,
        expires_in: Duration,
    ) -> Result<String>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SignRequest {
    expires_in: u64,
}

#[derive(Deserialize)]
struct SignResponse {
    #[serde(rename = "signedURL", alias = "signedUrl")]
    signed_url: String,
}

/// Percent-encodes each path segment, keeping the separators.
fn encode_object_path(path: &str) -> String {
    path.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

impl BackendClient {
    fn absolute_signed_url(&self, signed: &str) -> String {
        if signed.starts_with("http://") || signed.starts_with("https://") {
            signed.to_string()
        } else {
            // Storage answers with a path relative to its own root.
            self.url(&format!("/storage/v1{}", signed))
        }
    }
}

#[async_trait]
impl UrlSigner for BackendClient {
    async fn create_signed_url(
        &self,
        bucket: &str,
        path: &str,
        expires_in: Duration,
    ) -> Result<String> {
        let endpoint = format!(
            "/storage/v1/object/sign/{}/{}",
            urlencoding::encode(bucket),
            encode_object_path(path)
        );

        debug!(bucket = %bucket, path = %path, "Requesting signed URL");

        let response = send(
            self.request(Method::POST, &endpoint).json(&SignRequest {
                expires_in: expires_in.as_secs(),
            }),
        )
        .await
        .inspect_err(|e| health().storage.set_unhealthy(e.to_string()))?;

        if !response.status().is_success() {
            let err = error_from_response(response).await;
            // 4xx means the object or policy is wrong, not that storage is down.
            if err.is_transient() {
                health().storage.set_unhealthy(err.to_string());
            }
            warn!(bucket = %bucket, path = %path, error = %err, "Storage refused to sign URL");
            return Err(err);
        }

        let body: SignResponse = response
            .json()
            .await
            .map_err(|e| Error::internal(format!("invalid sign response: {}", e)))?;

        health().storage.set_healthy();
        Ok(self.absolute_signed_url(&body.signed_url))
    }
}
