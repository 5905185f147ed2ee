//! Backend reachability probe.

use crate::client::{send, BackendClient};
use reqwest::Method;
use telemetry::health;
use tracing::{debug, warn};

/// Probes the auth health endpoint and records the outcome for both
/// storage and ingest, which share the same gateway.
pub async fn check_connection(client: &BackendClient) -> bool {
    match send(client.request(Method::GET, "/auth/v1/health")).await {
        Ok(response) if response.status().is_success() => {
            debug!("Backend connection healthy");
            health().storage.set_healthy();
            health().ingest.set_healthy();
            true
        }
        Ok(response) => {
            let msg = format!("health endpoint returned {}", response.status());
            warn!("Backend health check failed: {}", msg);
            health().storage.set_unhealthy(msg.clone());
            health().ingest.set_unhealthy(msg);
            false
        }
        Err(e) => {
            warn!("Backend health check failed: {}", e);
            health().storage.set_unhealthy(e.to_string());
            health().ingest.set_unhealthy(e.to_string());
            false
        }
    }
}
