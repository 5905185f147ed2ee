//! Bulk insert of analytics events.

use crate::client::{error_from_response, send, BackendClient};
use async_trait::async_trait;
use journal_core::{AnalyticsEvent, Result};
use reqwest::Method;
use telemetry::health;
use tracing::{debug, warn};

/// Destination for analytics batches.
///
/// A batch either lands completely or not at all; there is no partial
/// success to reconcile.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn insert_events(&self, events: &[AnalyticsEvent]) -> Result<()>;
}

#[async_trait]
impl EventSink for BackendClient {
    async fn insert_events(&self, events: &[AnalyticsEvent]) -> Result<()> {
        if events.is_empty() {
            return Ok(());
        }

        let endpoint = format!("/rest/v1/{}", self.config().events_table);

        let response = send(
            self.request(Method::POST, &endpoint)
                .header("Prefer", "return=minimal")
                .json(events),
        )
        .await
        .inspect_err(|e| health().ingest.set_unhealthy(e.to_string()))?;

        if !response.status().is_success() {
            let err = error_from_response(response).await;
            health().ingest.set_unhealthy(err.to_string());
            warn!(count = events.len(), error = %err, "Backend rejected analytics batch");
            return Err(err);
        }

        health().ingest.set_healthy();
        debug!(count = events.len(), "Inserted analytics batch");
        Ok(())
    }
}
