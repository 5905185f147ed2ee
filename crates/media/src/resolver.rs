//! Storage reference → usable URL.

use crate::cache::SignedUrlCache;
use crate::config::MediaConfig;
use backend_client::UrlSigner;
use futures::future::join_all;
use journal_core::{system_clock, Clock, StorageReference};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use telemetry::metrics;
use tracing::{debug, warn};

/// Resolves storage references into signed URLs, caching them per
/// reference until shortly before they expire.
///
/// Cheap to clone; clones share one cache. Construct one per process and
/// hand it to whatever renders images.
#[derive(Clone)]
pub struct UrlResolver {
    signer: Arc<dyn UrlSigner>,
    cache: SignedUrlCache,
    storage_host: Option<String>,
    lifetime: Duration,
    cache_window: Duration,
}

impl UrlResolver {
    pub fn new(signer: Arc<dyn UrlSigner>, storage_host: Option<String>, config: &MediaConfig) -> Self {
        Self::with_clock(signer, storage_host, config, system_clock())
    }

    pub fn with_clock(
        signer: Arc<dyn UrlSigner>,
        storage_host: Option<String>,
        config: &MediaConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            signer,
            cache: SignedUrlCache::new(config.cache_capacity, config.lifetime(), clock),
            storage_host,
            lifetime: config.lifetime(),
            cache_window: config.cache_window(),
        }
    }

    /// Returns a URL that can be rendered, or `None` when there is nothing
    /// to show (empty reference or signing failed).
    pub async fn resolve(&self, reference: &str) -> Option<String> {
        let (bucket, path) = match StorageReference::parse(reference, self.storage_host.as_deref())? {
            StorageReference::External(url) => {
                metrics().url_passthrough.inc();
                return Some(url);
            }
            StorageReference::Object { bucket, path } => (bucket, path),
        };

        if let Some(url) = self.cache.get_fresh(reference).await {
            metrics().url_cache_hits.inc();
            debug!(reference = %reference, "Signed URL cache hit");
            return Some(url);
        }
        metrics().url_cache_misses.inc();

        let epoch = self.cache.epoch();
        let start = Instant::now();
        let result = self
            .signer
            .create_signed_url(&bucket, &path, self.lifetime)
            .await;
        metrics()
            .sign_latency_ms
            .observe(start.elapsed().as_millis() as u64);

        match result {
            Ok(url) => {
                if !self.cache_window.is_zero()
                    && !self
                        .cache
                        .insert_if_current(reference, &url, self.cache_window, epoch)
                        .await
                {
                    debug!(reference = %reference, "Cache cleared while signing, not caching URL");
                }
                Some(url)
            }
            Err(e) => {
                metrics().url_sign_failures.inc();
                warn!(
                    reference = %reference,
                    code = e.code(),
                    error = %e,
                    "Failed to resolve signed URL"
                );
                None
            }
        }
    }

    /// Resolves every distinct reference concurrently. References that do
    /// not resolve are left out of the map.
    pub async fn resolve_many<I, S>(&self, references: I) -> HashMap<String, String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let unique: HashSet<String> = references
            .into_iter()
            .map(|r| r.as_ref().to_string())
            .collect();

        let resolved = join_all(unique.into_iter().map(|reference| async move {
            let url = self.resolve(&reference).await;
            (reference, url)
        }))
        .await;

        resolved
            .into_iter()
            .filter_map(|(reference, url)| url.map(|u| (reference, u)))
            .collect()
    }

    /// Forgets every cached URL. Call on sign-out so URLs authorized for
    /// one identity are never served to the next.
    pub fn clear_cache(&self) {
        debug!("Clearing signed URL cache");
        self.cache.clear();
    }

    pub fn cache(&self) -> &SignedUrlCache {
        &self.cache
    }
}
