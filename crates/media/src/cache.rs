//! In-memory cache of resolved signed URLs.

use chrono::{DateTime, Utc};
use journal_core::Clock;
use moka::future::Cache;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// A resolved URL and the moment it stops being served.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedUrlEntry {
    pub source_reference: String,
    pub resolved_url: String,
    /// Earlier than the signed URL's true expiry by the safety margin.
    pub expires_at: DateTime<Utc>,
}

impl CachedUrlEntry {
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

/// Reference → signed URL cache.
///
/// Freshness is decided against the injected clock. The moka TTL only
/// bounds how long abandoned entries occupy memory.
///
/// `clear` advances an epoch; inserts tagged with an older epoch are
/// discarded so a signing request that outlives a clear cannot repopulate
/// the cache.
#[derive(Clone)]
pub struct SignedUrlCache {
    entries: Cache<String, CachedUrlEntry>,
    clock: Arc<dyn Clock>,
    epoch: Arc<AtomicU64>,
}

impl SignedUrlCache {
    pub fn new(capacity: u64, max_age: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Cache::builder()
                .max_capacity(capacity)
                .time_to_live(max_age.max(Duration::from_secs(1)))
                .build(),
            clock,
            epoch: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Current clear generation. Read before a signing request and pass to
    /// `insert_if_current` afterwards.
    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    /// Returns the cached URL if it has not passed `expires_at`.
    pub async fn get_fresh(&self, reference: &str) -> Option<String> {
        let entry = self.entries.get(reference).await?;
        if entry.is_fresh(self.clock.now()) {
            Some(entry.resolved_url)
        } else {
            None
        }
    }

    /// Stores `url` for `reference`, replacing any previous entry.
    pub async fn insert(&self, reference: &str, url: &str, valid_for: Duration) {
        let valid_for = chrono::Duration::from_std(valid_for).unwrap_or_else(|_| chrono::Duration::zero());
        let entry = CachedUrlEntry {
            source_reference: reference.to_string(),
            resolved_url: url.to_string(),
            expires_at: self.clock.now() + valid_for,
        };
        self.entries.insert(reference.to_string(), entry).await;
    }

    /// Like `insert`, but only if no `clear` happened since `epoch` was read.
    /// Returns whether the entry was kept.
    pub async fn insert_if_current(
        &self,
        reference: &str,
        url: &str,
        valid_for: Duration,
        epoch: u64,
    ) -> bool {
        if self.epoch() != epoch {
            return false;
        }
        self.insert(reference, url, valid_for).await;

        // A clear may have landed while the insert was pending.
        if self.epoch() != epoch {
            self.entries.invalidate(reference).await;
            return false;
        }
        true
    }

    pub async fn entry(&self, reference: &str) -> Option<CachedUrlEntry> {
        self.entries.get(reference).await
    }

    /// Drops every entry.
    pub fn clear(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.entries.invalidate_all();
    }
}
