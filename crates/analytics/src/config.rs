//! Analytics queue configuration.

use journal_core::limits::{DEFAULT_BATCH_SIZE, DEFAULT_FLUSH_INTERVAL_MS, DEFAULT_MAX_QUEUE_LEN};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsConfig {
    /// Master switch; when false every track call is a no-op
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Queue length that triggers an immediate flush
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Delay after the latest enqueue before a deferred flush
    #[serde(default = "default_flush_interval_ms")]
    pub flush_interval_ms: u64,
    /// Upper bound for the retry delay after consecutive failed flushes.
    /// Equal to `flush_interval_ms` means no backoff.
    #[serde(default = "default_flush_interval_ms")]
    pub max_retry_interval_ms: u64,
    /// Oldest events are dropped beyond this many queued events
    #[serde(default = "default_max_queue_len")]
    pub max_queue_len: usize,
    /// Durable storage key holding the queue mirror
    #[serde(default = "default_queue_storage_key")]
    pub queue_storage_key: String,
    /// Session storage key holding the session ID
    #[serde(default = "default_session_storage_key")]
    pub session_storage_key: String,
    /// Emit a `session_start` event from `start()`
    #[serde(default = "default_enabled")]
    pub track_session_start: bool,
    /// Overrides the captured user agent
    #[serde(default)]
    pub user_agent: Option<String>,
    /// "WIDTHxHEIGHT" reported by the host, if any
    #[serde(default)]
    pub screen_size: Option<String>,
}

fn default_enabled() -> bool {
    true
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_flush_interval_ms() -> u64 {
    DEFAULT_FLUSH_INTERVAL_MS
}

fn default_max_queue_len() -> usize {
    DEFAULT_MAX_QUEUE_LEN
}

fn default_queue_storage_key() -> String {
    "analytics_queue".to_string()
}

fn default_session_storage_key() -> String {
    "analytics_session_id".to_string()
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            batch_size: default_batch_size(),
            flush_interval_ms: default_flush_interval_ms(),
            max_retry_interval_ms: default_flush_interval_ms(),
            max_queue_len: default_max_queue_len(),
            queue_storage_key: default_queue_storage_key(),
            session_storage_key: default_session_storage_key(),
            track_session_start: default_enabled(),
            user_agent: None,
            screen_size: None,
        }
    }
}

impl AnalyticsConfig {
    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }

    /// Delay before retrying after `failures` consecutive failed flushes:
    /// the flush interval, doubled per extra failure, capped at
    /// `max_retry_interval_ms`.
    pub fn retry_delay(&self, failures: u32) -> Duration {
        let base = self.flush_interval();
        let cap = Duration::from_millis(self.max_retry_interval_ms).max(base);
        let exponent = failures.saturating_sub(1).min(16);
        base.saturating_mul(1u32 << exponent).min(cap)
    }

    /// Batch size, never below one.
    pub fn effective_batch_size(&self) -> usize {
        self.batch_size.max(1)
    }
}
