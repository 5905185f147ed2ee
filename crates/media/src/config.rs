//! Signed URL cache configuration.

use journal_core::limits::{DEFAULT_SIGNED_URL_LIFETIME_SECS, DEFAULT_SIGNED_URL_SAFETY_MARGIN_SECS};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    /// Lifetime requested for each signed URL
    #[serde(default = "default_lifetime_secs")]
    pub signed_url_lifetime_secs: u64,
    /// How long before true expiry a cached URL stops being served
    #[serde(default = "default_safety_margin_secs")]
    pub safety_margin_secs: u64,
    /// Maximum cached references
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: u64,
}

fn default_lifetime_secs() -> u64 {
    DEFAULT_SIGNED_URL_LIFETIME_SECS
}

fn default_safety_margin_secs() -> u64 {
    DEFAULT_SIGNED_URL_SAFETY_MARGIN_SECS
}

fn default_cache_capacity() -> u64 {
    10_000
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            signed_url_lifetime_secs: default_lifetime_secs(),
            safety_margin_secs: default_safety_margin_secs(),
            cache_capacity: default_cache_capacity(),
        }
    }
}

impl MediaConfig {
    pub fn lifetime(&self) -> Duration {
        Duration::from_secs(self.signed_url_lifetime_secs)
    }

    /// How long a freshly signed URL may be served from cache. Zero when the
    /// margin swallows the whole lifetime, which disables caching.
    pub fn cache_window(&self) -> Duration {
        Duration::from_secs(
            self.signed_url_lifetime_secs
                .saturating_sub(self.safety_margin_secs),
        )
    }
}
