//! Backend connection configuration.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Project base URL (e.g. "https://abcd.supabase.co")
    pub url: String,
    /// Public anon key, sent as `apikey` and as the bearer when signed out
    #[serde(default)]
    pub anon_key: String,
    /// Request timeout in seconds; unset leaves the HTTP client default
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
    /// Host serving storage objects, when it differs from `url`'s host
    #[serde(default)]
    pub storage_host: Option<String>,
    /// Table receiving analytics inserts
    #[serde(default = "default_events_table")]
    pub events_table: String,
}

fn default_events_table() -> String {
    "analytics_events".to_string()
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:54321".to_string(),
            anon_key: String::new(),
            request_timeout_secs: None,
            storage_host: None,
            events_table: default_events_table(),
        }
    }
}

impl BackendConfig {
    pub fn new(url: impl Into<String>, anon_key: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            anon_key: anon_key.into(),
            ..Self::default()
        }
    }

    /// Base URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        self.url.trim_end_matches('/')
    }
}
