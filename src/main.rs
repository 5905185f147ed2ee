//! Sip Journal client agent
//!
//! Hosts the two client-side utilities behind the journal UI:
//! - Signed URL resolution with an expiry-aware cache
//! - Batched analytics with a crash-safe local mirror
//!
//! Storage references passed as arguments are resolved and printed; with no
//! arguments the agent stays up until Ctrl+C, flushing analytics as it goes.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde_json::json;
use tokio::signal;
use tracing::{error, info, warn};

use analytics::{AnalyticsConfig, AnalyticsTracker};
use backend_client::{BackendClient, BackendConfig};
use local_store::{FileStore, KeyValueStore, MemoryStore};
use media::{MediaConfig, UrlResolver};
use telemetry::{health, init_tracing_from_env, metrics};

/// Application configuration.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct Config {
    /// Directory backing durable local storage
    #[serde(default = "default_data_dir")]
    data_dir: String,

    /// Seconds between status log lines; 0 disables them
    #[serde(default = "default_status_interval_secs")]
    status_interval_secs: u64,

    #[serde(default)]
    backend: BackendConfig,

    #[serde(default)]
    media: MediaConfig,

    #[serde(default)]
    analytics: AnalyticsConfig,
}

fn default_data_dir() -> String {
    ".sipjournal".to_string()
}

fn default_status_interval_secs() -> u64 {
    60
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            status_interval_secs: default_status_interval_secs(),
            backend: BackendConfig::default(),
            media: MediaConfig::default(),
            analytics: AnalyticsConfig::default(),
        }
    }
}

/// Process-wide instances shared by every screen.
struct Services {
    backend: BackendClient,
    resolver: UrlResolver,
    tracker: AnalyticsTracker,
}

impl Services {
    fn build(config: &Config) -> Result<Self> {
        let durable = FileStore::open(&config.data_dir)
            .with_context(|| format!("Failed to open data dir '{}'", config.data_dir))?;
        Self::with_stores(config, Arc::new(durable), Arc::new(MemoryStore::new()))
    }

    fn with_stores(
        config: &Config,
        durable: Arc<dyn KeyValueStore>,
        session: Arc<dyn KeyValueStore>,
    ) -> Result<Self> {
        let backend =
            BackendClient::new(config.backend.clone()).context("Failed to create backend client")?;

        let resolver = UrlResolver::new(
            Arc::new(backend.clone()),
            backend.storage_host().map(str::to_string),
            &config.media,
        );

        let tracker = AnalyticsTracker::new(
            config.analytics.clone(),
            Arc::new(backend.clone()),
            durable,
            session,
        );

        Ok(Self {
            backend,
            resolver,
            tracker,
        })
    }

    fn sign_in(&self, access_token: String, user_id: String) {
        self.backend.set_access_token(Some(access_token));
        self.tracker.set_user_id(Some(user_id));
        info!("Signed in");
    }

    /// URLs signed for the previous identity must not be served to the next.
    fn sign_out(&self) {
        self.resolver.clear_cache();
        self.backend.set_access_token(None);
        self.tracker.set_user_id(None);
        info!("Signed out, signed URL cache cleared");
    }

    fn shutdown(&self) {
        self.tracker.shutdown();
        self.resolver.clear_cache();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    init_tracing_from_env();

    info!("Starting Sip Journal agent v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config()?;
    info!(
        backend = %config.backend.base_url(),
        data_dir = %config.data_dir,
        analytics_enabled = config.analytics.enabled,
        "Loaded configuration"
    );

    let services = Services::build(&config)?;

    if let (Ok(token), Ok(user_id)) = (
        std::env::var("SIPJOURNAL_ACCESS_TOKEN"),
        std::env::var("SIPJOURNAL_USER_ID"),
    ) {
        services.sign_in(token, user_id);
    }

    check_health(&services.backend).await;
    services.tracker.start();

    let _status_handle = (config.status_interval_secs > 0)
        .then(|| start_status_log(Duration::from_secs(config.status_interval_secs)));

    let references: Vec<String> = std::env::args().skip(1).collect();
    if references.is_empty() {
        info!("No references given, running until shutdown signal");
        shutdown_signal().await;
    } else {
        resolve_and_print(&services, &references).await;
    }

    info!("Shutting down...");
    services.shutdown();

    let snapshot = metrics().snapshot();
    info!(
        events_tracked = snapshot.events_tracked,
        events_sent = snapshot.events_sent,
        queued = snapshot.queue_depth,
        url_cache_hits = snapshot.url_cache_hits,
        url_cache_misses = snapshot.url_cache_misses,
        "Shutdown complete"
    );
    Ok(())
}

async fn resolve_and_print(services: &Services, references: &[String]) {
    services.tracker.track_action(
        "resolve_references",
        json!({ "count": references.len() }),
    );

    let resolved = services.resolver.resolve_many(references).await;
    for reference in references {
        match resolved.get(reference) {
            Some(url) => println!("{}\t{}", reference, url),
            None => println!("{}\t-", reference),
        }
    }

    let missing = references.len() - references.iter().filter(|r| resolved.contains_key(*r)).count();
    if missing > 0 {
        warn!(missing, "Some references could not be resolved");
    }
}

/// Load configuration from files and environment.
fn load_config() -> Result<Config> {
    let config = config::Config::builder()
        // Start with defaults
        .add_source(config::Config::try_from(&Config::default())?)
        // Load from config file if exists
        .add_source(
            config::File::with_name("config/default")
                .required(false)
                .format(config::FileFormat::Toml),
        )
        // Override with environment variables
        .add_source(
            config::Environment::default()
                .prefix("SIPJOURNAL")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .context("Failed to build configuration")?;

    let mut config: Config = config
        .try_deserialize()
        .context("Failed to deserialize configuration")?;

    // Flat names for the settings deployments set most often
    if let Ok(url) = std::env::var("SIPJOURNAL_BACKEND_URL") {
        config.backend.url = url;
    }
    if let Ok(key) = std::env::var("SIPJOURNAL_BACKEND_ANON_KEY") {
        config.backend.anon_key = key;
    }
    if let Ok(dir) = std::env::var("SIPJOURNAL_DATA_DIR") {
        config.data_dir = dir;
    }

    Ok(config)
}

/// Check backend reachability on startup.
async fn check_health(backend: &BackendClient) {
    if backend_client::health::check_connection(backend).await {
        info!("Backend connection: healthy");
    } else {
        // Resolution and analytics both degrade gracefully offline.
        error!("Backend connection: unhealthy");
    }

    let report = health().report();
    info!(status = ?report.status, "Startup health");
}

fn start_status_log(every: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let s = metrics().snapshot();
            info!(
                queued = s.queue_depth,
                events_sent = s.events_sent,
                send_failures = s.send_failures,
                url_cache_hits = s.url_cache_hits,
                url_cache_misses = s.url_cache_misses,
                sign_latency_mean_ms = s.sign_latency_mean_ms,
                "Status"
            );
        }
    })
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install terminate handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            info!("Received terminate signal");
        }
    }
}
