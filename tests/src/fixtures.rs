//! Test fixtures and builders.

use crate::mocks::{MockSigner, MockSink};
use analytics::{AnalyticsConfig, AnalyticsTracker};
use chrono::Utc;
use journal_core::{AnalyticsEvent, Clock, DeviceInfo, EventCategory, ManualClock};
use local_store::KeyValueStore;
use media::{MediaConfig, UrlResolver};
use std::sync::Arc;

pub const QUEUE_KEY: &str = "analytics_queue";

/// A valid event with fixed device info.
pub fn event(name: &str) -> AnalyticsEvent {
    AnalyticsEvent::new(
        "sess-test".to_string(),
        name,
        EventCategory::Action,
        DeviceInfo::default(),
        Utc::now(),
    )
}

/// Resolver over a mock signer with a manual clock.
pub fn resolver(signer: &MockSigner, clock: &ManualClock) -> UrlResolver {
    UrlResolver::with_clock(
        Arc::new(signer.clone()),
        Some("abcd.supabase.co".to_string()),
        &MediaConfig::default(),
        Arc::new(clock.clone()) as Arc<dyn Clock>,
    )
}

/// Queue defaults without the automatic `session_start` event.
pub fn quiet_config() -> AnalyticsConfig {
    AnalyticsConfig {
        track_session_start: false,
        ..AnalyticsConfig::default()
    }
}

pub fn tracker(
    config: AnalyticsConfig,
    sink: &MockSink,
    durable: Arc<dyn KeyValueStore>,
    session: Arc<dyn KeyValueStore>,
) -> AnalyticsTracker {
    AnalyticsTracker::new(config, Arc::new(sink.clone()), durable, session)
}

/// Decodes the durable queue mirror; empty when the key is absent.
pub fn mirror(store: &dyn KeyValueStore) -> Vec<AnalyticsEvent> {
    store
        .get(QUEUE_KEY)
        .unwrap()
        .map(|raw| serde_json::from_str(&raw).unwrap())
        .unwrap_or_default()
}

pub fn names(events: &[AnalyticsEvent]) -> Vec<String> {
    events.iter().map(|e| e.event_name.clone()).collect()
}
