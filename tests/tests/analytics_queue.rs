//! Analytics queue behavior across flushes, failures, and restarts.

use analytics::QueueState;
use integration_tests::fixtures::{self, mirror, names, quiet_config};
use integration_tests::mocks::MockSink;
use local_store::{FileStore, KeyValueStore, MemoryStore};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

#[tokio::test(start_paused = true)]
async fn test_ninth_event_waits_tenth_flushes() {
    let sink = MockSink::new();
    let durable = Arc::new(MemoryStore::new());
    let tracker = fixtures::tracker(quiet_config(), &sink, durable.clone(), Arc::new(MemoryStore::new()));

    for i in 0..9 {
        tracker.track_action(&format!("log_drink_{i}"), json!({ "n": i }));
    }
    settle().await;
    assert_eq!(sink.attempts(), 0);
    assert_eq!(mirror(&*durable).len(), 9);

    tracker.track_action("log_drink_9", json!({ "n": 9 }));
    settle().await;

    let batches = sink.batches();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].len(), 10);
    assert_eq!(batches[0][0].event_name, "log_drink_0");
    assert_eq!(batches[0][9].event_name, "log_drink_9");
    assert!(tracker.is_empty());
    assert_eq!(durable.get(fixtures::QUEUE_KEY).unwrap(), None);
}

#[tokio::test(start_paused = true)]
async fn test_idle_queue_flushes_after_interval() {
    let sink = MockSink::new();
    let tracker = fixtures::tracker(
        quiet_config(),
        &sink,
        Arc::new(MemoryStore::new()),
        Arc::new(MemoryStore::new()),
    );

    tracker.track_page_view("/collections");
    tokio::time::sleep(Duration::from_secs(29)).await;
    assert_eq!(sink.attempts(), 0);

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(sink.event_count(), 1);
    assert_eq!(tracker.state(), QueueState::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_failed_batch_requeued_ahead_of_new_events() {
    let sink = MockSink::new();
    sink.set_should_fail(true);
    sink.set_delay(Duration::from_millis(100));
    let durable = Arc::new(MemoryStore::new());
    let tracker = fixtures::tracker(quiet_config(), &sink, durable.clone(), Arc::new(MemoryStore::new()));

    for i in 0..10 {
        tracker.track_action(&format!("batch_{i}"), json!({}));
    }
    settle().await;
    assert_eq!(tracker.state(), QueueState::Flushing);

    tracker.track_action("late_a", json!({}));
    tracker.track_action("late_b", json!({}));

    tokio::time::sleep(Duration::from_millis(200)).await;

    let mut expected: Vec<String> = (0..10).map(|i| format!("batch_{i}")).collect();
    expected.push("late_a".into());
    expected.push("late_b".into());

    let queued = tracker.pending_events();
    assert_eq!(names(&queued), expected);
    assert_eq!(mirror(&*durable), queued);
    assert!(tracker.has_pending_flush());
    assert_eq!(sink.attempts(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_events_tracked_during_successful_flush_go_in_next_batch() {
    let sink = MockSink::new();
    sink.set_delay(Duration::from_millis(100));
    let durable = Arc::new(MemoryStore::new());
    let tracker = fixtures::tracker(quiet_config(), &sink, durable.clone(), Arc::new(MemoryStore::new()));

    for i in 0..10 {
        tracker.track_action(&format!("first_{i}"), json!({}));
    }
    settle().await;
    assert_eq!(tracker.state(), QueueState::Flushing);
    assert!(mirror(&*durable).is_empty());

    for i in 0..10 {
        tracker.track_action(&format!("second_{i}"), json!({}));
        assert_eq!(mirror(&*durable), tracker.pending_events());
    }
    assert_eq!(tracker.len(), 10);

    tokio::time::sleep(Duration::from_millis(300)).await;

    let batches = sink.batches();
    assert_eq!(batches.len(), 2);
    let first: Vec<String> = (0..10).map(|i| format!("first_{i}")).collect();
    let second: Vec<String> = (0..10).map(|i| format!("second_{i}")).collect();
    assert_eq!(names(&batches[0]), first);
    assert_eq!(names(&batches[1]), second);
    assert!(tracker.is_empty());
    assert_eq!(durable.get(fixtures::QUEUE_KEY).unwrap(), None);
}

#[tokio::test(start_paused = true)]
async fn test_recovers_after_backend_returns() {
    let sink = MockSink::new();
    sink.set_should_fail(true);
    let tracker = fixtures::tracker(
        quiet_config(),
        &sink,
        Arc::new(MemoryStore::new()),
        Arc::new(MemoryStore::new()),
    );

    tracker.track_action("rate_drink", json!({ "stars": 4 }));
    tokio::time::sleep(Duration::from_secs(31)).await;
    assert_eq!(sink.attempts(), 1);
    assert_eq!(tracker.len(), 1);

    sink.set_should_fail(false);
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(sink.event_count(), 1);
    assert!(tracker.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_quota_exceeded_keeps_memory_queue() {
    let sink = MockSink::new();
    let durable = Arc::new(MemoryStore::with_quota(64));
    let tracker = fixtures::tracker(quiet_config(), &sink, durable.clone(), Arc::new(MemoryStore::new()));

    tracker.track_action("share_drink", json!({ "channel": "link" }));

    assert_eq!(tracker.len(), 1);
    assert_eq!(durable.get(fixtures::QUEUE_KEY).unwrap(), None);

    tokio::time::sleep(Duration::from_secs(31)).await;
    assert_eq!(sink.event_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_queue_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let session = Arc::new(MemoryStore::new());

    let sink = MockSink::new();
    {
        let durable = Arc::new(FileStore::open(dir.path()).unwrap());
        let tracker = fixtures::tracker(quiet_config(), &sink, durable, session.clone());
        tracker.track_action("add_drink", json!({ "drink": "flat white" }));
        tracker.track_page_view("/drinks/42");
        tracker.shutdown();
    }
    assert_eq!(sink.attempts(), 0);

    let durable = Arc::new(FileStore::open(dir.path()).unwrap());
    let tracker = fixtures::tracker(quiet_config(), &sink, durable.clone(), session);
    assert_eq!(
        names(&tracker.pending_events()),
        vec!["add_drink", "page_view", "session_end"]
    );

    tracker.start();
    tokio::time::sleep(Duration::from_secs(31)).await;

    let batches = sink.batches();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].len(), 3);
    assert_eq!(durable.get(fixtures::QUEUE_KEY).unwrap(), None);
}

#[tokio::test(start_paused = true)]
async fn test_start_emits_session_start() {
    let sink = MockSink::new();
    let tracker = fixtures::tracker(
        analytics::AnalyticsConfig::default(),
        &sink,
        Arc::new(MemoryStore::new()),
        Arc::new(MemoryStore::new()),
    );

    tracker.start();
    let events = tracker.pending_events();
    assert_eq!(names(&events), vec!["session_start"]);
    assert_eq!(events[0].event_category, journal_core::EventCategory::Engagement);
}

#[tokio::test(start_paused = true)]
async fn test_session_id_shared_within_session() {
    let sink = MockSink::new();
    let session = Arc::new(MemoryStore::new());

    let first = fixtures::tracker(quiet_config(), &sink, Arc::new(MemoryStore::new()), session.clone());
    let second = fixtures::tracker(quiet_config(), &sink, Arc::new(MemoryStore::new()), session);
    assert_eq!(first.context().session_id, second.context().session_id);

    let fresh = fixtures::tracker(
        quiet_config(),
        &sink,
        Arc::new(MemoryStore::new()),
        Arc::new(MemoryStore::new()),
    );
    assert_ne!(first.context().session_id, fresh.context().session_id);
}

#[tokio::test(start_paused = true)]
async fn test_corrupt_mirror_is_discarded() {
    let sink = MockSink::new();
    let durable = Arc::new(MemoryStore::new());
    durable.set(fixtures::QUEUE_KEY, "{not json").unwrap();

    let tracker = fixtures::tracker(quiet_config(), &sink, durable.clone(), Arc::new(MemoryStore::new()));
    assert!(tracker.is_empty());
    assert_eq!(durable.get(fixtures::QUEUE_KEY).unwrap(), None);
}
