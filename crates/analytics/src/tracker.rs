//! Batched analytics queue with a durable mirror.
//!
//! State machine:
//! - Idle: queue empty, no timer
//! - Accumulating: events queued, one deferred flush scheduled
//! - Flushing: a batch send is in flight
//!
//! Every mutation of the in-memory queue is written through to durable
//! storage before the lock is released, so the mirror never lags by more
//! than the flush in progress.

use crate::config::AnalyticsConfig;
use crate::device::capture_device_info;
use crate::session::{load_or_create_session_id, SessionContext};
use backend_client::EventSink;
use chrono::{DateTime, Utc};
use journal_core::{system_clock, AnalyticsEvent, Clock, Error, EventCategory};
use local_store::KeyValueStore;
use parking_lot::{Mutex, RwLock};
use serde_json::{json, Value};
use std::future::Future;
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};
use telemetry::metrics;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueState {
    Idle,
    Accumulating,
    Flushing,
}

struct PendingFlush {
    id: u64,
    handle: JoinHandle<()>,
}

#[derive(Default)]
struct Queue {
    events: Vec<AnalyticsEvent>,
    timer: Option<PendingFlush>,
    next_timer_id: u64,
    flushing: bool,
    consecutive_failures: u32,
}

struct Shared {
    config: AnalyticsConfig,
    sink: Arc<dyn EventSink>,
    durable: Arc<dyn KeyValueStore>,
    session_store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    runtime: Option<Handle>,
    started_at: DateTime<Utc>,
    context: OnceLock<SessionContext>,
    user_id: RwLock<Option<String>>,
    queue: Mutex<Queue>,
}

/// Process-wide analytics queue. Cheap to clone; clones share one queue.
#[derive(Clone)]
pub struct AnalyticsTracker {
    shared: Arc<Shared>,
}

impl AnalyticsTracker {
    /// Creates the tracker and seeds the queue from durable storage.
    pub fn new(
        config: AnalyticsConfig,
        sink: Arc<dyn EventSink>,
        durable: Arc<dyn KeyValueStore>,
        session_store: Arc<dyn KeyValueStore>,
    ) -> Self {
        Self::with_clock(config, sink, durable, session_store, system_clock())
    }

    pub fn with_clock(
        config: AnalyticsConfig,
        sink: Arc<dyn EventSink>,
        durable: Arc<dyn KeyValueStore>,
        session_store: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let restored = restore_queue(durable.as_ref(), &config.queue_storage_key);
        if !restored.is_empty() {
            info!(count = restored.len(), "Restored analytics events from previous session");
        }
        metrics().queue_depth.set(restored.len() as u64);

        let started_at = clock.now();
        Self {
            shared: Arc::new(Shared {
                config,
                sink,
                durable,
                session_store,
                clock,
                runtime: Handle::try_current().ok(),
                started_at,
                context: OnceLock::new(),
                user_id: RwLock::new(None),
                queue: Mutex::new(Queue {
                    events: restored,
                    ..Queue::default()
                }),
            }),
        }
    }

    /// Emits `session_start` (when configured) and schedules delivery of
    /// anything restored from the previous session.
    pub fn start(&self) {
        if !self.shared.config.enabled {
            return;
        }

        info!(
            session_id = %self.context().session_id,
            restored = self.len(),
            "Analytics tracker started"
        );

        if self.shared.config.track_session_start {
            self.track("session_start", EventCategory::Engagement, json!({}));
        } else {
            self.kick();
        }
    }

    /// Session ID and device info, computed on first use.
    pub fn context(&self) -> &SessionContext {
        let shared = &self.shared;
        shared.context.get_or_init(|| SessionContext {
            session_id: load_or_create_session_id(
                shared.session_store.as_ref(),
                &shared.config.session_storage_key,
            ),
            device_info: capture_device_info(
                shared.config.user_agent.as_deref(),
                shared.config.screen_size.as_deref(),
            ),
        })
    }

    /// Sets the user attached to subsequently tracked events.
    pub fn set_user_id(&self, user_id: Option<String>) {
        *self.shared.user_id.write() = user_id;
    }

    pub fn track(&self, name: &str, category: EventCategory, properties: Value) {
        if !self.shared.config.enabled {
            return;
        }

        let properties = if properties.is_null() {
            json!({})
        } else {
            properties
        };

        let event = self.build_event(name, category).with_properties(properties);
        self.enqueue(event);
    }

    pub fn track_action(&self, action: &str, properties: Value) {
        self.track(action, EventCategory::Action, properties);
    }

    pub fn track_page_view(&self, page: &str) {
        self.track("page_view", EventCategory::PageView, json!({ "page": page }));
    }

    pub fn track_error(&self, message: &str, context: Value) {
        self.track(
            "error",
            EventCategory::Error,
            json!({ "message": message, "context": context }),
        );
    }

    pub fn track_engagement(&self, name: &str, properties: Value) {
        self.track(name, EventCategory::Engagement, properties);
    }

    /// Appends an event, writes the queue through to durable storage, and
    /// either flushes right away (queue reached `batch_size`) or pushes the
    /// deferred flush back to `flush_interval_ms` from now.
    pub fn enqueue(&self, event: AnalyticsEvent) {
        let shared = &self.shared;
        if !shared.config.enabled {
            return;
        }

        if let Err(e) = event.check() {
            metrics().events_rejected.inc();
            warn!(code = e.code(), error = %e, "Dropping invalid analytics event");
            return;
        }

        let flush_now = {
            let mut queue = shared.queue.lock();
            queue.events.push(event);
            shared.enforce_cap(&mut queue.events);
            shared.persist(&queue.events);
            metrics().events_tracked.inc();

            if queue.events.len() >= shared.config.effective_batch_size() {
                true
            } else {
                schedule_flush(&self.shared, &mut queue, shared.config.flush_interval());
                false
            }
        };

        if flush_now {
            self.spawn_flush();
        }
    }

    /// Sends the whole queue as one batch.
    ///
    /// No-op when empty or when a flush is already in flight. The queue is
    /// taken before sending, so events tracked meanwhile start a new queue.
    /// On failure the batch goes back in front of them and a fresh timer is
    /// armed instead of retrying immediately.
    pub async fn flush(&self) {
        let shared = &self.shared;

        let batch = {
            let mut queue = shared.queue.lock();
            if queue.flushing || queue.events.is_empty() {
                return;
            }
            if let Some(pending) = queue.timer.take() {
                pending.handle.abort();
            }
            queue.flushing = true;
            let batch = std::mem::take(&mut queue.events);
            shared.persist(&queue.events);
            batch
        };

        debug!(count = batch.len(), "Flushing analytics batch");
        let start = Instant::now();
        let result = shared.sink.insert_events(&batch).await;
        metrics()
            .flush_latency_ms
            .observe(start.elapsed().as_millis() as u64);

        let flush_again = {
            let mut queue = shared.queue.lock();
            queue.flushing = false;

            match result {
                Ok(()) => {
                    queue.consecutive_failures = 0;
                    metrics().batches_sent.inc();
                    metrics().events_sent.inc_by(batch.len() as u64);
                    debug!(count = batch.len(), "Analytics batch delivered");

                    if queue.events.len() >= shared.config.effective_batch_size() {
                        true
                    } else {
                        if !queue.events.is_empty() && queue.timer.is_none() {
                            schedule_flush(shared, &mut queue, shared.config.flush_interval());
                        }
                        false
                    }
                }
                Err(e) => {
                    queue.consecutive_failures += 1;
                    let failures = queue.consecutive_failures;
                    let requeued = batch.len();

                    let mut events = batch;
                    events.append(&mut queue.events);
                    shared.enforce_cap(&mut events);
                    queue.events = events;
                    shared.persist(&queue.events);

                    metrics().send_failures.inc();
                    metrics().events_requeued.inc_by(requeued as u64);

                    let delay = shared.config.retry_delay(failures);
                    warn!(
                        code = e.code(),
                        error = %e,
                        requeued,
                        failures,
                        retry_in_ms = delay.as_millis() as u64,
                        "Analytics flush failed, batch requeued"
                    );
                    schedule_flush(shared, &mut queue, delay);
                    false
                }
            }
        };

        if flush_again {
            self.spawn_flush();
        }
    }

    /// Teardown hook: appends a `session_end` event and persists the queue
    /// without touching the network. Delivery is left to the next session.
    /// When disabled, the durable copy is removed instead.
    pub fn shutdown(&self) {
        let shared = &self.shared;
        let duration_seconds = (shared.clock.now() - shared.started_at)
            .num_seconds()
            .max(0);

        let event = shared.config.enabled.then(|| {
            self.build_event("session_end", EventCategory::Engagement)
                .with_properties(json!({ "duration_seconds": duration_seconds }))
        });

        let mut queue = shared.queue.lock();
        if let Some(pending) = queue.timer.take() {
            pending.handle.abort();
        }
        match event {
            Some(event) => {
                queue.events.push(event);
                shared.enforce_cap(&mut queue.events);
            }
            // Opted out: nothing restored from an earlier session is kept.
            None => queue.events.clear(),
        }
        shared.persist(&queue.events);

        info!(
            queued = queue.events.len(),
            duration_seconds,
            "Analytics queue persisted at shutdown"
        );
    }

    pub fn len(&self) -> usize {
        self.shared.queue.lock().events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn state(&self) -> QueueState {
        let queue = self.shared.queue.lock();
        if queue.flushing {
            QueueState::Flushing
        } else if queue.events.is_empty() {
            QueueState::Idle
        } else {
            QueueState::Accumulating
        }
    }

    pub fn has_pending_flush(&self) -> bool {
        self.shared.queue.lock().timer.is_some()
    }

    /// Copy of the queued events, oldest first.
    pub fn pending_events(&self) -> Vec<AnalyticsEvent> {
        self.shared.queue.lock().events.clone()
    }

    pub fn config(&self) -> &AnalyticsConfig {
        &self.shared.config
    }

    fn build_event(&self, name: &str, category: EventCategory) -> AnalyticsEvent {
        let context = self.context();
        AnalyticsEvent::new(
            context.session_id.clone(),
            name,
            category,
            context.device_info.clone(),
            self.shared.clock.now(),
        )
        .with_user(self.shared.user_id.read().clone())
    }

    /// Schedules delivery of whatever is queued, without adding an event.
    fn kick(&self) {
        let flush_now = {
            let mut queue = self.shared.queue.lock();
            if queue.events.is_empty() {
                return;
            }
            if queue.events.len() >= self.shared.config.effective_batch_size() {
                true
            } else {
                schedule_flush(&self.shared, &mut queue, self.shared.config.flush_interval());
                false
            }
        };

        if flush_now {
            self.spawn_flush();
        }
    }

    fn spawn_flush(&self) {
        let tracker = self.clone();
        self.shared.spawn(async move {
            tracker.flush().await;
        });
    }
}

impl Shared {
    /// Writes the queue to durable storage. On failure the durable copy is
    /// removed rather than left stale; the in-memory queue is untouched.
    fn persist(&self, events: &[AnalyticsEvent]) {
        let key = &self.config.queue_storage_key;
        metrics().queue_depth.set(events.len() as u64);

        let result = if events.is_empty() {
            self.durable.remove(key)
        } else {
            serde_json::to_string(events)
                .map_err(Error::from)
                .and_then(|raw| self.durable.set(key, &raw))
        };

        if let Err(e) = result {
            metrics().persist_failures.inc();
            warn!(
                code = e.code(),
                error = %e,
                queued = events.len(),
                "Failed to persist analytics queue, dropping durable copy"
            );
            if let Err(e) = self.durable.remove(key) {
                warn!(error = %e, "Failed to clear analytics queue mirror");
            }
        }
    }

    /// Drops the oldest events beyond `max_queue_len`.
    fn enforce_cap(&self, events: &mut Vec<AnalyticsEvent>) {
        let max = self
            .config
            .max_queue_len
            .max(self.config.effective_batch_size());
        if events.len() > max {
            let excess = events.len() - max;
            events.drain(..excess);
            metrics().events_dropped_overflow.inc_by(excess as u64);
            warn!(dropped = excess, max, "Analytics queue full, dropped oldest events");
        }
    }

    fn spawn<F>(&self, fut: F) -> Option<JoinHandle<()>>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        match Handle::try_current().ok().or_else(|| self.runtime.clone()) {
            Some(handle) => Some(handle.spawn(fut)),
            None => {
                warn!("No async runtime available, analytics flush deferred");
                None
            }
        }
    }
}

/// Replaces any pending timer with one firing after `delay`.
fn schedule_flush(shared: &Arc<Shared>, queue: &mut Queue, delay: Duration) {
    if let Some(pending) = queue.timer.take() {
        pending.handle.abort();
    }

    queue.next_timer_id += 1;
    let id = queue.next_timer_id;
    let weak = Arc::downgrade(shared);

    let handle = shared.spawn(async move {
        tokio::time::sleep(delay).await;
        let Some(shared) = weak.upgrade() else {
            return;
        };
        {
            // Only the timer currently on record may fire; it clears itself
            // so the flush it starts does not abort its own task.
            let mut queue = shared.queue.lock();
            match &queue.timer {
                Some(pending) if pending.id == id => queue.timer = None,
                _ => return,
            }
        }
        let tracker = AnalyticsTracker { shared };
        tracker.flush().await;
    });

    if let Some(handle) = handle {
        queue.timer = Some(PendingFlush { id, handle });
        debug!(delay_ms = delay.as_millis() as u64, "Scheduled analytics flush");
    }
}

fn restore_queue(durable: &dyn KeyValueStore, key: &str) -> Vec<AnalyticsEvent> {
    match durable.get(key) {
        Ok(Some(raw)) => match serde_json::from_str::<Vec<AnalyticsEvent>>(&raw) {
            Ok(events) => events,
            Err(e) => {
                warn!(error = %e, "Discarding unreadable analytics queue mirror");
                if let Err(e) = durable.remove(key) {
                    warn!(error = %e, "Failed to clear analytics queue mirror");
                }
                Vec::new()
            }
        },
        Ok(None) => Vec::new(),
        Err(e) => {
            warn!(error = %e, "Failed to read analytics queue mirror");
            Vec::new()
        }
    }
}
