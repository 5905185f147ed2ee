//! Reactive wrapper for views that show one image at a time.

use crate::resolver::UrlResolver;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageStatus {
    Loading,
    Ready(String),
    /// Nothing to show; the view renders its placeholder.
    Absent,
}

/// Tracks the URL for a reference that changes over time.
///
/// Each `set_reference` bumps a generation counter. A resolution that
/// finishes after its reference was replaced, or after the watcher was
/// dropped, is discarded instead of published.
pub struct ImageWatcher {
    resolver: UrlResolver,
    generation: Arc<AtomicU64>,
    status: Arc<watch::Sender<ImageStatus>>,
    runtime: Option<Handle>,
}

impl ImageWatcher {
    pub fn new(resolver: UrlResolver) -> Self {
        let (tx, _rx) = watch::channel(ImageStatus::Absent);
        Self {
            resolver,
            generation: Arc::new(AtomicU64::new(0)),
            status: Arc::new(tx),
            runtime: Handle::try_current().ok(),
        }
    }

    /// Points the watcher at a new reference. Resolution runs on the
    /// current runtime, or on the one the watcher was created in.
    pub fn set_reference(&self, reference: Option<&str>) {
        let reference = reference
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(str::to_string);

        // Bump under the channel lock so a completing task can't slip a
        // stale value in between the bump and the new status.
        let mut generation = 0;
        self.status.send_modify(|status| {
            generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
            *status = if reference.is_some() {
                ImageStatus::Loading
            } else {
                ImageStatus::Absent
            };
        });

        let Some(reference) = reference else {
            return;
        };

        let Some(runtime) = Handle::try_current().ok().or_else(|| self.runtime.clone()) else {
            warn!(reference = %reference, "No async runtime available, image left absent");
            self.status.send_if_modified(|s| {
                if self.generation.load(Ordering::SeqCst) != generation {
                    return false;
                }
                *s = ImageStatus::Absent;
                true
            });
            return;
        };

        let resolver = self.resolver.clone();
        let current = self.generation.clone();
        let status = self.status.clone();
        runtime.spawn(async move {
            let resolved = resolver.resolve(&reference).await;
            status.send_if_modified(|s| {
                if current.load(Ordering::SeqCst) != generation {
                    debug!(reference = %reference, "Discarding superseded image resolution");
                    return false;
                }
                *s = match resolved {
                    Some(url) => ImageStatus::Ready(url),
                    None => ImageStatus::Absent,
                };
                true
            });
        });
    }

    pub fn status(&self) -> ImageStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ImageStatus> {
        self.status.subscribe()
    }
}

impl Drop for ImageWatcher {
    fn drop(&mut self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }
}
