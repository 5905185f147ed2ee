//! Per-session metadata shared by every event.

use journal_core::DeviceInfo;
use local_store::KeyValueStore;
use tracing::{debug, warn};
use uuid::Uuid;

/// Computed once per process and reused for every event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    pub session_id: String,
    pub device_info: DeviceInfo,
}

/// Reads the session ID from session-scoped storage, generating and
/// storing a new one only when none is there.
pub fn load_or_create_session_id(store: &dyn KeyValueStore, key: &str) -> String {
    match store.get(key) {
        Ok(Some(id)) if !id.trim().is_empty() => {
            debug!(session_id = %id, "Reusing session ID");
            return id;
        }
        Ok(_) => {}
        Err(e) => warn!(error = %e, "Failed to read session ID, starting a new session"),
    }

    let id = Uuid::new_v4().to_string();
    if let Err(e) = store.set(key, &id) {
        // Still usable for this process; the next one just gets a new ID.
        warn!(error = %e, "Failed to store session ID");
    }
    debug!(session_id = %id, "Started new session");
    id
}
