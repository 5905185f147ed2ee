//! Size limits for client-side analytics and media handling.
//!
//! The `#[validate]` derive macro requires literal values in attributes,
//! so field limits are duplicated there. Keep both in sync when modifying.

/// Maximum analytics event name length (chars).
pub const MAX_EVENT_NAME_LEN: usize = 100;

/// Maximum user ID length.
/// UUIDs=36, emails=~50, custom IDs up to 128.
pub const MAX_USER_ID_LEN: usize = 128;

/// Maximum serialized properties size per event (16KB).
pub const MAX_PROPERTIES_BYTES: usize = 16 * 1024;

/// Default number of queued events that triggers an immediate flush.
pub const DEFAULT_BATCH_SIZE: usize = 10;

/// Default deferred flush delay (30 seconds).
pub const DEFAULT_FLUSH_INTERVAL_MS: u64 = 30_000;

/// Default cap on queued events retained across failed flushes.
pub const DEFAULT_MAX_QUEUE_LEN: usize = 500;

/// Default signed URL lifetime requested from storage (1 hour).
pub const DEFAULT_SIGNED_URL_LIFETIME_SECS: u64 = 3600;

/// Default safety margin subtracted from the cached lifetime (5 minutes).
pub const DEFAULT_SIGNED_URL_SAFETY_MARGIN_SECS: u64 = 300;
