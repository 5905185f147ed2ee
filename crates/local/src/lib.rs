//! Local key-value storage for the journal client.
//!
//! Two flavours back the analytics queue:
//! - `FileStore`: durable, survives process restarts (crash-safety mirror)
//! - `MemoryStore`: session-scoped, gone when the process exits

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use journal_core::Result;

/// Synchronous string key-value storage.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Fails with `Error::QuotaExceeded` when the store is full.
    fn set(&self, key: &str, value: &str) -> Result<()>;

    fn remove(&self, key: &str) -> Result<()>;
}
