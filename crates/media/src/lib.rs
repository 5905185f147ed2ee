//! Signed URL resolution for drink photos, avatars, and collection covers.
//!
//! Storage references are resolved into time-limited URLs and cached until
//! shortly before they expire. Failures degrade to "no image", never to an
//! error the UI has to handle.

pub mod cache;
pub mod config;
pub mod resolver;
pub mod watcher;

pub use cache::*;
pub use config::*;
pub use resolver::*;
pub use watcher::*;
