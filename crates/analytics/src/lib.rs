//! Analytics event queue for the journal client.
//!
//! Events are buffered in memory, mirrored to durable local storage after
//! every change, and sent to the backend in batches when the queue reaches
//! `batch_size` or `flush_interval_ms` passes without a new event.
//! Telemetry is best-effort: nothing here ever returns an error to the
//! code that tracked the event.

pub mod config;
pub mod device;
pub mod session;
pub mod tracker;

pub use config::*;
pub use device::capture_device_info;
pub use session::*;
pub use tracker::*;
