//! Logging, in-process metrics, and component health for the journal client.
//!
//! Nothing here leaves the process: metrics are counters read by the binary's
//! periodic status log, and health backs the startup report.

pub mod health;
pub mod metrics;
pub mod tracing_setup;

pub use health::*;
pub use metrics::*;
pub use tracing_setup::*;
