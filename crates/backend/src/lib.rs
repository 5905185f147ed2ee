//! Client for the managed backend the journal app runs on.
//!
//! Exposes the two capabilities the client utilities consume:
//! - `UrlSigner`: time-limited signed URLs for private storage objects
//! - `EventSink`: all-or-nothing bulk insert of analytics events

pub mod client;
pub mod config;
pub mod health;
pub mod ingest;
pub mod signer;

pub use client::*;
pub use config::*;
pub use ingest::*;
pub use signer::*;
