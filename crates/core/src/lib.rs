//! Core types, errors, and reference parsing for the drink journal client.

pub mod clock;
pub mod error;
pub mod events;
pub mod limits;
pub mod reference;

pub use clock::*;
pub use error::{Error, Result};
pub use events::*;
pub use reference::*;
