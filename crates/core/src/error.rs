//! Unified error types for the journal client.
//!
//! Error codes:
//! - BACKEND_001: Backend returned a non-success response
//! - NET_001: Transport failure reaching the backend
//! - STORE_001: Local storage quota exceeded
//! - STORE_002: Local storage I/O failure
//! - VALID_001: Invalid analytics event
//! - CONFIG_001: Invalid configuration

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for the journal client.
#[derive(Debug, Error)]
pub enum Error {
    /// The backend answered, but with an error status.
    #[error("[BACKEND_001] backend returned {status}: {message}")]
    Backend { status: u16, message: String },

    /// The request never produced a response.
    #[error("[NET_001] network error: {0}")]
    Network(String),

    #[error("[STORE_001] storage quota exceeded writing '{key}' ({needed} bytes, limit {limit})")]
    QuotaExceeded {
        key: String,
        needed: usize,
        limit: usize,
    },

    #[error("[STORE_002] storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("[VALID_001] invalid event: {0}")]
    Validation(String),

    #[error("[CONFIG_001] invalid configuration: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn backend(status: u16, message: impl Into<String>) -> Self {
        Self::Backend {
            status,
            message: message.into(),
        }
    }

    pub fn network(msg: impl Into<String>) -> Self {
        Self::Network(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Stable error code, used as a structured log field.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Backend { .. } => "BACKEND_001",
            Self::Network(_) => "NET_001",
            Self::QuotaExceeded { .. } => "STORE_001",
            Self::Storage(_) => "STORE_002",
            Self::Validation(_) => "VALID_001",
            Self::Config(_) => "CONFIG_001",
            Self::Serialization(_) => "SERDE_001",
            Self::Internal(_) => "INTERNAL_001",
        }
    }

    /// Whether a later attempt at the same operation may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network(_) => true,
            Self::Backend { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    pub fn is_quota_exceeded(&self) -> bool {
        matches!(self, Self::QuotaExceeded { .. })
    }
}
