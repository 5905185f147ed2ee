//! Analytics event definitions for the journal client.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::error::{Error, Result};
use crate::limits::MAX_PROPERTIES_BYTES;

/// Coarse grouping used by dashboards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventCategory {
    Action,
    PageView,
    Error,
    Engagement,
}

impl EventCategory {
    /// Returns the string representation stored by the backend.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Action => "action",
            Self::PageView => "page_view",
            Self::Error => "error",
            Self::Engagement => "engagement",
        }
    }
}

/// Device details captured once per session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DeviceInfo {
    pub platform: String,
    pub user_agent: String,
    /// "WIDTHxHEIGHT", when the host knows it.
    pub screen_size: Option<String>,
    pub locale: String,
    pub timezone: String,
}

/// Validates that properties are a JSON object within the size limit.
fn validate_properties(props: &serde_json::Value) -> std::result::Result<(), ValidationError> {
    if !props.is_object() {
        let mut err = ValidationError::new("properties_not_object");
        err.message = Some("properties must be a JSON object".into());
        return Err(err);
    }

    let size = serde_json::to_vec(props).map(|v| v.len()).unwrap_or(0);
    if size > MAX_PROPERTIES_BYTES {
        let mut err = ValidationError::new("properties_too_large");
        err.message = Some(
            format!(
                "properties {}KB exceeds {}KB limit",
                size / 1024,
                MAX_PROPERTIES_BYTES / 1024
            )
            .into(),
        );
        return Err(err);
    }

    Ok(())
}

/// A single queued analytics event, in the shape the backend stores it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct AnalyticsEvent {
    /// Client-generated ID, lets the backend dedupe replays.
    pub id: Uuid,
    #[validate(length(max = 128))]
    pub user_id: Option<String>,
    pub session_id: String,
    #[validate(length(min = 1, max = 100))]
    pub event_name: String,
    pub event_category: EventCategory,
    #[validate(custom(function = "validate_properties"))]
    pub properties: serde_json::Value,
    pub device_info: DeviceInfo,
    pub created_at: DateTime<Utc>,
}

impl AnalyticsEvent {
    /// Creates an event with a fresh ID and empty properties.
    pub fn new(
        session_id: impl Into<String>,
        event_name: impl Into<String>,
        event_category: EventCategory,
        device_info: DeviceInfo,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: None,
            session_id: session_id.into(),
            event_name: event_name.into(),
            event_category,
            properties: serde_json::Value::Object(Default::default()),
            device_info,
            created_at,
        }
    }

    pub fn with_user(mut self, user_id: Option<String>) -> Self {
        self.user_id = user_id;
        self
    }

    pub fn with_properties(mut self, properties: serde_json::Value) -> Self {
        self.properties = properties;
        self
    }

    /// Checks field limits and the properties shape.
    pub fn check(&self) -> Result<()> {
        self.validate()
            .map_err(|e| Error::validation(format!("{}: {}", self.event_name, e)))?;
        if self.event_name.trim().is_empty() {
            return Err(Error::validation("event_name is required"));
        }
        Ok(())
    }
}
