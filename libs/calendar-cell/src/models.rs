use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Serialize)]
pub struct CreateEventRequest {
    pub organizer_email: String,
    pub attendee_email: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub conferencing: bool,
}

/// Partial update; only populated fields are sent.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EventPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attendee_email: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CalendarEventResponse {
    pub id: String,
    #[serde(default)]
    pub conference_link: Option<String>,
}

#[derive(Debug, Error)]
pub enum CalendarError {
    #[error("Calendar integration is not configured")]
    NotConfigured,

    #[error("Calendar API error: {message}")]
    ApiError { message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}
