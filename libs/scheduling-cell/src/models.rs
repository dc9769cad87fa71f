use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use std::fmt;

use therapist_cell::models::Weekday;

// ==============================================================================
// CORE SCHEDULING MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub therapist_id: Uuid,
    pub patient_id: Uuid,
    pub scheduled_to: DateTime<Utc>,
    pub modality: Modality,
    pub status: AppointmentStatus,
    pub appointment_type: AppointmentType,
    pub paid: bool,
    /// Set on instances spawned from a standing weekly booking.
    pub recurrence_id: Option<Uuid>,
    pub calendar_event_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    pub fn is_future(&self, now: DateTime<Utc>) -> bool {
        self.scheduled_to >= now
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppointmentStatus {
    Pendent,
    Accepted,
    Rejected,
    Canceled,
}

impl AppointmentStatus {
    /// CANCELED and REJECTED are immutable history.
    pub fn is_terminal(self) -> bool {
        matches!(self, AppointmentStatus::Rejected | AppointmentStatus::Canceled)
    }

    pub fn can_transition_to(self, next: AppointmentStatus) -> bool {
        match self {
            AppointmentStatus::Pendent => matches!(
                next,
                AppointmentStatus::Accepted | AppointmentStatus::Rejected | AppointmentStatus::Canceled
            ),
            AppointmentStatus::Accepted => matches!(next, AppointmentStatus::Canceled),
            AppointmentStatus::Rejected | AppointmentStatus::Canceled => false,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AppointmentStatus::Pendent => "PENDENT",
            AppointmentStatus::Accepted => "ACCEPTED",
            AppointmentStatus::Rejected => "REJECTED",
            AppointmentStatus::Canceled => "CANCELED",
        }
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppointmentType {
    OneOff,
    Recurrent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Modality {
    Online,
    OnSite,
}

impl Modality {
    /// Online sessions get a conference link on their calendar event.
    pub fn needs_conferencing(self) -> bool {
        matches!(self, Modality::Online)
    }
}

/// A standing weekly booking. Acceptance spawns a bounded run of
/// `Appointment` instances linked back through `recurrence_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recurrence {
    pub id: Uuid,
    pub therapist_id: Uuid,
    pub patient_id: Uuid,
    pub weekday: Weekday,
    pub start_time: NaiveTime,
    pub start_date: NaiveDate,
    pub modality: Modality,
    pub status: RecurrenceStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecurrenceStatus {
    Pendent,
    Accepted,
    Canceled,
}

impl RecurrenceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RecurrenceStatus::Pendent => "PENDENT",
            RecurrenceStatus::Accepted => "ACCEPTED",
            RecurrenceStatus::Canceled => "CANCELED",
        }
    }
}

impl fmt::Display for RecurrenceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookAppointmentRequest {
    pub therapist_id: Uuid,
    pub patient_id: Uuid,
    pub scheduled_to: DateTime<Utc>,
    pub modality: Modality,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRecurrenceRequest {
    pub therapist_id: Uuid,
    pub patient_id: Uuid,
    pub weekday: Weekday,
    pub start_time: NaiveTime,
    pub start_date: NaiveDate,
    pub modality: Modality,
}

/// A conflict is a normal negative answer, not an error: the caller uses it
/// to offer alternate slots.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingOutcome {
    pub conflict: bool,
    pub appointment: Option<Appointment>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecurrenceOutcome {
    pub conflict: bool,
    pub recurrence: Option<Recurrence>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaterializationResult {
    pub recurrence_id: Uuid,
    pub instances: Vec<Appointment>,
}

/// Audit of the three cancellation phases. Each phase is attempted
/// independently; failures land in `failures` instead of aborting siblings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecurrenceCancellationReport {
    pub recurrence_canceled: bool,
    pub appointments_canceled: usize,
    pub calendar_events_removed: usize,
    pub failures: Vec<String>,
}

impl RecurrenceCancellationReport {
    pub fn fully_succeeded(&self) -> bool {
        self.recurrence_canceled && self.failures.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppointmentSearchQuery {
    pub therapist_id: Option<Uuid>,
    pub patient_id: Option<Uuid>,
    pub status: Option<AppointmentStatus>,
    pub from_date: Option<DateTime<Utc>>,
    pub to_date: Option<DateTime<Utc>>,
    pub limit: Option<i32>,
    pub offset: Option<i32>,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, thiserror::Error)]
pub enum SchedulingError {
    #[error("Appointment not found")]
    AppointmentNotFound,

    #[error("Recurrence not found")]
    RecurrenceNotFound,

    #[error("Therapist not found")]
    TherapistNotFound,

    #[error("Patient not found")]
    PatientNotFound,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Booking conflicts with an existing claim on the slot")]
    ConflictDetected,

    #[error("Cannot transition appointment from status: {0}")]
    InvalidStatusTransition(AppointmentStatus),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("External service error: {0}")]
    DependencyError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_statuses_accept_no_transition() {
        assert!(!AppointmentStatus::Canceled.can_transition_to(AppointmentStatus::Pendent));
        assert!(!AppointmentStatus::Canceled.can_transition_to(AppointmentStatus::Accepted));
        assert!(!AppointmentStatus::Rejected.can_transition_to(AppointmentStatus::Canceled));
    }

    #[test]
    fn pendent_can_resolve_any_way() {
        assert!(AppointmentStatus::Pendent.can_transition_to(AppointmentStatus::Accepted));
        assert!(AppointmentStatus::Pendent.can_transition_to(AppointmentStatus::Rejected));
        assert!(AppointmentStatus::Pendent.can_transition_to(AppointmentStatus::Canceled));
    }

    #[test]
    fn accepted_can_only_be_canceled() {
        assert!(AppointmentStatus::Accepted.can_transition_to(AppointmentStatus::Canceled));
        assert!(!AppointmentStatus::Accepted.can_transition_to(AppointmentStatus::Pendent));
        assert!(!AppointmentStatus::Accepted.can_transition_to(AppointmentStatus::Rejected));
    }

    #[test]
    fn status_wire_format_is_screaming_snake() {
        let status = serde_json::to_string(&AppointmentStatus::Pendent).unwrap();
        assert_eq!(status, "\"PENDENT\"");
        let modality = serde_json::to_string(&Modality::OnSite).unwrap();
        assert_eq!(modality, "\"ON_SITE\"");
        let kind = serde_json::to_string(&AppointmentType::OneOff).unwrap();
        assert_eq!(kind, "\"ONE_OFF\"");
    }
}
