use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, NaiveDate, Utc};
use std::fmt;

// ==============================================================================
// CORE THERAPIST MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Therapist {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    /// Session price in cents; charged per confirmed appointment.
    pub hourly_rate: i64,
    pub bio: Option<String>,
    pub street: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub push_token: Option<String>,
    pub calendar_email: Option<String>,
    /// Payout destination at the payment processor.
    pub payment_account_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Therapist {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn has_address(&self) -> bool {
        self.street.is_some() && self.city.is_some()
    }
}

/// One recurring one-hour availability block in a therapist's weekly
/// schedule. Rows are replaced in bulk, never patched individually.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hour {
    pub id: Uuid,
    pub therapist_id: Uuid,
    pub weekday: Weekday,
    pub start_hour: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Weekday {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl Weekday {
    pub fn from_chrono(weekday: chrono::Weekday) -> Self {
        match weekday {
            chrono::Weekday::Mon => Weekday::Monday,
            chrono::Weekday::Tue => Weekday::Tuesday,
            chrono::Weekday::Wed => Weekday::Wednesday,
            chrono::Weekday::Thu => Weekday::Thursday,
            chrono::Weekday::Fri => Weekday::Friday,
            chrono::Weekday::Sat => Weekday::Saturday,
            chrono::Weekday::Sun => Weekday::Sunday,
        }
    }

    pub fn is_weekend(self) -> bool {
        matches!(self, Weekday::Saturday | Weekday::Sunday)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Weekday::Monday => "MONDAY",
            Weekday::Tuesday => "TUESDAY",
            Weekday::Wednesday => "WEDNESDAY",
            Weekday::Thursday => "THURSDAY",
            Weekday::Friday => "FRIDAY",
            Weekday::Saturday => "SATURDAY",
            Weekday::Sunday => "SUNDAY",
        }
    }
}

impl fmt::Display for Weekday {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTherapistRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub hourly_rate: i64,
    pub bio: Option<String>,
    pub street: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub calendar_email: Option<String>,
    pub payment_account_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateTherapistRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub hourly_rate: Option<i64>,
    pub bio: Option<String>,
    pub street: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub push_token: Option<String>,
    pub calendar_email: Option<String>,
    pub payment_account_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HourTemplate {
    pub weekday: Weekday,
    pub start_hour: u32,
}

/// Bulk replacement of the weekly schedule: existing rows are deleted and
/// the submitted templates inserted in one pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetWeeklyHoursRequest {
    pub hours: Vec<HourTemplate>,
}

// ==============================================================================
// AVAILABILITY MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DayAvailability {
    pub date: NaiveDate,
    pub hours: Vec<Hour>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonthAvailability {
    pub year: i32,
    pub month: u32,
    pub days: Vec<DayAvailability>,
}

/// Open slots grouped by month, months in first-encountered order, dates
/// ascending within each month.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AvailabilityCalendar {
    pub months: Vec<MonthAvailability>,
}

impl AvailabilityCalendar {
    pub fn is_empty(&self) -> bool {
        self.months.is_empty()
    }

    pub fn slot_count(&self) -> usize {
        self.months
            .iter()
            .flat_map(|m| m.days.iter())
            .map(|d| d.hours.len())
            .sum()
    }
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, thiserror::Error)]
pub enum TherapistError {
    #[error("Therapist not found")]
    NotFound,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}
