use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, Timelike, Utc};
use reqwest::Method;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use shared_config::{AppConfig, SchedulingConfig};
use shared_database::supabase::SupabaseClient;

use crate::models::{
    AvailabilityCalendar, DayAvailability, Hour, MonthAvailability, TherapistError, Weekday,
};
use crate::services::therapist::TherapistService;

/// Derives a therapist's open slots from their weekly Hour templates over a
/// lookahead window, excluding slots already claimed by bookings.
pub struct AvailabilityService {
    supabase: Arc<SupabaseClient>,
    scheduling: SchedulingConfig,
}

impl AvailabilityService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: Arc::new(SupabaseClient::new(config)),
            scheduling: config.scheduling.clone(),
        }
    }

    pub fn with_client(supabase: Arc<SupabaseClient>, scheduling: SchedulingConfig) -> Self {
        Self { supabase, scheduling }
    }

    /// Compute the month-grouped availability calendar for a therapist.
    /// A therapist with no Hour templates yields an empty calendar.
    pub async fn find_available_slots(
        &self,
        therapist_id: Uuid,
        days: Option<i64>,
        auth_token: &str,
    ) -> Result<AvailabilityCalendar, TherapistError> {
        let lookahead_days = days.unwrap_or(self.scheduling.lookahead_days);
        if lookahead_days <= 0 {
            return Err(TherapistError::ValidationError(
                "Lookahead must be a positive number of days".to_string(),
            ));
        }

        debug!(
            "Computing availability for therapist {} over {} days",
            therapist_id, lookahead_days
        );

        let therapist_service = TherapistService::with_client(Arc::clone(&self.supabase));
        therapist_service.get_therapist(therapist_id, auth_token).await?;

        let hours = therapist_service.get_hours(therapist_id, auth_token).await?;
        if hours.is_empty() {
            debug!("Therapist {} has no hour templates", therapist_id);
            return Ok(AvailabilityCalendar::default());
        }

        let offset = self.provider_offset();
        let start_date = Utc::now().with_timezone(&offset).date_naive();

        let booked = self
            .fetch_booked_slots(therapist_id, start_date, lookahead_days, offset, auth_token)
            .await?;

        Ok(build_availability_calendar(start_date, lookahead_days, &hours, &booked))
    }

    fn provider_offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.scheduling.provider_utc_offset_hours * 3600)
            .unwrap_or_else(|| FixedOffset::east_opt(0).unwrap())
    }

    /// Concrete (date, hour) slots already claimed by a non-canceled
    /// appointment inside the window.
    async fn fetch_booked_slots(
        &self,
        therapist_id: Uuid,
        start_date: NaiveDate,
        lookahead_days: i64,
        offset: FixedOffset,
        auth_token: &str,
    ) -> Result<HashSet<(NaiveDate, u32)>, TherapistError> {
        let window_start = start_date
            .and_hms_opt(0, 0, 0)
            .unwrap()
            .and_local_timezone(offset)
            .unwrap();
        let window_end = window_start + Duration::days(lookahead_days);

        let path = format!(
            "/rest/v1/appointments?therapist_id=eq.{}&scheduled_to=gte.{}&scheduled_to=lt.{}&status=neq.CANCELED&order=scheduled_to.asc",
            therapist_id,
            window_start.to_rfc3339(),
            window_end.to_rfc3339()
        );

        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| TherapistError::DatabaseError(e.to_string()))?;

        let mut booked = HashSet::new();
        for row in result {
            let Some(raw) = row["scheduled_to"].as_str() else {
                continue;
            };
            let scheduled_to = DateTime::parse_from_rfc3339(raw)
                .map_err(|e| TherapistError::DatabaseError(format!("Bad scheduled_to: {}", e)))?
                .with_timezone(&offset);
            booked.insert((scheduled_to.date_naive(), scheduled_to.hour()));
        }

        Ok(booked)
    }
}

/// Walk each date in `[start_date, start_date + days)`, keep weekdays whose
/// Hour templates match, drop slots present in `booked`, and group the
/// survivors by month in first-encountered order.
///
/// Guarantees: no duplicate (date, hour) pair, dates ascending within a
/// month, every date a weekday.
pub fn build_availability_calendar(
    start_date: NaiveDate,
    days: i64,
    hours: &[Hour],
    booked: &HashSet<(NaiveDate, u32)>,
) -> AvailabilityCalendar {
    // Duplicate templates would duplicate slots downstream.
    let mut seen_templates = HashSet::new();
    let mut templates: Vec<&Hour> = hours
        .iter()
        .filter(|h| seen_templates.insert((h.weekday, h.start_hour)))
        .collect();
    templates.sort_by_key(|h| h.start_hour);

    let mut calendar = AvailabilityCalendar::default();

    for day_index in 0..days {
        let date = start_date + Duration::days(day_index);
        let weekday = Weekday::from_chrono(date.weekday());

        if weekday.is_weekend() {
            continue;
        }

        let open_hours: Vec<Hour> = templates
            .iter()
            .filter(|h| h.weekday == weekday)
            .filter(|h| !booked.contains(&(date, h.start_hour)))
            .map(|h| (*h).clone())
            .collect();

        if open_hours.is_empty() {
            continue;
        }

        let day = DayAvailability { date, hours: open_hours };

        match calendar.months.last_mut() {
            Some(month) if month.year == date.year() && month.month == date.month() => {
                month.days.push(day);
            }
            _ => calendar.months.push(MonthAvailability {
                year: date.year(),
                month: date.month(),
                days: vec![day],
            }),
        }
    }

    calendar
}
