use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveTime, Utc};
use reqwest::Method;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use shared_config::SchedulingConfig;
use shared_database::supabase::SupabaseClient;

use therapist_cell::models::Weekday;

use crate::models::SchedulingError;

/// Detects claims on a time slot at both levels: concrete ACCEPTED
/// appointments on any weekly repetition of the requested instant, and
/// ACCEPTED recurrences holding the same (weekday, start-time). Either
/// establishes a standing claim.
pub struct ConflictDetectionService {
    supabase: Arc<SupabaseClient>,
    scheduling: SchedulingConfig,
}

impl ConflictDetectionService {
    pub fn new(supabase: Arc<SupabaseClient>, scheduling: SchedulingConfig) -> Self {
        Self { supabase, scheduling }
    }

    /// Conflict check for a one-off booking request. The recurrence-level
    /// branch is derived from the instant itself: its weekday and
    /// time-of-day in the provider's zone.
    pub async fn check_slot_conflict(
        &self,
        therapist_id: Uuid,
        scheduled_to: DateTime<Utc>,
        auth_token: &str,
    ) -> Result<bool, SchedulingError> {
        let local = scheduled_to.with_timezone(&self.provider_offset());
        let weekday = Weekday::from_chrono(local.weekday());
        let start_time = local.time();

        self.has_conflict(therapist_id, scheduled_to, weekday, start_time, auth_token)
            .await
    }

    /// Conflict check for a prospective (weekday, time-of-day) claim with
    /// no stored recurrence yet. Anchored at the given date, or at the next
    /// occurrence of the weekday when none is supplied.
    pub async fn check_requested_recurrence(
        &self,
        therapist_id: Uuid,
        weekday: Weekday,
        start_time: NaiveTime,
        start_date: Option<chrono::NaiveDate>,
        auth_token: &str,
    ) -> Result<bool, SchedulingError> {
        let offset = self.provider_offset();
        let anchor = match start_date {
            Some(date) => date,
            None => next_weekday_date(Utc::now().with_timezone(&offset).date_naive(), weekday),
        };

        let first_instant = anchor
            .and_time(start_time)
            .and_local_timezone(offset)
            .unwrap()
            .with_timezone(&Utc);

        self.has_conflict(therapist_id, first_instant, weekday, start_time, auth_token)
            .await
    }

    /// Conflict check for a recurrence request anchored at `first_instant`.
    pub async fn check_recurrence_conflict(
        &self,
        therapist_id: Uuid,
        first_instant: DateTime<Utc>,
        weekday: Weekday,
        start_time: NaiveTime,
        auth_token: &str,
    ) -> Result<bool, SchedulingError> {
        self.has_conflict(therapist_id, first_instant, weekday, start_time, auth_token)
            .await
    }

    async fn has_conflict(
        &self,
        therapist_id: Uuid,
        requested_instant: DateTime<Utc>,
        weekday: Weekday,
        start_time: NaiveTime,
        auth_token: &str,
    ) -> Result<bool, SchedulingError> {
        debug!(
            "Checking conflicts for therapist {} at {} ({} {})",
            therapist_id, requested_instant, weekday, start_time
        );

        let candidates = weekly_candidates(
            requested_instant,
            Utc::now(),
            self.scheduling.conflict_horizon_days,
        );

        let appointment_hits = self
            .count_accepted_appointments_at(therapist_id, &candidates, auth_token)
            .await?;

        let recurrence_hits = self
            .count_accepted_recurrences_at(therapist_id, weekday, start_time, auth_token)
            .await?;

        let conflict = appointment_hits > 0 || recurrence_hits > 0;
        if conflict {
            warn!(
                "Conflict for therapist {}: {} appointment(s), {} recurrence(s) claim the slot",
                therapist_id, appointment_hits, recurrence_hits
            );
        }

        Ok(conflict)
    }

    async fn count_accepted_appointments_at(
        &self,
        therapist_id: Uuid,
        candidates: &[DateTime<Utc>],
        auth_token: &str,
    ) -> Result<usize, SchedulingError> {
        if candidates.is_empty() {
            return Ok(0);
        }

        let instant_list = candidates
            .iter()
            .map(|c| format!("\"{}\"", c.to_rfc3339()))
            .collect::<Vec<_>>()
            .join(",");

        let path = format!(
            "/rest/v1/appointments?therapist_id=eq.{}&status=eq.ACCEPTED&scheduled_to=in.({})",
            therapist_id, instant_list
        );

        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| SchedulingError::DatabaseError(e.to_string()))?;

        Ok(result.len())
    }

    async fn count_accepted_recurrences_at(
        &self,
        therapist_id: Uuid,
        weekday: Weekday,
        start_time: NaiveTime,
        auth_token: &str,
    ) -> Result<usize, SchedulingError> {
        let path = format!(
            "/rest/v1/recurrences?therapist_id=eq.{}&status=eq.ACCEPTED&weekday=eq.{}&start_time=eq.{}",
            therapist_id,
            weekday,
            start_time.format("%H:%M:%S")
        );

        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| SchedulingError::DatabaseError(e.to_string()))?;

        Ok(result.len())
    }

    fn provider_offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.scheduling.provider_utc_offset_hours * 3600)
            .unwrap_or_else(|| FixedOffset::east_opt(0).unwrap())
    }
}

/// Weekly repetitions of `requested` that fall inside the conflict horizon:
/// `requested + {0, 7, 14, ...}` days, one offset per whole week between
/// `now` and `now + horizon_days`.
pub fn weekly_candidates(
    requested: DateTime<Utc>,
    now: DateTime<Utc>,
    horizon_days: i64,
) -> Vec<DateTime<Utc>> {
    let horizon = now + Duration::days(horizon_days);
    let weeks = (horizon - now).num_weeks();
    if weeks < 0 {
        return vec![];
    }

    (0..=weeks)
        .map(|week| requested + Duration::weeks(week))
        .collect()
}

/// First date on or after `from` that falls on `weekday`.
pub fn next_weekday_date(from: chrono::NaiveDate, weekday: Weekday) -> chrono::NaiveDate {
    let mut date = from;
    while Weekday::from_chrono(date.weekday()) != weekday {
        date += Duration::days(1);
    }
    date
}
