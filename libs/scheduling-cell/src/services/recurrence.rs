use chrono::{DateTime, Datelike, Duration, FixedOffset, Utc};
use reqwest::Method;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_config::SchedulingConfig;
use shared_database::supabase::SupabaseClient;

use calendar_cell::models::CreateEventRequest;
use calendar_cell::CalendarClient;
use patient_cell::models::Patient;
use therapist_cell::models::{Therapist, Weekday};

use crate::models::{
    Appointment, AppointmentStatus, AppointmentType, CreateRecurrenceRequest,
    MaterializationResult, Recurrence, RecurrenceCancellationReport, RecurrenceOutcome,
    RecurrenceStatus, SchedulingError,
};
use crate::services::conflict::ConflictDetectionService;
use crate::services::consistency::TherapistLockRegistry;

/// Owns the lifecycle of standing weekly bookings: request, acceptance,
/// materialization into concrete instances, and cancellation.
pub struct RecurrenceService {
    supabase: Arc<SupabaseClient>,
    scheduling: SchedulingConfig,
    conflict_service: Arc<ConflictDetectionService>,
    locks: Arc<TherapistLockRegistry>,
    calendar: Option<Arc<CalendarClient>>,
}

impl RecurrenceService {
    pub fn new(
        supabase: Arc<SupabaseClient>,
        scheduling: SchedulingConfig,
        conflict_service: Arc<ConflictDetectionService>,
        locks: Arc<TherapistLockRegistry>,
        calendar: Option<Arc<CalendarClient>>,
    ) -> Self {
        Self {
            supabase,
            scheduling,
            conflict_service,
            locks,
            calendar,
        }
    }

    /// Request a standing weekly booking. A conflicting slot is a normal
    /// negative outcome; the recurrence is stored PENDENT otherwise.
    pub async fn create_recurrence(
        &self,
        request: CreateRecurrenceRequest,
        auth_token: &str,
    ) -> Result<RecurrenceOutcome, SchedulingError> {
        let anchor_weekday = Weekday::from_chrono(request.start_date.weekday());
        if anchor_weekday != request.weekday {
            return Err(SchedulingError::ValidationError(format!(
                "Anchor date {} falls on {}, not {}",
                request.start_date, anchor_weekday, request.weekday
            )));
        }
        if request.weekday.is_weekend() {
            return Err(SchedulingError::ValidationError(
                "Recurring bookings are only available on weekdays".to_string(),
            ));
        }

        let first_instant = self.to_instant(request.start_date, request.start_time);
        if first_instant < Utc::now() {
            return Err(SchedulingError::ValidationError(
                "Anchor date must be in the future".to_string(),
            ));
        }

        let conflict = self
            .conflict_service
            .check_recurrence_conflict(
                request.therapist_id,
                first_instant,
                request.weekday,
                request.start_time,
                auth_token,
            )
            .await?;

        if conflict {
            return Ok(RecurrenceOutcome { conflict: true, recurrence: None });
        }

        let recurrence_data = json!({
            "id": Uuid::new_v4(),
            "therapist_id": request.therapist_id,
            "patient_id": request.patient_id,
            "weekday": request.weekday,
            "start_time": request.start_time.format("%H:%M:%S").to_string(),
            "start_date": request.start_date,
            "modality": request.modality,
            "status": RecurrenceStatus::Pendent,
            "created_at": Utc::now().to_rfc3339(),
            "updated_at": Utc::now().to_rfc3339()
        });

        let result = self
            .supabase
            .insert_returning("/rest/v1/recurrences", Some(auth_token), recurrence_data)
            .await
            .map_err(|e| SchedulingError::DatabaseError(e.to_string()))?;

        let row = result
            .into_iter()
            .next()
            .ok_or_else(|| SchedulingError::DatabaseError("Failed to create recurrence".to_string()))?;

        let recurrence: Recurrence = serde_json::from_value(row)
            .map_err(|e| SchedulingError::DatabaseError(format!("Failed to parse recurrence: {}", e)))?;

        info!("Recurrence {} requested for therapist {}", recurrence.id, recurrence.therapist_id);

        Ok(RecurrenceOutcome { conflict: false, recurrence: Some(recurrence) })
    }

    pub async fn get_recurrence(
        &self,
        recurrence_id: Uuid,
        auth_token: &str,
    ) -> Result<Recurrence, SchedulingError> {
        let path = format!("/rest/v1/recurrences?id=eq.{}", recurrence_id);
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| SchedulingError::DatabaseError(e.to_string()))?;

        let row = result.into_iter().next().ok_or(SchedulingError::RecurrenceNotFound)?;

        serde_json::from_value(row)
            .map_err(|e| SchedulingError::DatabaseError(format!("Failed to parse recurrence: {}", e)))
    }

    /// Therapist accepts a PENDENT recurrence: the slot claim is re-checked
    /// under the therapist's booking lock, the recurrence flips to
    /// ACCEPTED, and the anchor instance plus the weekly run inside the
    /// horizon are materialized.
    pub async fn accept_recurrence(
        &self,
        recurrence_id: Uuid,
        auth_token: &str,
    ) -> Result<MaterializationResult, SchedulingError> {
        let recurrence = self.get_recurrence(recurrence_id, auth_token).await?;

        if recurrence.status != RecurrenceStatus::Pendent {
            return Err(SchedulingError::ValidationError(format!(
                "Recurrence is {}, only PENDENT recurrences can be accepted",
                recurrence.status
            )));
        }

        let _guard = self.locks.acquire(recurrence.therapist_id).await;

        let first_instant = self.to_instant(recurrence.start_date, recurrence.start_time);
        let conflict = self
            .conflict_service
            .check_recurrence_conflict(
                recurrence.therapist_id,
                first_instant,
                recurrence.weekday,
                recurrence.start_time,
                auth_token,
            )
            .await?;
        if conflict {
            return Err(SchedulingError::ConflictDetected);
        }

        self.set_recurrence_status(recurrence_id, RecurrenceStatus::Accepted, auth_token)
            .await?;

        let (therapist, patient) = self.load_participants(&recurrence, auth_token).await?;

        let mut instances = Vec::new();
        instances.push(
            self.create_instance(&recurrence, first_instant, &therapist, &patient, auth_token)
                .await?,
        );

        let schedule = materialization_schedule(
            first_instant,
            Utc::now(),
            self.scheduling.conflict_horizon_days,
            self.scheduling.recurrence_instance_day_offset,
        );
        for instant in schedule {
            instances.push(
                self.create_instance(&recurrence, instant, &therapist, &patient, auth_token)
                    .await?,
            );
        }

        info!(
            "Recurrence {} accepted, {} instance(s) scheduled",
            recurrence_id,
            instances.len()
        );

        Ok(MaterializationResult { recurrence_id, instances })
    }

    /// Materialize the weekly run of an already-ACCEPTED recurrence. Fails
    /// fast when the recurrence is missing; no instances are created in
    /// that case.
    pub async fn materialize(
        &self,
        recurrence_id: Uuid,
        auth_token: &str,
    ) -> Result<MaterializationResult, SchedulingError> {
        let recurrence = self.get_recurrence(recurrence_id, auth_token).await?;

        if recurrence.status != RecurrenceStatus::Accepted {
            return Err(SchedulingError::ValidationError(format!(
                "Recurrence is {}, only ACCEPTED recurrences can be materialized",
                recurrence.status
            )));
        }

        let _guard = self.locks.acquire(recurrence.therapist_id).await;

        let (therapist, patient) = self.load_participants(&recurrence, auth_token).await?;

        let first_instant = self.to_instant(recurrence.start_date, recurrence.start_time);
        let schedule = materialization_schedule(
            first_instant,
            Utc::now(),
            self.scheduling.conflict_horizon_days,
            self.scheduling.recurrence_instance_day_offset,
        );

        debug!(
            "Materializing {} instance(s) for recurrence {}",
            schedule.len(),
            recurrence_id
        );

        let mut instances = Vec::new();
        for instant in schedule {
            instances.push(
                self.create_instance(&recurrence, instant, &therapist, &patient, auth_token)
                    .await?,
            );
        }

        Ok(MaterializationResult { recurrence_id, instances })
    }

    /// Cancel a recurrence and its future unpaid instances, then signal
    /// calendar cleanup for every canceled instance that carries an event.
    /// The three phases run independently; a failing phase is recorded in
    /// the report and never blocks its siblings.
    pub async fn cancel_recurrence(
        &self,
        recurrence_id: Uuid,
        auth_token: &str,
    ) -> Result<RecurrenceCancellationReport, SchedulingError> {
        // Missing recurrence is a hard NotFound; there is nothing to clean.
        self.get_recurrence(recurrence_id, auth_token).await?;

        let mut report = RecurrenceCancellationReport::default();

        match self
            .set_recurrence_status(recurrence_id, RecurrenceStatus::Canceled, auth_token)
            .await
        {
            Ok(()) => report.recurrence_canceled = true,
            Err(e) => {
                warn!("Failed to cancel recurrence {}: {}", recurrence_id, e);
                report.failures.push(format!("recurrence update: {}", e));
            }
        }

        let canceled = match self
            .cancel_future_unpaid_instances(recurrence_id, auth_token)
            .await
        {
            Ok(rows) => {
                report.appointments_canceled = rows.len();
                rows
            }
            Err(e) => {
                warn!("Failed to cancel instances of recurrence {}: {}", recurrence_id, e);
                report.failures.push(format!("appointment updates: {}", e));
                vec![]
            }
        };

        for appointment in canceled.iter().filter(|a| a.calendar_event_id.is_some()) {
            let event_id = appointment.calendar_event_id.as_deref().unwrap();
            match &self.calendar {
                Some(calendar) => match calendar.delete_event(event_id).await {
                    Ok(()) => report.calendar_events_removed += 1,
                    Err(e) => {
                        warn!("Failed to delete calendar event {}: {}", event_id, e);
                        report.failures.push(format!("calendar event {}: {}", event_id, e));
                    }
                },
                None => {
                    report
                        .failures
                        .push(format!("calendar event {}: integration not configured", event_id));
                }
            }
        }

        info!(
            "Recurrence {} cancellation: recurrence_canceled={}, {} instance(s), {} event(s), {} failure(s)",
            recurrence_id,
            report.recurrence_canceled,
            report.appointments_canceled,
            report.calendar_events_removed,
            report.failures.len()
        );

        Ok(report)
    }

    // ==============================================================================
    // PRIVATE HELPER METHODS
    // ==============================================================================

    fn provider_offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.scheduling.provider_utc_offset_hours * 3600)
            .unwrap_or_else(|| FixedOffset::east_opt(0).unwrap())
    }

    fn to_instant(&self, date: chrono::NaiveDate, time: chrono::NaiveTime) -> DateTime<Utc> {
        date.and_time(time)
            .and_local_timezone(self.provider_offset())
            .unwrap()
            .with_timezone(&Utc)
    }

    async fn set_recurrence_status(
        &self,
        recurrence_id: Uuid,
        status: RecurrenceStatus,
        auth_token: &str,
    ) -> Result<(), SchedulingError> {
        let path = format!("/rest/v1/recurrences?id=eq.{}", recurrence_id);
        let body = json!({
            "status": status,
            "updated_at": Utc::now().to_rfc3339()
        });

        let _: Vec<Value> = self
            .supabase
            .request(Method::PATCH, &path, Some(auth_token), Some(body))
            .await
            .map_err(|e| SchedulingError::DatabaseError(e.to_string()))?;

        Ok(())
    }

    async fn load_participants(
        &self,
        recurrence: &Recurrence,
        auth_token: &str,
    ) -> Result<(Therapist, Patient), SchedulingError> {
        let path = format!("/rest/v1/therapists?id=eq.{}", recurrence.therapist_id);
        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| SchedulingError::DatabaseError(e.to_string()))?;
        let therapist: Therapist = rows
            .into_iter()
            .next()
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| SchedulingError::DatabaseError(format!("Failed to parse therapist: {}", e)))?
            .ok_or(SchedulingError::TherapistNotFound)?;

        let path = format!("/rest/v1/patients?id=eq.{}", recurrence.patient_id);
        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| SchedulingError::DatabaseError(e.to_string()))?;
        let patient: Patient = rows
            .into_iter()
            .next()
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| SchedulingError::DatabaseError(format!("Failed to parse patient: {}", e)))?
            .ok_or(SchedulingError::PatientNotFound)?;

        Ok((therapist, patient))
    }

    /// Insert one RECURRENT instance and, when the calendar collaborator is
    /// wired up, its event. A calendar failure is a DependencyError and
    /// aborts the remaining run.
    async fn create_instance(
        &self,
        recurrence: &Recurrence,
        scheduled_to: DateTime<Utc>,
        therapist: &Therapist,
        patient: &Patient,
        auth_token: &str,
    ) -> Result<Appointment, SchedulingError> {
        let appointment_data = json!({
            "id": Uuid::new_v4(),
            "therapist_id": recurrence.therapist_id,
            "patient_id": recurrence.patient_id,
            "scheduled_to": scheduled_to.to_rfc3339(),
            "modality": recurrence.modality,
            "status": AppointmentStatus::Accepted,
            "appointment_type": AppointmentType::Recurrent,
            "paid": false,
            "recurrence_id": recurrence.id,
            "created_at": Utc::now().to_rfc3339(),
            "updated_at": Utc::now().to_rfc3339()
        });

        let result = self
            .supabase
            .insert_returning("/rest/v1/appointments", Some(auth_token), appointment_data)
            .await
            .map_err(|e| SchedulingError::DatabaseError(e.to_string()))?;

        let row = result
            .into_iter()
            .next()
            .ok_or_else(|| SchedulingError::DatabaseError("Failed to create instance".to_string()))?;

        let mut appointment: Appointment = serde_json::from_value(row)
            .map_err(|e| SchedulingError::DatabaseError(format!("Failed to parse instance: {}", e)))?;

        if let (Some(calendar), Some(organizer)) = (&self.calendar, therapist.calendar_email.as_deref()) {
            let event_request = CreateEventRequest {
                organizer_email: organizer.to_string(),
                attendee_email: patient.email.clone(),
                start: scheduled_to,
                end: scheduled_to + Duration::hours(1),
                conferencing: recurrence.modality.needs_conferencing(),
            };

            let event_id = calendar
                .create_event(&event_request)
                .await
                .map_err(|e| SchedulingError::DependencyError(e.to_string()))?;

            let path = format!("/rest/v1/appointments?id=eq.{}", appointment.id);
            let body = json!({ "calendar_event_id": event_id });
            let _: Vec<Value> = self
                .supabase
                .request(Method::PATCH, &path, Some(auth_token), Some(body))
                .await
                .map_err(|e| SchedulingError::DatabaseError(e.to_string()))?;

            appointment.calendar_event_id = Some(event_id);
        }

        Ok(appointment)
    }

    /// Flip future, unpaid, non-terminal instances to CANCELED and hand
    /// back the affected rows. Past or paid instances are immutable
    /// history.
    async fn cancel_future_unpaid_instances(
        &self,
        recurrence_id: Uuid,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, SchedulingError> {
        let path = format!(
            "/rest/v1/appointments?recurrence_id=eq.{}&scheduled_to=gte.{}&paid=eq.false&status=in.(PENDENT,ACCEPTED)",
            recurrence_id,
            Utc::now().to_rfc3339()
        );

        let body = json!({
            "status": AppointmentStatus::Canceled,
            "updated_at": Utc::now().to_rfc3339()
        });

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert("Prefer", reqwest::header::HeaderValue::from_static("return=representation"));

        let rows: Vec<Value> = self
            .supabase
            .request_with_headers(Method::PATCH, &path, Some(auth_token), Some(body), Some(headers))
            .await
            .map_err(|e| SchedulingError::DatabaseError(e.to_string()))?;

        rows.into_iter()
            .map(|row| {
                serde_json::from_value(row).map_err(|e| {
                    SchedulingError::DatabaseError(format!("Failed to parse instance: {}", e))
                })
            })
            .collect()
    }
}

/// Instants for the weekly run after the anchor: one per whole week between
/// the first instance and `now + horizon_days`, each `7*i + day_offset`
/// days after the anchor. `day_offset` 0 keeps every instance on the
/// anchor's weekday.
pub fn materialization_schedule(
    first_instant: DateTime<Utc>,
    now: DateTime<Utc>,
    horizon_days: i64,
    day_offset: i64,
) -> Vec<DateTime<Utc>> {
    let horizon = now + Duration::days(horizon_days);
    let weeks_to_schedule = (horizon - first_instant).num_weeks();
    if weeks_to_schedule < 1 {
        return vec![];
    }

    (1..=weeks_to_schedule)
        .map(|week| first_instant + Duration::days(7 * week + day_offset))
        .collect()
}
