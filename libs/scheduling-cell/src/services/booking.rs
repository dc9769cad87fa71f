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
use notification_cell::PushClient;
use patient_cell::models::Patient;
use payment_cell::PaymentClient;
use therapist_cell::models::{Therapist, Weekday};

use crate::models::{
    Appointment, AppointmentSearchQuery, AppointmentStatus, AppointmentType,
    BookAppointmentRequest, BookingOutcome, SchedulingError,
};
use crate::services::conflict::ConflictDetectionService;
use crate::services::consistency::TherapistLockRegistry;

/// One-off appointment lifecycle: request, therapist decision, payment and
/// calendar hookup after confirmation.
pub struct BookingService {
    supabase: Arc<SupabaseClient>,
    scheduling: SchedulingConfig,
    conflict_service: Arc<ConflictDetectionService>,
    locks: Arc<TherapistLockRegistry>,
    calendar: Option<Arc<CalendarClient>>,
    payments: Option<Arc<PaymentClient>>,
    push: Option<Arc<PushClient>>,
}

impl BookingService {
    pub fn new(
        supabase: Arc<SupabaseClient>,
        scheduling: SchedulingConfig,
        conflict_service: Arc<ConflictDetectionService>,
        locks: Arc<TherapistLockRegistry>,
        calendar: Option<Arc<CalendarClient>>,
        payments: Option<Arc<PaymentClient>>,
        push: Option<Arc<PushClient>>,
    ) -> Self {
        Self {
            supabase,
            scheduling,
            conflict_service,
            locks,
            calendar,
            payments,
            push,
        }
    }

    /// Request a one-off booking. A claimed slot is a normal negative
    /// outcome so the caller can offer alternatives.
    pub async fn book_appointment(
        &self,
        request: BookAppointmentRequest,
        auth_token: &str,
    ) -> Result<BookingOutcome, SchedulingError> {
        if request.scheduled_to <= Utc::now() {
            return Err(SchedulingError::ValidationError(
                "Appointment must be scheduled for a future time".to_string(),
            ));
        }

        let local = request.scheduled_to.with_timezone(&self.provider_offset());
        if Weekday::from_chrono(local.weekday()).is_weekend() {
            return Err(SchedulingError::ValidationError(
                "Appointments are only available on weekdays".to_string(),
            ));
        }

        let conflict = self
            .conflict_service
            .check_slot_conflict(request.therapist_id, request.scheduled_to, auth_token)
            .await?;
        if conflict {
            return Ok(BookingOutcome { conflict: true, appointment: None });
        }

        let appointment_data = json!({
            "id": Uuid::new_v4(),
            "therapist_id": request.therapist_id,
            "patient_id": request.patient_id,
            "scheduled_to": request.scheduled_to.to_rfc3339(),
            "modality": request.modality,
            "status": AppointmentStatus::Pendent,
            "appointment_type": AppointmentType::OneOff,
            "paid": false,
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
            .ok_or_else(|| SchedulingError::DatabaseError("Failed to create appointment".to_string()))?;

        let appointment: Appointment = serde_json::from_value(row)
            .map_err(|e| SchedulingError::DatabaseError(format!("Failed to parse appointment: {}", e)))?;

        info!(
            "Appointment {} requested with therapist {}",
            appointment.id, appointment.therapist_id
        );

        if let Some(push) = &self.push {
            if let Ok(therapist) = self.load_therapist(appointment.therapist_id, auth_token).await {
                push.notify(
                    therapist.push_token.as_deref(),
                    "New booking request",
                    &format!("A patient requested {}", local.format("%A %H:%M")),
                )
                .await;
            }
        }

        Ok(BookingOutcome { conflict: false, appointment: Some(appointment) })
    }

    pub async fn get_appointment(
        &self,
        appointment_id: Uuid,
        auth_token: &str,
    ) -> Result<Appointment, SchedulingError> {
        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| SchedulingError::DatabaseError(e.to_string()))?;

        let row = result.into_iter().next().ok_or(SchedulingError::AppointmentNotFound)?;

        serde_json::from_value(row)
            .map_err(|e| SchedulingError::DatabaseError(format!("Failed to parse appointment: {}", e)))
    }

    /// Therapist confirms a PENDENT request. The slot claim is re-checked
    /// under the therapist's booking lock before the status write; the
    /// calendar event and the patient push are best-effort follow-ups.
    pub async fn accept_appointment(
        &self,
        appointment_id: Uuid,
        auth_token: &str,
    ) -> Result<Appointment, SchedulingError> {
        let appointment = self.get_appointment(appointment_id, auth_token).await?;

        if !appointment.status.can_transition_to(AppointmentStatus::Accepted) {
            return Err(SchedulingError::InvalidStatusTransition(appointment.status));
        }

        let _guard = self.locks.acquire(appointment.therapist_id).await;

        let conflict = self
            .conflict_service
            .check_slot_conflict(appointment.therapist_id, appointment.scheduled_to, auth_token)
            .await?;
        if conflict {
            return Err(SchedulingError::ConflictDetected);
        }

        let mut appointment = self
            .set_appointment_status(appointment_id, AppointmentStatus::Accepted, auth_token)
            .await?;

        let therapist = self.load_therapist(appointment.therapist_id, auth_token).await?;
        let patient = self.load_patient(appointment.patient_id, auth_token).await?;

        if let (Some(calendar), Some(organizer)) = (&self.calendar, therapist.calendar_email.as_deref()) {
            let event_request = CreateEventRequest {
                organizer_email: organizer.to_string(),
                attendee_email: patient.email.clone(),
                start: appointment.scheduled_to,
                end: appointment.scheduled_to + Duration::hours(1),
                conferencing: appointment.modality.needs_conferencing(),
            };

            match calendar.create_event(&event_request).await {
                Ok(event_id) => {
                    let path = format!("/rest/v1/appointments?id=eq.{}", appointment.id);
                    let body = json!({ "calendar_event_id": event_id });
                    let _: Vec<Value> = self
                        .supabase
                        .request(Method::PATCH, &path, Some(auth_token), Some(body))
                        .await
                        .map_err(|e| SchedulingError::DatabaseError(e.to_string()))?;
                    appointment.calendar_event_id = Some(event_id);
                }
                Err(e) => {
                    // The confirmation stands; the event can be synced later.
                    warn!("Calendar event creation failed for appointment {}: {}", appointment.id, e);
                }
            }
        }

        if let Some(push) = &self.push {
            push.notify(
                patient.push_token.as_deref(),
                "Appointment confirmed",
                &format!("{} confirmed your session", therapist.full_name()),
            )
            .await;
        }

        info!("Appointment {} accepted", appointment.id);
        Ok(appointment)
    }

    /// Charge the patient for a confirmed, unpaid appointment. Kept apart
    /// from acceptance so a declined charge can be retried without touching
    /// the booking itself.
    pub async fn charge_appointment(
        &self,
        appointment_id: Uuid,
        auth_token: &str,
    ) -> Result<Appointment, SchedulingError> {
        let appointment = self.get_appointment(appointment_id, auth_token).await?;

        if appointment.status != AppointmentStatus::Accepted {
            return Err(SchedulingError::ValidationError(
                "Only accepted appointments can be charged".to_string(),
            ));
        }
        if appointment.paid {
            return Err(SchedulingError::ValidationError(
                "Appointment is already paid".to_string(),
            ));
        }

        let payments = self
            .payments
            .as_ref()
            .ok_or_else(|| SchedulingError::DependencyError("Payment integration not configured".to_string()))?;

        let therapist = self.load_therapist(appointment.therapist_id, auth_token).await?;
        let patient = self.load_patient(appointment.patient_id, auth_token).await?;

        let payer = patient.payment_account_id.as_deref().ok_or_else(|| {
            SchedulingError::ValidationError("Patient has no payment account on file".to_string())
        })?;
        let payee = therapist.payment_account_id.as_deref().ok_or_else(|| {
            SchedulingError::ValidationError("Therapist has no payment account on file".to_string())
        })?;

        payments
            .charge(payer, payee, therapist.hourly_rate)
            .await
            .map_err(|e| SchedulingError::DependencyError(e.to_string()))?;

        let path = format!("/rest/v1/appointments?id=eq.{}", appointment.id);
        let body = json!({
            "paid": true,
            "updated_at": Utc::now().to_rfc3339()
        });
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert("Prefer", reqwest::header::HeaderValue::from_static("return=representation"));

        let rows: Vec<Value> = self
            .supabase
            .request_with_headers(Method::PATCH, &path, Some(auth_token), Some(body), Some(headers))
            .await
            .map_err(|e| SchedulingError::DatabaseError(e.to_string()))?;

        let row = rows.into_iter().next().ok_or(SchedulingError::AppointmentNotFound)?;

        serde_json::from_value(row)
            .map_err(|e| SchedulingError::DatabaseError(format!("Failed to parse appointment: {}", e)))
    }

    pub async fn reject_appointment(
        &self,
        appointment_id: Uuid,
        auth_token: &str,
    ) -> Result<Appointment, SchedulingError> {
        let appointment = self.get_appointment(appointment_id, auth_token).await?;

        if !appointment.status.can_transition_to(AppointmentStatus::Rejected) {
            return Err(SchedulingError::InvalidStatusTransition(appointment.status));
        }

        let updated = self
            .set_appointment_status(appointment_id, AppointmentStatus::Rejected, auth_token)
            .await?;

        if let Some(push) = &self.push {
            if let Ok(patient) = self.load_patient(updated.patient_id, auth_token).await {
                push.notify(
                    patient.push_token.as_deref(),
                    "Booking declined",
                    "Your booking request was declined, please pick another slot",
                )
                .await;
            }
        }

        Ok(updated)
    }

    /// Cancel a booking. The calendar event, when present, is removed
    /// best-effort.
    pub async fn cancel_appointment(
        &self,
        appointment_id: Uuid,
        auth_token: &str,
    ) -> Result<Appointment, SchedulingError> {
        let appointment = self.get_appointment(appointment_id, auth_token).await?;

        if !appointment.status.can_transition_to(AppointmentStatus::Canceled) {
            return Err(SchedulingError::InvalidStatusTransition(appointment.status));
        }

        let updated = self
            .set_appointment_status(appointment_id, AppointmentStatus::Canceled, auth_token)
            .await?;

        if let (Some(calendar), Some(event_id)) = (&self.calendar, updated.calendar_event_id.as_deref()) {
            if let Err(e) = calendar.delete_event(event_id).await {
                warn!("Failed to delete calendar event {}: {}", event_id, e);
            }
        }

        info!("Appointment {} canceled", appointment_id);
        Ok(updated)
    }

    pub async fn search_appointments(
        &self,
        query: AppointmentSearchQuery,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, SchedulingError> {
        let mut query_parts = Vec::new();

        if let Some(therapist_id) = query.therapist_id {
            query_parts.push(format!("therapist_id=eq.{}", therapist_id));
        }
        if let Some(patient_id) = query.patient_id {
            query_parts.push(format!("patient_id=eq.{}", patient_id));
        }
        if let Some(status) = query.status {
            query_parts.push(format!("status=eq.{}", status));
        }
        if let Some(from_date) = query.from_date {
            query_parts.push(format!("scheduled_to=gte.{}", from_date.to_rfc3339()));
        }
        if let Some(to_date) = query.to_date {
            query_parts.push(format!("scheduled_to=lte.{}", to_date.to_rfc3339()));
        }
        query_parts.push(format!("limit={}", query.limit.unwrap_or(50)));
        query_parts.push(format!("offset={}", query.offset.unwrap_or(0)));

        let path = format!(
            "/rest/v1/appointments?{}&order=scheduled_to.asc",
            query_parts.join("&")
        );

        debug!("Searching appointments: {}", path);

        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| SchedulingError::DatabaseError(e.to_string()))?;

        result
            .into_iter()
            .map(|row| {
                serde_json::from_value(row).map_err(|e| {
                    SchedulingError::DatabaseError(format!("Failed to parse appointment: {}", e))
                })
            })
            .collect()
    }

    // ==============================================================================
    // PRIVATE HELPER METHODS
    // ==============================================================================

    fn provider_offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.scheduling.provider_utc_offset_hours * 3600)
            .unwrap_or_else(|| FixedOffset::east_opt(0).unwrap())
    }

    async fn set_appointment_status(
        &self,
        appointment_id: Uuid,
        status: AppointmentStatus,
        auth_token: &str,
    ) -> Result<Appointment, SchedulingError> {
        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);
        let body = json!({
            "status": status,
            "updated_at": Utc::now().to_rfc3339()
        });

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert("Prefer", reqwest::header::HeaderValue::from_static("return=representation"));

        let rows: Vec<Value> = self
            .supabase
            .request_with_headers(Method::PATCH, &path, Some(auth_token), Some(body), Some(headers))
            .await
            .map_err(|e| SchedulingError::DatabaseError(e.to_string()))?;

        let row = rows.into_iter().next().ok_or(SchedulingError::AppointmentNotFound)?;

        serde_json::from_value(row)
            .map_err(|e| SchedulingError::DatabaseError(format!("Failed to parse appointment: {}", e)))
    }

    async fn load_therapist(
        &self,
        therapist_id: Uuid,
        auth_token: &str,
    ) -> Result<Therapist, SchedulingError> {
        let path = format!("/rest/v1/therapists?id=eq.{}", therapist_id);
        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| SchedulingError::DatabaseError(e.to_string()))?;

        rows.into_iter()
            .next()
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| SchedulingError::DatabaseError(format!("Failed to parse therapist: {}", e)))?
            .ok_or(SchedulingError::TherapistNotFound)
    }

    async fn load_patient(
        &self,
        patient_id: Uuid,
        auth_token: &str,
    ) -> Result<Patient, SchedulingError> {
        let path = format!("/rest/v1/patients?id=eq.{}", patient_id);
        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| SchedulingError::DatabaseError(e.to_string()))?;

        rows.into_iter()
            .next()
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| SchedulingError::DatabaseError(format!("Failed to parse patient: {}", e)))?
            .ok_or(SchedulingError::PatientNotFound)
    }
}
