use std::sync::Arc;

use axum::{
    extract::{Path, Query, State, Extension},
    Json,
};
use axum_extra::TypedHeader;
use headers::{Authorization, authorization::Bearer};
use serde::Deserialize;
use serde_json::{json, Value};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use uuid::Uuid;

use shared_models::auth::User;
use shared_models::error::AppError;

use therapist_cell::models::Weekday;

use crate::models::{
    Appointment, AppointmentSearchQuery, AppointmentStatus, BookAppointmentRequest,
    CreateRecurrenceRequest, SchedulingError,
};
use crate::router::SchedulingState;

// ==============================================================================
// QUERY PARAMETER STRUCTS
// ==============================================================================

#[derive(Debug, Deserialize)]
pub struct AppointmentQueryParams {
    pub therapist_id: Option<Uuid>,
    pub patient_id: Option<Uuid>,
    pub status: Option<AppointmentStatus>,
    pub from_date: Option<DateTime<Utc>>,
    pub to_date: Option<DateTime<Utc>>,
    pub limit: Option<i32>,
    pub offset: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct RecurrenceConflictQuery {
    pub therapist_id: Uuid,
    pub weekday: Weekday,
    pub start_time: NaiveTime,
    pub start_date: Option<NaiveDate>,
}

fn map_scheduling_error(e: SchedulingError) -> AppError {
    match e {
        SchedulingError::AppointmentNotFound => AppError::NotFound("Appointment not found".to_string()),
        SchedulingError::RecurrenceNotFound => AppError::NotFound("Recurrence not found".to_string()),
        SchedulingError::TherapistNotFound => AppError::NotFound("Therapist not found".to_string()),
        SchedulingError::PatientNotFound => AppError::NotFound("Patient not found".to_string()),
        SchedulingError::ValidationError(msg) => AppError::Validation(msg),
        SchedulingError::ConflictDetected => {
            AppError::Conflict("Slot is already claimed by another booking".to_string())
        }
        SchedulingError::InvalidStatusTransition(status) => {
            AppError::BadRequest(format!("Cannot transition from current status: {}", status))
        }
        SchedulingError::DatabaseError(msg) => AppError::Database(msg),
        SchedulingError::DependencyError(msg) => AppError::Dependency(msg),
    }
}

fn authorize_participant(user: &User, appointment: &Appointment) -> Result<(), AppError> {
    let is_patient = appointment.patient_id.to_string() == user.id;
    let is_therapist = appointment.therapist_id.to_string() == user.id;

    if !is_patient && !is_therapist && !user.is_admin() {
        return Err(AppError::Auth("Not authorized for this appointment".to_string()));
    }
    Ok(())
}

// ==============================================================================
// ONE-OFF APPOINTMENT HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn book_appointment(
    State(state): State<Arc<SchedulingState>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<BookAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();

    let is_patient = request.patient_id.to_string() == user.id;
    if !is_patient && !user.is_admin() {
        return Err(AppError::Auth("Not authorized to book for this patient".to_string()));
    }

    let outcome = state
        .booking
        .book_appointment(request, token)
        .await
        .map_err(map_scheduling_error)?;

    let conflict = outcome.conflict;

    Ok(Json(json!({
        "success": !conflict,
        "outcome": outcome,
        "message": if conflict {
            "Slot is already claimed, please pick another time"
        } else {
            "Booking request created, waiting for the therapist"
        }
    })))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<Arc<SchedulingState>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();

    let appointment = state
        .booking
        .get_appointment(appointment_id, token)
        .await
        .map_err(map_scheduling_error)?;

    authorize_participant(&user, &appointment)?;

    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn accept_appointment(
    State(state): State<Arc<SchedulingState>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();

    let appointment = state
        .booking
        .get_appointment(appointment_id, token)
        .await
        .map_err(map_scheduling_error)?;

    let is_therapist = appointment.therapist_id.to_string() == user.id;
    if !is_therapist && !user.is_admin() {
        return Err(AppError::Auth("Only the therapist can accept a booking".to_string()));
    }

    let accepted = state
        .booking
        .accept_appointment(appointment_id, token)
        .await
        .map_err(map_scheduling_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": accepted,
        "message": "Appointment accepted"
    })))
}

#[axum::debug_handler]
pub async fn reject_appointment(
    State(state): State<Arc<SchedulingState>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();

    let appointment = state
        .booking
        .get_appointment(appointment_id, token)
        .await
        .map_err(map_scheduling_error)?;

    let is_therapist = appointment.therapist_id.to_string() == user.id;
    if !is_therapist && !user.is_admin() {
        return Err(AppError::Auth("Only the therapist can reject a booking".to_string()));
    }

    let rejected = state
        .booking
        .reject_appointment(appointment_id, token)
        .await
        .map_err(map_scheduling_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": rejected,
        "message": "Appointment rejected"
    })))
}

#[axum::debug_handler]
pub async fn cancel_appointment(
    State(state): State<Arc<SchedulingState>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();

    let appointment = state
        .booking
        .get_appointment(appointment_id, token)
        .await
        .map_err(map_scheduling_error)?;

    authorize_participant(&user, &appointment)?;

    let canceled = state
        .booking
        .cancel_appointment(appointment_id, token)
        .await
        .map_err(map_scheduling_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": canceled,
        "message": "Appointment canceled"
    })))
}

#[axum::debug_handler]
pub async fn charge_appointment(
    State(state): State<Arc<SchedulingState>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();

    let appointment = state
        .booking
        .get_appointment(appointment_id, token)
        .await
        .map_err(map_scheduling_error)?;

    authorize_participant(&user, &appointment)?;

    let charged = state
        .booking
        .charge_appointment(appointment_id, token)
        .await
        .map_err(map_scheduling_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": charged,
        "message": "Appointment charged"
    })))
}

#[axum::debug_handler]
pub async fn search_appointments(
    State(state): State<Arc<SchedulingState>>,
    Query(params): Query<AppointmentQueryParams>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();

    let mut search_query = AppointmentSearchQuery {
        therapist_id: params.therapist_id,
        patient_id: params.patient_id,
        status: params.status,
        from_date: params.from_date,
        to_date: params.to_date,
        limit: params.limit,
        offset: params.offset,
    };

    // Non-admins only see their own bookings.
    if !user.is_admin() {
        if let Ok(user_uuid) = Uuid::parse_str(&user.id) {
            if user.is_therapist() {
                search_query.therapist_id = Some(user_uuid);
            } else {
                search_query.patient_id = Some(user_uuid);
            }
        }
    }

    let appointments = state
        .booking
        .search_appointments(search_query, token)
        .await
        .map_err(map_scheduling_error)?;

    let total = appointments.len();

    Ok(Json(json!({
        "appointments": appointments,
        "total": total,
        "limit": params.limit,
        "offset": params.offset
    })))
}

// ==============================================================================
// RECURRENCE HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn create_recurrence(
    State(state): State<Arc<SchedulingState>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateRecurrenceRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();

    let is_patient = request.patient_id.to_string() == user.id;
    if !is_patient && !user.is_admin() {
        return Err(AppError::Auth("Not authorized to book for this patient".to_string()));
    }

    let outcome = state
        .recurrence
        .create_recurrence(request, token)
        .await
        .map_err(map_scheduling_error)?;

    let conflict = outcome.conflict;

    Ok(Json(json!({
        "success": !conflict,
        "outcome": outcome,
        "message": if conflict {
            "Weekly slot is already claimed, please pick another time"
        } else {
            "Recurrence requested, waiting for the therapist"
        }
    })))
}

#[axum::debug_handler]
pub async fn check_recurrence_conflict(
    State(state): State<Arc<SchedulingState>>,
    Query(params): Query<RecurrenceConflictQuery>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(_user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();

    let conflict = state
        .conflict
        .check_requested_recurrence(
            params.therapist_id,
            params.weekday,
            params.start_time,
            params.start_date,
            token,
        )
        .await
        .map_err(map_scheduling_error)?;

    Ok(Json(json!({
        "therapist_id": params.therapist_id,
        "weekday": params.weekday,
        "start_time": params.start_time,
        "conflict": conflict
    })))
}

#[axum::debug_handler]
pub async fn accept_recurrence(
    State(state): State<Arc<SchedulingState>>,
    Path(recurrence_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();

    let recurrence = state
        .recurrence
        .get_recurrence(recurrence_id, token)
        .await
        .map_err(map_scheduling_error)?;

    let is_therapist = recurrence.therapist_id.to_string() == user.id;
    if !is_therapist && !user.is_admin() {
        return Err(AppError::Auth("Only the therapist can accept a recurrence".to_string()));
    }

    let result = state
        .recurrence
        .accept_recurrence(recurrence_id, token)
        .await
        .map_err(map_scheduling_error)?;

    let total_instances = result.instances.len();

    Ok(Json(json!({
        "success": true,
        "recurrence_id": result.recurrence_id,
        "instances": result.instances,
        "total_instances": total_instances,
        "message": "Recurrence accepted and scheduled"
    })))
}

#[axum::debug_handler]
pub async fn materialize_recurrence(
    State(state): State<Arc<SchedulingState>>,
    Path(recurrence_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();

    let recurrence = state
        .recurrence
        .get_recurrence(recurrence_id, token)
        .await
        .map_err(map_scheduling_error)?;

    let is_therapist = recurrence.therapist_id.to_string() == user.id;
    if !is_therapist && !user.is_admin() {
        return Err(AppError::Auth("Only the therapist can materialize a recurrence".to_string()));
    }

    let result = state
        .recurrence
        .materialize(recurrence_id, token)
        .await
        .map_err(map_scheduling_error)?;

    let total_instances = result.instances.len();

    Ok(Json(json!({
        "success": true,
        "recurrence_id": result.recurrence_id,
        "instances": result.instances,
        "total_instances": total_instances,
        "message": "Recurrence instances created"
    })))
}

#[axum::debug_handler]
pub async fn cancel_recurrence(
    State(state): State<Arc<SchedulingState>>,
    Path(recurrence_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();

    let recurrence = state
        .recurrence
        .get_recurrence(recurrence_id, token)
        .await
        .map_err(map_scheduling_error)?;

    let is_patient = recurrence.patient_id.to_string() == user.id;
    let is_therapist = recurrence.therapist_id.to_string() == user.id;
    if !is_patient && !is_therapist && !user.is_admin() {
        return Err(AppError::Auth("Not authorized for this recurrence".to_string()));
    }

    let report = state
        .recurrence
        .cancel_recurrence(recurrence_id, token)
        .await
        .map_err(map_scheduling_error)?;

    let fully_succeeded = report.fully_succeeded();

    Ok(Json(json!({
        "success": fully_succeeded,
        "report": report,
        "message": if fully_succeeded {
            "Recurrence canceled"
        } else {
            "Recurrence cancellation completed with partial failures"
        }
    })))
}
