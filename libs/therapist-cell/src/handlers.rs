use std::sync::Arc;

use axum::{
    extract::{Path, Query, State, Extension},
    Json,
};
use axum_extra::TypedHeader;
use headers::{Authorization, authorization::Bearer};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{CreateTherapistRequest, SetWeeklyHoursRequest, TherapistError, UpdateTherapistRequest};
use crate::services::availability::AvailabilityService;
use crate::services::therapist::TherapistService;

#[derive(Debug, Deserialize)]
pub struct AvailabilityQueryParams {
    pub days: Option<i64>,
}

fn map_therapist_error(e: TherapistError) -> AppError {
    match e {
        TherapistError::NotFound => AppError::NotFound("Therapist not found".to_string()),
        TherapistError::ValidationError(msg) => AppError::Validation(msg),
        TherapistError::DatabaseError(msg) => AppError::Database(msg),
    }
}

#[axum::debug_handler]
pub async fn create_therapist(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateTherapistRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();

    if !user.is_therapist() && !user.is_admin() {
        return Err(AppError::Auth("Not authorized to create a therapist profile".to_string()));
    }

    let service = TherapistService::new(&state);
    let therapist = service
        .create_therapist(request, token)
        .await
        .map_err(map_therapist_error)?;

    Ok(Json(json!({
        "success": true,
        "therapist": therapist,
        "message": "Therapist profile created successfully"
    })))
}

#[axum::debug_handler]
pub async fn get_therapist(
    State(state): State<Arc<AppConfig>>,
    Path(therapist_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(_user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let service = TherapistService::new(&state);

    let therapist = service
        .get_therapist(therapist_id, token)
        .await
        .map_err(map_therapist_error)?;

    Ok(Json(json!(therapist)))
}

#[axum::debug_handler]
pub async fn update_therapist(
    State(state): State<Arc<AppConfig>>,
    Path(therapist_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateTherapistRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();

    let is_self = therapist_id.to_string() == user.id;
    if !is_self && !user.is_admin() {
        return Err(AppError::Auth("Not authorized to update this therapist".to_string()));
    }

    let service = TherapistService::new(&state);
    let therapist = service
        .update_therapist(therapist_id, request, token)
        .await
        .map_err(map_therapist_error)?;

    Ok(Json(json!({
        "success": true,
        "therapist": therapist,
        "message": "Therapist profile updated successfully"
    })))
}

#[axum::debug_handler]
pub async fn set_weekly_hours(
    State(state): State<Arc<AppConfig>>,
    Path(therapist_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<SetWeeklyHoursRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();

    let is_self = therapist_id.to_string() == user.id;
    if !is_self && !user.is_admin() {
        return Err(AppError::Auth("Not authorized to set hours for this therapist".to_string()));
    }

    let service = TherapistService::new(&state);
    let hours = service
        .set_weekly_hours(therapist_id, request, token)
        .await
        .map_err(map_therapist_error)?;

    let total = hours.len();

    Ok(Json(json!({
        "success": true,
        "hours": hours,
        "total": total,
        "message": "Weekly schedule replaced successfully"
    })))
}

#[axum::debug_handler]
pub async fn get_hours(
    State(state): State<Arc<AppConfig>>,
    Path(therapist_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(_user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let service = TherapistService::new(&state);

    let hours = service
        .get_hours(therapist_id, token)
        .await
        .map_err(map_therapist_error)?;

    let total = hours.len();

    Ok(Json(json!({
        "therapist_id": therapist_id,
        "hours": hours,
        "total": total
    })))
}

#[axum::debug_handler]
pub async fn get_availability(
    State(state): State<Arc<AppConfig>>,
    Path(therapist_id): Path<Uuid>,
    Query(params): Query<AvailabilityQueryParams>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(_user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let service = AvailabilityService::new(&state);

    let calendar = service
        .find_available_slots(therapist_id, params.days, token)
        .await
        .map_err(map_therapist_error)?;

    let total_slots = calendar.slot_count();

    Ok(Json(json!({
        "therapist_id": therapist_id,
        "availability": calendar,
        "total_slots": total_slots
    })))
}
