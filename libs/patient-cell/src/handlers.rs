use std::sync::Arc;

use axum::{
    extract::{Path, State, Extension},
    Json,
};
use axum_extra::TypedHeader;
use headers::{Authorization, authorization::Bearer};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{CreatePatientRequest, PatientError, UpdatePaymentAccountRequest};
use crate::services::patient::PatientService;

fn map_patient_error(e: PatientError) -> AppError {
    match e {
        PatientError::NotFound => AppError::NotFound("Patient not found".to_string()),
        PatientError::ValidationError(msg) => AppError::Validation(msg),
        PatientError::DatabaseError(msg) => AppError::Database(msg),
    }
}

#[axum::debug_handler]
pub async fn create_patient(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(_user): Extension<User>,
    Json(request): Json<CreatePatientRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let service = PatientService::new(&state);

    let patient = service
        .create_patient(request, token)
        .await
        .map_err(map_patient_error)?;

    Ok(Json(json!({
        "success": true,
        "patient": patient,
        "message": "Patient profile created successfully"
    })))
}

#[axum::debug_handler]
pub async fn get_patient(
    State(state): State<Arc<AppConfig>>,
    Path(patient_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();

    let is_self = patient_id.to_string() == user.id;
    if !is_self && !user.is_admin() && !user.is_therapist() {
        return Err(AppError::Auth("Not authorized to view this patient".to_string()));
    }

    let service = PatientService::new(&state);
    let patient = service
        .get_patient(patient_id, token)
        .await
        .map_err(map_patient_error)?;

    Ok(Json(json!(patient)))
}

#[axum::debug_handler]
pub async fn set_payment_account(
    State(state): State<Arc<AppConfig>>,
    Path(patient_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdatePaymentAccountRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();

    let is_self = patient_id.to_string() == user.id;
    if !is_self && !user.is_admin() {
        return Err(AppError::Auth("Not authorized to update this patient".to_string()));
    }

    let service = PatientService::new(&state);
    let patient = service
        .set_payment_account(patient_id, request, token)
        .await
        .map_err(map_patient_error)?;

    Ok(Json(json!({
        "success": true,
        "patient": patient,
        "message": "Payment account updated successfully"
    })))
}
