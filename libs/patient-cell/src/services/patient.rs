use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{CreatePatientRequest, Patient, PatientError, UpdatePaymentAccountRequest};

pub struct PatientService {
    supabase: Arc<SupabaseClient>,
}

impl PatientService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: Arc::new(SupabaseClient::new(config)),
        }
    }

    pub fn with_client(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    pub async fn create_patient(
        &self,
        request: CreatePatientRequest,
        auth_token: &str,
    ) -> Result<Patient, PatientError> {
        debug!("Creating patient profile for {}", request.email);

        if request.first_name.trim().is_empty() || request.last_name.trim().is_empty() {
            return Err(PatientError::ValidationError(
                "Name must not be empty".to_string(),
            ));
        }

        let patient_data = json!({
            "id": Uuid::new_v4(),
            "first_name": request.first_name,
            "last_name": request.last_name,
            "email": request.email,
            "created_at": Utc::now().to_rfc3339(),
            "updated_at": Utc::now().to_rfc3339()
        });

        let result = self
            .supabase
            .insert_returning("/rest/v1/patients", Some(auth_token), patient_data)
            .await
            .map_err(|e| PatientError::DatabaseError(e.to_string()))?;

        let row = result
            .into_iter()
            .next()
            .ok_or_else(|| PatientError::DatabaseError("Failed to create patient".to_string()))?;

        serde_json::from_value(row)
            .map_err(|e| PatientError::DatabaseError(format!("Failed to parse patient: {}", e)))
    }

    pub async fn get_patient(
        &self,
        patient_id: Uuid,
        auth_token: &str,
    ) -> Result<Patient, PatientError> {
        let path = format!("/rest/v1/patients?id=eq.{}", patient_id);
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| PatientError::DatabaseError(e.to_string()))?;

        let row = result.into_iter().next().ok_or(PatientError::NotFound)?;

        serde_json::from_value(row)
            .map_err(|e| PatientError::DatabaseError(format!("Failed to parse patient: {}", e)))
    }

    pub async fn set_payment_account(
        &self,
        patient_id: Uuid,
        request: UpdatePaymentAccountRequest,
        auth_token: &str,
    ) -> Result<Patient, PatientError> {
        debug!("Updating payment account for patient {}", patient_id);

        if request.payment_account_id.trim().is_empty() {
            return Err(PatientError::ValidationError(
                "Payment account id must not be empty".to_string(),
            ));
        }

        let update_data = json!({
            "payment_account_id": request.payment_account_id,
            "updated_at": Utc::now().to_rfc3339()
        });

        let path = format!("/rest/v1/patients?id=eq.{}", patient_id);
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert("Prefer", reqwest::header::HeaderValue::from_static("return=representation"));

        let result: Vec<Value> = self
            .supabase
            .request_with_headers(Method::PATCH, &path, Some(auth_token), Some(update_data), Some(headers))
            .await
            .map_err(|e| PatientError::DatabaseError(e.to_string()))?;

        let row = result.into_iter().next().ok_or(PatientError::NotFound)?;

        serde_json::from_value(row)
            .map_err(|e| PatientError::DatabaseError(format!("Failed to parse patient: {}", e)))
    }
}
