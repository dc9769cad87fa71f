use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{
    CreateTherapistRequest, Hour, SetWeeklyHoursRequest, Therapist, TherapistError,
    UpdateTherapistRequest,
};

pub struct TherapistService {
    supabase: Arc<SupabaseClient>,
}

impl TherapistService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: Arc::new(SupabaseClient::new(config)),
        }
    }

    pub fn with_client(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    pub async fn create_therapist(
        &self,
        request: CreateTherapistRequest,
        auth_token: &str,
    ) -> Result<Therapist, TherapistError> {
        debug!("Creating therapist profile for {}", request.email);

        if request.hourly_rate <= 0 {
            return Err(TherapistError::ValidationError(
                "Hourly rate must be positive".to_string(),
            ));
        }
        if request.first_name.trim().is_empty() || request.last_name.trim().is_empty() {
            return Err(TherapistError::ValidationError(
                "Name must not be empty".to_string(),
            ));
        }

        let therapist_data = json!({
            "id": Uuid::new_v4(),
            "first_name": request.first_name,
            "last_name": request.last_name,
            "email": request.email,
            "hourly_rate": request.hourly_rate,
            "bio": request.bio,
            "street": request.street,
            "city": request.city,
            "state": request.state,
            "postal_code": request.postal_code,
            "calendar_email": request.calendar_email,
            "payment_account_id": request.payment_account_id,
            "created_at": Utc::now().to_rfc3339(),
            "updated_at": Utc::now().to_rfc3339()
        });

        let result = self
            .supabase
            .insert_returning("/rest/v1/therapists", Some(auth_token), therapist_data)
            .await
            .map_err(|e| TherapistError::DatabaseError(e.to_string()))?;

        let row = result
            .into_iter()
            .next()
            .ok_or_else(|| TherapistError::DatabaseError("Failed to create therapist".to_string()))?;

        serde_json::from_value(row)
            .map_err(|e| TherapistError::DatabaseError(format!("Failed to parse therapist: {}", e)))
    }

    pub async fn get_therapist(
        &self,
        therapist_id: Uuid,
        auth_token: &str,
    ) -> Result<Therapist, TherapistError> {
        let path = format!("/rest/v1/therapists?id=eq.{}", therapist_id);
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| TherapistError::DatabaseError(e.to_string()))?;

        let row = result.into_iter().next().ok_or(TherapistError::NotFound)?;

        serde_json::from_value(row)
            .map_err(|e| TherapistError::DatabaseError(format!("Failed to parse therapist: {}", e)))
    }

    pub async fn update_therapist(
        &self,
        therapist_id: Uuid,
        request: UpdateTherapistRequest,
        auth_token: &str,
    ) -> Result<Therapist, TherapistError> {
        debug!("Updating therapist: {}", therapist_id);

        if let Some(rate) = request.hourly_rate {
            if rate <= 0 {
                return Err(TherapistError::ValidationError(
                    "Hourly rate must be positive".to_string(),
                ));
            }
        }

        let mut update_data = serde_json::Map::new();
        if let Some(first_name) = request.first_name {
            update_data.insert("first_name".to_string(), json!(first_name));
        }
        if let Some(last_name) = request.last_name {
            update_data.insert("last_name".to_string(), json!(last_name));
        }
        if let Some(rate) = request.hourly_rate {
            update_data.insert("hourly_rate".to_string(), json!(rate));
        }
        if let Some(bio) = request.bio {
            update_data.insert("bio".to_string(), json!(bio));
        }
        if let Some(street) = request.street {
            update_data.insert("street".to_string(), json!(street));
        }
        if let Some(city) = request.city {
            update_data.insert("city".to_string(), json!(city));
        }
        if let Some(state) = request.state {
            update_data.insert("state".to_string(), json!(state));
        }
        if let Some(postal_code) = request.postal_code {
            update_data.insert("postal_code".to_string(), json!(postal_code));
        }
        if let Some(push_token) = request.push_token {
            update_data.insert("push_token".to_string(), json!(push_token));
        }
        if let Some(calendar_email) = request.calendar_email {
            update_data.insert("calendar_email".to_string(), json!(calendar_email));
        }
        if let Some(payment_account_id) = request.payment_account_id {
            update_data.insert("payment_account_id".to_string(), json!(payment_account_id));
        }
        update_data.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let path = format!("/rest/v1/therapists?id=eq.{}", therapist_id);
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert("Prefer", reqwest::header::HeaderValue::from_static("return=representation"));

        let result: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::PATCH,
                &path,
                Some(auth_token),
                Some(Value::Object(update_data)),
                Some(headers),
            )
            .await
            .map_err(|e| TherapistError::DatabaseError(e.to_string()))?;

        let row = result.into_iter().next().ok_or(TherapistError::NotFound)?;

        serde_json::from_value(row)
            .map_err(|e| TherapistError::DatabaseError(format!("Failed to parse therapist: {}", e)))
    }

    /// Replace the weekly schedule wholesale: delete every Hour row for the
    /// therapist, then insert the submitted templates.
    pub async fn set_weekly_hours(
        &self,
        therapist_id: Uuid,
        request: SetWeeklyHoursRequest,
        auth_token: &str,
    ) -> Result<Vec<Hour>, TherapistError> {
        debug!("Replacing weekly hours for therapist {}", therapist_id);

        for template in &request.hours {
            if template.start_hour > 23 {
                return Err(TherapistError::ValidationError(format!(
                    "Start hour must be between 0 and 23, got {}",
                    template.start_hour
                )));
            }
        }

        // Verify the therapist exists before touching the schedule.
        self.get_therapist(therapist_id, auth_token).await?;

        let delete_path = format!("/rest/v1/hours?therapist_id=eq.{}", therapist_id);
        let _: Vec<Value> = self
            .supabase
            .request(Method::DELETE, &delete_path, Some(auth_token), None)
            .await
            .map_err(|e| TherapistError::DatabaseError(e.to_string()))?;

        if request.hours.is_empty() {
            return Ok(vec![]);
        }

        let rows: Vec<Value> = request
            .hours
            .iter()
            .map(|template| {
                json!({
                    "id": Uuid::new_v4(),
                    "therapist_id": therapist_id,
                    "weekday": template.weekday,
                    "start_hour": template.start_hour,
                })
            })
            .collect();

        let result = self
            .supabase
            .insert_returning("/rest/v1/hours", Some(auth_token), Value::Array(rows))
            .await
            .map_err(|e| TherapistError::DatabaseError(e.to_string()))?;

        result
            .into_iter()
            .map(|row| {
                serde_json::from_value(row)
                    .map_err(|e| TherapistError::DatabaseError(format!("Failed to parse hour: {}", e)))
            })
            .collect()
    }

    pub async fn get_hours(
        &self,
        therapist_id: Uuid,
        auth_token: &str,
    ) -> Result<Vec<Hour>, TherapistError> {
        let path = format!(
            "/rest/v1/hours?therapist_id=eq.{}&order=weekday.asc,start_hour.asc",
            therapist_id
        );
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| TherapistError::DatabaseError(e.to_string()))?;

        result
            .into_iter()
            .map(|row| {
                serde_json::from_value(row)
                    .map_err(|e| TherapistError::DatabaseError(format!("Failed to parse hour: {}", e)))
            })
            .collect()
    }
}
