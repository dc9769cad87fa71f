use reqwest::Client;
use serde_json::json;
use tracing::{debug, error, info};

use shared_config::AppConfig;

use crate::models::{CalendarError, CalendarEventResponse, CreateEventRequest, EventPatch};

/// Client for the external calendar provider. The scheduling core only
/// relies on the event id round-tripping; everything else is provider
/// detail.
pub struct CalendarClient {
    client: Client,
    base_url: String,
    api_token: String,
    organizer_email: String,
}

impl CalendarClient {
    pub fn new(config: &AppConfig) -> Result<Self, CalendarError> {
        if !config.is_calendar_configured() {
            return Err(CalendarError::NotConfigured);
        }

        Ok(Self {
            client: Client::new(),
            base_url: config.calendar_api_base_url.clone(),
            api_token: config.calendar_api_token.clone(),
            organizer_email: config.calendar_organizer_email.clone(),
        })
    }

    pub fn organizer_email(&self) -> &str {
        &self.organizer_email
    }

    /// POST /events
    pub async fn create_event(
        &self,
        request: &CreateEventRequest,
    ) -> Result<String, CalendarError> {
        info!("Creating calendar event for {}", request.attendee_email);

        let url = format!("{}/events", self.base_url);

        let body = json!({
            "organizer": request.organizer_email,
            "attendees": [request.attendee_email],
            "start": request.start.to_rfc3339(),
            "end": request.end.to_rfc3339(),
            "conferencing": request.conferencing,
        });

        debug!("Sending event creation request to: {}", url);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_token))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let response_text = response.text().await?;

        if !status.is_success() {
            error!("Calendar event creation failed: {} - {}", status, response_text);
            return Err(CalendarError::ApiError {
                message: format!("HTTP {}: {}", status, response_text),
            });
        }

        let event: CalendarEventResponse = serde_json::from_str(&response_text)
            .map_err(|e| CalendarError::ApiError {
                message: format!("Failed to parse event response: {}", e),
            })?;

        info!("Calendar event created: {}", event.id);
        Ok(event.id)
    }

    /// PATCH /events/{eventId}
    pub async fn update_event(
        &self,
        event_id: &str,
        patch: &EventPatch,
    ) -> Result<(), CalendarError> {
        info!("Updating calendar event: {}", event_id);

        let url = format!("{}/events/{}", self.base_url, event_id);

        let response = self
            .client
            .patch(&url)
            .header("Authorization", format!("Bearer {}", self.api_token))
            .header("Content-Type", "application/json")
            .json(patch)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let response_text = response.text().await?;
            error!("Calendar event update failed: {} - {}", status, response_text);
            return Err(CalendarError::ApiError {
                message: format!("HTTP {}: {}", status, response_text),
            });
        }

        Ok(())
    }

    /// DELETE /events/{eventId}
    pub async fn delete_event(&self, event_id: &str) -> Result<(), CalendarError> {
        info!("Deleting calendar event: {}", event_id);

        let url = format!("{}/events/{}", self.base_url, event_id);

        let response = self
            .client
            .delete(&url)
            .header("Authorization", format!("Bearer {}", self.api_token))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let response_text = response.text().await?;
            error!("Calendar event deletion failed: {} - {}", status, response_text);
            return Err(CalendarError::ApiError {
                message: format!("HTTP {}: {}", status, response_text),
            });
        }

        debug!("Calendar event {} deleted", event_id);
        Ok(())
    }
}
