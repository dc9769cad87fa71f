use reqwest::Client;
use tracing::{debug, warn};

use shared_config::AppConfig;

use crate::models::{PushError, PushMessage};

/// Fire-and-forget push delivery. Nothing in the scheduling flow depends on
/// the outcome, so `notify` downgrades every failure to a warning.
pub struct PushClient {
    client: Client,
    base_url: String,
    api_token: String,
}

impl PushClient {
    pub fn new(config: &AppConfig) -> Result<Self, PushError> {
        if !config.is_push_configured() {
            return Err(PushError::NotConfigured);
        }

        Ok(Self {
            client: Client::new(),
            base_url: config.push_api_base_url.clone(),
            api_token: config.push_api_token.clone(),
        })
    }

    pub async fn send(
        &self,
        destination_token: &str,
        title: &str,
        body: &str,
    ) -> Result<(), PushError> {
        debug!("Sending push notification: {}", title);

        let message = PushMessage {
            to: destination_token.to_string(),
            title: title.to_string(),
            body: body.to_string(),
        };

        let mut request = self.client.post(&self.base_url).json(&message);
        if !self.api_token.is_empty() {
            request = request.header("Authorization", format!("Bearer {}", self.api_token));
        }

        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            let response_text = response.text().await.unwrap_or_default();
            return Err(PushError::ApiError {
                message: format!("HTTP {}: {}", status, response_text),
            });
        }

        Ok(())
    }

    /// Best-effort variant used by handlers; failure never bubbles up.
    pub async fn notify(&self, destination_token: Option<&str>, title: &str, body: &str) {
        let Some(token) = destination_token else {
            debug!("No push token on file, skipping notification");
            return;
        };

        if let Err(e) = self.send(token, title, body).await {
            warn!("Push notification failed: {}", e);
        }
    }
}
