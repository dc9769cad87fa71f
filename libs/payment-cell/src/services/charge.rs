use reqwest::Client;
use tracing::{debug, error, info};

use shared_config::AppConfig;

use crate::models::{ChargeRequest, ChargeResponse, ChargeStatus, PaymentError};

/// Client for the payment processor. Invoked after an appointment is
/// confirmed, never from inside the scheduling core.
pub struct PaymentClient {
    client: Client,
    base_url: String,
    secret_key: String,
    application_fee_bps: u32,
}

impl PaymentClient {
    pub fn new(config: &AppConfig) -> Result<Self, PaymentError> {
        if !config.is_payment_configured() {
            return Err(PaymentError::NotConfigured);
        }

        Ok(Self {
            client: Client::new(),
            base_url: config.payment_api_base_url.clone(),
            secret_key: config.payment_api_secret_key.clone(),
            application_fee_bps: config.payment_application_fee_bps,
        })
    }

    /// Platform cut for a given amount, in cents.
    pub fn application_fee(&self, amount: i64) -> i64 {
        amount * self.application_fee_bps as i64 / 10_000
    }

    /// POST /charges
    pub async fn charge(
        &self,
        payer_account_id: &str,
        payee_account_id: &str,
        amount: i64,
    ) -> Result<String, PaymentError> {
        info!("Charging {} cents from {}", amount, payer_account_id);

        let url = format!("{}/charges", self.base_url);

        let request = ChargeRequest {
            payer_account_id: payer_account_id.to_string(),
            payee_account_id: payee_account_id.to_string(),
            amount,
            application_fee: self.application_fee(amount),
        };

        debug!("Sending charge request to: {}", url);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.secret_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let response_text = response.text().await?;

        if !status.is_success() {
            error!("Charge failed: {} - {}", status, response_text);
            return Err(PaymentError::ApiError {
                message: format!("HTTP {}: {}", status, response_text),
            });
        }

        let charge: ChargeResponse = serde_json::from_str(&response_text)
            .map_err(|e| PaymentError::ApiError {
                message: format!("Failed to parse charge response: {}", e),
            })?;

        if charge.status != ChargeStatus::Succeeded {
            return Err(PaymentError::ChargeDeclined);
        }

        info!("Charge succeeded: {}", charge.id);
        Ok(charge.id)
    }
}
