use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Amounts are integer cents; the processor rejects fractional values.
#[derive(Debug, Clone, Serialize)]
pub struct ChargeRequest {
    pub payer_account_id: String,
    pub payee_account_id: String,
    pub amount: i64,
    pub application_fee: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChargeResponse {
    pub id: String,
    pub status: ChargeStatus,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChargeStatus {
    Succeeded,
    Failed,
}

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("Payment integration is not configured")]
    NotConfigured,

    #[error("Charge was declined")]
    ChargeDeclined,

    #[error("Payment API error: {message}")]
    ApiError { message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}
