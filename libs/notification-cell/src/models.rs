use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, Serialize)]
pub struct PushMessage {
    pub to: String,
    pub title: String,
    pub body: String,
}

#[derive(Debug, Error)]
pub enum PushError {
    #[error("Push integration is not configured")]
    NotConfigured,

    #[error("Push API error: {message}")]
    ApiError { message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}
