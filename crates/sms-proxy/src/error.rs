//! Error types for the SMS proxy.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use proxy_store::StoreError;
use serde::Serialize;
use sms_client::SmsError;
use thiserror::Error;

/// Proxy error types.
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("Number already in pool: {0}")]
    DuplicateNumber(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Number {number} is in use by session {session_id}")]
    NumberInUse { number: String, session_id: String },

    #[error("No virtual numbers available")]
    NoAvailableNumbers,

    #[error("{number} is not a participant of the session on {virtual_tn}")]
    UnknownParticipant { number: String, virtual_tn: String },

    #[error("No active session on {0}")]
    NoActiveSession(String),

    #[error("Message delivery failed: {0}")]
    DeliveryFailed(String),

    #[error("Invalid phone number format: {0}")]
    InvalidPhoneNumber(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ProxyError {
    pub fn number_not_found(number: impl Into<String>) -> Self {
        ProxyError::NotFound {
            entity: "Number",
            id: number.into(),
        }
    }

    pub fn session_not_found(id: impl Into<String>) -> Self {
        ProxyError::NotFound {
            entity: "Session",
            id: id.into(),
        }
    }

    /// Status and machine-readable code for this error.
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ProxyError::DuplicateNumber(_) => (StatusCode::CONFLICT, "DUPLICATE_NUMBER"),
            ProxyError::NotFound { .. } => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ProxyError::NumberInUse { .. } => (StatusCode::CONFLICT, "NUMBER_IN_USE"),
            ProxyError::NoAvailableNumbers => (StatusCode::CONFLICT, "NO_AVAILABLE_NUMBERS"),
            ProxyError::UnknownParticipant { .. } => {
                (StatusCode::FORBIDDEN, "UNKNOWN_PARTICIPANT")
            }
            ProxyError::NoActiveSession(_) => (StatusCode::NOT_FOUND, "NO_ACTIVE_SESSION"),
            ProxyError::DeliveryFailed(_) => (StatusCode::BAD_GATEWAY, "DELIVERY_FAILED"),
            ProxyError::InvalidPhoneNumber(_) => (StatusCode::BAD_REQUEST, "INVALID_PHONE_NUMBER"),
            ProxyError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "INVALID_REQUEST"),
            ProxyError::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, "STORAGE_ERROR"),
            ProxyError::RateLimitExceeded => (StatusCode::TOO_MANY_REQUESTS, "RATE_LIMIT_EXCEEDED"),
            ProxyError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let body = ErrorResponse {
            error: self.to_string(),
            code: code.to_string(),
        };

        (status, Json(body)).into_response()
    }
}

impl From<StoreError> for ProxyError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::DuplicateNumber(number) => ProxyError::DuplicateNumber(number),
            StoreError::NumberNotFound(number) => ProxyError::number_not_found(number),
            StoreError::NumberInUse { number, session_id } => {
                ProxyError::NumberInUse { number, session_id }
            }
            StoreError::Sqlite(e) => ProxyError::Storage(e.to_string()),
            StoreError::Backend(msg) => ProxyError::Storage(msg),
        }
    }
}

impl From<SmsError> for ProxyError {
    fn from(e: SmsError) -> Self {
        ProxyError::DeliveryFailed(e.to_string())
    }
}
