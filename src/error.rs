use actix_web::{HttpResponse, ResponseError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AppError {
    #[error("Bad Request error: {0}")]
    BadRequest(String),
    #[error("Not Found error: {0}")]
    NotFound(String),
    #[error("Conflict error: {0}")]
    Conflict(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn job_not_found(job_id: &str) -> Self {
        AppError::NotFound(format!("Job not found: {job_id}"))
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    error_type: String,
    message: String,
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let (error_type, message) = match self {
            AppError::BadRequest(msg) => ("bad_request", msg),
            AppError::NotFound(msg) => ("not_found", msg),
            AppError::Conflict(msg) => ("conflict", msg),
            AppError::Internal(msg) => ("internal_error", msg),
        };

        let error_response = ErrorResponse {
            error: "request_failed".to_string(),
            error_type: error_type.to_string(),
            message: message.clone(),
        };

        match self {
            AppError::BadRequest(_) => HttpResponse::BadRequest().json(error_response),
            AppError::NotFound(_) => HttpResponse::NotFound().json(error_response),
            AppError::Conflict(_) => HttpResponse::Conflict().json(error_response),
            AppError::Internal(_) => HttpResponse::InternalServerError().json(error_response),
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;

/// Failure of a single provider lookup.
///
/// Lives inside job snapshots and aggregate responses, so it is cloneable and
/// serializes as `{"kind": ..., ...}`.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FetchError {
    #[error("network error: {message}")]
    NetworkError { message: String },
    #[error("decode error: {message}")]
    DecodeError { message: String },
    #[error("provider error (status {status}): {message}")]
    ProviderError { status: u16, message: String },
    #[error("retries exhausted after {attempts} attempts: {last}")]
    RetryExhausted { attempts: u32, last: Box<FetchError> },
}

impl FetchError {
    /// The underlying attempt failure, looking through `RetryExhausted`.
    pub fn root_cause(&self) -> &FetchError {
        match self {
            FetchError::RetryExhausted { last, .. } => last.root_cause(),
            other => other,
        }
    }

    /// Short label used for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::NetworkError { .. } => "network_error",
            FetchError::DecodeError { .. } => "decode_error",
            FetchError::ProviderError { .. } => "provider_error",
            FetchError::RetryExhausted { .. } => "retry_exhausted",
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            FetchError::DecodeError { message: e.to_string() }
        } else if let Some(status) = e.status() {
            FetchError::ProviderError {
                status: status.as_u16(),
                message: e.to_string(),
            }
        } else {
            FetchError::NetworkError { message: e.to_string() }
        }
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(e: serde_json::Error) -> Self {
        FetchError::DecodeError { message: e.to_string() }
    }
}
