use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Feature store unavailable: {0}")]
    FeatureStoreUnavailable(String),

    #[error("Inference error: {0}")]
    InferenceError(String),

    #[error("Initialization error: {0}")]
    InitializationError(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// Label used for the `match_errors_total{error_type}` counter.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::InvalidRequest(_) => "invalid_request",
            AppError::FeatureStoreUnavailable(_) => "feature_store_error",
            AppError::InferenceError(_) => "inference_error",
            AppError::InitializationError(_) => "initialization_error",
            AppError::Internal(_) => "internal_error",
        }
    }
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: u16,
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let code = self.status_code();
        HttpResponse::build(code).json(ErrorResponse {
            error: self.to_string(),
            code: code.as_u16(),
        })
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            AppError::FeatureStoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::InitializationError(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::InferenceError(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<redis::RedisError> for AppError {
    fn from(err: redis::RedisError) -> Self {
        AppError::FeatureStoreUnavailable(err.to_string())
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<crate::geo::GeoError> for AppError {
    fn from(err: crate::geo::GeoError) -> Self {
        AppError::InvalidRequest(err.to_string())
    }
}
