//! API error type and wire mapping.
//!
//! Every failure surfaces to the client as a stable machine-readable code;
//! raw storage errors are logged server-side and never leak into the
//! response body.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::storage::repository::StoreError;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("authentication failed")]
    AuthFailed,

    #[error("not found: {0}")]
    NotFound(String),
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            ApiError::Store(store) => match store {
                StoreError::Sqlx(e) => {
                    tracing::error!("storage failure: {}", e);
                    (
                        StatusCode::SERVICE_UNAVAILABLE,
                        "STORAGE_ERROR",
                        "storage temporarily unavailable".to_string(),
                    )
                }
                StoreError::NotFound(msg) => {
                    (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone())
                }
                StoreError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
                StoreError::InsufficientFunds { have, need } => (
                    StatusCode::BAD_REQUEST,
                    "INSUFFICIENT_FUNDS",
                    format!("insufficient funds: have {}, need {}", have, need),
                ),
                StoreError::LevelOutOfRange { requested, max } => (
                    StatusCode::BAD_REQUEST,
                    "LEVEL_OUT_OF_RANGE",
                    format!("upgrade level {} exceeds maximum {}", requested, max),
                ),
                StoreError::DowngradeRejected { current, requested } => (
                    StatusCode::CONFLICT,
                    "DOWNGRADE_REJECTED",
                    format!("level {} is below current level {}", requested, current),
                ),
                StoreError::AlreadyOwned(name) => (
                    StatusCode::CONFLICT,
                    "ALREADY_OWNED",
                    format!("weapon {} is already owned", name),
                ),
                StoreError::NotOwned(name) => (
                    StatusCode::BAD_REQUEST,
                    "NOT_OWNED",
                    format!("weapon {} is not owned", name),
                ),
                StoreError::InvalidAmount(msg) => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
                }
            },
            ApiError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
            }
            ApiError::AuthFailed => (
                StatusCode::UNAUTHORIZED,
                "AUTH_FAILED",
                "invalid email or password".to_string(),
            ),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
        };

        let body = Json(ErrorResponse {
            success: false,
            error: ErrorDetail {
                code: code.to_string(),
                message,
            },
        });

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ApiError>;
