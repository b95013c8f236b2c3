//! Error handling module
//!
//! Centralized error types and HTTP response conversion.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::domain::DomainError;
use crate::engine::TransferError;
use crate::store::StoreError;

/// Application-wide Result type
pub type AppResult<T> = Result<T, AppError>;

/// Application error types
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // Client errors (4xx)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Missing required header: {0}")]
    MissingHeader(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error(transparent)]
    Domain(#[from] DomainError),

    // Store and engine errors, status depends on the variant
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Transfer(#[from] TransferError),
}

impl AppError {
    /// Attach the entity name to a store `NotFound`
    pub fn from_store(err: StoreError, what: impl Into<String>) -> Self {
        match err {
            StoreError::NotFound => AppError::NotFound(what.into()),
            other => AppError::Store(other),
        }
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    pub error_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

fn store_status(err: &StoreError) -> (StatusCode, &'static str) {
    match err {
        StoreError::NotFound => (StatusCode::NOT_FOUND, "not_found"),
        StoreError::ForeignKeyViolation(_) => (StatusCode::FORBIDDEN, "foreign_key_violation"),
        StoreError::UniqueViolation(_) => (StatusCode::FORBIDDEN, "unique_violation"),
        StoreError::Transient(e) => {
            tracing::error!("Transient store error: {}", e);
            (StatusCode::SERVICE_UNAVAILABLE, "store_unavailable")
        }
        StoreError::Unknown(e) => {
            tracing::error!("Store error: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "database_error")
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_code, details) = match &self {
            // 400 Bad Request
            AppError::InvalidRequest(msg) => {
                (StatusCode::BAD_REQUEST, "invalid_request", Some(msg.clone()))
            }
            AppError::MissingHeader(header) => {
                (StatusCode::BAD_REQUEST, "missing_header", Some(header.clone()))
            }

            // 404 Not Found
            AppError::NotFound(what) => (StatusCode::NOT_FOUND, "not_found", Some(what.clone())),

            // Domain errors - map to appropriate HTTP status
            AppError::Domain(domain_err) => match domain_err {
                DomainError::NotAccountOwner(_) => {
                    (StatusCode::UNAUTHORIZED, "not_account_owner", None)
                }
                DomainError::InvalidAmount(_) => (StatusCode::BAD_REQUEST, "invalid_amount", None),
                DomainError::UnsupportedCurrency(_) => {
                    (StatusCode::BAD_REQUEST, "unsupported_currency", None)
                }
                DomainError::CurrencyMismatch { .. } => {
                    (StatusCode::BAD_REQUEST, "currency_mismatch", None)
                }
                DomainError::InvalidAccountId(_) => {
                    (StatusCode::BAD_REQUEST, "invalid_account_id", None)
                }
                DomainError::InvalidPagination(_) => {
                    (StatusCode::BAD_REQUEST, "invalid_pagination", None)
                }
            },

            AppError::Store(e) => {
                let (status, code) = store_status(e);
                (status, code, None)
            }

            AppError::Transfer(e) => match e {
                TransferError::Store(store_err) => {
                    let (status, code) = store_status(store_err);
                    (status, code, None)
                }
                TransferError::Rollback { .. } => {
                    tracing::error!("Transfer rollback failed: {}", e);
                    (StatusCode::INTERNAL_SERVER_ERROR, "rollback_failed", None)
                }
                TransferError::Timeout(_) => {
                    (StatusCode::GATEWAY_TIMEOUT, "transfer_timeout", None)
                }
            },
        };

        // Server-side failures keep their detail in the logs only.
        let error = if status.is_server_error() {
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        let body = ErrorResponse {
            success: false,
            error,
            error_code: error_code.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}
