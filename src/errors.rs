//! Transport-independent error taxonomy (spec.md §7).
//!
//! Every domain error in this crate is one of these kinds; the `IntoResponse`
//! impl is the only place that knows about HTTP status codes, mirroring the
//! boundary the upstream gateway drew around its own `AppError`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::rbac::store::StoreError;
use crate::rbac::validation::ValidationError;
use crate::signing::key_registry::KeyRegistryError;
use crate::signing::kms_client::SigningError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("validation failed: {field}: {reason}")]
    ValidationFailed { field: String, reason: String },

    #[error("{kind} not found: {identity}")]
    NotFound { kind: &'static str, identity: String },

    #[error("{kind} already exists: {identity}")]
    AlreadyExists { kind: &'static str, identity: String },

    #[error("unauthorized")]
    Unauthorized,

    #[error("forbidden")]
    Forbidden,

    #[error("transaction aborted: {cause}")]
    TransactionAborted { cause: String },

    #[error("signing service unavailable")]
    SigningUnavailable,

    #[error("signing forbidden")]
    SigningForbidden,

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<ValidationError> for AppError {
    fn from(e: ValidationError) -> Self {
        AppError::ValidationFailed { field: e.field.to_string(), reason: e.reason }
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::AlreadyExists => AppError::AlreadyExists {
                kind: "item",
                identity: String::new(),
            },
            StoreError::NotFound => AppError::NotFound {
                kind: "item",
                identity: String::new(),
            },
            StoreError::TransactionAborted(cause) => AppError::TransactionAborted { cause },
            StoreError::TransactionTooLarge(count, limit) => AppError::Internal(anyhow::anyhow!(
                "transaction too large: {count} operations exceeds limit of {limit}"
            )),
            StoreError::Backend(e) => AppError::Internal(e),
        }
    }
}

impl From<KeyRegistryError> for AppError {
    fn from(e: KeyRegistryError) -> Self {
        AppError::Internal(anyhow::anyhow!(e.to_string()))
    }
}

impl From<SigningError> for AppError {
    fn from(e: SigningError) -> Self {
        match e {
            SigningError::Unavailable(_) => AppError::SigningUnavailable,
            SigningError::Forbidden(_) => AppError::SigningForbidden,
        }
    }
}

impl AppError {
    pub fn not_found(kind: &'static str, identity: impl Into<String>) -> Self {
        AppError::NotFound { kind, identity: identity.into() }
    }

    pub fn already_exists(kind: &'static str, identity: impl Into<String>) -> Self {
        AppError::AlreadyExists { kind, identity: identity.into() }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type, code, msg) = match &self {
            AppError::ValidationFailed { field, reason } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "validation_error",
                "validation_failed",
                format!("{field}: {reason}"),
            ),
            AppError::NotFound { kind, identity } => (
                StatusCode::NOT_FOUND,
                "not_found",
                "not_found",
                format!("{kind} not found: {identity}"),
            ),
            AppError::AlreadyExists { kind, identity } => (
                StatusCode::CONFLICT,
                "conflict",
                "already_exists",
                format!("{kind} already exists: {identity}"),
            ),
            AppError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "authentication_error",
                "unauthorized",
                "missing or invalid authentication".to_string(),
            ),
            AppError::Forbidden => (
                StatusCode::FORBIDDEN,
                "permission_error",
                "forbidden",
                "insufficient policy role".to_string(),
            ),
            AppError::TransactionAborted { cause } => {
                tracing::warn!(cause = %cause, "transaction aborted");
                if cause.to_lowercase().contains("conditionalcheckfailed") {
                    (
                        StatusCode::CONFLICT,
                        "conflict",
                        "transaction_aborted",
                        "conflicting concurrent write".to_string(),
                    )
                } else {
                    (
                        StatusCode::SERVICE_UNAVAILABLE,
                        "store_error",
                        "transaction_aborted",
                        "store transaction aborted, retry".to_string(),
                    )
                }
            }
            AppError::SigningUnavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                "signing_error",
                "signing_unavailable",
                "signing service temporarily unavailable".to_string(),
            ),
            AppError::SigningForbidden => {
                tracing::error!("signing service denied the signing request");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "internal_server_error",
                    "internal server error".to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("internal error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "internal_server_error",
                    "internal server error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "message": msg,
                "type": error_type,
                "code": code,
            }
        }));

        let mut response = (status, body).into_response();
        if let AppError::SigningUnavailable = self {
            response
                .headers_mut()
                .insert("retry-after", axum::http::HeaderValue::from_static("5"));
        }
        response
    }
}
