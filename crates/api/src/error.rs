//! API error types with HTTP response mapping.

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use checkout::CheckoutError;
use domain::{AuthError, DomainError};

/// API-level error type that maps to HTTP responses.
///
/// Bodies have the shape `{"error": {"type": ..., "message": ...}}`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The request body, path or query string could not be read.
    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Checkout(#[from] CheckoutError),
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let code = self.auth_code();
        let (status, kind, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "validation_error", msg),
            ApiError::Auth(err) => auth_error_to_response(err),
            ApiError::Domain(err) => domain_error_to_response(err),
            ApiError::Checkout(err) => checkout_error_to_response(err),
        };

        let mut error = serde_json::json!({ "type": kind, "message": message });
        if let Some(code) = code {
            error["code"] = serde_json::Value::from(code);
        }

        (status, axum::Json(serde_json::json!({ "error": error }))).into_response()
    }
}

impl ApiError {
    fn auth_code(&self) -> Option<&'static str> {
        match self {
            ApiError::Auth(err)
            | ApiError::Domain(DomainError::Auth(err))
            | ApiError::Checkout(CheckoutError::Domain(DomainError::Auth(err))) => Some(err.code()),
            _ => None,
        }
    }
}

fn auth_error_to_response(err: AuthError) -> (StatusCode, &'static str, String) {
    (StatusCode::UNAUTHORIZED, "auth_error", err.to_string())
}

fn domain_error_to_response(err: DomainError) -> (StatusCode, &'static str, String) {
    match err {
        DomainError::Validation(msg) => (StatusCode::BAD_REQUEST, "validation_error", msg),
        DomainError::Auth(auth) => auth_error_to_response(auth),
        DomainError::NotFound { .. } => (StatusCode::NOT_FOUND, "not_found", err.to_string()),
        DomainError::InsufficientStock { .. } => {
            (StatusCode::CONFLICT, "insufficient_stock", err.to_string())
        }
        DomainError::InvalidStatusTransition { .. } => (
            StatusCode::CONFLICT,
            "invalid_status_transition",
            err.to_string(),
        ),
        DomainError::PasswordHash(_) | DomainError::Token(_) | DomainError::Store(_) => {
            tracing::error!(error = %err, "internal server error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "Internal server error".to_string(),
            )
        }
    }
}

fn checkout_error_to_response(err: CheckoutError) -> (StatusCode, &'static str, String) {
    match err {
        CheckoutError::InvalidOrder(_) => {
            (StatusCode::BAD_REQUEST, "validation_error", err.to_string())
        }
        CheckoutError::AccountNotFound(_) => (StatusCode::NOT_FOUND, "not_found", err.to_string()),
        CheckoutError::Domain(inner) => domain_error_to_response(inner),
    }
}
