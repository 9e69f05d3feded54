//! Domain error types.

use common::{OrderStatus, ProductId};
use store::StoreError;
use thiserror::Error;
use validator::ValidationErrors;

/// Why a credential or token was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AuthError {
    /// No token was presented.
    #[error("No token provided")]
    Missing,

    /// The token is malformed, has a bad signature or has expired.
    #[error("Invalid token")]
    Invalid,

    /// No account exists for the given email.
    #[error("Patient not found")]
    NotFound,

    /// The password does not match.
    #[error("Invalid credentials")]
    InvalidCredentials,
}

impl AuthError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::Missing => "missing",
            AuthError::Invalid => "invalid",
            AuthError::NotFound => "not_found",
            AuthError::InvalidCredentials => "invalid_credentials",
        }
    }
}

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// Bad or missing input, including a taken email.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Authentication failed.
    #[error("Authentication failed: {0}")]
    Auth(#[from] AuthError),

    /// The referenced entity does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// The catalog cannot satisfy the requested quantity.
    #[error(
        "Insufficient stock for product {product_id}: requested {requested}, available {available}"
    )]
    InsufficientStock {
        product_id: ProductId,
        requested: u64,
        available: i64,
    },

    /// The order status cannot move from `from` to `to`.
    #[error("Cannot change order status from {from} to {to}")]
    InvalidStatusTransition { from: OrderStatus, to: OrderStatus },

    /// Hashing or verifying a password failed.
    #[error("Password hashing error: {0}")]
    PasswordHash(String),

    /// Signing a token failed.
    #[error("Token error: {0}")]
    Token(String),

    /// A persistence failure.
    #[error("Store error: {0}")]
    Store(StoreError),
}

impl DomainError {
    pub fn validation(message: impl Into<String>) -> Self {
        DomainError::Validation(message.into())
    }
}

impl From<ValidationErrors> for DomainError {
    /// Joins every field message, sorted so the text is stable.
    fn from(errors: ValidationErrors) -> Self {
        let mut messages: Vec<String> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |e| match &e.message {
                    Some(message) => message.to_string(),
                    None => format!("{field} is invalid"),
                })
            })
            .collect();
        messages.sort();
        messages.dedup();
        DomainError::Validation(messages.join("; "))
    }
}

impl From<StoreError> for DomainError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound { entity, id } => DomainError::NotFound { entity, id },
            StoreError::DuplicateEmail(email) => {
                DomainError::Validation(format!("An account with email {email} already exists"))
            }
            StoreError::InsufficientStock {
                product_id,
                requested,
                available,
            } => DomainError::InsufficientStock {
                product_id,
                requested,
                available,
            },
            other => DomainError::Store(other),
        }
    }
}
