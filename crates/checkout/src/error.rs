//! Checkout error types.

use common::AccountId;
use domain::DomainError;
use store::StoreError;
use thiserror::Error;

/// Errors that can occur while placing an order.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// The cart or delivery details are unusable.
    #[error("Invalid order: {0}")]
    InvalidOrder(String),

    /// The ordering account does not exist.
    #[error("Account not found: {0}")]
    AccountNotFound(AccountId),

    /// Domain error, including stock shortages and missing products.
    #[error(transparent)]
    Domain(#[from] DomainError),
}

impl From<StoreError> for CheckoutError {
    fn from(e: StoreError) -> Self {
        CheckoutError::Domain(e.into())
    }
}

impl CheckoutError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        CheckoutError::InvalidOrder(message.into())
    }

    /// Short label used for the `orders_rejected_total` metric.
    pub fn reason(&self) -> &'static str {
        match self {
            CheckoutError::InvalidOrder(_) => "invalid_order",
            CheckoutError::AccountNotFound(_) => "account_not_found",
            CheckoutError::Domain(DomainError::InsufficientStock { .. }) => "insufficient_stock",
            CheckoutError::Domain(DomainError::NotFound { .. }) => "product_not_found",
            CheckoutError::Domain(_) => "internal",
        }
    }
}

/// Convenience type alias for checkout results.
pub type Result<T> = std::result::Result<T, CheckoutError>;
