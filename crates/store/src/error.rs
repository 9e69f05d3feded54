use common::{OrderId, OrderStatus, ProductId};
use thiserror::Error;

/// Errors that can occur when interacting with the store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The referenced record does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// An account with this email (compared case-insensitively) already exists.
    #[error("An account with email {0} already exists")]
    DuplicateEmail(String),

    /// A conditional stock decrement failed. Nothing was applied.
    #[error(
        "Insufficient stock for product {product_id}: requested {requested}, available {available}"
    )]
    InsufficientStock {
        product_id: ProductId,
        requested: u64,
        available: i64,
    },

    /// The order's status changed between read and write.
    #[error("Status conflict for order {order_id}: expected {expected}, found {actual}")]
    StatusConflict {
        order_id: OrderId,
        expected: OrderStatus,
        actual: OrderStatus,
    },

    /// A stored row could not be mapped back into a record.
    #[error("Corrupt record: {0}")]
    Corrupt(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    pub fn account_not_found(id: impl ToString) -> Self {
        StoreError::NotFound {
            entity: "Account",
            id: id.to_string(),
        }
    }

    pub fn product_not_found(id: ProductId) -> Self {
        StoreError::NotFound {
            entity: "Product",
            id: id.to_string(),
        }
    }

    pub fn order_not_found(id: OrderId) -> Self {
        StoreError::NotFound {
            entity: "Order",
            id: id.to_string(),
        }
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
