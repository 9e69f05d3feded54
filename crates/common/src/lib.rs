//! Shared identifiers and value types used across the pharmacy crates.

pub mod money;
pub mod status;
pub mod types;

pub use money::Money;
pub use status::{OrderStatus, UnknownStatus};
pub use types::{AccountId, OrderId, ProductId};
