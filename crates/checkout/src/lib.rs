//! Order placement for the pharmacy backend.
//!
//! [`OrderWorkflow::place_order`] validates a cart, takes stock for every
//! line atomically, persists the order and hands a summary to the
//! notification fan-out without waiting for it. If the order cannot be
//! stored, the stock taken for it is returned before the error surfaces.

pub mod error;
pub mod workflow;

pub use error::CheckoutError;
pub use workflow::{CartLine, OrderWorkflow, PlaceOrder, PlacedOrder};
