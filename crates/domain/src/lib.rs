//! Domain services for the pharmacy backend.
//!
//! - [`AccountService`]: registration and password handling
//! - [`SessionIssuer`]: login and bearer-token verification
//! - [`CatalogService`]: drug catalog CRUD and stock decrements
//! - [`OrderService`]: order listing and the status state machine
//!
//! Order placement lives in the `checkout` crate.

pub mod account;
pub mod catalog;
pub mod error;
pub mod order;
pub mod session;

pub use account::{AccountService, NewAccount, verify_password};
pub use catalog::{CatalogService, NewProduct};
pub use error::{AuthError, DomainError};
pub use order::{OrderService, parse_status};
pub use session::{Claims, DEFAULT_TOKEN_TTL, SessionIssuer};
