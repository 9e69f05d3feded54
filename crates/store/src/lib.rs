//! Persistence for accounts, the drug catalog and orders.
//!
//! Services depend on the [`AccountStore`], [`CatalogStore`] and
//! [`OrderStore`] traits; [`InMemoryStore`] backs tests and local runs,
//! [`PostgresStore`] backs production.

pub mod error;
pub mod memory;
pub mod model;
pub mod postgres;
pub mod query;
pub mod store;

pub use error::{Result, StoreError};
pub use memory::InMemoryStore;
pub use model::{Account, LineItem, Order, Product, ProductPatch, StockLine};
pub use postgres::PostgresStore;
pub use query::OrderQuery;
pub use store::{AccountStore, CatalogStore, CatalogStoreExt, OrderStore, Store};
