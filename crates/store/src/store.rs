use async_trait::async_trait;
use common::{AccountId, OrderId, OrderStatus, ProductId};

use crate::{Account, Order, OrderQuery, Product, ProductPatch, Result, StockLine};

/// Persistence of patient accounts.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Inserts a new account.
    ///
    /// Fails with `DuplicateEmail` if any account already uses the same email,
    /// compared case-insensitively. The check and the insert are atomic.
    async fn insert_account(&self, account: Account) -> Result<Account>;

    /// Finds an account by email, case-insensitively.
    async fn find_account_by_email(&self, email: &str) -> Result<Option<Account>>;

    /// Gets an account by id.
    async fn get_account(&self, id: AccountId) -> Result<Option<Account>>;

    /// Replaces the stored password hash.
    async fn update_password(&self, id: AccountId, password_hash: String) -> Result<()>;
}

/// Persistence of the drug catalog.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Inserts a new product.
    async fn insert_product(&self, product: Product) -> Result<Product>;

    /// Lists all products in creation order.
    async fn list_products(&self) -> Result<Vec<Product>>;

    /// Gets a product by id.
    async fn get_product(&self, id: ProductId) -> Result<Option<Product>>;

    /// Applies a partial update. Fails with `NotFound` if the product is absent.
    async fn update_product(&self, id: ProductId, patch: ProductPatch) -> Result<Product>;

    /// Deletes a product. Fails with `NotFound` if the product is absent.
    async fn delete_product(&self, id: ProductId) -> Result<()>;

    /// Takes stock for every line, or for none of them.
    ///
    /// Lines naming the same product are summed first. Fails with `NotFound`
    /// if any product is absent and `InsufficientStock` if any product has
    /// fewer units than requested; in both cases no stock is changed.
    /// Returns the updated products, sorted by id.
    async fn decrement_stock_batch(&self, lines: &[StockLine]) -> Result<Vec<Product>>;

    /// Returns stock taken by an earlier decrement.
    ///
    /// Products deleted in the meantime are skipped.
    async fn restock(&self, lines: &[StockLine]) -> Result<()>;
}

/// Persistence of placed orders.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Inserts a new order.
    async fn insert_order(&self, order: Order) -> Result<Order>;

    /// Gets an order by id.
    async fn get_order(&self, id: OrderId) -> Result<Option<Order>>;

    /// Lists orders matching the query, newest first.
    async fn list_orders(&self, query: OrderQuery) -> Result<Vec<Order>>;

    /// Sets the status to `next` if it is currently `expected`.
    ///
    /// Fails with `NotFound` if the order is absent and `StatusConflict` if
    /// another writer changed the status first.
    async fn update_order_status(
        &self,
        id: OrderId,
        expected: OrderStatus,
        next: OrderStatus,
    ) -> Result<Order>;

    /// Cancels the order if its status is currently `expected` and returns
    /// its units to the catalog, both in one atomic step.
    ///
    /// Fails like [`update_order_status`](Self::update_order_status); on
    /// failure neither the order nor the catalog changes. Products deleted
    /// since the order was placed are skipped.
    async fn cancel_order(&self, id: OrderId, expected: OrderStatus) -> Result<Order>;
}

/// Extension trait providing convenience methods for catalog stores.
#[async_trait]
pub trait CatalogStoreExt: CatalogStore {
    /// Conditionally decrements a single product's stock.
    async fn decrement_stock(&self, id: ProductId, quantity: u32) -> Result<Product> {
        let mut updated = self
            .decrement_stock_batch(&[StockLine::new(id, quantity)])
            .await?;
        updated
            .pop()
            .ok_or_else(|| crate::StoreError::product_not_found(id))
    }
}

impl<T: CatalogStore + ?Sized> CatalogStoreExt for T {}

/// Everything the application needs from persistence, in one bound.
pub trait Store: AccountStore + CatalogStore + OrderStore + Clone + 'static {}

impl<T> Store for T where T: AccountStore + CatalogStore + OrderStore + Clone + 'static {}
