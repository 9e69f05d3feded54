use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use common::{AccountId, OrderId, OrderStatus, ProductId};
use tokio::sync::RwLock;

use crate::{
    Account, Order, OrderQuery, Product, ProductPatch, Result, StockLine, StoreError,
    model::merge_stock_lines,
    store::{AccountStore, CatalogStore, OrderStore},
};

/// In-memory store for tests and local development.
///
/// Each collection sits behind its own lock; every conditional write runs
/// its check and its mutation under one write guard.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    accounts: Arc<RwLock<HashMap<AccountId, Account>>>,
    products: Arc<RwLock<Vec<Product>>>,
    orders: Arc<RwLock<Vec<Order>>>,
}

impl InMemoryStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored orders.
    pub async fn order_count(&self) -> usize {
        self.orders.read().await.len()
    }
}

fn check_status(order: &Order, expected: OrderStatus) -> Result<()> {
    if order.status != expected {
        return Err(StoreError::StatusConflict {
            order_id: order.id,
            expected,
            actual: order.status,
        });
    }
    Ok(())
}

fn restock_locked(products: &mut [Product], lines: &[StockLine]) {
    let now = Utc::now();
    for (product_id, quantity) in merge_stock_lines(lines) {
        match products.iter_mut().find(|p| p.id == product_id) {
            Some(product) => {
                product.stock = product.stock.saturating_add(quantity as i64);
                product.updated_at = now;
            }
            None => {
                tracing::warn!(%product_id, quantity, "restock skipped, product no longer exists");
            }
        }
    }
}

#[async_trait]
impl AccountStore for InMemoryStore {
    async fn insert_account(&self, account: Account) -> Result<Account> {
        let mut accounts = self.accounts.write().await;

        let taken = accounts
            .values()
            .any(|a| a.email.eq_ignore_ascii_case(&account.email));
        if taken {
            return Err(StoreError::DuplicateEmail(account.email));
        }

        accounts.insert(account.id, account.clone());
        Ok(account)
    }

    async fn find_account_by_email(&self, email: &str) -> Result<Option<Account>> {
        let accounts = self.accounts.read().await;
        Ok(accounts
            .values()
            .find(|a| a.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn get_account(&self, id: AccountId) -> Result<Option<Account>> {
        Ok(self.accounts.read().await.get(&id).cloned())
    }

    async fn update_password(&self, id: AccountId, password_hash: String) -> Result<()> {
        let mut accounts = self.accounts.write().await;
        let account = accounts
            .get_mut(&id)
            .ok_or_else(|| StoreError::account_not_found(id))?;
        account.password_hash = password_hash;
        Ok(())
    }
}

#[async_trait]
impl CatalogStore for InMemoryStore {
    async fn insert_product(&self, product: Product) -> Result<Product> {
        self.products.write().await.push(product.clone());
        Ok(product)
    }

    async fn list_products(&self) -> Result<Vec<Product>> {
        Ok(self.products.read().await.clone())
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>> {
        let products = self.products.read().await;
        Ok(products.iter().find(|p| p.id == id).cloned())
    }

    async fn update_product(&self, id: ProductId, patch: ProductPatch) -> Result<Product> {
        let mut products = self.products.write().await;
        let product = products
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| StoreError::product_not_found(id))?;

        patch.apply_to(product, Utc::now());
        Ok(product.clone())
    }

    async fn delete_product(&self, id: ProductId) -> Result<()> {
        let mut products = self.products.write().await;
        let before = products.len();
        products.retain(|p| p.id != id);
        if products.len() == before {
            return Err(StoreError::product_not_found(id));
        }
        Ok(())
    }

    async fn decrement_stock_batch(&self, lines: &[StockLine]) -> Result<Vec<Product>> {
        let merged = merge_stock_lines(lines);
        let mut products = self.products.write().await;

        // Check every line before touching any of them
        let mut positions = Vec::with_capacity(merged.len());
        for (product_id, requested) in &merged {
            let position = products
                .iter()
                .position(|p| p.id == *product_id)
                .ok_or_else(|| StoreError::product_not_found(*product_id))?;

            let available = products[position].stock;
            if i128::from(available) < i128::from(*requested) {
                return Err(StoreError::InsufficientStock {
                    product_id: *product_id,
                    requested: *requested,
                    available,
                });
            }
            positions.push(position);
        }

        let now = Utc::now();
        let mut updated = Vec::with_capacity(merged.len());
        for ((_, requested), position) in merged.iter().zip(positions) {
            let product = &mut products[position];
            // Fits: checked against a non-negative stock above
            product.stock -= *requested as i64;
            product.updated_at = now;
            updated.push(product.clone());
        }

        Ok(updated)
    }

    async fn restock(&self, lines: &[StockLine]) -> Result<()> {
        let mut products = self.products.write().await;
        restock_locked(&mut products, lines);
        Ok(())
    }
}

#[async_trait]
impl OrderStore for InMemoryStore {
    async fn insert_order(&self, order: Order) -> Result<Order> {
        self.orders.write().await.push(order.clone());
        Ok(order)
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>> {
        let orders = self.orders.read().await;
        Ok(orders.iter().find(|o| o.id == id).cloned())
    }

    async fn list_orders(&self, query: OrderQuery) -> Result<Vec<Order>> {
        let orders = self.orders.read().await;

        // Reverse insertion order first so equal timestamps still come out newest first
        let mut matching: Vec<Order> = orders
            .iter()
            .rev()
            .filter(|o| {
                if let Some(account_id) = query.account_id
                    && o.account_id != account_id
                {
                    return false;
                }
                if let Some(status) = query.status
                    && o.status != status
                {
                    return false;
                }
                true
            })
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let offset = query.offset.unwrap_or(0);
        let limit = query.limit.unwrap_or(usize::MAX);
        Ok(matching.into_iter().skip(offset).take(limit).collect())
    }

    async fn update_order_status(
        &self,
        id: OrderId,
        expected: OrderStatus,
        next: OrderStatus,
    ) -> Result<Order> {
        let mut orders = self.orders.write().await;
        let order = orders
            .iter_mut()
            .find(|o| o.id == id)
            .ok_or_else(|| StoreError::order_not_found(id))?;

        check_status(order, expected)?;

        order.status = next;
        order.updated_at = Utc::now();
        Ok(order.clone())
    }

    async fn cancel_order(&self, id: OrderId, expected: OrderStatus) -> Result<Order> {
        // Orders before products, the only place both are held
        let mut orders = self.orders.write().await;
        let mut products = self.products.write().await;

        let order = orders
            .iter_mut()
            .find(|o| o.id == id)
            .ok_or_else(|| StoreError::order_not_found(id))?;
        check_status(order, expected)?;

        restock_locked(&mut products, &order.stock_lines());
        order.status = OrderStatus::Cancelled;
        order.updated_at = Utc::now();
        Ok(order.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::CatalogStoreExt;
    use crate::LineItem;
    use common::Money;

    fn account(email: &str) -> Account {
        Account {
            id: AccountId::new(),
            name: "Test Patient".to_string(),
            email: email.to_string(),
            phone: "+255700000001".to_string(),
            password_hash: "hash".to_string(),
            created_at: Utc::now(),
        }
    }

    fn product(name: &str, stock: i64) -> Product {
        let now = Utc::now();
        Product {
            id: ProductId::new(),
            name: name.to_string(),
            description: String::new(),
            price: Money::from_cents(500),
            stock,
            image_url: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn order(account_id: AccountId) -> Order {
        let now = Utc::now();
        Order {
            id: OrderId::new(),
            account_id,
            line_items: vec![LineItem {
                product_id: ProductId::new(),
                product_name: "Amoxicillin".to_string(),
                quantity: 1,
                unit_price: Money::from_cents(1200),
            }],
            total_amount: Money::from_cents(1200),
            delivery_address: "12 Uhuru Street".to_string(),
            status: OrderStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected_case_insensitively() {
        let store = InMemoryStore::new();
        store
            .insert_account(account("amina@example.com"))
            .await
            .unwrap();

        let result = store.insert_account(account("Amina@Example.COM")).await;
        assert!(matches!(result, Err(StoreError::DuplicateEmail(_))));

        let found = store
            .find_account_by_email("AMINA@example.com")
            .await
            .unwrap();
        assert!(found.is_some());
    }

    #[tokio::test]
    async fn concurrent_registrations_with_same_email_admit_one() {
        let store = InMemoryStore::new();

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.insert_account(account("same@example.com")).await })
            })
            .collect();

        let mut successes = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                successes += 1;
            }
        }
        assert_eq!(successes, 1);
    }

    #[tokio::test]
    async fn update_password_requires_existing_account() {
        let store = InMemoryStore::new();
        let result = store.update_password(AccountId::new(), "x".into()).await;
        assert!(matches!(result, Err(StoreError::NotFound { .. })));
    }

    #[tokio::test]
    async fn decrement_stock_reduces_and_rejects_oversell() {
        let store = InMemoryStore::new();
        let p = store.insert_product(product("Ibuprofen", 5)).await.unwrap();

        let updated = store.decrement_stock(p.id, 2).await.unwrap();
        assert_eq!(updated.stock, 3);

        let result = store.decrement_stock(p.id, 4).await;
        assert!(matches!(
            result,
            Err(StoreError::InsufficientStock {
                requested: 4,
                available: 3,
                ..
            })
        ));
        assert_eq!(store.get_product(p.id).await.unwrap().unwrap().stock, 3);
    }

    #[tokio::test]
    async fn decrement_unknown_product_is_not_found() {
        let store = InMemoryStore::new();
        let result = store.decrement_stock(ProductId::new(), 1).await;
        assert!(matches!(result, Err(StoreError::NotFound { .. })));
    }

    #[tokio::test]
    async fn batch_decrement_is_all_or_nothing() {
        let store = InMemoryStore::new();
        let a = store.insert_product(product("A", 10)).await.unwrap();
        let b = store.insert_product(product("B", 1)).await.unwrap();

        let result = store
            .decrement_stock_batch(&[StockLine::new(a.id, 3), StockLine::new(b.id, 2)])
            .await;
        assert!(matches!(result, Err(StoreError::InsufficientStock { .. })));

        assert_eq!(store.get_product(a.id).await.unwrap().unwrap().stock, 10);
        assert_eq!(store.get_product(b.id).await.unwrap().unwrap().stock, 1);
    }

    #[tokio::test]
    async fn batch_decrement_sums_repeated_lines() {
        let store = InMemoryStore::new();
        let a = store.insert_product(product("A", 4)).await.unwrap();

        let result = store
            .decrement_stock_batch(&[StockLine::new(a.id, 3), StockLine::new(a.id, 3)])
            .await;
        assert!(matches!(
            result,
            Err(StoreError::InsufficientStock { requested: 6, .. })
        ));

        let updated = store
            .decrement_stock_batch(&[StockLine::new(a.id, 2), StockLine::new(a.id, 2)])
            .await
            .unwrap();
        assert_eq!(updated.len(), 1);
        assert_eq!(updated[0].stock, 0);
    }

    #[tokio::test]
    async fn concurrent_decrements_never_go_negative() {
        let store = InMemoryStore::new();
        let p = store.insert_product(product("Insulin", 50)).await.unwrap();

        let handles: Vec<_> = (0..80)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.decrement_stock(p.id, 1).await })
            })
            .collect();

        let mut successes = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                successes += 1;
            }
        }

        assert_eq!(successes, 50);
        assert_eq!(store.get_product(p.id).await.unwrap().unwrap().stock, 0);
    }

    #[tokio::test]
    async fn restock_skips_deleted_products() {
        let store = InMemoryStore::new();
        let a = store.insert_product(product("A", 1)).await.unwrap();
        let gone = ProductId::new();

        store
            .restock(&[StockLine::new(a.id, 4), StockLine::new(gone, 2)])
            .await
            .unwrap();

        assert_eq!(store.get_product(a.id).await.unwrap().unwrap().stock, 5);
    }

    #[tokio::test]
    async fn update_and_delete_missing_product() {
        let store = InMemoryStore::new();
        let id = ProductId::new();

        let result = store.update_product(id, ProductPatch::default()).await;
        assert!(matches!(result, Err(StoreError::NotFound { .. })));
        let result = store.delete_product(id).await;
        assert!(matches!(result, Err(StoreError::NotFound { .. })));
    }

    #[tokio::test]
    async fn list_orders_newest_first_with_filters() {
        let store = InMemoryStore::new();
        let alice = AccountId::new();
        let bob = AccountId::new();

        let first = store.insert_order(order(alice)).await.unwrap();
        store.insert_order(order(bob)).await.unwrap();
        let third = store.insert_order(order(alice)).await.unwrap();

        let all = store.list_orders(OrderQuery::new()).await.unwrap();
        assert_eq!(all.len(), 3);

        let own = store
            .list_orders(OrderQuery::for_account(alice))
            .await
            .unwrap();
        assert_eq!(own.len(), 2);
        assert_eq!(own[0].id, third.id);
        assert_eq!(own[1].id, first.id);

        let page = store
            .list_orders(OrderQuery::new().offset(1).limit(1))
            .await
            .unwrap();
        assert_eq!(page.len(), 1);
    }

    #[tokio::test]
    async fn status_update_is_compare_and_set() {
        let store = InMemoryStore::new();
        let o = store.insert_order(order(AccountId::new())).await.unwrap();

        let updated = store
            .update_order_status(o.id, OrderStatus::Pending, OrderStatus::Processing)
            .await
            .unwrap();
        assert_eq!(updated.status, OrderStatus::Processing);

        let stale = store
            .update_order_status(o.id, OrderStatus::Pending, OrderStatus::Cancelled)
            .await;
        assert!(matches!(
            stale,
            Err(StoreError::StatusConflict {
                actual: OrderStatus::Processing,
                ..
            })
        ));

        let missing = store
            .update_order_status(OrderId::new(), OrderStatus::Pending, OrderStatus::Processing)
            .await;
        assert!(matches!(missing, Err(StoreError::NotFound { .. })));
    }

    #[tokio::test]
    async fn cancel_restocks_together_with_the_status_change() {
        let store = InMemoryStore::new();
        let p = store.insert_product(product("Amoxicillin", 7)).await.unwrap();
        let mut placed = order(AccountId::new());
        placed.line_items[0].product_id = p.id;
        placed.line_items[0].quantity = 3;
        let o = store.insert_order(placed).await.unwrap();

        let cancelled = store
            .cancel_order(o.id, OrderStatus::Pending)
            .await
            .unwrap();
        assert_eq!(cancelled.status, OrderStatus::Cancelled);
        assert_eq!(store.get_product(p.id).await.unwrap().unwrap().stock, 10);

        // A second cancel sees the stale status and restocks nothing
        let again = store.cancel_order(o.id, OrderStatus::Pending).await;
        assert!(matches!(
            again,
            Err(StoreError::StatusConflict {
                actual: OrderStatus::Cancelled,
                ..
            })
        ));
        assert_eq!(store.get_product(p.id).await.unwrap().unwrap().stock, 10);
    }

    #[tokio::test]
    async fn concurrent_cancels_restock_once() {
        let store = InMemoryStore::new();
        let p = store.insert_product(product("Amoxicillin", 0)).await.unwrap();
        let mut placed = order(AccountId::new());
        placed.line_items[0].product_id = p.id;
        placed.line_items[0].quantity = 2;
        let o = store.insert_order(placed).await.unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.cancel_order(o.id, OrderStatus::Pending).await })
            })
            .collect();

        let mut successes = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                successes += 1;
            }
        }

        assert_eq!(successes, 1);
        assert_eq!(store.get_product(p.id).await.unwrap().unwrap().stock, 2);
    }

    #[tokio::test]
    async fn cancel_missing_order_is_not_found() {
        let store = InMemoryStore::new();
        let result = store.cancel_order(OrderId::new(), OrderStatus::Pending).await;
        assert!(matches!(result, Err(StoreError::NotFound { .. })));
    }
}
