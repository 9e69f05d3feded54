//! Order listing and status management.

use common::{AccountId, OrderId, OrderStatus};
use store::{Order, OrderQuery, OrderStore, StoreError};

use crate::error::DomainError;

/// Parses a status name supplied by a client.
pub fn parse_status(raw: &str) -> Result<OrderStatus, DomainError> {
    raw.parse()
        .map_err(|e: common::UnknownStatus| DomainError::validation(e.to_string()))
}

/// Service for placed orders.
#[derive(Clone)]
pub struct OrderService<S> {
    store: S,
}

impl<S: OrderStore> OrderService<S> {
    /// Creates a new order service backed by `store`.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Lists every order, or only `account_id`'s, newest first.
    pub async fn list_orders(
        &self,
        account_id: Option<AccountId>,
    ) -> Result<Vec<Order>, DomainError> {
        let query = match account_id {
            Some(id) => OrderQuery::for_account(id),
            None => OrderQuery::new(),
        };
        self.query(query).await
    }

    /// Lists orders matching `query`.
    pub async fn query(&self, query: OrderQuery) -> Result<Vec<Order>, DomainError> {
        Ok(self.store.list_orders(query).await?)
    }

    /// Gets an order, failing with `NotFound` if it is absent.
    pub async fn get_order(&self, id: OrderId) -> Result<Order, DomainError> {
        self.store
            .get_order(id)
            .await?
            .ok_or_else(|| DomainError::NotFound {
                entity: "Order",
                id: id.to_string(),
            })
    }

    /// Moves an order to `next` along the status state machine.
    ///
    /// Cancelling returns the order's units to the catalog in the same store
    /// operation, so a failure leaves both the order and the stock untouched.
    #[tracing::instrument(skip(self))]
    pub async fn update_order_status(
        &self,
        id: OrderId,
        next: OrderStatus,
    ) -> Result<Order, DomainError> {
        let current = self.get_order(id).await?;

        if !current.status.can_transition_to(next) {
            return Err(DomainError::InvalidStatusTransition {
                from: current.status,
                to: next,
            });
        }

        let result = if next == OrderStatus::Cancelled {
            self.store.cancel_order(id, current.status).await
        } else {
            self.store.update_order_status(id, current.status, next).await
        };
        let updated = result.map_err(|e| match e {
            StoreError::StatusConflict { actual, .. } => DomainError::InvalidStatusTransition {
                from: actual,
                to: next,
            },
            other => other.into(),
        })?;

        if next == OrderStatus::Cancelled {
            tracing::info!(order_id = %id, "order cancelled, stock returned");
        }

        metrics::counter!("order_status_updates_total", "status" => next.as_str()).increment(1);
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use common::{Money, ProductId};
    use store::{CatalogStore, InMemoryStore, LineItem, Product, StockLine};

    /// Delegates to an in-memory store, but every restock fails and takes
    /// the surrounding cancellation down with it.
    #[derive(Clone)]
    struct BrokenRestock {
        inner: InMemoryStore,
    }

    #[async_trait::async_trait]
    impl OrderStore for BrokenRestock {
        async fn insert_order(&self, order: Order) -> store::Result<Order> {
            self.inner.insert_order(order).await
        }

        async fn get_order(&self, id: OrderId) -> store::Result<Option<Order>> {
            self.inner.get_order(id).await
        }

        async fn list_orders(&self, query: OrderQuery) -> store::Result<Vec<Order>> {
            self.inner.list_orders(query).await
        }

        async fn update_order_status(
            &self,
            id: OrderId,
            expected: OrderStatus,
            next: OrderStatus,
        ) -> store::Result<Order> {
            self.inner.update_order_status(id, expected, next).await
        }

        async fn cancel_order(&self, _: OrderId, _: OrderStatus) -> store::Result<Order> {
            Err(StoreError::Corrupt("restock failed".into()))
        }
    }

    async fn seeded() -> (InMemoryStore, Product, Order) {
        let store = InMemoryStore::new();
        let now = Utc::now();
        let product = store
            .insert_product(Product {
                id: ProductId::new(),
                name: "Metformin".into(),
                description: String::new(),
                price: Money::from_cents(1500),
                stock: 10,
                image_url: None,
                created_at: now,
                updated_at: now,
            })
            .await
            .unwrap();

        store
            .decrement_stock_batch(&[StockLine::new(product.id, 4)])
            .await
            .unwrap();

        let order = store
            .insert_order(Order {
                id: OrderId::new(),
                account_id: AccountId::new(),
                line_items: vec![LineItem {
                    product_id: product.id,
                    product_name: product.name.clone(),
                    quantity: 4,
                    unit_price: product.price,
                }],
                total_amount: Money::from_cents(6000),
                delivery_address: "1 Main St".into(),
                status: OrderStatus::Pending,
                created_at: now,
                updated_at: now,
            })
            .await
            .unwrap();

        (store, product, order)
    }

    #[test]
    fn parse_status_accepts_known_names() {
        assert_eq!(parse_status("shipped").unwrap(), OrderStatus::Shipped);
        assert!(matches!(
            parse_status("lost"),
            Err(DomainError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn follows_the_state_machine() {
        let (store, _, order) = seeded().await;
        let orders = OrderService::new(store);

        for next in [
            OrderStatus::Processing,
            OrderStatus::Shipped,
            OrderStatus::Delivered,
        ] {
            let updated = orders.update_order_status(order.id, next).await.unwrap();
            assert_eq!(updated.status, next);
        }

        let result = orders
            .update_order_status(order.id, OrderStatus::Cancelled)
            .await;
        assert!(matches!(
            result,
            Err(DomainError::InvalidStatusTransition {
                from: OrderStatus::Delivered,
                to: OrderStatus::Cancelled,
            })
        ));
    }

    #[tokio::test]
    async fn rejects_skipping_ahead() {
        let (store, _, order) = seeded().await;
        let orders = OrderService::new(store);

        let result = orders
            .update_order_status(order.id, OrderStatus::Delivered)
            .await;
        assert!(matches!(
            result,
            Err(DomainError::InvalidStatusTransition { .. })
        ));
    }

    #[tokio::test]
    async fn cancelling_restocks() {
        let (store, product, order) = seeded().await;
        let orders = OrderService::new(store.clone());

        orders
            .update_order_status(order.id, OrderStatus::Cancelled)
            .await
            .unwrap();

        let after = store.get_product(product.id).await.unwrap().unwrap();
        assert_eq!(after.stock, 10);
    }

    #[tokio::test]
    async fn failed_restock_leaves_order_pending() {
        let (store, product, order) = seeded().await;
        let broken = OrderService::new(BrokenRestock {
            inner: store.clone(),
        });

        let result = broken
            .update_order_status(order.id, OrderStatus::Cancelled)
            .await;
        assert!(matches!(
            result,
            Err(DomainError::Store(StoreError::Corrupt(_)))
        ));

        let unchanged = store.get_order(order.id).await.unwrap().unwrap();
        assert_eq!(unchanged.status, OrderStatus::Pending);
        assert_eq!(
            store.get_product(product.id).await.unwrap().unwrap().stock,
            6
        );

        // The order is still cancellable once the store recovers
        let orders = OrderService::new(store.clone());
        orders
            .update_order_status(order.id, OrderStatus::Cancelled)
            .await
            .unwrap();
        assert_eq!(
            store.get_product(product.id).await.unwrap().unwrap().stock,
            10
        );
    }

    #[tokio::test]
    async fn cancelling_twice_restocks_once() {
        let (store, product, order) = seeded().await;
        let orders = OrderService::new(store.clone());

        orders
            .update_order_status(order.id, OrderStatus::Cancelled)
            .await
            .unwrap();
        let again = orders
            .update_order_status(order.id, OrderStatus::Cancelled)
            .await;
        assert!(matches!(
            again,
            Err(DomainError::InvalidStatusTransition {
                from: OrderStatus::Cancelled,
                ..
            })
        ));
        assert_eq!(
            store.get_product(product.id).await.unwrap().unwrap().stock,
            10
        );
    }

    #[tokio::test]
    async fn unknown_order_is_not_found() {
        let orders = OrderService::new(InMemoryStore::new());
        let result = orders
            .update_order_status(OrderId::new(), OrderStatus::Processing)
            .await;
        assert!(matches!(result, Err(DomainError::NotFound { .. })));
    }

    #[tokio::test]
    async fn list_filters_by_account() {
        let (store, _, order) = seeded().await;
        let orders = OrderService::new(store);

        assert_eq!(orders.list_orders(None).await.unwrap().len(), 1);
        assert_eq!(
            orders
                .list_orders(Some(order.account_id))
                .await
                .unwrap()
                .len(),
            1
        );
        assert!(
            orders
                .list_orders(Some(AccountId::new()))
                .await
                .unwrap()
                .is_empty()
        );
    }
}
