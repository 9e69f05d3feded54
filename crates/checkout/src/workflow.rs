//! The order placement workflow.

use std::collections::HashMap;
use std::time::Instant;

use chrono::Utc;
use common::{AccountId, Money, OrderId, OrderStatus, ProductId};
use notifications::{FanoutReport, NotificationFanout, OrderSummary};
use serde::Deserialize;
use store::{LineItem, Order, StockLine, Store, StoreError};
use tokio::task::JoinHandle;

use crate::error::{CheckoutError, Result};

/// One requested product and quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct CartLine {
    pub product_id: ProductId,
    pub quantity: u32,
}

impl CartLine {
    pub fn new(product_id: ProductId, quantity: u32) -> Self {
        Self {
            product_id,
            quantity,
        }
    }
}

/// A patient's request to place an order.
#[derive(Debug, Clone, Deserialize)]
pub struct PlaceOrder {
    pub line_items: Vec<CartLine>,
    pub delivery_address: String,
}

/// A persisted order plus the background notification it triggered.
#[derive(Debug)]
pub struct PlacedOrder {
    pub order: Order,
    /// Resolves once the notification fan-out has finished. `None` when the
    /// notification pool was saturated and the notification was dropped.
    pub notification: Option<JoinHandle<FanoutReport>>,
}

/// Places orders against the catalog.
///
/// Steps:
/// 1. Validate the cart and merge repeated products
/// 2. Take stock for every line at once, or for none
/// 3. Persist the order as `Pending`, returning the stock if that fails
/// 4. Hand the order summary to the notification fan-out
#[derive(Clone)]
pub struct OrderWorkflow<S> {
    store: S,
    notifier: NotificationFanout,
}

impl<S: Store> OrderWorkflow<S> {
    pub fn new(store: S, notifier: NotificationFanout) -> Self {
        Self { store, notifier }
    }

    /// Places an order for `account_id`.
    #[tracing::instrument(skip(self, request), fields(%account_id, lines = request.line_items.len()))]
    pub async fn place_order(
        &self,
        account_id: AccountId,
        request: PlaceOrder,
    ) -> Result<PlacedOrder> {
        let started = Instant::now();
        let result = self.try_place_order(account_id, request).await;

        metrics::histogram!("order_placement_duration_seconds")
            .record(started.elapsed().as_secs_f64());

        match &result {
            Ok(placed) => {
                metrics::counter!("orders_placed_total").increment(1);
                tracing::info!(
                    order_id = %placed.order.id,
                    total = %placed.order.total_amount,
                    "order placed"
                );
            }
            Err(e) => {
                metrics::counter!("orders_rejected_total", "reason" => e.reason()).increment(1);
                tracing::info!(reason = e.reason(), error = %e, "order rejected");
            }
        }

        result
    }

    async fn try_place_order(
        &self,
        account_id: AccountId,
        request: PlaceOrder,
    ) -> Result<PlacedOrder> {
        let lines = merge_cart(&request.line_items)?;
        let delivery_address = request.delivery_address.trim().to_string();
        if delivery_address.is_empty() {
            return Err(CheckoutError::invalid("delivery address is required"));
        }

        let account = self
            .store
            .get_account(account_id)
            .await?
            .ok_or(CheckoutError::AccountNotFound(account_id))?;

        let taken = self.store.decrement_stock_batch(&lines).await?;
        let catalog: HashMap<ProductId, _> = taken.into_iter().map(|p| (p.id, p)).collect();

        let mut line_items = Vec::with_capacity(lines.len());
        for line in &lines {
            let Some(product) = catalog.get(&line.product_id) else {
                self.return_stock(&lines).await;
                return Err(StoreError::product_not_found(line.product_id).into());
            };
            line_items.push(LineItem {
                product_id: product.id,
                product_name: product.name.clone(),
                quantity: line.quantity,
                unit_price: product.price,
            });
        }

        let now = Utc::now();
        let order = Order {
            id: OrderId::new(),
            account_id,
            total_amount: line_items.iter().map(LineItem::line_total).sum::<Money>(),
            line_items,
            delivery_address,
            status: OrderStatus::Pending,
            created_at: now,
            updated_at: now,
        };

        let order = match self.store.insert_order(order).await {
            Ok(order) => order,
            Err(e) => {
                tracing::warn!(error = %e, "order insert failed, returning stock");
                self.return_stock(&lines).await;
                return Err(e.into());
            }
        };

        let summary = OrderSummary::from_order(&order).with_patient_name(account.name);
        let notification = self.notifier.dispatch(summary);

        Ok(PlacedOrder {
            order,
            notification,
        })
    }

    /// Compensates a decrement whose order could not be stored.
    async fn return_stock(&self, lines: &[StockLine]) {
        if let Err(e) = self.store.restock(lines).await {
            metrics::counter!("checkout_compensation_failed_total").increment(1);
            tracing::error!(error = %e, "failed to return stock after aborted checkout");
        }
    }
}

/// Validates cart lines and sums repeated products, keeping first-seen order.
fn merge_cart(cart: &[CartLine]) -> Result<Vec<StockLine>> {
    if cart.is_empty() {
        return Err(CheckoutError::invalid(
            "order must contain at least one line item",
        ));
    }

    let mut merged: Vec<StockLine> = Vec::with_capacity(cart.len());
    for line in cart {
        if line.quantity == 0 {
            return Err(CheckoutError::invalid(format!(
                "quantity for product {} must be greater than zero",
                line.product_id
            )));
        }

        match merged.iter_mut().find(|m| m.product_id == line.product_id) {
            Some(existing) => {
                existing.quantity = existing.quantity.checked_add(line.quantity).ok_or_else(
                    || {
                        CheckoutError::invalid(format!(
                            "quantity for product {} is too large",
                            line.product_id
                        ))
                    },
                )?;
            }
            None => merged.push(StockLine::new(line.product_id, line.quantity)),
        }
    }

    Ok(merged)
}
