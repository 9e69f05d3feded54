//! What the administrator is told about a newly placed order.

use chrono::{DateTime, Utc};
use common::{AccountId, Money, OrderId};
use serde::Serialize;
use store::Order;

/// One line of an order summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SummaryLine {
    pub product_name: String,
    pub quantity: u32,
    pub line_total: Money,
}

/// What an administrator needs to know about a newly placed order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderSummary {
    pub order_id: OrderId,
    pub account_id: AccountId,
    pub patient_name: Option<String>,
    pub lines: Vec<SummaryLine>,
    pub total: Money,
    pub delivery_address: String,
    pub placed_at: DateTime<Utc>,
}

impl OrderSummary {
    /// Builds a summary from a stored order.
    pub fn from_order(order: &Order) -> Self {
        Self {
            order_id: order.id,
            account_id: order.account_id,
            patient_name: None,
            lines: order
                .line_items
                .iter()
                .map(|item| SummaryLine {
                    product_name: item.product_name.clone(),
                    quantity: item.quantity,
                    line_total: item.line_total(),
                })
                .collect(),
            total: order.total_amount,
            delivery_address: order.delivery_address.clone(),
            placed_at: order.created_at,
        }
    }

    /// Attaches the patient's display name.
    pub fn with_patient_name(mut self, name: impl Into<String>) -> Self {
        self.patient_name = Some(name.into());
        self
    }
}
