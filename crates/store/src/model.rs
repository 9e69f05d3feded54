//! Records persisted by the store.

use chrono::{DateTime, Utc};
use common::{AccountId, Money, OrderId, OrderStatus, ProductId};
use serde::{Deserialize, Deserializer, Serialize};

/// A registered patient account.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub name: String,
    /// Lower-cased on registration; lookups compare case-insensitively.
    pub email: String,
    pub phone: String,
    /// Argon2 PHC string.
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

impl std::fmt::Debug for Account {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Account")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("email", &self.email)
            .field("phone", &self.phone)
            .field("password_hash", &"[REDACTED]")
            .field("created_at", &self.created_at)
            .finish()
    }
}

/// A drug in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    pub price: Money,
    /// Units on hand. Never negative.
    pub stock: i64,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Partial update for a product. `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Money>,
    pub stock: Option<i64>,
    /// `Some(None)` removes the image. In JSON an explicit `null` clears it
    /// and a missing key leaves it alone.
    #[serde(
        default,
        deserialize_with = "present_or_null",
        skip_serializing_if = "Option::is_none"
    )]
    pub image_url: Option<Option<String>>,
}

/// Maps a present key to `Some`, so `null` becomes `Some(None)`.
fn present_or_null<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

impl ProductPatch {
    /// Returns true if the patch changes nothing.
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.price.is_none()
            && self.stock.is_none()
            && self.image_url.is_none()
    }

    /// Applies the provided fields to `product` and bumps `updated_at`.
    pub fn apply_to(&self, product: &mut Product, now: DateTime<Utc>) {
        if let Some(ref name) = self.name {
            product.name = name.clone();
        }
        if let Some(ref description) = self.description {
            product.description = description.clone();
        }
        if let Some(price) = self.price {
            product.price = price;
        }
        if let Some(stock) = self.stock {
            product.stock = stock;
        }
        if let Some(ref image_url) = self.image_url {
            product.image_url = image_url.clone();
        }
        product.updated_at = now;
    }
}

/// A quantity of one product, used for stock decrements and restocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockLine {
    pub product_id: ProductId,
    pub quantity: u32,
}

impl StockLine {
    pub fn new(product_id: ProductId, quantity: u32) -> Self {
        Self {
            product_id,
            quantity,
        }
    }
}

/// Sums quantities per product. Output is sorted by product id, which is also
/// the row-locking order used by the PostgreSQL store.
pub fn merge_stock_lines(lines: &[StockLine]) -> Vec<(ProductId, u64)> {
    let mut merged = std::collections::BTreeMap::<ProductId, u64>::new();
    for line in lines {
        *merged.entry(line.product_id).or_default() += u64::from(line.quantity);
    }
    merged.into_iter().collect()
}

/// One line of a placed order, with name and price captured at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price: Money,
}

impl LineItem {
    /// Returns quantity * unit_price.
    pub fn line_total(&self) -> Money {
        self.unit_price.multiply(self.quantity)
    }
}

/// A placed order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub account_id: AccountId,
    pub line_items: Vec<LineItem>,
    pub total_amount: Money,
    pub delivery_address: String,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Returns the stock lines this order took from the catalog.
    pub fn stock_lines(&self) -> Vec<StockLine> {
        self.line_items
            .iter()
            .map(|item| StockLine::new(item.product_id, item.quantity))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product() -> Product {
        let now = Utc::now();
        Product {
            id: ProductId::new(),
            name: "Paracetamol 500mg".to_string(),
            description: "Pain relief".to_string(),
            price: Money::from_cents(350),
            stock: 20,
            image_url: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn patch_changes_only_provided_fields() {
        let mut p = product();
        let before = p.clone();
        let patch = ProductPatch {
            price: Some(Money::from_cents(400)),
            ..Default::default()
        };

        patch.apply_to(&mut p, Utc::now());

        assert_eq!(p.price.cents(), 400);
        assert_eq!(p.name, before.name);
        assert_eq!(p.description, before.description);
        assert_eq!(p.stock, before.stock);
        assert_eq!(p.image_url, before.image_url);
    }

    #[test]
    fn image_can_be_cleared() {
        let mut p = product();
        p.image_url = Some("https://img.example.com/p.png".to_string());

        let patch = ProductPatch {
            image_url: Some(None),
            ..Default::default()
        };
        assert!(!patch.is_empty());
        patch.apply_to(&mut p, Utc::now());

        assert_eq!(p.image_url, None);
    }

    #[test]
    fn patch_json_tells_null_from_missing() {
        let cleared: ProductPatch = serde_json::from_str(r#"{"image_url": null}"#).unwrap();
        assert_eq!(cleared.image_url, Some(None));

        let untouched: ProductPatch = serde_json::from_str(r#"{"stock": 3}"#).unwrap();
        assert_eq!(untouched.image_url, None);
        assert_eq!(untouched.stock, Some(3));

        let set: ProductPatch =
            serde_json::from_str(r#"{"image_url": "https://img.example.com/p.png"}"#).unwrap();
        assert_eq!(
            set.image_url,
            Some(Some("https://img.example.com/p.png".to_string()))
        );
    }

    #[test]
    fn empty_patch() {
        assert!(ProductPatch::default().is_empty());
        let patch = ProductPatch {
            stock: Some(0),
            ..Default::default()
        };
        assert!(!patch.is_empty());
    }

    #[test]
    fn merge_sums_duplicate_products() {
        let a = ProductId::new();
        let b = ProductId::new();
        let merged = merge_stock_lines(&[
            StockLine::new(a, 2),
            StockLine::new(b, 1),
            StockLine::new(a, 3),
        ]);

        assert_eq!(merged.len(), 2);
        assert!(merged.contains(&(a, 5)));
        assert!(merged.contains(&(b, 1)));
        assert!(merged.windows(2).all(|w| w[0].0 < w[1].0));
    }

    #[test]
    fn account_debug_redacts_hash() {
        let account = Account {
            id: AccountId::new(),
            name: "Amina".to_string(),
            email: "amina@example.com".to_string(),
            phone: "+255700000000".to_string(),
            password_hash: "$argon2id$secret".to_string(),
            created_at: Utc::now(),
        };
        let debug = format!("{account:?}");
        assert!(!debug.contains("secret"));
        assert!(debug.contains("[REDACTED]"));
    }
}
