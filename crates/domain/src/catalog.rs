//! Drug catalog management.

use chrono::Utc;
use common::{Money, ProductId};
use serde::Deserialize;
use store::{CatalogStore, CatalogStoreExt, Product, ProductPatch};
use validator::{Validate, ValidationError};

use crate::error::DomainError;

/// Input for adding a drug to the catalog.
///
/// `price` is in cents.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewProduct {
    #[validate(length(min = 1, max = 200, message = "name is required"))]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[validate(custom(function = "non_negative_price"))]
    pub price: Money,
    #[validate(range(min = 0, message = "stock must not be negative"))]
    pub stock: i64,
    #[serde(default)]
    pub image_url: Option<String>,
}

/// The checked fields of a [`ProductPatch`]; absent fields pass.
#[derive(Validate)]
struct PatchFields {
    #[validate(length(min = 1, max = 200, message = "name is required"))]
    name: Option<String>,
    #[validate(custom(function = "non_negative_price"))]
    price: Option<Money>,
    #[validate(range(min = 0, message = "stock must not be negative"))]
    stock: Option<i64>,
}

/// Service for the drug catalog.
#[derive(Clone)]
pub struct CatalogService<S> {
    store: S,
}

impl<S: CatalogStore> CatalogService<S> {
    /// Creates a new catalog service backed by `store`.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Adds a product.
    #[tracing::instrument(skip(self))]
    pub async fn add_product(&self, input: NewProduct) -> Result<Product, DomainError> {
        let input = NewProduct {
            name: input.name.trim().to_string(),
            ..input
        };
        input.validate()?;

        let now = Utc::now();
        let product = self
            .store
            .insert_product(Product {
                id: ProductId::new(),
                name: input.name,
                description: input.description,
                price: input.price,
                stock: input.stock,
                image_url: input.image_url.filter(|url| !url.trim().is_empty()),
                created_at: now,
                updated_at: now,
            })
            .await?;

        tracing::info!(product_id = %product.id, "product added");
        Ok(product)
    }

    /// Lists every product.
    pub async fn list_products(&self) -> Result<Vec<Product>, DomainError> {
        Ok(self.store.list_products().await?)
    }

    /// Gets a product, failing with `NotFound` if it is absent.
    pub async fn get_product(&self, id: ProductId) -> Result<Product, DomainError> {
        self.store
            .get_product(id)
            .await?
            .ok_or_else(|| DomainError::NotFound {
                entity: "Product",
                id: id.to_string(),
            })
    }

    /// Changes only the fields present in `patch`.
    #[tracing::instrument(skip(self))]
    pub async fn update_product(
        &self,
        id: ProductId,
        mut patch: ProductPatch,
    ) -> Result<Product, DomainError> {
        if patch.is_empty() {
            return Err(DomainError::validation("no fields to update"));
        }
        if let Some(name) = patch.name.as_mut() {
            *name = name.trim().to_string();
        }
        // A blank URL clears the image, same as on creation
        if let Some(url) = patch.image_url.as_mut() {
            *url = url.take().filter(|url| !url.trim().is_empty());
        }
        PatchFields {
            name: patch.name.clone(),
            price: patch.price,
            stock: patch.stock,
        }
        .validate()?;

        Ok(self.store.update_product(id, patch).await?)
    }

    /// Removes a product.
    #[tracing::instrument(skip(self))]
    pub async fn delete_product(&self, id: ProductId) -> Result<(), DomainError> {
        self.store.delete_product(id).await?;
        tracing::info!(product_id = %id, "product deleted");
        Ok(())
    }

    /// Takes `quantity` units if that many are on hand.
    #[tracing::instrument(skip(self))]
    pub async fn decrement_stock(
        &self,
        id: ProductId,
        quantity: u32,
    ) -> Result<Product, DomainError> {
        if quantity == 0 {
            return Err(DomainError::validation("quantity must be greater than zero"));
        }
        Ok(self.store.decrement_stock(id, quantity).await?)
    }
}

fn non_negative_price(price: &Money) -> Result<(), ValidationError> {
    if price.is_negative() {
        return Err(
            ValidationError::new("range").with_message("price must not be negative".into()),
        );
    }
    Ok(())
}
