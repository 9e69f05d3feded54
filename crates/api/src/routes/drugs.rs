//! Drug catalog endpoints. Administrative routes are trusted, not authenticated.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::ProductId;
use domain::NewProduct;
use serde::Serialize;
use store::{Product, ProductPatch, Store};

use crate::AppState;
use crate::error::ApiError;

#[derive(Serialize)]
pub struct DrugResponse {
    pub message: &'static str,
    pub product_id: String,
}

/// POST /drugs — add a drug to the catalog.
#[tracing::instrument(skip(state, payload))]
pub async fn create<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    payload: Result<Json<NewProduct>, JsonRejection>,
) -> Result<(StatusCode, Json<DrugResponse>), ApiError> {
    let Json(req) = payload?;
    let product = state.catalog.add_product(req).await?;

    Ok((
        StatusCode::CREATED,
        Json(DrugResponse {
            message: "Drug added",
            product_id: product.id.to_string(),
        }),
    ))
}

/// GET /drugs — list the catalog.
pub async fn list<S: Store>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<Vec<Product>>, ApiError> {
    Ok(Json(state.catalog.list_products().await?))
}

/// GET /drugs/{id} — fetch one drug.
pub async fn get<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    id: Result<Path<ProductId>, PathRejection>,
) -> Result<Json<Product>, ApiError> {
    let Path(id) = id?;
    Ok(Json(state.catalog.get_product(id).await?))
}

/// PUT /drugs/{id} — change only the provided fields.
#[tracing::instrument(skip(state, payload))]
pub async fn update<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    id: Result<Path<ProductId>, PathRejection>,
    payload: Result<Json<ProductPatch>, JsonRejection>,
) -> Result<Json<DrugResponse>, ApiError> {
    let Path(id) = id?;
    let Json(patch) = payload?;
    let product = state.catalog.update_product(id, patch).await?;

    Ok(Json(DrugResponse {
        message: "Drug updated",
        product_id: product.id.to_string(),
    }))
}

/// DELETE /drugs/{id} — remove a drug.
#[tracing::instrument(skip(state))]
pub async fn delete<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    id: Result<Path<ProductId>, PathRejection>,
) -> Result<Json<DrugResponse>, ApiError> {
    let Path(id) = id?;
    state.catalog.delete_product(id).await?;

    Ok(Json(DrugResponse {
        message: "Drug deleted",
        product_id: id.to_string(),
    }))
}
