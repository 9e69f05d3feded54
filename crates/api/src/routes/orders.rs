//! Order placement, listing and status endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use checkout::PlaceOrder;
use common::{AccountId, OrderId};
use serde::{Deserialize, Serialize};
use store::{Order, OrderQuery, Store};

use crate::AppState;
use crate::auth::AuthenticatedAccount;
use crate::error::ApiError;

// -- Request types --

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

/// Filters for the administrator's order listing. All are optional.
#[derive(Debug, Default, Deserialize)]
pub struct ListOrdersParams {
    pub status: Option<String>,
    pub account_id: Option<AccountId>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl ListOrdersParams {
    fn into_query(self) -> Result<OrderQuery, ApiError> {
        let mut query = OrderQuery::new();
        if let Some(status) = self.status.as_deref() {
            query = query.status(domain::parse_status(status)?);
        }
        if let Some(account_id) = self.account_id {
            query = query.account_id(account_id);
        }
        if let Some(limit) = self.limit {
            query = query.limit(limit);
        }
        if let Some(offset) = self.offset {
            query = query.offset(offset);
        }
        Ok(query)
    }
}

// -- Response types --

#[derive(Serialize)]
pub struct OrderPlacedResponse {
    pub message: &'static str,
    pub order_id: String,
    pub status: String,
    pub total_cents: i64,
}

#[derive(Serialize)]
pub struct StatusUpdatedResponse {
    pub message: &'static str,
    pub order_id: String,
    pub status: String,
}

// -- Handlers --

/// POST /orders — place an order for the authenticated patient.
///
/// Responds once the order is stored; notifications continue in the background.
#[tracing::instrument(skip(state, payload))]
pub async fn create<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    AuthenticatedAccount(account_id): AuthenticatedAccount,
    payload: Result<Json<PlaceOrder>, JsonRejection>,
) -> Result<(StatusCode, Json<OrderPlacedResponse>), ApiError> {
    let Json(req) = payload?;
    let placed = state.checkout.place_order(account_id, req).await?;

    Ok((
        StatusCode::CREATED,
        Json(OrderPlacedResponse {
            message: "Order saved",
            order_id: placed.order.id.to_string(),
            status: placed.order.status.to_string(),
            total_cents: placed.order.total_amount.cents(),
        }),
    ))
}

/// GET /orders — the authenticated patient's orders, newest first.
pub async fn list_own<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    AuthenticatedAccount(account_id): AuthenticatedAccount,
) -> Result<Json<Vec<Order>>, ApiError> {
    Ok(Json(state.orders.list_orders(Some(account_id)).await?))
}

/// GET /admin/orders — every order, newest first.
///
/// Accepts `status`, `account_id`, `limit` and `offset` query parameters.
pub async fn list_all<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    params: Result<Query<ListOrdersParams>, QueryRejection>,
) -> Result<Json<Vec<Order>>, ApiError> {
    let Query(params) = params?;
    Ok(Json(state.orders.query(params.into_query()?).await?))
}

/// PUT /orders/{id} — move an order along the status state machine.
#[tracing::instrument(skip(state, payload))]
pub async fn update_status<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    id: Result<Path<OrderId>, PathRejection>,
    payload: Result<Json<UpdateStatusRequest>, JsonRejection>,
) -> Result<Json<StatusUpdatedResponse>, ApiError> {
    let Path(id) = id?;
    let Json(req) = payload?;
    let next = domain::parse_status(&req.status)?;
    let order = state.orders.update_order_status(id, next).await?;

    Ok(Json(StatusUpdatedResponse {
        message: "Order status updated",
        order_id: order.id.to_string(),
        status: order.status.to_string(),
    }))
}
