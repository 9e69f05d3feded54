//! Registration, login and password change.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use domain::NewAccount;
use serde::{Deserialize, Serialize};
use store::Store;

use crate::AppState;
use crate::auth::AuthenticatedAccount;
use crate::error::ApiError;

// -- Request types --

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

// -- Response types --

#[derive(Serialize)]
pub struct RegisteredResponse {
    pub message: &'static str,
    pub account_id: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub token_type: &'static str,
    pub expires_in: u64,
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

// -- Handlers --

/// POST /register — create a patient account.
#[tracing::instrument(skip(state, payload))]
pub async fn register<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    payload: Result<Json<NewAccount>, JsonRejection>,
) -> Result<(StatusCode, Json<RegisteredResponse>), ApiError> {
    let Json(req) = payload?;
    let account = state.accounts.register(req).await?;

    Ok((
        StatusCode::CREATED,
        Json(RegisteredResponse {
            message: "Patient created",
            account_id: account.id.to_string(),
        }),
    ))
}

/// POST /login — exchange credentials for a session token.
#[tracing::instrument(skip(state, payload))]
pub async fn login<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, ApiError> {
    let Json(req) = payload?;
    let token = state.sessions.login(&req.email, &req.password).await?;

    Ok(Json(LoginResponse {
        token,
        token_type: "Bearer",
        expires_in: state.sessions.ttl().as_secs(),
    }))
}

/// PUT /account/password — change the caller's password.
#[tracing::instrument(skip(state, payload))]
pub async fn change_password<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    AuthenticatedAccount(account_id): AuthenticatedAccount,
    payload: Result<Json<ChangePasswordRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let Json(req) = payload?;
    state
        .accounts
        .change_password(account_id, req.current_password, req.new_password)
        .await?;

    Ok(Json(MessageResponse {
        message: "Password updated",
    }))
}
