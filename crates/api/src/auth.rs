//! Bearer-token extraction for protected routes.

use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use common::AccountId;
use domain::AuthError;
use store::Store;

use crate::AppState;
use crate::error::ApiError;

/// The account that presented a valid session token.
///
/// The `Authorization` header carries the raw token; a `Bearer ` prefix is
/// also accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatedAccount(pub AccountId);

impl<S: Store> FromRequestParts<Arc<AppState<S>>> for AuthenticatedAccount {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState<S>>,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .map(|value| value.to_str().map_err(|_| AuthError::Invalid))
            .transpose()?;

        let token = header.map(|h| h.strip_prefix("Bearer ").unwrap_or(h));
        let account_id = state.sessions.verify(token)?;
        Ok(Self(account_id))
    }
}
