//! Login and bearer-token verification.

use std::time::Duration;

use chrono::{DateTime, Utc};
use common::AccountId;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use store::AccountStore;
use uuid::Uuid;

use crate::account::verify_password_blocking;
use crate::error::{AuthError, DomainError};

/// Default token lifetime: 24 hours.
pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(86_400);

/// Claims carried by a session token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
}

/// Issues and verifies HS256 session tokens.
///
/// Tokens are not persisted; they are checked by signature and expiry only.
#[derive(Clone)]
pub struct SessionIssuer<S> {
    store: S,
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl<S: AccountStore> SessionIssuer<S> {
    /// Creates an issuer signing with `secret`, with the default lifetime.
    pub fn new(store: S, secret: &SecretString) -> Self {
        Self::with_ttl(store, secret, DEFAULT_TOKEN_TTL)
    }

    /// Creates an issuer with a custom token lifetime.
    pub fn with_ttl(store: S, secret: &SecretString, ttl: Duration) -> Self {
        let key = secret.expose_secret().as_bytes();

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            store,
            encoding: EncodingKey::from_secret(key),
            decoding: DecodingKey::from_secret(key),
            validation,
            ttl,
        }
    }

    /// Token lifetime.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Checks credentials and issues a token.
    #[tracing::instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<String, DomainError> {
        let Some(account) = self.store.find_account_by_email(email.trim()).await? else {
            metrics::counter!("logins_total", "outcome" => "not_found").increment(1);
            return Err(AuthError::NotFound.into());
        };

        let matches =
            verify_password_blocking(password.to_string(), account.password_hash.clone()).await?;
        if !matches {
            metrics::counter!("logins_total", "outcome" => "invalid_credentials").increment(1);
            return Err(AuthError::InvalidCredentials.into());
        }

        let token = self.issue(account.id)?;
        metrics::counter!("logins_total", "outcome" => "success").increment(1);
        tracing::info!(account_id = %account.id, "login succeeded");
        Ok(token)
    }

    /// Issues a token for `account_id`, valid from now.
    pub fn issue(&self, account_id: AccountId) -> Result<String, DomainError> {
        self.issue_at(account_id, Utc::now())
    }

    /// Issues a token as if it had been issued at `issued_at`.
    pub fn issue_at(
        &self,
        account_id: AccountId,
        issued_at: DateTime<Utc>,
    ) -> Result<String, DomainError> {
        let ttl = chrono::Duration::from_std(self.ttl)
            .map_err(|e| DomainError::Token(e.to_string()))?;

        let claims = Claims {
            sub: account_id.to_string(),
            iat: issued_at.timestamp(),
            exp: (issued_at + ttl).timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| DomainError::Token(e.to_string()))
    }

    /// Verifies a token taken from a request.
    ///
    /// `None` means the request carried no token.
    pub fn verify(&self, token: Option<&str>) -> Result<AccountId, AuthError> {
        let token = token.map(str::trim).filter(|t| !t.is_empty());
        let Some(token) = token else {
            return Err(AuthError::Missing);
        };

        let data = decode::<Claims>(token, &self.decoding, &self.validation).map_err(|e| {
            tracing::debug!(error = %e, "token rejected");
            AuthError::Invalid
        })?;

        data.claims.sub.parse().map_err(|_| AuthError::Invalid)
    }
}
