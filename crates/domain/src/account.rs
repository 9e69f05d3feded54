//! Patient registration and credentials.

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::Utc;
use common::AccountId;
use serde::Deserialize;
use store::{Account, AccountStore};
use validator::Validate;

use crate::error::DomainError;

/// Input for registering a patient.
#[derive(Clone, Deserialize, Validate)]
pub struct NewAccount {
    #[validate(length(min = 1, max = 100, message = "name is required"))]
    pub name: String,
    #[validate(
        email(message = "email is invalid"),
        length(max = 255, message = "email is too long")
    )]
    pub email: String,
    #[validate(length(min = 1, max = 32, message = "phone is required"))]
    pub phone: String,
    #[validate(length(min = 8, message = "password must be at least 8 characters"))]
    pub password: String,
}

impl NewAccount {
    /// Trims every field but the password and lower-cases the email.
    fn normalized(self) -> Self {
        Self {
            name: self.name.trim().to_string(),
            email: self.email.trim().to_lowercase(),
            phone: self.phone.trim().to_string(),
            password: self.password,
        }
    }
}

#[derive(Validate)]
struct NewPassword {
    #[validate(length(min = 8, message = "password must be at least 8 characters"))]
    password: String,
}

impl std::fmt::Debug for NewAccount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NewAccount")
            .field("name", &self.name)
            .field("email", &self.email)
            .field("phone", &self.phone)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Service for patient accounts.
#[derive(Clone)]
pub struct AccountService<S> {
    store: S,
}

impl<S: AccountStore> AccountService<S> {
    /// Creates a new account service backed by `store`.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Registers a patient and returns the stored account.
    ///
    /// The email is trimmed and lower-cased. Fails with a validation error if
    /// the input is malformed or the email is already registered.
    #[tracing::instrument(skip(self, input), fields(email = %input.email))]
    pub async fn register(&self, input: NewAccount) -> Result<Account, DomainError> {
        let input = input.normalized();
        input.validate()?;

        let password_hash = hash_password(input.password).await?;

        let account = self
            .store
            .insert_account(Account {
                id: AccountId::new(),
                name: input.name,
                email: input.email,
                phone: input.phone,
                password_hash,
                created_at: Utc::now(),
            })
            .await?;

        metrics::counter!("accounts_registered_total").increment(1);
        tracing::info!(account_id = %account.id, "account registered");
        Ok(account)
    }

    /// Finds an account by email, case-insensitively.
    pub async fn find_by_email(&self, email: &str) -> Result<Option<Account>, DomainError> {
        Ok(self.store.find_account_by_email(email.trim()).await?)
    }

    /// Gets an account by id.
    pub async fn get_account(&self, id: AccountId) -> Result<Option<Account>, DomainError> {
        Ok(self.store.get_account(id).await?)
    }

    /// Replaces the password after checking the current one.
    #[tracing::instrument(skip(self, current, new_password))]
    pub async fn change_password(
        &self,
        id: AccountId,
        current: String,
        new_password: String,
    ) -> Result<(), DomainError> {
        let account = self
            .store
            .get_account(id)
            .await?
            .ok_or_else(|| DomainError::NotFound {
                entity: "Account",
                id: id.to_string(),
            })?;

        if !verify_password_blocking(current, account.password_hash).await? {
            return Err(crate::AuthError::InvalidCredentials.into());
        }
        let new_password = NewPassword {
            password: new_password,
        };
        new_password.validate()?;

        let password_hash = hash_password(new_password.password).await?;
        self.store.update_password(id, password_hash).await?;
        Ok(())
    }
}

/// Checks `plaintext` against an Argon2 PHC string.
///
/// A malformed stored hash verifies as `false`.
pub fn verify_password(plaintext: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(plaintext.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

/// Runs [`verify_password`] off the async executor.
pub(crate) async fn verify_password_blocking(
    plaintext: String,
    stored_hash: String,
) -> Result<bool, DomainError> {
    tokio::task::spawn_blocking(move || verify_password(&plaintext, &stored_hash))
        .await
        .map_err(|e| DomainError::PasswordHash(e.to_string()))
}

async fn hash_password(plaintext: String) -> Result<String, DomainError> {
    tokio::task::spawn_blocking(move || {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(plaintext.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| DomainError::PasswordHash(e.to_string()))
    })
    .await
    .map_err(|e| DomainError::PasswordHash(e.to_string()))?
}
