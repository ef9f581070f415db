use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::model::{MfaFieldsUpdate, RefreshSession, UserRecord};

/// Infrastructure fault raised by a collaborator store. "Not found" is never
/// an error; stores signal absence with `Ok(None)` or `Ok(false)`.
#[derive(Debug, Error)]
#[error("store failure during {operation}: {message}")]
pub struct StoreError {
    pub operation: &'static str,
    pub message: String,
}

impl StoreError {
    pub fn new(operation: &'static str, message: impl Into<String>) -> Self {
        Self {
            operation,
            message: message.into(),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Narrow interface over the external user store.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> StoreResult<Option<UserRecord>>;
    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<UserRecord>>;
    /// Equality lookup on the stored ciphertext, used by the enrollment
    /// uniqueness check.
    async fn find_by_encrypted_mfa_secret(
        &self,
        encrypted: &str,
    ) -> StoreResult<Option<UserRecord>>;
    /// Persist a new password hash; `false` when no matching row exists.
    async fn update_password(&self, email: &str, password_hash: &str) -> StoreResult<bool>;
    async fn set_mfa_fields(&self, update: MfaFieldsUpdate) -> StoreResult<bool>;
    /// Flip `first_sign_in = false, mfa_verified = true` after the user's
    /// first successful TOTP verification.
    async fn mark_first_sign_in_complete(&self, email: &str) -> StoreResult<bool>;
}

/// Narrow interface over the refresh session store.
#[async_trait]
pub trait RefreshSessionStore: Send + Sync {
    async fn find_by_user_id(&self, user_id: Uuid) -> StoreResult<Option<RefreshSession>>;
    async fn find_by_token(&self, token: &str) -> StoreResult<Option<RefreshSession>>;
    async fn insert(&self, session: RefreshSession) -> StoreResult<()>;
    async fn delete_by_id(&self, id: Uuid) -> StoreResult<bool>;
}

/// Outbound notification channel. Fire-and-forget from the core's
/// perspective: failures are logged by the caller, never surfaced as
/// authentication failures.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, recipient: &str, subject: &str, body: &str) -> anyhow::Result<()>;
}
