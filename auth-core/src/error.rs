use common_crypto::CryptoError;
use thiserror::Error;

use crate::store::StoreError;

pub type AuthResult<T> = Result<T, AuthError>;

/// Error taxonomy for the authentication core.
///
/// Business outcomes (`InvalidCredentials`, `Unauthorized`, `NotFound`,
/// `WeakPassword`) are expected negative results that callers map to a
/// response. Infrastructure faults (`Store`, `Crypto`, `Token`,
/// `PasswordHash`) are logged with context at the failure site and
/// propagated unmodified; the caller decides how to surface them.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Bad password, inactive account, unknown account, or bad TOTP code.
    /// Always uniform so the caller cannot distinguish the reason.
    #[error("invalid credentials")]
    InvalidCredentials,
    /// Structurally valid token with the wrong purpose or wrong subject,
    /// or a token that fails signature/expiry validation.
    #[error("unauthorized")]
    Unauthorized,
    /// Referenced principal does not exist.
    #[error("principal not found")]
    NotFound,
    #[error("password must be at least 8 characters and contain a digit and a special character")]
    WeakPassword,
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Crypto(#[from] CryptoError),
    #[error("token signing failed: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),
    #[error("password hashing failed: {0}")]
    PasswordHash(String),
}

impl AuthError {
    /// True for expected business outcomes, false for infrastructure faults.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            AuthError::InvalidCredentials
                | AuthError::Unauthorized
                | AuthError::NotFound
                | AuthError::WeakPassword
        )
    }
}
