use chrono::{Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{AuthError, AuthResult};
use crate::model::{normalize_email, RefreshSession, SessionTokens, UserRecord};
use crate::store::{RefreshSessionStore, UserStore};
use crate::tokens::TokenIssuer;

/// Enforces the single-active-refresh-session invariant and validates
/// refresh tokens on renewal.
///
/// The read-delete-insert sequence in `issue_pair` runs under a per-user
/// async lock so two concurrent full logins for the same user cannot leave
/// two live sessions or drop one silently.
pub struct SessionManager {
    users: Arc<dyn UserStore>,
    sessions: Arc<dyn RefreshSessionStore>,
    issuer: Arc<TokenIssuer>,
    refresh_ttl: Duration,
    locks: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

impl SessionManager {
    pub fn new(
        users: Arc<dyn UserStore>,
        sessions: Arc<dyn RefreshSessionStore>,
        issuer: Arc<TokenIssuer>,
        refresh_ttl_days: i64,
    ) -> Self {
        Self {
            users,
            sessions,
            issuer,
            refresh_ttl: Duration::days(refresh_ttl_days),
            locks: Mutex::new(HashMap::new()),
        }
    }

    async fn user_lock(&self, user_id: Uuid) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks.entry(user_id).or_default().clone()
    }

    /// Mint an access/refresh pair and persist the refresh session,
    /// superseding any existing session for the user. Deleting the old
    /// session is best-effort: a failed delete is logged and issuance
    /// continues, since the stale session still self-expires.
    pub async fn issue_pair(&self, user: &UserRecord) -> AuthResult<SessionTokens> {
        let access_token = self.issuer.issue_access_token(user)?;
        let refresh_token = TokenIssuer::generate_refresh_token();

        let lock = self.user_lock(user.id).await;
        let _guard = lock.lock().await;

        match self.sessions.find_by_user_id(user.id).await {
            Ok(Some(existing)) => {
                if let Err(err) = self.sessions.delete_by_id(existing.id).await {
                    warn!(
                        user_id = %user.id,
                        error = %err,
                        "failed to delete superseded refresh session"
                    );
                }
            }
            Ok(None) => {}
            Err(err) => {
                warn!(
                    user_id = %user.id,
                    error = %err,
                    "failed to look up existing refresh session"
                );
            }
        }

        self.sessions
            .insert(RefreshSession {
                id: Uuid::new_v4(),
                token: refresh_token.clone(),
                user_id: user.id,
                expires_at: Utc::now() + self.refresh_ttl,
            })
            .await?;

        info!(user_id = %user.id, "issued access and refresh token pair");

        Ok(SessionTokens {
            access_token,
            refresh_token,
        })
    }

    /// Exchange a refresh token for a new access token. The submitted token
    /// string is the lookup key; possession is the proof. Rejects with
    /// `Unauthorized` when the session is missing, expired, or owned by a
    /// different user than the one the email resolves to. The refresh token
    /// is not rotated: it stays valid until expiry or a fresh full login.
    pub async fn renew(&self, submitted_token: &str, email: &str) -> AuthResult<String> {
        let session = self.sessions.find_by_token(submitted_token).await?;

        let user = self
            .users
            .find_by_email(&normalize_email(email))
            .await?
            .ok_or(AuthError::NotFound)?;

        let session = session.ok_or(AuthError::Unauthorized)?;
        if session.expires_at < Utc::now() || session.user_id != user.id {
            return Err(AuthError::Unauthorized);
        }

        self.issuer.issue_access_token(&user)
    }
}
