use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand_core::OsRng;
use std::sync::Arc;
use tracing::{error, info, warn};

use common_crypto::SecretCodec;

use crate::config::AuthConfig;
use crate::error::{AuthError, AuthResult};
use crate::metrics::AuthMetrics;
use crate::mfa::{
    build_otpauth_uri, enroll_secret, generate_totp_secret, manual_entry_code,
    normalize_totp_code, verify_totp_code,
};
use crate::model::{
    normalize_email, LoginChallenge, MfaEnrollment, MfaFieldsUpdate, SessionTokens,
};
use crate::session::SessionManager;
use crate::store::{Notifier, RefreshSessionStore, StoreError, UserStore};
use crate::tokens::{TokenIssuer, TokenPurpose};

/// The authentication state machine.
///
/// Orchestrates login → MFA challenge → session issuance → renewal plus the
/// password-reset branch, and enforces the token-purpose contract at every
/// transition. Stateless across requests: all shared state lives in the
/// external stores, and configuration is read-only after construction.
pub struct AuthService {
    users: Arc<dyn UserStore>,
    notifier: Arc<dyn Notifier>,
    codec: SecretCodec,
    issuer: Arc<TokenIssuer>,
    sessions: SessionManager,
    config: AuthConfig,
    metrics: Arc<AuthMetrics>,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserStore>,
        refresh_sessions: Arc<dyn RefreshSessionStore>,
        notifier: Arc<dyn Notifier>,
        config: AuthConfig,
    ) -> anyhow::Result<Self> {
        let issuer = Arc::new(TokenIssuer::new(&config));
        let codec = SecretCodec::new(&config.mfa_passphrase, &config.mfa_salt);
        let sessions = SessionManager::new(
            users.clone(),
            refresh_sessions,
            issuer.clone(),
            config.refresh_ttl_days,
        );
        let metrics = Arc::new(AuthMetrics::new()?);

        Ok(Self {
            users,
            notifier,
            codec,
            issuer,
            sessions,
            config,
            metrics,
        })
    }

    pub fn metrics(&self) -> Arc<AuthMetrics> {
        self.metrics.clone()
    }

    /// `Anonymous → MfaChallenged`. Unknown accounts, inactive accounts and
    /// wrong passwords all collapse into `InvalidCredentials` so a caller
    /// cannot probe for account existence.
    pub async fn login(&self, email: &str, password: &str) -> AuthResult<LoginChallenge> {
        let email = normalize_email(email);

        let user = match self.users.find_by_email(&email).await? {
            Some(user) if user.active => user,
            _ => {
                self.metrics.login_attempt("rejected");
                return Err(AuthError::InvalidCredentials);
            }
        };

        if !verify_password(password, &user.password_hash) {
            self.metrics.login_attempt("rejected");
            return Err(AuthError::InvalidCredentials);
        }

        let mfa_token = self.issuer.issue_mfa_token(&user)?;
        self.metrics.login_attempt("challenged");
        info!(email = %user.email, "password accepted, MFA challenge issued");

        Ok(LoginChallenge {
            mfa_token,
            first_sign_in: user.first_sign_in,
            mfa_verified: user.mfa_verified,
        })
    }

    /// Generate and persist MFA enrollment artifacts for the challenged
    /// user. Requires a valid `mfa-token` whose email claim matches the
    /// claimed email exactly after normalization.
    pub async fn enroll_mfa(&self, mfa_token: &str, email: &str) -> AuthResult<MfaEnrollment> {
        let email = normalize_email(email);
        let claims = self.issuer.verify(mfa_token, TokenPurpose::MfaToken)?;
        if normalize_email(&claims.sub) != email {
            return Err(AuthError::Unauthorized);
        }

        let user = self
            .users
            .find_by_email(&email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        let (secret, encrypted_secret) =
            enroll_secret(&self.codec, self.users.as_ref(), generate_totp_secret).await?;

        let otpauth_uri = build_otpauth_uri(&self.config.mfa_account_issuer, &user.email, &secret);
        let manual_code = manual_entry_code(&secret);

        let updated = self
            .users
            .set_mfa_fields(MfaFieldsUpdate {
                user_id: user.id,
                encrypted_secret: encrypted_secret.clone(),
                qr_code_uri: otpauth_uri.clone(),
                manual_entry_code: manual_code.clone(),
                first_sign_in: true,
                mfa_verified: false,
            })
            .await?;
        if !updated {
            error!(email = %user.email, "MFA field update matched no rows");
            return Err(StoreError::new("set_mfa_fields", "no rows updated").into());
        }

        self.metrics.mfa_event("enrolled");
        info!(email = %user.email, "MFA enrollment artifacts issued");

        Ok(MfaEnrollment {
            encrypted_secret,
            otpauth_uri,
            manual_entry_code: manual_code,
        })
    }

    /// `MfaChallenged → Authenticated`. A bad code is `InvalidCredentials`;
    /// only decryption or store faults are real errors. The user's first
    /// successful verification flips the first-sign-in flags before the
    /// session pair is issued.
    pub async fn verify_mfa(
        &self,
        mfa_token: &str,
        email: &str,
        code: &str,
    ) -> AuthResult<SessionTokens> {
        let email = normalize_email(email);
        let claims = self.issuer.verify(mfa_token, TokenPurpose::MfaToken)?;
        if normalize_email(&claims.sub) != email {
            return Err(AuthError::Unauthorized);
        }

        let user = self
            .users
            .find_by_email(&email)
            .await?
            .ok_or(AuthError::NotFound)?;

        let encrypted = user
            .encrypted_mfa_secret
            .as_deref()
            .ok_or(AuthError::InvalidCredentials)?;
        let secret = self.codec.decrypt(encrypted)?;

        let code = normalize_totp_code(code).ok_or(AuthError::InvalidCredentials)?;
        if !verify_totp_code(&secret, &code) {
            self.metrics.mfa_event("rejected");
            return Err(AuthError::InvalidCredentials);
        }

        if user.first_sign_in && !user.mfa_verified {
            let flipped = self.users.mark_first_sign_in_complete(&user.email).await?;
            if !flipped {
                error!(email = %user.email, "first sign-in completion matched no rows");
                return Err(
                    StoreError::new("mark_first_sign_in_complete", "no rows updated").into(),
                );
            }
        }

        self.metrics.mfa_event("verified");
        info!(email = %user.email, "MFA verified, issuing session");

        self.sessions.issue_pair(&user).await
    }

    /// `Authenticated → Authenticated` via the refresh session.
    pub async fn renew(&self, refresh_token: &str, email: &str) -> AuthResult<String> {
        let access_token = self.sessions.renew(refresh_token, email).await?;
        self.metrics.token_renewal();
        Ok(access_token)
    }

    /// `PasswordResetRequested`: mint a change-password token and hand the
    /// reset link to the notifier. Notification failure is logged, never
    /// surfaced; the token was minted either way.
    pub async fn forgot_password(&self, email: &str) -> AuthResult<()> {
        let email = normalize_email(email);
        let user = self
            .users
            .find_by_email(&email)
            .await?
            .ok_or(AuthError::NotFound)?;

        let token = self.issuer.issue_change_password_token(&user)?;
        let link = format!(
            "{}/auth/change-password?token={token}&email={}",
            self.config.front_end_base_url.trim_end_matches('/'),
            user.email
        );
        let body = format!("A password reset was requested for this account.\n\nReset it here: {link}\n\nIf this was not you, no action is needed; the link expires on its own.");

        if let Err(err) = self
            .notifier
            .send(&user.email, "Password reset requested", &body)
            .await
        {
            warn!(email = %user.email, error = %err, "failed to send password reset notification");
        }

        info!(email = %user.email, "password reset token issued");
        Ok(())
    }

    /// `PasswordResetConfirmed`: the token must carry the change-password
    /// purpose and its subject id must match the resolved user. On success
    /// the new password is hashed, persisted, and confirmed by a second
    /// notification.
    pub async fn change_password(
        &self,
        token: &str,
        email: &str,
        new_password: &str,
    ) -> AuthResult<()> {
        if !password_meets_policy(new_password) {
            return Err(AuthError::WeakPassword);
        }

        let email = normalize_email(email);
        let user = self
            .users
            .find_by_email(&email)
            .await?
            .ok_or(AuthError::NotFound)?;

        let claims = self.issuer.verify(token, TokenPurpose::ChangePasswordToken)?;
        if claims.sid != user.id {
            return Err(AuthError::Unauthorized);
        }

        let password_hash = hash_password(new_password)?;
        let updated = self.users.update_password(&user.email, &password_hash).await?;
        if !updated {
            error!(email = %user.email, "password update matched no rows");
            return Err(StoreError::new("update_password", "no rows updated").into());
        }

        if let Err(err) = self
            .notifier
            .send(
                &user.email,
                "Your password was changed",
                "The password for your account was just changed. If this was not you, contact support immediately.",
            )
            .await
        {
            warn!(email = %user.email, error = %err, "failed to send password change confirmation");
        }

        info!(email = %user.email, "password changed");
        Ok(())
    }
}

/// Policy from the original platform: length plus at least one digit and
/// one special character.
pub fn password_meets_policy(password: &str) -> bool {
    password.len() >= 8
        && password.chars().any(|ch| ch.is_ascii_digit())
        && password.chars().any(|ch| !ch.is_alphanumeric())
}

pub fn hash_password(password: &str) -> AuthResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| AuthError::PasswordHash(err.to_string()))
}

fn verify_password(password: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}
