use anyhow::{Context, Result};
use std::env;

/// Process-wide configuration, read-only after initialization. Secrets are
/// sourced from the environment; nothing in the core hard-codes key
/// material.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Symmetric HS256 signing key shared by all claim-bundle tokens.
    pub signing_key: String,
    /// `iss` claim stamped into and required from every token.
    pub token_issuer: String,
    /// Passphrase feeding the MFA secret codec's key derivation.
    pub mfa_passphrase: String,
    /// Salt feeding the MFA secret codec's key derivation.
    pub mfa_salt: String,
    /// Issuer label shown in authenticator apps (otpauth URI).
    pub mfa_account_issuer: String,
    /// Base URL used to build password-reset links.
    pub front_end_base_url: String,
    pub access_ttl_minutes: i64,
    pub mfa_ttl_minutes: i64,
    pub mfa_first_sign_in_ttl_minutes: i64,
    pub change_password_ttl_minutes: i64,
    pub refresh_ttl_days: i64,
}

pub fn load_auth_config() -> Result<AuthConfig> {
    let signing_key = env::var("AUTH_SIGNING_KEY").context("AUTH_SIGNING_KEY must be set")?;
    let mfa_passphrase =
        env::var("AUTH_MFA_PASSPHRASE").context("AUTH_MFA_PASSPHRASE must be set")?;
    let mfa_salt = env::var("AUTH_MFA_SALT").context("AUTH_MFA_SALT must be set")?;

    let token_issuer =
        env::var("AUTH_TOKEN_ISSUER").unwrap_or_else(|_| "casebox-auth".to_string());
    let mfa_account_issuer =
        env::var("AUTH_MFA_ISSUER").unwrap_or_else(|_| "CaseBox".to_string());
    let front_end_base_url = env::var("AUTH_FRONTEND_BASE_URL")
        .unwrap_or_else(|_| "http://localhost:3000".to_string());

    let access_ttl_minutes = i64_from_env("AUTH_ACCESS_TTL_MINUTES")?.unwrap_or(60);
    let mfa_ttl_minutes = i64_from_env("AUTH_MFA_TTL_MINUTES")?.unwrap_or(10);
    let mfa_first_sign_in_ttl_minutes =
        i64_from_env("AUTH_MFA_FIRST_SIGN_IN_TTL_MINUTES")?.unwrap_or(20);
    let change_password_ttl_minutes =
        i64_from_env("AUTH_CHANGE_PASSWORD_TTL_MINUTES")?.unwrap_or(60);
    let refresh_ttl_days = i64_from_env("AUTH_REFRESH_TTL_DAYS")?.unwrap_or(7);

    Ok(AuthConfig {
        signing_key,
        token_issuer,
        mfa_passphrase,
        mfa_salt,
        mfa_account_issuer,
        front_end_base_url,
        access_ttl_minutes,
        mfa_ttl_minutes,
        mfa_first_sign_in_ttl_minutes,
        change_password_ttl_minutes,
        refresh_ttl_days,
    })
}

fn i64_from_env(key: &str) -> Result<Option<i64>> {
    match env::var(key) {
        Ok(value) => {
            let parsed = value
                .trim()
                .parse::<i64>()
                .with_context(|| format!("Failed to parse {key} as an integer"))?;
            Ok(Some(parsed))
        }
        Err(_) => Ok(None),
    }
}
