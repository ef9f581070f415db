use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine as _;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand_core::{OsRng, RngCore};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::error::{AuthError, AuthResult};
use crate::model::UserRecord;

const REFRESH_TOKEN_BYTES: usize = 64;

/// Which step of the authentication flow minted a token. Every consuming
/// operation names the purpose it expects; a structurally valid token of
/// the wrong purpose is rejected identically to an invalid one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenPurpose {
    #[serde(rename = "mfa-token")]
    MfaToken,
    #[serde(rename = "access-token")]
    AccessToken,
    #[serde(rename = "change-password-token")]
    ChangePasswordToken,
}

impl TokenPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenPurpose::MfaToken => "mfa-token",
            TokenPurpose::AccessToken => "access-token",
            TokenPurpose::ChangePasswordToken => "change-password-token",
        }
    }
}

/// Signed claim bundle. Tokens are stateless and never persisted;
/// invalidation is by expiry alone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject email.
    pub sub: String,
    /// Subject user id.
    pub sid: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    pub purpose: TokenPurpose,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
}

/// Mints and verifies the purpose-scoped bearer tokens. One symmetric HS256
/// key and one issuer identity cover all claim-bundle purposes; refresh
/// tokens are opaque random strings validated purely by store lookup.
pub struct TokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    mfa_ttl: Duration,
    mfa_first_sign_in_ttl: Duration,
    access_ttl: Duration,
    change_password_ttl: Duration,
}

impl TokenIssuer {
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(config.signing_key.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.signing_key.as_bytes()),
            issuer: config.token_issuer.clone(),
            mfa_ttl: Duration::minutes(config.mfa_ttl_minutes),
            mfa_first_sign_in_ttl: Duration::minutes(config.mfa_first_sign_in_ttl_minutes),
            access_ttl: Duration::minutes(config.access_ttl_minutes),
            change_password_ttl: Duration::minutes(config.change_password_ttl_minutes),
        }
    }

    /// MFA challenge token. First sign-ins get the longer window so the user
    /// has time to finish authenticator enrollment.
    pub fn issue_mfa_token(&self, user: &UserRecord) -> AuthResult<String> {
        let ttl = if user.first_sign_in {
            self.mfa_first_sign_in_ttl
        } else {
            self.mfa_ttl
        };
        self.sign(user, TokenPurpose::MfaToken, None, ttl)
    }

    pub fn issue_access_token(&self, user: &UserRecord) -> AuthResult<String> {
        self.sign(
            user,
            TokenPurpose::AccessToken,
            Some(user.role.clone()),
            self.access_ttl,
        )
    }

    pub fn issue_change_password_token(&self, user: &UserRecord) -> AuthResult<String> {
        self.sign(
            user,
            TokenPurpose::ChangePasswordToken,
            None,
            self.change_password_ttl,
        )
    }

    fn sign(
        &self,
        user: &UserRecord,
        purpose: TokenPurpose,
        role: Option<String>,
        ttl: Duration,
    ) -> AuthResult<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: user.email.clone(),
            sid: user.id,
            role,
            purpose,
            iss: self.issuer.clone(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        };

        Ok(encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &self.encoding_key,
        )?)
    }

    /// Opaque refresh token: 64 bytes from a CSPRNG, base64-encoded. Carries
    /// no claims; validity is established by the session store.
    pub fn generate_refresh_token() -> String {
        let mut bytes = [0u8; REFRESH_TOKEN_BYTES];
        OsRng.fill_bytes(&mut bytes);
        BASE64_STANDARD.encode(bytes)
    }

    /// Validate signature, expiry and issuer, then require the exact
    /// expected purpose. Any failure collapses to `Unauthorized` so a
    /// wrong-purpose token is indistinguishable from an invalid one.
    pub fn verify(&self, token: &str, expected: TokenPurpose) -> AuthResult<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[self.issuer.as_str()]);

        let data = decode::<Claims>(token, &self.decoding_key, &validation).map_err(|err| {
            debug!(error = %err, "token failed validation");
            AuthError::Unauthorized
        })?;

        match (data.claims.purpose, expected) {
            (TokenPurpose::MfaToken, TokenPurpose::MfaToken)
            | (TokenPurpose::AccessToken, TokenPurpose::AccessToken)
            | (TokenPurpose::ChangePasswordToken, TokenPurpose::ChangePasswordToken) => {
                Ok(data.claims)
            }
            (found, _) => {
                debug!(found = found.as_str(), expected = expected.as_str(), "token purpose mismatch");
                Err(AuthError::Unauthorized)
            }
        }
    }
}
