use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Credential record owned by the external user store.
///
/// The encrypted MFA secret is stored and transported only as ciphertext;
/// the plaintext exists transiently in process memory during enrollment and
/// verification.
#[derive(Debug, Clone)]
pub struct UserRecord {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub active: bool,
    pub role: String,
    pub first_sign_in: bool,
    pub mfa_verified: bool,
    pub encrypted_mfa_secret: Option<String>,
    pub qr_code_uri: Option<String>,
    pub manual_entry_code: Option<String>,
}

/// Server-persisted refresh session. At most one non-expired session exists
/// per user; the token string is the lookup key on renewal.
#[derive(Debug, Clone)]
pub struct RefreshSession {
    pub id: Uuid,
    pub token: String,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

/// Display-once artifacts handed back from MFA enrollment. The otpauth URI
/// and manual entry code derive from the plaintext secret and are meant to
/// be shown to the user exactly once; only the ciphertext is persisted.
#[derive(Debug, Clone, Serialize)]
pub struct MfaEnrollment {
    pub encrypted_secret: String,
    pub otpauth_uri: String,
    pub manual_entry_code: String,
}

/// Outcome of a successful password login: the MFA challenge token plus
/// enrollment flags as response metadata (not token claims).
#[derive(Debug, Serialize)]
pub struct LoginChallenge {
    pub mfa_token: String,
    pub first_sign_in: bool,
    pub mfa_verified: bool,
}

#[derive(Debug, Serialize)]
pub struct SessionTokens {
    pub access_token: String,
    pub refresh_token: String,
}

/// Field set written back to the user store when enrollment completes.
#[derive(Debug, Clone)]
pub struct MfaFieldsUpdate {
    pub user_id: Uuid,
    pub encrypted_secret: String,
    pub qr_code_uri: String,
    pub manual_entry_code: String,
    pub first_sign_in: bool,
    pub mfa_verified: bool,
}

/// Emails are unique case-insensitively; every lookup and claim comparison
/// goes through this normalization.
pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_ascii_lowercase()
}
