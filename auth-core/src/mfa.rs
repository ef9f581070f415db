use data_encoding::BASE32_NOPAD;
use hmac::{Hmac, Mac};
use rand::{rngs::OsRng, RngCore};
use sha1::Sha1;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::warn;
use urlencoding::encode;

use common_crypto::SecretCodec;

use crate::error::AuthResult;
use crate::store::UserStore;

type HmacSha1 = Hmac<Sha1>;

const TOTP_SECRET_LEN: usize = 20;
const TOTP_PERIOD: u64 = 30;
const TOTP_VARIANCE: [i32; 3] = [-1, 0, 1];
const TOTP_DIGITS: u32 = 6;

/// Generate a fresh TOTP secret: 20 random bytes, base32 without padding.
/// Printable and whitespace-free by construction.
pub fn generate_totp_secret() -> String {
    let mut secret = [0u8; TOTP_SECRET_LEN];
    OsRng.fill_bytes(&mut secret);
    BASE32_NOPAD.encode(&secret)
}

/// Encrypt a freshly generated secret and make sure no other user already
/// stores the same ciphertext. On a collision the secret is regenerated
/// exactly once and accepted even if it still collides; the deterministic
/// codec makes ciphertext equality equivalent to secret equality. Returns
/// the plaintext secret and its ciphertext.
pub async fn enroll_secret(
    codec: &SecretCodec,
    users: &dyn UserStore,
    generate: impl Fn() -> String,
) -> AuthResult<(String, String)> {
    let secret = generate();
    let encrypted = codec.encrypt(&secret);

    if users
        .find_by_encrypted_mfa_secret(&encrypted)
        .await?
        .is_some()
    {
        warn!("encrypted MFA secret collision detected, regenerating once");
        let retry = generate();
        let encrypted = codec.encrypt(&retry);
        return Ok((retry, encrypted));
    }

    Ok((secret, encrypted))
}

pub fn build_otpauth_uri(issuer: &str, account_name: &str, secret: &str) -> String {
    let issuer_enc = encode(issuer);
    let account_enc = encode(account_name);
    format!(
        "otpauth://totp/{issuer_enc}:{account_enc}?secret={secret}&issuer={issuer_enc}&algorithm=SHA1&digits={TOTP_DIGITS}&period={TOTP_PERIOD}"
    )
}

/// Manual entry form of the secret: the base32 string in blocks of four.
pub fn manual_entry_code(secret: &str) -> String {
    secret
        .as_bytes()
        .chunks(4)
        .map(|chunk| std::str::from_utf8(chunk).unwrap_or_default())
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn normalize_totp_code(input: &str) -> Option<String> {
    let digits = input
        .chars()
        .filter(|ch| ch.is_ascii_digit())
        .collect::<String>();

    if digits.len() == TOTP_DIGITS as usize {
        Some(digits)
    } else {
        None
    }
}

/// The code a correct authenticator would display at `unix_time`. `None`
/// when the secret is not valid base32.
pub fn totp_code_at(secret: &str, unix_time: u64) -> Option<String> {
    let secret_bytes = decode_secret(secret)?;
    let counter = unix_time / TOTP_PERIOD;
    Some(format_code(hotp(&secret_bytes, counter)))
}

pub fn verify_totp_code(secret: &str, code: &str) -> bool {
    let now = match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(duration) => duration.as_secs(),
        Err(_) => return false,
    };
    verify_totp_code_at(secret, code, now)
}

/// Check `code` against the window containing `unix_time` and the adjacent
/// windows (standard clock-skew tolerance). A mismatch is `false`, never an
/// error: a bad code is an expected business outcome.
pub fn verify_totp_code_at(secret: &str, code: &str, unix_time: u64) -> bool {
    let secret_bytes = match decode_secret(secret) {
        Some(bytes) => bytes,
        None => return false,
    };

    let current_counter = unix_time / TOTP_PERIOD;

    TOTP_VARIANCE.iter().any(|offset| {
        let counter = if *offset < 0 {
            current_counter.saturating_sub(offset.unsigned_abs() as u64)
        } else {
            current_counter.saturating_add(*offset as u64)
        };

        format_code(hotp(&secret_bytes, counter)) == code
    })
}

fn decode_secret(secret: &str) -> Option<Vec<u8>> {
    BASE32_NOPAD
        .decode(secret.trim().to_ascii_uppercase().as_bytes())
        .ok()
}

fn format_code(code: u32) -> String {
    format!("{:0width$}", code, width = TOTP_DIGITS as usize)
}

fn hotp(secret: &[u8], counter: u64) -> u32 {
    let mut mac = HmacSha1::new_from_slice(secret).expect("HMAC can take key of any size");
    mac.update(&counter.to_be_bytes());
    let result = mac.finalize().into_bytes();

    let offset = (result[result.len() - 1] & 0x0f) as usize;
    let code = ((result[offset] as u32 & 0x7f) << 24)
        | ((result[offset + 1] as u32) << 16)
        | ((result[offset + 2] as u32) << 8)
        | (result[offset + 3] as u32);

    code % 10u32.pow(TOTP_DIGITS)
}
