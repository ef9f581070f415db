use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine as _;
use sha1::Sha1;
use thiserror::Error;
use zeroize::Zeroizing;

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

const KEY_LENGTH: usize = 32;
const IV_LENGTH: usize = 16;
const KDF_ROUNDS: u32 = 1000;

/// Errors produced by the secret codec.
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("base64 decode error: {0}")]
    Base64Decode(#[from] base64::DecodeError),
    #[error("ciphertext has invalid length or padding")]
    InvalidCiphertext,
    #[error("decrypted secret is not valid UTF-8")]
    InvalidUtf8,
}

/// Encrypts and decrypts MFA secrets at rest.
///
/// Key material is derived once from a deployment-wide passphrase and salt
/// with PBKDF2-HMAC-SHA1 (1000 rounds): 48 bytes split into an AES-256 key
/// and a 128-bit IV. Because the IV is fixed per deployment, encryption is
/// deterministic: equal plaintexts yield equal ciphertexts. The enrollment
/// uniqueness check relies on that equality, so the property is kept on
/// purpose; a store-side deterministic hash column would be the migration
/// path if per-record IVs are ever wanted.
pub struct SecretCodec {
    key: Zeroizing<[u8; KEY_LENGTH]>,
    iv: Zeroizing<[u8; IV_LENGTH]>,
}

impl SecretCodec {
    pub fn new(passphrase: &str, salt: &str) -> Self {
        let mut derived = Zeroizing::new([0u8; KEY_LENGTH + IV_LENGTH]);
        pbkdf2::pbkdf2_hmac::<Sha1>(
            passphrase.as_bytes(),
            salt.as_bytes(),
            KDF_ROUNDS,
            &mut *derived,
        );

        let mut key = Zeroizing::new([0u8; KEY_LENGTH]);
        let mut iv = Zeroizing::new([0u8; IV_LENGTH]);
        key.copy_from_slice(&derived[..KEY_LENGTH]);
        iv.copy_from_slice(&derived[KEY_LENGTH..]);

        Self { key, iv }
    }

    /// Encrypt a plaintext secret, returning base64 ciphertext.
    pub fn encrypt(&self, plaintext: &str) -> String {
        let cipher = Aes256CbcEnc::new((&*self.key).into(), (&*self.iv).into());
        let ciphertext = cipher.encrypt_padded_vec_mut::<Pkcs7>(plaintext.as_bytes());
        BASE64_STANDARD.encode(ciphertext)
    }

    /// Decrypt base64 ciphertext back into the plaintext secret.
    pub fn decrypt(&self, ciphertext: &str) -> Result<String, CryptoError> {
        let encrypted = BASE64_STANDARD.decode(ciphertext.trim())?;
        let cipher = Aes256CbcDec::new((&*self.key).into(), (&*self.iv).into());
        let plaintext = cipher
            .decrypt_padded_vec_mut::<Pkcs7>(&encrypted)
            .map_err(|_| CryptoError::InvalidCiphertext)?;
        String::from_utf8(plaintext).map_err(|_| CryptoError::InvalidUtf8)
    }
}

impl std::fmt::Debug for SecretCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretCodec")
            .field("key", &"***redacted***")
            .field("iv", &"***redacted***")
            .finish()
    }
}
