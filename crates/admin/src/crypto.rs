//! Encryption of Shopify access tokens at rest.
//!
//! Tokens are sealed with AES-256-GCM under the key from
//! `SHOPIFY_ENCRYPTION_KEY`. Each ciphertext carries its own random 96-bit
//! nonce and is stored as `base64(nonce || ciphertext)`.

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::{Engine, engine::general_purpose::STANDARD};
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;

/// Errors from sealing or opening stored secrets.
#[derive(Debug, Error)]
pub enum CipherError {
    #[error("invalid encryption key: {0}")]
    InvalidKey(String),
    #[error("encryption failed")]
    Encrypt,
    #[error("stored secret could not be decrypted")]
    Decrypt,
}

/// AES-256-GCM cipher for short secrets.
#[derive(Clone)]
pub struct TokenCipher {
    cipher: Aes256Gcm,
}

impl std::fmt::Debug for TokenCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCipher")
            .field("key", &"[REDACTED]")
            .finish()
    }
}

impl TokenCipher {
    /// Build a cipher from a base64-encoded 32-byte key.
    ///
    /// # Errors
    ///
    /// Returns `CipherError::InvalidKey` if the key is not valid base64 or
    /// does not decode to exactly 32 bytes.
    pub fn from_base64_key(key: &SecretString) -> Result<Self, CipherError> {
        let raw = STANDARD
            .decode(key.expose_secret().trim())
            .map_err(|e| CipherError::InvalidKey(e.to_string()))?;
        if raw.len() != KEY_LEN {
            return Err(CipherError::InvalidKey(format!(
                "expected {KEY_LEN} bytes, got {}",
                raw.len()
            )));
        }

        let key = Key::<Aes256Gcm>::from_slice(&raw);
        Ok(Self {
            cipher: Aes256Gcm::new(key),
        })
    }

    /// Encrypt `plaintext` under a fresh nonce.
    ///
    /// # Errors
    ///
    /// Returns `CipherError::Encrypt` if the AEAD operation fails.
    pub fn encrypt(&self, plaintext: &str) -> Result<String, CipherError> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|_| CipherError::Encrypt)?;

        let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        sealed.extend_from_slice(&nonce);
        sealed.extend_from_slice(&ciphertext);
        Ok(STANDARD.encode(sealed))
    }

    /// Decrypt a value produced by [`TokenCipher::encrypt`].
    ///
    /// # Errors
    ///
    /// Returns `CipherError::Decrypt` if the value is malformed, was sealed
    /// under another key, or has been tampered with.
    pub fn decrypt(&self, sealed: &str) -> Result<SecretString, CipherError> {
        let bytes = STANDARD.decode(sealed).map_err(|_| CipherError::Decrypt)?;
        if bytes.len() <= NONCE_LEN {
            return Err(CipherError::Decrypt);
        }

        let (nonce, ciphertext) = bytes.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| CipherError::Decrypt)?;
        let text = String::from_utf8(plaintext).map_err(|_| CipherError::Decrypt)?;
        Ok(SecretString::from(text))
    }
}
