//! At-rest sealing of the session token with AES-256-GCM.
//!
//! A sealed value is the base64 encoding of `nonce || ciphertext`, with a
//! fresh random 96-bit nonce per seal.

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::error::StorageError;

const NONCE_LEN: usize = 12;

/// Symmetric cipher for values persisted at rest.
#[derive(Clone)]
pub struct TokenCipher {
    cipher: Aes256Gcm,
}

impl std::fmt::Debug for TokenCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCipher").finish_non_exhaustive()
    }
}

impl TokenCipher {
    /// Cipher over a caller-supplied 256-bit key.
    pub fn new(key: [u8; 32]) -> Self {
        Self {
            cipher: Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key)),
        }
    }

    /// Cipher over a random key that lives only as long as this process.
    pub fn ephemeral() -> Self {
        Self {
            cipher: Aes256Gcm::new(&Aes256Gcm::generate_key(&mut OsRng)),
        }
    }

    /// Encrypt `plaintext` for storage.
    pub fn seal(&self, plaintext: &str) -> Result<String, StorageError> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|_| StorageError::Cipher("encryption failed".into()))?;

        let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        sealed.extend_from_slice(&nonce);
        sealed.extend_from_slice(&ciphertext);
        Ok(STANDARD.encode(sealed))
    }

    /// Decrypt a value produced by [`seal`](TokenCipher::seal).
    ///
    /// # Errors
    ///
    /// [`StorageError::Cipher`] if the value is not valid base64, is
    /// truncated, or was sealed under a different key.
    pub fn unseal(&self, sealed: &str) -> Result<String, StorageError> {
        let bytes = STANDARD
            .decode(sealed)
            .map_err(|e| StorageError::Cipher(e.to_string()))?;
        if bytes.len() < NONCE_LEN {
            return Err(StorageError::Cipher("sealed value is truncated".into()));
        }

        let (nonce, ciphertext) = bytes.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| StorageError::Cipher("decryption failed".into()))?;
        String::from_utf8(plaintext).map_err(|e| StorageError::Cipher(e.to_string()))
    }
}
