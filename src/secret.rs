//! Stored mailbox passwords are AES-256-GCM sealed with a key derived from a
//! process-wide secret (SHA-256 of the secret text). Stored form is
//! base64(nonce || ciphertext), 12-byte nonce.

use aes_gcm::aead::rand_core::RngCore;
use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use sha2::{Digest, Sha256};

use crate::error::MailError;

const NONCE_SIZE: usize = 12;

/// Recovers a plaintext password from its stored form.
pub trait Decrypt: Send + Sync {
    fn decrypt(&self, ciphertext: &str) -> Result<String, MailError>;
}

pub struct AesGcmSecret {
    cipher: Aes256Gcm,
}

impl AesGcmSecret {
    pub fn new(secret: &str) -> Result<Self, MailError> {
        if secret.is_empty() {
            return Err(MailError::config("encryption key is empty"));
        }
        let key: [u8; 32] = Sha256::digest(secret.as_bytes()).into();
        Ok(Self {
            cipher: Aes256Gcm::new(&key.into()),
        })
    }

    pub fn encrypt(&self, plaintext: &str) -> Result<String, MailError> {
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        OsRng.fill_bytes(&mut nonce_bytes);
        let ciphertext = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), plaintext.as_bytes())
            .map_err(|_| MailError::config("failed to encrypt password"))?;

        let mut combined = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        combined.extend_from_slice(&nonce_bytes);
        combined.extend_from_slice(&ciphertext);
        Ok(BASE64.encode(combined))
    }
}

impl Decrypt for AesGcmSecret {
    fn decrypt(&self, ciphertext: &str) -> Result<String, MailError> {
        if ciphertext.is_empty() {
            return Err(MailError::Decryption);
        }
        let combined = BASE64.decode(ciphertext).map_err(|_| MailError::Decryption)?;
        if combined.len() < NONCE_SIZE {
            return Err(MailError::Decryption);
        }
        let (nonce, sealed) = combined.split_at(NONCE_SIZE);
        let plain = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), sealed)
            .map_err(|_| MailError::Decryption)?;
        String::from_utf8(plain).map_err(|_| MailError::Decryption)
    }
}

/// Stable, non-reversible tag of a stored ciphertext, used to notice
/// credential changes without keeping the password around.
pub fn fingerprint(ciphertext: &str) -> String {
    let digest = Sha256::digest(ciphertext.as_bytes());
    digest.iter().take(8).map(|b| format!("{b:02x}")).collect()
}
