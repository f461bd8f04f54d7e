// =============================================================================
// Encryption — symmetric envelope for stored third-party credentials
// =============================================================================
//
// The PDE never touches user credentials directly; this interface exists so
// the Adapter may load exchange credentials for signed requests. Keys are
// derived from an operator-provided passphrase via PBKDF2-HMAC-SHA256 (fixed
// salt, 100k iterations, 32-byte key); ciphertext is URL-safe-base64 around
// an AES-GCM authenticated envelope (12-byte nonce prefix, then ciphertext).
// =============================================================================

use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use sha2::Sha256;
use tracing::error;

use crate::error::{Error, Result};

const SALT: &[u8] = b"launch-sentinel-salt";
const PBKDF2_ITERATIONS: u32 = 100_000;
const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;

pub struct Encryption {
    cipher: Aes256Gcm,
}

impl Encryption {
    pub fn new(passphrase: &str) -> Self {
        let mut key_bytes = [0u8; KEY_LEN];
        pbkdf2_hmac::<Sha256>(passphrase.as_bytes(), SALT, PBKDF2_ITERATIONS, &mut key_bytes);
        let key = Key::<Aes256Gcm>::from_slice(&key_bytes);
        Self {
            cipher: Aes256Gcm::new(key),
        }
    }

    pub fn encrypt(&self, plaintext: &str) -> Result<String> {
        if plaintext.is_empty() {
            return Ok(String::new());
        }

        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|e| Error::Internal(format!("encryption failed: {e}")))?;

        let mut envelope = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        envelope.extend_from_slice(&nonce_bytes);
        envelope.extend_from_slice(&ciphertext);

        Ok(URL_SAFE_NO_PAD.encode(envelope))
    }

    pub fn decrypt(&self, ciphertext: &str) -> Result<String> {
        if ciphertext.is_empty() {
            return Ok(String::new());
        }

        let envelope = URL_SAFE_NO_PAD
            .decode(ciphertext)
            .map_err(|e| Error::Validation(format!("invalid ciphertext encoding: {e}")))?;

        if envelope.len() < NONCE_LEN {
            return Err(Error::Validation("ciphertext too short".into()));
        }

        let (nonce_bytes, body) = envelope.split_at(NONCE_LEN);
        let nonce = Nonce::from_slice(nonce_bytes);

        let plaintext = self.cipher.decrypt(nonce, body).map_err(|e| {
            error!(error = %e, "failed to decrypt credential");
            Error::Validation("failed to decrypt data".into())
        })?;

        String::from_utf8(plaintext).map_err(|e| Error::Validation(format!("decrypted data not UTF-8: {e}")))
    }
}

/// Decrypted exchange credentials, loaded once at process start.
pub struct ApiCredentials {
    pub api_key: Option<String>,
    pub secret_key: Option<String>,
}

/// Load API credentials from the environment, decrypting them if an
/// `ENCRYPTION_KEY` passphrase is configured and the stored values look like
/// envelopes; otherwise passes plaintext through unchanged.
pub fn load_api_credentials(cfg: &crate::config::Config) -> ApiCredentials {
    match (&cfg.encryption_key, &cfg.mexc_api_key, &cfg.mexc_secret_key) {
        (Some(passphrase), api_key, secret_key) => {
            let enc = Encryption::new(passphrase);
            ApiCredentials {
                api_key: api_key.as_deref().and_then(|v| enc.decrypt(v).ok()).filter(|s| !s.is_empty()),
                secret_key: secret_key
                    .as_deref()
                    .and_then(|v| enc.decrypt(v).ok())
                    .filter(|s| !s.is_empty()),
            }
        }
        (None, api_key, secret_key) => ApiCredentials {
            api_key: api_key.clone(),
            secret_key: secret_key.clone(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_encrypt_decrypt() {
        let enc = Encryption::new("test-passphrase");
        let ciphertext = enc.encrypt("my-secret-key").unwrap();
        assert_ne!(ciphertext, "my-secret-key");
        assert_eq!(enc.decrypt(&ciphertext).unwrap(), "my-secret-key");
    }

    #[test]
    fn empty_plaintext_roundtrips_to_empty() {
        let enc = Encryption::new("test-passphrase");
        assert_eq!(enc.encrypt("").unwrap(), "");
        assert_eq!(enc.decrypt("").unwrap(), "");
    }

    #[test]
    fn wrong_passphrase_fails_to_decrypt() {
        let enc1 = Encryption::new("passphrase-one");
        let enc2 = Encryption::new("passphrase-two");
        let ciphertext = enc1.encrypt("secret").unwrap();
        assert!(enc2.decrypt(&ciphertext).is_err());
    }
}
