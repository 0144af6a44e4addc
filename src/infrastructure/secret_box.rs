// Encryption at rest for upstream API keys - AES-256-GCM, base64 encoded
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use anyhow::{anyhow, Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;

const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;

#[derive(Clone)]
pub struct SecretBox {
    cipher: Aes256Gcm,
}

/// Fresh random key, base64 encoded, for `auth.encryption_key`
pub fn generate_key() -> String {
    STANDARD.encode(rand::random::<[u8; KEY_LEN]>())
}

impl SecretBox {
    pub fn from_base64_key(key: &str) -> Result<Self> {
        let bytes = STANDARD
            .decode(key.trim())
            .context("auth.encryption_key is not valid base64")?;
        if bytes.len() != KEY_LEN {
            anyhow::bail!("auth.encryption_key must decode to {} bytes, got {}", KEY_LEN, bytes.len());
        }
        let cipher = Aes256Gcm::new_from_slice(&bytes).map_err(|e| anyhow!("Invalid encryption key: {}", e))?;
        Ok(Self { cipher })
    }

    /// Output is base64 of `nonce || ciphertext`
    pub fn seal(&self, plaintext: &str) -> Result<String> {
        let nonce = rand::random::<[u8; NONCE_LEN]>();
        let ciphertext = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext.as_bytes())
            .map_err(|_| anyhow!("Failed to encrypt secret"))?;

        let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        sealed.extend_from_slice(&nonce);
        sealed.extend_from_slice(&ciphertext);
        Ok(STANDARD.encode(sealed))
    }

    pub fn open(&self, sealed: &str) -> Result<String> {
        let bytes = STANDARD.decode(sealed).context("Sealed secret is not valid base64")?;
        if bytes.len() < NONCE_LEN {
            anyhow::bail!("Sealed secret is truncated");
        }
        let (nonce, ciphertext) = bytes.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| anyhow!("Failed to decrypt secret, wrong key or corrupted data"))?;

        String::from_utf8(plaintext).context("Decrypted secret is not UTF-8")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sealed_key_opens_and_hides_plaintext() {
        let secrets = SecretBox::from_base64_key(&generate_key()).unwrap();
        let sealed = secrets.seal("sk-live-1234").unwrap();

        assert!(!sealed.contains("sk-live-1234"));
        assert_ne!(sealed, secrets.seal("sk-live-1234").unwrap());
        assert_eq!(secrets.open(&sealed).unwrap(), "sk-live-1234");
    }

    #[test]
    fn test_wrong_key_or_tampering_fails() {
        let secrets = SecretBox::from_base64_key(&generate_key()).unwrap();
        let sealed = secrets.seal("sk-live-1234").unwrap();

        let other = SecretBox::from_base64_key(&generate_key()).unwrap();
        assert!(other.open(&sealed).is_err());

        let mut bytes = STANDARD.decode(&sealed).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 1;
        assert!(secrets.open(&STANDARD.encode(bytes)).is_err());
        assert!(secrets.open("c2hvcnQ=").is_err());
    }

    #[test]
    fn test_key_must_be_32_bytes() {
        assert!(SecretBox::from_base64_key("not base64!").is_err());
        assert!(SecretBox::from_base64_key(&STANDARD.encode([0u8; 16])).is_err());
        assert!(SecretBox::from_base64_key(&STANDARD.encode([0u8; 32])).is_ok());
    }
}
