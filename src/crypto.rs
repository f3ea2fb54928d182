//! The pluggable crypto seam (spec §6): hashing for `content_hash` and an
//! AEAD for payload secrecy. The core only ever treats payloads as
//! opaque bytes; secrecy is the embedding application's concern.

use crate::error::CryptoError;
use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use sha2::{Digest, Sha256};

/// A pluggable crypto provider. Applications may supply their own
/// implementation; [`DefaultCryptoProvider`] exists so tests and the
/// harness don't need a second crate.
pub trait CryptoProvider: Send + Sync {
    fn hash(&self, bytes: &[u8]) -> [u8; 32];
    fn encrypt(&self, key: &[u8; 32], nonce: &[u8; 12], plaintext: &[u8], ad: &[u8]) -> Vec<u8>;
    fn decrypt(
        &self,
        key: &[u8; 32],
        nonce: &[u8; 12],
        ciphertext: &[u8],
        ad: &[u8],
    ) -> Result<Vec<u8>, CryptoError>;
}

/// SHA-256 for hashing, AES-256-GCM for AEAD.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultCryptoProvider;

impl DefaultCryptoProvider {
    pub fn new() -> Self {
        Self
    }
}

impl CryptoProvider for DefaultCryptoProvider {
    fn hash(&self, bytes: &[u8]) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        hasher.finalize().into()
    }

    fn encrypt(&self, key: &[u8; 32], nonce: &[u8; 12], plaintext: &[u8], ad: &[u8]) -> Vec<u8> {
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
        cipher
            .encrypt(
                Nonce::from_slice(nonce),
                Payload {
                    msg: plaintext,
                    aad: ad,
                },
            )
            .expect("AES-256-GCM encryption with fixed-size key/nonce cannot fail")
    }

    fn decrypt(
        &self,
        key: &[u8; 32],
        nonce: &[u8; 12],
        ciphertext: &[u8],
        ad: &[u8],
    ) -> Result<Vec<u8>, CryptoError> {
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
        cipher
            .decrypt(
                Nonce::from_slice(nonce),
                Payload {
                    msg: ciphertext,
                    aad: ad,
                },
            )
            .map_err(|_| CryptoError::AuthFailed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_deterministic() {
        let c = DefaultCryptoProvider::new();
        assert_eq!(c.hash(b"hello"), c.hash(b"hello"));
        assert_ne!(c.hash(b"hello"), c.hash(b"world"));
    }

    #[test]
    fn encrypt_decrypt_round_trip() {
        let c = DefaultCryptoProvider::new();
        let key = [7u8; 32];
        let nonce = [1u8; 12];
        let plaintext = b"rescue team inbound";
        let ciphertext = c.encrypt(&key, &nonce, plaintext, b"ad");
        let decrypted = c.decrypt(&key, &nonce, &ciphertext, b"ad").unwrap();
        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn decrypt_rejects_tampered_ciphertext() {
        let c = DefaultCryptoProvider::new();
        let key = [7u8; 32];
        let nonce = [1u8; 12];
        let mut ciphertext = c.encrypt(&key, &nonce, b"payload", b"ad");
        ciphertext[0] ^= 0xFF;
        assert!(c.decrypt(&key, &nonce, &ciphertext, b"ad").is_err());
    }
}
