//! # Snapshot Encryption
//!
//! RSA-OAEP with SHA-256 as the core [`Encryptor`], and a PEM [`KeyLoader`].
//!
//! OAEP limits one message to `key_size - 2 * 32 - 2` bytes, so longer
//! plaintexts are split into blocks of that size. The ciphertext is the
//! concatenation of the encrypted blocks, each exactly `key_size` bytes.

use memlink_core::{Encryptor, KeyLoader, MemlinkError};
use rsa::pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey};
use rsa::traits::PublicKeyParts;
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;
use std::path::Path;

/// Size of a SHA-256 digest in bytes.
const DIGEST_SIZE: usize = 32;

/// Encrypts under an RSA public key with OAEP/SHA-256 padding.
#[derive(Debug, Clone)]
pub struct RsaEncryptor {
    key: RsaPublicKey,
}

impl RsaEncryptor {
    pub fn new(key: RsaPublicKey) -> Self {
        Self { key }
    }

    /// Parse a PEM key.
    ///
    /// Accepts an SPKI or PKCS#1 public key, or a PKCS#8 or PKCS#1 private
    /// key whose public half is used.
    pub fn from_pem(pem: &str) -> Result<Self, MemlinkError> {
        let key = RsaPublicKey::from_public_key_pem(pem)
            .or_else(|_| RsaPublicKey::from_pkcs1_pem(pem))
            .or_else(|_| RsaPrivateKey::from_pkcs8_pem(pem).map(|k| k.to_public_key()))
            .or_else(|_| RsaPrivateKey::from_pkcs1_pem(pem).map(|k| k.to_public_key()))
            .map_err(|e| MemlinkError::Encryption(format!("Unrecognised RSA key: {}", e)))?;
        Ok(Self::new(key))
    }

    /// Modulus size in bytes; also the size of each ciphertext block.
    pub fn block_size(&self) -> usize {
        self.key.size()
    }

    /// Largest plaintext block OAEP/SHA-256 accepts for this key.
    pub fn max_message_size(&self) -> usize {
        self.block_size().saturating_sub(2 * DIGEST_SIZE + 2)
    }
}

impl Encryptor for RsaEncryptor {
    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, MemlinkError> {
        let max = self.max_message_size();
        if max == 0 {
            return Err(MemlinkError::Encryption(format!(
                "{}-bit key is too small for OAEP/SHA-256",
                self.block_size() * 8
            )));
        }

        let mut rng = rand::thread_rng();
        let blocks = plaintext.len().div_ceil(max).max(1);
        let mut ciphertext = Vec::with_capacity(blocks * self.block_size());

        let mut encrypt_block = |block: &[u8]| -> Result<(), MemlinkError> {
            let encrypted = self
                .key
                .encrypt(&mut rng, Oaep::new::<Sha256>(), block)
                .map_err(|e| MemlinkError::Encryption(e.to_string()))?;
            ciphertext.extend_from_slice(&encrypted);
            Ok(())
        };

        if plaintext.is_empty() {
            encrypt_block(&[])?;
        }
        for block in plaintext.chunks(max) {
            encrypt_block(block)?;
        }

        Ok(ciphertext)
    }
}

/// Loads [`RsaEncryptor`]s from PEM files.
#[derive(Debug, Clone, Copy, Default)]
pub struct PemKeyLoader;

impl KeyLoader for PemKeyLoader {
    type Encryptor = RsaEncryptor;

    fn load(&self, path: &Path) -> Result<RsaEncryptor, MemlinkError> {
        let pem = std::fs::read_to_string(path).map_err(|e| MemlinkError::storage(path, e))?;
        let encryptor = RsaEncryptor::from_pem(&pem)?;
        tracing::debug!(
            "Loaded {}-bit RSA key from {}",
            encryptor.block_size() * 8,
            path.display()
        );
        Ok(encryptor)
    }
}

// =============================================================================
// TESTS
// =============================================================================
