//! Crypto & key store (C2, spec §4.2).

pub mod cipher;
pub mod kdf;
pub mod keystore;
pub mod signature;

use std::fmt;

pub use cipher::CipherAlgorithm;
pub use keystore::{generate_rsa_keypair, PrivateKeyStore, PublicKeyStore};
pub use signature::{SigningKey, VerifyingKey};

use crate::error::{BarError, ChunkError};

/// A secret byte buffer that overwrites itself on drop and never prints its
/// contents, even via `{:?}` — the teacher's snapshot predates the
/// `zeroize` crate, so this is a small hand-rolled equivalent rather than an
/// added dependency for one struct.
pub struct SecretBytes(Vec<u8>);

impl SecretBytes {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Drop for SecretBytes {
    fn drop(&mut self) {
        for b in self.0.iter_mut() {
            *b = 0;
        }
    }
}

impl fmt::Debug for SecretBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretBytes({} bytes, redacted)", self.0.len())
    }
}

/// An operator-supplied password, rejected if empty whenever a crypt
/// algorithm is configured (§4.2 "Password sources").
pub struct Password(SecretBytes);

impl Password {
    pub fn new(bytes: Vec<u8>) -> Result<Self, BarError> {
        if bytes.is_empty() {
            return Err(BarError::PasswordRequired);
        }
        Ok(Self(SecretBytes::new(bytes)))
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_slice()
    }
}

/// Everything the chunk codec needs to encrypt/decrypt one archive's
/// payloads: the chosen cipher, the derived master key, and the salt that
/// feeds per-chunk IV derivation (§4.2, §4.2.1). Generalizes the teacher's
/// `CryptConfig` (`src/backup/data_blob.rs`) from one fixed cipher to the
/// full table.
pub struct CryptConfig {
    pub cipher: CipherAlgorithm,
    key: SecretBytes,
    salt: Vec<u8>,
}

impl CryptConfig {
    pub fn new(cipher: CipherAlgorithm, key: Vec<u8>, salt: Vec<u8>) -> Result<Self, BarError> {
        if cipher != CipherAlgorithm::None && key.len() != cipher.key_len() {
            return Err(BarError::KeyFormat(format!(
                "{:?} requires a {}-byte key, got {}",
                cipher,
                cipher.key_len(),
                key.len()
            )));
        }
        Ok(Self {
            cipher,
            key: SecretBytes::new(key),
            salt,
        })
    }

    /// Derives this archive's master key from a password plus salt, as read
    /// back from (or freshly written to) the archive's `SALT` chunk.
    pub fn from_password(cipher: CipherAlgorithm, password: &Password, salt: Vec<u8>) -> Result<Self, BarError> {
        let key = kdf::derive_master_key(password.as_bytes(), &salt, cipher.key_len())?;
        Self::new(cipher, key, salt)
    }

    /// Encrypts one chunk's payload, deriving that chunk's IV from its
    /// byte offset (§4.2 "per-chunk IV").
    pub fn encrypt_chunk(&self, chunk_offset: u64, plaintext: &[u8]) -> Result<Vec<u8>, BarError> {
        if self.cipher == CipherAlgorithm::None {
            return Ok(plaintext.to_vec());
        }
        let iv = kdf::derive_chunk_iv(self.key.as_slice(), &self.salt, chunk_offset, self.cipher.block_size())?;
        cipher::cbc_cts_encrypt(self.cipher, self.key.as_slice(), &iv, plaintext)
    }

    /// Decrypts one chunk's payload. The very first chunk decrypted under a
    /// freshly derived key should have its trailing CRC checked by the
    /// caller immediately afterward and mapped to `BarError::WrongPassword`
    /// on mismatch (§4.2.1) — this function only reverses the cipher.
    pub fn decrypt_chunk(&self, chunk_offset: u64, ciphertext: &[u8]) -> Result<Vec<u8>, BarError> {
        if self.cipher == CipherAlgorithm::None {
            return Ok(ciphertext.to_vec());
        }
        let iv = kdf::derive_chunk_iv(self.key.as_slice(), &self.salt, chunk_offset, self.cipher.block_size())?;
        cipher::cbc_cts_decrypt(self.cipher, self.key.as_slice(), &iv, ciphertext)
    }
}

/// Maps a payload CRC mismatch on the first chunk decrypted under a
/// just-derived key to `WrongPassword` rather than a generic chunk error
/// (§4.2 "Failures", §4.2.1).
pub fn classify_first_chunk_error(err: BarError) -> BarError {
    match err {
        BarError::Chunk(ChunkError::CrcMismatch) => BarError::WrongPassword,
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_rejects_empty() {
        assert!(matches!(Password::new(Vec::new()), Err(BarError::PasswordRequired)));
    }

    #[test]
    fn crypt_config_round_trips_a_chunk_payload() {
        let password = Password::new(b"correct horse battery staple".to_vec()).unwrap();
        let salt = vec![0x5Cu8; 16];
        let config = CryptConfig::from_password(CipherAlgorithm::Aes256, &password, salt).unwrap();

        let plaintext = b"fragment payload that is not block-aligned!!";
        let ct = config.encrypt_chunk(4096, plaintext).unwrap();
        let pt = config.decrypt_chunk(4096, &ct).unwrap();
        assert_eq!(pt, plaintext);
    }

    #[test]
    fn wrong_password_yields_different_key_and_ciphertext() {
        let salt = vec![0xA5u8; 16];
        let good = Password::new(b"hunter2".to_vec()).unwrap();
        let bad = Password::new(b"wrong-guess".to_vec()).unwrap();

        let good_config = CryptConfig::from_password(CipherAlgorithm::Aes256, &good, salt.clone()).unwrap();
        let bad_config = CryptConfig::from_password(CipherAlgorithm::Aes256, &bad, salt).unwrap();

        let ct = good_config.encrypt_chunk(0, b"some plaintext bytes here").unwrap();
        let wrong_pt = bad_config.decrypt_chunk(0, &ct).unwrap();
        assert_ne!(wrong_pt, b"some plaintext bytes here");
    }

    #[test]
    fn classify_maps_crc_mismatch_to_wrong_password() {
        let mapped = classify_first_chunk_error(BarError::Chunk(ChunkError::CrcMismatch));
        assert!(matches!(mapped, BarError::WrongPassword));
    }
}
