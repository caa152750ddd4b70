//! Key derivation (§4.2, §4.2.1).
//!
//! Two distinct KDFs are in play: `argon2` turns an operator password into a
//! master key (expensive, once per archive), and HKDF-SHA256 turns the
//! master key plus a chunk offset into that chunk's IV (cheap, once per
//! chunk). Using one KDF for both would either make password unlocking
//! trivially fast to brute-force or make every chunk's IV derivation as
//! slow as a password hash; the teacher's snapshot carries neither crate,
//! so both are enrichment picks from the wider ecosystem.

use argon2::password_hash::SaltString;
use argon2::Argon2;
use hkdf::Hkdf;
use sha2::Sha256;

use crate::error::BarError;

/// Derives a `key_len`-byte master key from a password and archive-level
/// salt (§4.2 "Key files"). The salt is stored alongside the archive
/// (`SALT` chunk) so the same password reproduces the same key later.
pub fn derive_master_key(password: &[u8], salt: &[u8], key_len: usize) -> Result<Vec<u8>, BarError> {
    let argon2 = Argon2::default();
    let mut out = vec![0u8; key_len];
    argon2
        .hash_password_into(password, salt, &mut out)
        .map_err(|e| BarError::Crypt(format!("argon2: {}", e)))?;
    Ok(out)
}

/// A fresh random salt suitable for `derive_master_key`, encoded the way
/// `argon2`'s own salt strings are (base64, no padding) for round-tripping
/// through config/CLI text fields if ever needed; callers that only need
/// raw bytes for the `SALT` chunk can call `.as_bytes()` on the result.
pub fn random_salt_string() -> SaltString {
    SaltString::generate(&mut rand::thread_rng())
}

/// Derives the per-chunk IV as `HKDF-SHA256(master_key, salt, info =
/// chunk_offset)` (§4.2 "Symmetric", §4.2.1). Cheap enough to call once per
/// chunk without meaningfully slowing down the pipeline.
pub fn derive_chunk_iv(master_key: &[u8], salt: &[u8], chunk_offset: u64, iv_len: usize) -> Result<Vec<u8>, BarError> {
    let hk = Hkdf::<Sha256>::new(Some(salt), master_key);
    let mut okm = vec![0u8; iv_len];
    hk.expand(&chunk_offset.to_be_bytes(), &mut okm)
        .map_err(|e| BarError::Crypt(format!("hkdf: {}", e)))?;
    Ok(okm)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_password_and_salt_derive_same_key() {
        let salt = b"0123456789abcdef";
        let k1 = derive_master_key(b"hunter2", salt, 32).unwrap();
        let k2 = derive_master_key(b"hunter2", salt, 32).unwrap();
        assert_eq!(k1, k2);
    }

    #[test]
    fn different_passwords_derive_different_keys() {
        let salt = b"0123456789abcdef";
        let k1 = derive_master_key(b"hunter2", salt, 32).unwrap();
        let k2 = derive_master_key(b"correct-horse", salt, 32).unwrap();
        assert_ne!(k1, k2);
    }

    #[test]
    fn chunk_ivs_differ_by_offset() {
        let key = [0x42u8; 32];
        let salt = [0x7eu8; 16];
        let iv0 = derive_chunk_iv(&key, &salt, 0, 16).unwrap();
        let iv1 = derive_chunk_iv(&key, &salt, 4096, 16).unwrap();
        assert_ne!(iv0, iv1);
        assert_eq!(iv0.len(), 16);
    }
}
