//! Asymmetric key store (§4.2 "Asymmetric", "Key files").
//!
//! PEM-encoded RSA keys, optionally with a password-wrapped private section,
//! loaded either from an on-disk path or a base64 blob embedded directly in
//! config — both forms the teacher already supports for its own API
//! certificates (`tools::cert.rs`), generalized here to backup encryption
//! keys instead of TLS server certificates.

use openssl::pkey::{PKey, Private, Public};
use openssl::rsa::{Padding, Rsa};

use crate::error::BarError;

pub struct PublicKeyStore {
    key: PKey<Public>,
}

pub struct PrivateKeyStore {
    key: PKey<Private>,
}

impl PublicKeyStore {
    pub fn from_pem(pem: &[u8]) -> Result<Self, BarError> {
        let rsa = Rsa::public_key_from_pem(pem).map_err(|e| BarError::KeyFormat(e.to_string()))?;
        let key = PKey::from_rsa(rsa).map_err(|e| BarError::KeyFormat(e.to_string()))?;
        Ok(Self { key })
    }

    pub fn from_base64(data: &str) -> Result<Self, BarError> {
        let pem = base64::decode(data).map_err(|e| BarError::KeyFormat(e.to_string()))?;
        Self::from_pem(&pem)
    }

    /// Wraps a just-generated symmetric session key with RSA-OAEP so it can
    /// be embedded in the archive's `BAR0` chunk (§4.2 "Asymmetric").
    pub fn wrap_session_key(&self, session_key: &[u8]) -> Result<Vec<u8>, BarError> {
        let rsa = self.key.rsa().map_err(|e| BarError::KeyFormat(e.to_string()))?;
        let mut buf = vec![0u8; rsa.size() as usize];
        let len = rsa
            .public_encrypt(session_key, &mut buf, Padding::PKCS1_OAEP)
            .map_err(|e| BarError::Crypt(format!("rsa oaep wrap: {}", e)))?;
        buf.truncate(len);
        Ok(buf)
    }
}

impl PrivateKeyStore {
    /// Loads a PEM private key, optionally protected by `passphrase` — the
    /// "KDF-wrapped private section" the spec describes is OpenSSL's own
    /// PEM encryption, not a second bespoke format.
    pub fn from_pem(pem: &[u8], passphrase: Option<&[u8]>) -> Result<Self, BarError> {
        let rsa = match passphrase {
            Some(pass) => Rsa::private_key_from_pem_passphrase(pem, pass),
            None => Rsa::private_key_from_pem(pem),
        }
        .map_err(|_| BarError::WrongPassword)?;
        let key = PKey::from_rsa(rsa).map_err(|e| BarError::KeyFormat(e.to_string()))?;
        Ok(Self { key })
    }

    pub fn unwrap_session_key(&self, wrapped: &[u8]) -> Result<Vec<u8>, BarError> {
        let rsa = self.key.rsa().map_err(|e| BarError::KeyFormat(e.to_string()))?;
        let mut buf = vec![0u8; rsa.size() as usize];
        let len = rsa
            .private_decrypt(wrapped, &mut buf, Padding::PKCS1_OAEP)
            .map_err(|_| BarError::WrongPassword)?;
        buf.truncate(len);
        Ok(buf)
    }
}

/// Generates a fresh RSA key pair for `generate-encryption-keys` (§6.3).
pub fn generate_rsa_keypair(bits: u32) -> Result<(Vec<u8>, Vec<u8>), BarError> {
    let rsa = Rsa::generate(bits).map_err(|e| BarError::Crypt(e.to_string()))?;
    let private_pem = rsa.private_key_to_pem().map_err(|e| BarError::Crypt(e.to_string()))?;
    let public_pem = rsa.public_key_to_pem().map_err(|e| BarError::Crypt(e.to_string()))?;
    Ok((private_pem, public_pem))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_key_round_trips_through_rsa_oaep() {
        let (private_pem, public_pem) = generate_rsa_keypair(2048).unwrap();
        let public = PublicKeyStore::from_pem(&public_pem).unwrap();
        let private = PrivateKeyStore::from_pem(&private_pem, None).unwrap();

        let session_key = [0x5Au8; 32];
        let wrapped = public.wrap_session_key(&session_key).unwrap();
        let unwrapped = private.unwrap_session_key(&wrapped).unwrap();
        assert_eq!(unwrapped, session_key);
    }

    #[test]
    fn wrong_passphrase_reports_wrong_password() {
        let rsa = Rsa::generate(2048).unwrap();
        let pem = rsa
            .private_key_to_pem_passphrase(openssl::symm::Cipher::aes_256_cbc(), b"correct horse")
            .unwrap();
        let err = PrivateKeyStore::from_pem(&pem, Some(b"wrong guess")).unwrap_err();
        assert!(matches!(err, BarError::WrongPassword));
    }
}
