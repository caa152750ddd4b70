//! Archive signatures (§4.2 "Signatures", §6.1 `SIG0`).
//!
//! Ed25519 over the SHA-256 digest of everything before the `SIG0` chunk —
//! picked the way the sibling content-addressed-store example in the
//! retrieval pack signs content, since the teacher's own snapshot never
//! signs anything itself (it only verifies TLS/API certificates).

use ed25519_dalek::{Keypair, PublicKey, SecretKey, Signature, Signer, Verifier};
use openssl::sha::sha256;

use crate::error::BarError;

pub struct SigningKey(Keypair);

pub struct VerifyingKey(PublicKey);

impl SigningKey {
    pub fn from_bytes(secret: &[u8]) -> Result<Self, BarError> {
        let secret = SecretKey::from_bytes(secret).map_err(|e| BarError::KeyFormat(e.to_string()))?;
        let public = PublicKey::from(&secret);
        Ok(Self(Keypair { secret, public }))
    }

    pub fn generate() -> Self {
        let mut rng = rand_core::OsRng;
        Self(Keypair::generate(&mut rng))
    }

    pub fn public_bytes(&self) -> [u8; 32] {
        self.0.public.to_bytes()
    }

    pub fn secret_bytes(&self) -> [u8; 32] {
        self.0.secret.to_bytes()
    }

    /// Signs `SHA256(prefix)`, where `prefix` is everything in the archive
    /// before the `SIG0` chunk's header (§4.2).
    pub fn sign_prefix(&self, prefix: &[u8]) -> [u8; 64] {
        let digest = sha256(prefix);
        self.0.sign(&digest).to_bytes()
    }
}

impl VerifyingKey {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, BarError> {
        let key = PublicKey::from_bytes(bytes).map_err(|e| BarError::KeyFormat(e.to_string()))?;
        Ok(Self(key))
    }

    pub fn verify_prefix(&self, prefix: &[u8], signature: &[u8]) -> Result<(), BarError> {
        let digest = sha256(prefix);
        let sig = Signature::from_bytes(signature).map_err(|_| BarError::SignatureMismatch)?;
        self.0
            .verify(&digest, &sig)
            .map_err(|_| BarError::SignatureMismatch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_verifies_against_matching_prefix() {
        let signing = SigningKey::generate();
        let verifying = VerifyingKey::from_bytes(&signing.public_bytes()).unwrap();

        let prefix = b"archive bytes up to SIG0's header";
        let sig = signing.sign_prefix(prefix);
        verifying.verify_prefix(prefix, &sig).unwrap();
    }

    #[test]
    fn tampered_prefix_fails_verification() {
        let signing = SigningKey::generate();
        let verifying = VerifyingKey::from_bytes(&signing.public_bytes()).unwrap();

        let sig = signing.sign_prefix(b"original bytes");
        let err = verifying.verify_prefix(b"tampered bytes!", &sig).unwrap_err();
        assert!(matches!(err, BarError::SignatureMismatch));
    }
}
