//! Algorithm-agile signing for audit entry content hashes and report digests.
//!
//! Per spec §4.B: "If a private key is configured, sign `contentHash`
//! (Ed25519 or RSA-SHA256 per configuration)". Key management beyond signing
//! with a supplied key is explicitly out of scope (spec §1 Non-goals) — this
//! module never generates, stores, or rotates keys on a caller's behalf.

use base64::{engine::general_purpose::STANDARD, Engine};
use ed25519_dalek::{Signer as _, SigningKey, Verifier as _, VerifyingKey};
use rsa::{
    pkcs1v15::{Signature as RsaSignature, SigningKey as RsaSigningKey, VerifyingKey as RsaVerifyingKey},
    signature::{SignatureEncoding, Signer as RsaSignerTrait, Verifier as RsaVerifierTrait},
    RsaPrivateKey, RsaPublicKey,
};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

/// Signing/verification algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SigningAlgorithm {
    Ed25519,
    RsaSha256,
}

/// A signature over some content hash, base64-encoded for wire transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    pub algorithm: SigningAlgorithm,
    pub value: String,
}

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("signing failed: {0}")]
    SigningFailed(String),
    #[error("signature verification failed")]
    VerificationFailed,
    #[error("invalid key material: {0}")]
    InvalidKey(String),
    #[error("base64 decode failed: {0}")]
    Encoding(String),
}

/// A configured private key capable of signing a digest under one algorithm.
pub enum PrivateKey {
    Ed25519(Box<SigningKey>),
    RsaSha256(Box<RsaSigningKey<Sha256>>),
}

impl PrivateKey {
    pub fn from_ed25519_bytes(seed: &[u8; 32]) -> Self {
        Self::Ed25519(Box::new(SigningKey::from_bytes(seed)))
    }

    pub fn from_rsa(key: RsaPrivateKey) -> Self {
        Self::RsaSha256(Box::new(RsaSigningKey::<Sha256>::new(key)))
    }

    pub fn algorithm(&self) -> SigningAlgorithm {
        match self {
            Self::Ed25519(_) => SigningAlgorithm::Ed25519,
            Self::RsaSha256(_) => SigningAlgorithm::RsaSha256,
        }
    }

    /// Sign `message` (the raw bytes of a content hash or canonical digest).
    pub fn sign(&self, message: &[u8]) -> Result<Signature, CryptoError> {
        match self {
            Self::Ed25519(key) => {
                let sig = key.sign(message);
                Ok(Signature {
                    algorithm: SigningAlgorithm::Ed25519,
                    value: STANDARD.encode(sig.to_bytes()),
                })
            }
            Self::RsaSha256(key) => {
                let sig = key
                    .try_sign(message)
                    .map_err(|e| CryptoError::SigningFailed(e.to_string()))?;
                Ok(Signature {
                    algorithm: SigningAlgorithm::RsaSha256,
                    value: STANDARD.encode(sig.to_bytes()),
                })
            }
        }
    }

    /// Derive the matching public key, for verification without retaining
    /// the private key.
    pub fn public_key(&self) -> PublicKey {
        match self {
            Self::Ed25519(key) => PublicKey::Ed25519(key.verifying_key()),
            Self::RsaSha256(key) => {
                PublicKey::RsaSha256(RsaVerifyingKey::<Sha256>::new(RsaPublicKey::from(key.as_ref())))
            }
        }
    }
}

/// A configured public key capable of verifying a signature under one algorithm.
pub enum PublicKey {
    Ed25519(VerifyingKey),
    RsaSha256(RsaVerifyingKey<Sha256>),
}

impl PublicKey {
    pub fn verify(&self, message: &[u8], signature: &Signature) -> Result<(), CryptoError> {
        let raw = STANDARD
            .decode(&signature.value)
            .map_err(|e| CryptoError::Encoding(e.to_string()))?;
        match (self, signature.algorithm) {
            (Self::Ed25519(key), SigningAlgorithm::Ed25519) => {
                let bytes: [u8; 64] = raw
                    .try_into()
                    .map_err(|_| CryptoError::InvalidKey("ed25519 signature must be 64 bytes".into()))?;
                let sig = ed25519_dalek::Signature::from_bytes(&bytes);
                key.verify(message, &sig)
                    .map_err(|_| CryptoError::VerificationFailed)
            }
            (Self::RsaSha256(key), SigningAlgorithm::RsaSha256) => {
                let sig = RsaSignature::try_from(raw.as_slice())
                    .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
                key.verify(message, &sig)
                    .map_err(|_| CryptoError::VerificationFailed)
            }
            _ => Err(CryptoError::InvalidKey(
                "public key algorithm does not match signature algorithm".into(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;

    #[test]
    fn ed25519_round_trips() {
        let key = PrivateKey::from_ed25519_bytes(&[7u8; 32]);
        let sig = key.sign(b"payload").unwrap();
        assert_eq!(sig.algorithm, SigningAlgorithm::Ed25519);
        key.public_key().verify(b"payload", &sig).unwrap();
    }

    #[test]
    fn ed25519_tampered_message_fails() {
        let key = PrivateKey::from_ed25519_bytes(&[9u8; 32]);
        let sig = key.sign(b"payload").unwrap();
        assert!(key.public_key().verify(b"other", &sig).is_err());
    }

    #[test]
    fn rsa_sha256_round_trips() {
        let mut rng = OsRng;
        let priv_key = RsaPrivateKey::new(&mut rng, 2048).unwrap();
        let key = PrivateKey::from_rsa(priv_key);
        let sig = key.sign(b"payload").unwrap();
        assert_eq!(sig.algorithm, SigningAlgorithm::RsaSha256);
        key.public_key().verify(b"payload", &sig).unwrap();
    }
}
