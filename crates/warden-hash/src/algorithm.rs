//! Hash algorithm identifiers and digest computation.
//!
//! Per spec: the schemas pin `sha256`; `sha384`/`sha512` are kept as opt-in
//! paths and must never be mixed with `sha256` within a single audit log.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256, Sha384, Sha512};

/// Supported digest algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    Sha256,
    Sha384,
    Sha512,
}

impl HashAlgorithm {
    /// Expected lowercase hex digest length for this algorithm.
    pub fn hex_len(self) -> usize {
        match self {
            Self::Sha256 => 64,
            Self::Sha384 => 96,
            Self::Sha512 => 128,
        }
    }

    /// The schema-default algorithm; every other algorithm is opt-in.
    pub fn is_default(self) -> bool {
        matches!(self, Self::Sha256)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
            Self::Sha384 => "sha384",
            Self::Sha512 => "sha512",
        }
    }
}

impl Default for HashAlgorithm {
    fn default() -> Self {
        Self::Sha256
    }
}

/// Compute a lowercase hex digest of `bytes` under `algo`.
pub fn digest(bytes: &[u8], algo: HashAlgorithm) -> String {
    match algo {
        HashAlgorithm::Sha256 => hex::encode(Sha256::digest(bytes)),
        HashAlgorithm::Sha384 => hex::encode(Sha384::digest(bytes)),
        HashAlgorithm::Sha512 => hex::encode(Sha512::digest(bytes)),
    }
}

/// Errors validating a stored hash value.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum HashValidationError {
    #[error("hash length {actual} does not match algorithm {algo:?} (expected {expected})")]
    LengthMismatch {
        algo: HashAlgorithm,
        expected: usize,
        actual: usize,
    },
    #[error("hash contains non-hex characters")]
    NotHex,
    #[error("hash is not lowercase")]
    NotLowercase,
}

/// Validate that `value` is a well-formed digest for `algo`: lowercase hex of
/// the expected length.
pub fn validate_hash(value: &str, algo: HashAlgorithm) -> Result<(), HashValidationError> {
    if value.len() != algo.hex_len() {
        return Err(HashValidationError::LengthMismatch {
            algo,
            expected: algo.hex_len(),
            actual: value.len(),
        });
    }
    if value.chars().any(|c| c.is_ascii_uppercase()) {
        return Err(HashValidationError::NotLowercase);
    }
    if !value.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(HashValidationError::NotHex);
    }
    Ok(())
}

/// The empty-string digest used to right-pad a Merkle layer, per spec §4.C
/// ("right-pad with `hash(\"\")`").
pub fn empty_digest(algo: HashAlgorithm) -> String {
    digest(b"", algo)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_digest_is_64_hex_chars() {
        let d = digest(b"hello", HashAlgorithm::Sha256);
        assert_eq!(d.len(), 64);
        assert!(validate_hash(&d, HashAlgorithm::Sha256).is_ok());
    }

    #[test]
    fn wrong_length_rejected() {
        let err = validate_hash("abcd", HashAlgorithm::Sha256).unwrap_err();
        assert_eq!(
            err,
            HashValidationError::LengthMismatch {
                algo: HashAlgorithm::Sha256,
                expected: 64,
                actual: 4
            }
        );
    }

    #[test]
    fn uppercase_rejected() {
        let d = digest(b"hello", HashAlgorithm::Sha256).to_uppercase();
        assert_eq!(
            validate_hash(&d, HashAlgorithm::Sha256).unwrap_err(),
            HashValidationError::NotLowercase
        );
    }

    #[test]
    fn algorithms_never_collide() {
        let a = digest(b"x", HashAlgorithm::Sha256);
        let b = digest(b"x", HashAlgorithm::Sha384);
        let c = digest(b"x", HashAlgorithm::Sha512);
        assert_ne!(a.len(), b.len());
        assert_ne!(b.len(), c.len());
    }
}
