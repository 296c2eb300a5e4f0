//! Canonical serialisation, content hashing, and algorithm-agile signing.
//!
//! This crate is component **A** of the governance core: every other crate in
//! the workspace hashes or signs through here so that two hosts computing the
//! same logical value always produce byte-identical digests.

pub mod algorithm;
pub mod canonical;
pub mod signing;

pub use algorithm::{digest, empty_digest, validate_hash, HashAlgorithm, HashValidationError};
pub use canonical::{canonical_bytes, canonical_bytes_of, without_paths};
pub use signing::{CryptoError, PrivateKey, PublicKey, Signature, SigningAlgorithm};

/// Compute the hex digest of the canonical encoding of `value` under `algo`.
pub fn hash_value<T: serde::Serialize>(
    value: &T,
    algo: HashAlgorithm,
) -> Result<String, serde_json::Error> {
    let bytes = canonical_bytes_of(value)?;
    Ok(digest(&bytes, algo))
}
