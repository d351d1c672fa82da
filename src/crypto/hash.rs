//! Cryptographic hashing utilities for the ledger
//!
//! Provides the SHA-256 helpers used for transaction identities, block
//! hashes and merkle reductions, plus the hex-prefix difficulty test used by
//! proof-of-compute.

use sha2::{Digest, Sha256};

/// Length of a hex-encoded SHA-256 digest
pub const HASH_HEX_LEN: usize = 64;

/// Computes SHA-256 hash of the input data
pub fn sha256(data: &[u8]) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().to_vec()
}

/// Computes SHA-256 hash and returns it as a lowercase hex string
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(sha256(data))
}

/// Computes SHA-256 over several byte slices fed in order
pub fn sha256_hex_parts(parts: &[&[u8]]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    hex::encode(hasher.finalize())
}

/// Checks if a hex digest meets the difficulty target
///
/// The digest must start with at least `difficulty` `'0'` characters.
/// A difficulty larger than the digest itself can never be met.
pub fn meets_difficulty(hash_hex: &str, difficulty: u32) -> bool {
    let required = difficulty as usize;
    if required > hash_hex.len() {
        return false;
    }
    hash_hex.bytes().take(required).all(|b| b == b'0')
}

/// Counts the leading zero hex characters of a digest
pub fn leading_zeros(hash_hex: &str) -> usize {
    hash_hex.bytes().take_while(|b| *b == b'0').count()
}

/// Checks that a string is a lowercase 64-character hex digest
pub fn is_hex_digest(value: &str) -> bool {
    value.len() == HASH_HEX_LEN
        && value
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}
