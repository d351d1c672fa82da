//! Cryptographic utilities for the ledger
//!
//! This module provides:
//! - SHA-256 hashing and the hex-prefix difficulty test
//! - ECDSA key management (secp256k1)
//! - Merkle root calculation and inclusion proofs

pub mod hash;
pub mod keys;
pub mod merkle;

pub use hash::{
    is_hex_digest, leading_zeros, meets_difficulty, sha256, sha256_hex, sha256_hex_parts,
    HASH_HEX_LEN,
};
pub use keys::{
    public_key_from_bytes, public_key_to_address, sign_message, verify_signature, KeyError,
    KeyPair,
};
pub use merkle::{calculate_merkle_root, hash_pair, merkle_proof, MerkleProof};
