//! Merkle tree implementation for transaction commitment
//!
//! Leaves are the hex transaction ids. Each pair is combined by concatenating
//! the two hex strings and hashing the text. An odd level duplicates its last
//! element before pairing, including a lone leaf, so a non-empty list always
//! goes through at least one reduction round.

use super::hash::sha256_hex;

/// Hash two hex digests into their parent
pub fn hash_pair(left: &str, right: &str) -> String {
    let mut data = String::with_capacity(left.len() + right.len());
    data.push_str(left);
    data.push_str(right);
    sha256_hex(data.as_bytes())
}

/// Reduce one level of the tree, duplicating the last node when odd
fn next_level(level: &[String]) -> Vec<String> {
    level
        .chunks(2)
        .map(|chunk| match chunk {
            [left, right] => hash_pair(left, right),
            [single] => hash_pair(single, single),
            _ => unreachable!("chunks(2) yields one or two elements"),
        })
        .collect()
}

/// Calculate the merkle root from a list of hex transaction ids
pub fn calculate_merkle_root(ids: &[String]) -> String {
    if ids.is_empty() {
        return sha256_hex(b"");
    }

    let mut level = next_level(ids);
    while level.len() > 1 {
        level = next_level(&level);
    }

    level.remove(0)
}

/// Merkle proof for verifying transaction inclusion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerkleProof {
    /// Sibling hashes from leaf to root, flagged when the sibling sits on the left
    pub siblings: Vec<(String, bool)>,
}

impl MerkleProof {
    /// Verify the proof against a root hash
    pub fn verify(&self, leaf: &str, root: &str) -> bool {
        let mut current = leaf.to_string();

        for (sibling, is_left) in &self.siblings {
            current = if *is_left {
                hash_pair(sibling, &current)
            } else {
                hash_pair(&current, sibling)
            };
        }

        current == root
    }
}

/// Build an inclusion proof for the leaf at `index`
pub fn merkle_proof(ids: &[String], index: usize) -> Option<MerkleProof> {
    if index >= ids.len() {
        return None;
    }

    let mut siblings = Vec::new();
    let mut level: Vec<String> = ids.to_vec();
    let mut position = index;

    loop {
        if level.len() % 2 == 1 {
            let last = level[level.len() - 1].clone();
            level.push(last);
        }

        let sibling_index = position ^ 1;
        siblings.push((level[sibling_index].clone(), sibling_index < position));

        level = next_level(&level);
        position /= 2;

        if level.len() == 1 {
            break;
        }
    }

    Some(MerkleProof { siblings })
}
