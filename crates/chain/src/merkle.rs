//! Merkle tree root over per-transaction hashes.
//!
//! Every input leaf is double-hashed and hex-encoded, then adjacent pairs
//! are combined by double-hashing their concatenation (again hex-encoded)
//! until one node remains. An odd tail node is promoted to the next level
//! unchanged. The root is therefore an ASCII hex string, which is exactly
//! what the header sign-string interpolates.

use crate::crypto::Crypto;
use crate::error::CryptoError;

fn hex_double_hash(crypto: &dyn Crypto, data: &[u8]) -> Result<Vec<u8>, CryptoError> {
    Ok(hex::encode(crypto.double_hash(data)?.as_bytes()).into_bytes())
}

/// Compute the tree root. An empty input collapses to the `"0"` sentinel
/// leaf, matching what the block parser feeds in for an empty block.
pub fn merkle_tree_root(
    crypto: &dyn Crypto,
    leaves: &[Vec<u8>],
) -> Result<Vec<u8>, CryptoError> {
    let mut level: Vec<Vec<u8>> = if leaves.is_empty() {
        vec![hex_double_hash(crypto, b"0")?]
    } else {
        let mut v = Vec::with_capacity(leaves.len());
        for leaf in leaves {
            v.push(hex_double_hash(crypto, leaf)?);
        }
        v
    };

    while level.len() > 1 {
        let mut next = Vec::with_capacity((level.len() + 1) / 2);
        for pair in level.chunks(2) {
            if pair.len() == 1 {
                next.push(pair[0].clone());
            } else {
                let mut cat = pair[0].clone();
                cat.extend_from_slice(&pair[1]);
                next.push(hex_double_hash(crypto, &cat)?);
            }
        }
        level = next;
    }

    Ok(level.swap_remove(0))
}
