//! Core aliases and byte-level helpers shared across the store.

use alloy_primitives::B256;
use sha2::{Digest, Sha256};

/// A 32-byte tree chunk: leaf payloads and internal node hashes.
pub type Chunk = B256;

/// Generalized index of a node in the perfect binary tree. The root is 1;
/// node `g` has children `2g` (left) and `2g + 1` (right).
pub type Gindex = u64;

/// Encode a gindex as its on-disk key: 8 bytes, little-endian. This is the
/// only key format the engine sees.
#[inline]
pub fn key_bytes(gindex: Gindex) -> [u8; 8] {
    gindex.to_le_bytes()
}

/// Pack a u64 into a chunk, little-endian in the leading 8 bytes. Also the
/// layout of a list's length mix-in.
#[inline]
pub fn chunk_of_u64(v: u64) -> Chunk {
    let mut chunk = Chunk::ZERO;
    chunk[..8].copy_from_slice(&v.to_le_bytes());
    chunk
}

/// Read a little-endian u64 from the leading 8 bytes.
#[inline]
pub fn u64_from_le(bytes: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[..8]);
    u64::from_le_bytes(buf)
}

/// SHA-256 of the concatenation of two chunks.
#[inline]
pub fn hash_pair(left: &Chunk, right: &Chunk) -> Chunk {
    let mut h = Sha256::new();
    h.update(left);
    h.update(right);
    Chunk::from_slice(&h.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_bytes() {
        assert_eq!(key_bytes(1), [1, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(key_bytes(0x0102), [2, 1, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_u64_chunk_round_trip() {
        let chunk = chunk_of_u64(777);
        assert_eq!(u64_from_le(chunk.as_slice()), 777);
        assert!(chunk[8..].iter().all(|&b| b == 0));
    }
}
