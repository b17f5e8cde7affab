//! Constants that determine the shape of the chunk tree.

use crate::types::Chunk;
use once_cell::sync::Lazy;
use sha2::{Digest, Sha256};

/// Width of a tree leaf in bytes. The atomic unit of merkleization and of
/// on-disk storage.
pub const CHUNK_SIZE: usize = 32;

/// Maximum depth of virtual padding supported by the zero-hash table.
pub const MAX_TREE_DEPTH: usize = 64;

/// Minimum number of 32-byte blocks in a reduction level before the work is
/// split across workers. Below this the coordination overhead outweighs the
/// hashing.
pub const MIN_PARALLELIZATION_SIZE: usize = 5000;

/// Roots of all-zero subtrees by depth: `ZERO_HASHES[0]` is the zero chunk
/// and `ZERO_HASHES[d + 1] = SHA256(ZERO_HASHES[d] || ZERO_HASHES[d])`.
pub static ZERO_HASHES: Lazy<[Chunk; MAX_TREE_DEPTH]> = Lazy::new(|| {
    let mut table = [Chunk::ZERO; MAX_TREE_DEPTH];
    for i in 1..MAX_TREE_DEPTH {
        let mut h = Sha256::new();
        h.update(table[i - 1]);
        h.update(table[i - 1]);
        table[i] = Chunk::from_slice(&h.finalize());
    }
    table
});

/// Root of the all-zero subtree of the given depth.
#[inline]
pub fn zero_hash(depth: u32) -> Chunk {
    ZERO_HASHES[depth as usize]
}

/// Smallest power of two greater than or equal to `v`; 1 for 0.
#[inline]
pub const fn next_power_of_two(v: u64) -> u64 {
    v.next_power_of_two()
}

/// Largest power of two less than or equal to `v`; 0 for 0.
#[inline]
pub const fn prev_power_of_two(v: u64) -> u64 {
    if v == 0 {
        0
    } else {
        1 << (63 - v.leading_zeros())
    }
}

/// Number of tree levels needed to cover `v` leaves: `ceil(log2(v))`.
#[inline]
pub const fn ceil_log2(v: u64) -> u32 {
    next_power_of_two(v).ilog2()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_power_of_two() {
        assert_eq!(next_power_of_two(1), 1);
        assert_eq!(next_power_of_two(3), 4);
        assert_eq!(next_power_of_two(16), 16);
        assert_eq!(next_power_of_two(17), 32);
        assert_eq!(next_power_of_two(8192), 8192);

        assert_eq!(prev_power_of_two(18), 16);
        assert_eq!(prev_power_of_two(16), 16);
        assert_eq!(prev_power_of_two(1), 1);
    }

    #[test]
    fn test_ceil_log2() {
        assert_eq!(ceil_log2(1), 0);
        assert_eq!(ceil_log2(2), 1);
        assert_eq!(ceil_log2(3), 2);
        assert_eq!(ceil_log2(8192), 13);
    }

    /// The first entries of the zero-hash table must never change.
    #[test]
    fn test_zero_hashes() {
        assert_eq!(ZERO_HASHES[0], Chunk::ZERO);

        // SHA256 of 64 zero bytes.
        let expected =
            hex::decode("f5a5fd42d16a20302798ef6ed309979b43003d2320d9f0e8ea9831a92759fb4b")
                .unwrap();
        assert_eq!(ZERO_HASHES[1].as_slice(), &expected[..]);

        for d in 1..MAX_TREE_DEPTH {
            let mut h = Sha256::new();
            h.update(ZERO_HASHES[d - 1]);
            h.update(ZERO_HASHES[d - 1]);
            assert_eq!(ZERO_HASHES[d], Chunk::from_slice(&h.finalize()));
        }
    }
}
