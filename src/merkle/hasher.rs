//! Pair-wise SHA-256 tree reduction.

use crate::constant::{ceil_log2, zero_hash, MIN_PARALLELIZATION_SIZE};
use crate::error::MerkleError;
use crate::types::{chunk_of_u64, hash_pair, Chunk};
use rayon::prelude::*;

/// Hash every adjacent pair of `input` blocks into `output`, splitting the
/// level across the default worker count.
pub fn build_parent_tree_roots(output: &mut [Chunk], input: &[Chunk]) -> Result<(), MerkleError> {
    let workers = rayon::current_num_threads().saturating_sub(1).max(1);
    build_parent_tree_roots_with_workers(output, input, workers)
}

/// Hash every adjacent pair of `input` blocks into `output` using up to
/// `workers` parallel workers on disjoint adjacent windows. Each worker
/// reduces `2 * group_size` input blocks into `group_size` output blocks;
/// the tail window may be shorter. Output order matches the input
/// partitioning exactly.
pub fn build_parent_tree_roots_with_workers(
    output: &mut [Chunk],
    input: &[Chunk],
    workers: usize,
) -> Result<(), MerkleError> {
    if input.len() % 2 != 0 {
        return Err(MerkleError::OddLengthTreeRoots);
    }
    debug_assert_eq!(output.len(), input.len() / 2);

    if input.len() < MIN_PARALLELIZATION_SIZE || workers <= 1 {
        hash_level(output, input);
        return Ok(());
    }

    let group_size = (output.len() / workers).max(1);
    output
        .par_chunks_mut(group_size)
        .zip(input.par_chunks(2 * group_size))
        .for_each(|(out, inp)| hash_level(out, inp));
    Ok(())
}

fn hash_level(output: &mut [Chunk], input: &[Chunk]) {
    for (out, pair) in output.iter_mut().zip(input.chunks_exact(2)) {
        *out = hash_pair(&pair[0], &pair[1]);
    }
}

/// Merkle root of `leaves` under a virtual tree of the given depth. An
/// empty input is the all-zero subtree; an odd level is closed with the
/// zero-hash of that level. One scratch buffer of `(n + 1) / 2` chunks is
/// alternated with the input per level.
pub fn root_with_depth(leaves: &[Chunk], depth: u32) -> Result<Chunk, MerkleError> {
    if leaves.is_empty() {
        return Ok(zero_hash(depth));
    }

    let mut current = leaves.to_vec();
    let mut buffer = vec![Chunk::ZERO; (leaves.len() + 1) / 2];
    for level in 0..depth {
        if current.len() % 2 == 1 {
            current.push(zero_hash(level));
        }
        let parents = current.len() / 2;
        build_parent_tree_roots(&mut buffer[..parents], &current)?;
        std::mem::swap(&mut current, &mut buffer);
        current.truncate(parents);
    }

    if current.len() != 1 {
        return Err(MerkleError::InputExceedsLimit);
    }
    Ok(current[0])
}

/// Merkle root of `leaves` padded virtually to `limit` leaves.
pub fn root_with_max_leaves(leaves: &[Chunk], limit: u64) -> Result<Chunk, MerkleError> {
    root_with_depth(leaves, ceil_log2(limit))
}

/// The SSZ length mix-in: `SHA256(root || u64_le(length) || 0^24)`.
#[inline]
pub fn mix_in_length(root: &Chunk, length: u64) -> Chunk {
    hash_pair(root, &chunk_of_u64(length))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    fn chunk(fill: u8) -> Chunk {
        Chunk::repeat_byte(fill)
    }

    /// Four chunks reduce to `SHA256(SHA256(A||B) || SHA256(C||D))`.
    #[test]
    fn test_four_chunk_root() {
        let (a, b, c, d) = (chunk(1), chunk(2), chunk(3), chunk(4));
        let expected = hash_pair(&hash_pair(&a, &b), &hash_pair(&c, &d));
        assert_eq!(root_with_depth(&[a, b, c, d], 2).unwrap(), expected);
    }

    #[test]
    fn test_odd_level_closed_with_zero_hash() {
        let a = chunk(7);
        // depth 2 over a single leaf: H(H(a || 0) || H(0 || 0))
        let expected = hash_pair(&hash_pair(&a, &zero_hash(0)), &zero_hash(1));
        assert_eq!(root_with_depth(&[a], 2).unwrap(), expected);
    }

    #[test]
    fn test_empty_input_is_zero_subtree() {
        for depth in [0u32, 1, 13, 40] {
            assert_eq!(root_with_depth(&[], depth).unwrap(), zero_hash(depth));
        }
    }

    #[test]
    fn test_odd_length_level_rejected() {
        let mut out = [Chunk::ZERO; 1];
        let input = [chunk(1); 3];
        assert_eq!(
            build_parent_tree_roots(&mut out, &input),
            Err(MerkleError::OddLengthTreeRoots)
        );
    }

    /// The parallel reduction must produce the same blocks as a single
    /// worker for inputs both below and above the parallelization cutoff.
    #[test]
    fn test_parallel_matches_serial() {
        let mut rng = StdRng::seed_from_u64(42);
        for len in [2usize, 64, 4096, 8192, 8192 + 2] {
            let input: Vec<Chunk> = (0..len).map(|_| Chunk::from(rng.gen::<[u8; 32]>())).collect();
            let mut serial = vec![Chunk::ZERO; len / 2];
            let mut parallel = vec![Chunk::ZERO; len / 2];

            build_parent_tree_roots_with_workers(&mut serial, &input, 1).unwrap();
            for workers in [2, 3, 7] {
                build_parent_tree_roots_with_workers(&mut parallel, &input, workers).unwrap();
                assert_eq!(serial, parallel, "len={len} workers={workers}");
            }
        }
    }

    #[test]
    fn test_mix_in_length() {
        let root = chunk(9);
        assert_eq!(mix_in_length(&root, 4), hash_pair(&root, &chunk_of_u64(4)));
    }
}
