//! Hash-tree-root helpers over the level reducer, following the SSZ
//! merkleization rules.

use crate::constant::{next_power_of_two, CHUNK_SIZE};
use crate::error::MerkleError;
use crate::merkle::hasher::{mix_in_length, root_with_max_leaves};
use crate::types::Chunk;

/// A fixed-width basic value that packs little-endian into chunk bytes.
pub trait BasicValue: Copy {
    /// Packed byte width.
    const SIZE: u64;

    fn pack_into(self, buf: &mut Vec<u8>);
}

impl BasicValue for u8 {
    const SIZE: u64 = 1;

    fn pack_into(self, buf: &mut Vec<u8>) {
        buf.push(self);
    }
}

impl BasicValue for u64 {
    const SIZE: u64 = 8;

    fn pack_into(self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.to_le_bytes());
    }
}

impl BasicValue for bool {
    const SIZE: u64 = 1;

    fn pack_into(self, buf: &mut Vec<u8>) {
        buf.push(self as u8);
    }
}

/// Reusable merkleizer for SSZ values. Holds scratch buffers so repeated
/// hashing does not reallocate.
#[derive(Debug, Default)]
pub struct Merkleizer {
    packed: Vec<u8>,
    chunks: Vec<Chunk>,
}

impl Merkleizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// `merkleize(chunks, limit)` from the SSZ spec. With no limit the
    /// effective limit is the next power of two of the chunk count; a limit
    /// below the chunk count is an error; a single chunk under limit 1 is
    /// its own root.
    pub fn merkleize(&self, chunks: &[Chunk], limit: Option<u64>) -> Result<Chunk, MerkleError> {
        let len = chunks.len() as u64;
        let effective_limit = match limit {
            None => next_power_of_two(len),
            Some(l) if l >= len => next_power_of_two(l),
            Some(_) => return Err(MerkleError::InputExceedsLimit),
        };

        if len == 1 && effective_limit == 1 {
            return Ok(chunks[0]);
        }
        root_with_max_leaves(chunks, effective_limit)
    }

    /// HTR of a single basic value.
    pub fn merkleize_basic<T: BasicValue>(&mut self, value: T) -> Result<Chunk, MerkleError> {
        self.merkleize_vector_basic(&[value])
    }

    /// HTR of a fixed-length vector of basic values, packed contiguously.
    pub fn merkleize_vector_basic<T: BasicValue>(
        &mut self,
        values: &[T],
    ) -> Result<Chunk, MerkleError> {
        self.pack_basic(values);
        self.merkleize(&self.chunks, None)
    }

    /// HTR of a list of basic values: packed chunks merkleized under the
    /// list's chunk capacity, then the element count mixed in.
    pub fn merkleize_list_basic<T: BasicValue>(
        &mut self,
        values: &[T],
        limit: u64,
    ) -> Result<Chunk, MerkleError> {
        self.pack_basic(values);
        let chunk_count = (limit * T::SIZE).div_ceil(CHUNK_SIZE as u64);
        let root = self.merkleize(&self.chunks, Some(chunk_count))?;
        Ok(mix_in_length(&root, values.len() as u64))
    }

    /// HTR of a fixed-length vector of composite elements, given their
    /// roots in element order.
    pub fn merkleize_vector_composite(&self, roots: &[Chunk]) -> Result<Chunk, MerkleError> {
        self.merkleize(roots, None)
    }

    /// HTR of a list of composite elements. The chunk count is the element
    /// limit itself, not a byte-derived count.
    pub fn merkleize_list_composite(
        &self,
        roots: &[Chunk],
        limit: u64,
    ) -> Result<Chunk, MerkleError> {
        let root = self.merkleize(roots, Some(limit))?;
        Ok(mix_in_length(&root, roots.len() as u64))
    }

    /// HTR of a byte slice as a fixed vector of bytes: chunkified with the
    /// final chunk right-padded.
    pub fn merkleize_byte_slice(&mut self, input: &[u8]) -> Result<Chunk, MerkleError> {
        self.chunkify(input);
        let num_chunks = self.chunks.len() as u64;
        self.merkleize(&self.chunks, Some(num_chunks))
    }

    /// HTR of a container, given its field roots in declared field order.
    pub fn merkleize_container(&self, field_roots: &[Chunk]) -> Result<Chunk, MerkleError> {
        self.merkleize(field_roots, None)
    }

    fn pack_basic<T: BasicValue>(&mut self, values: &[T]) {
        self.packed.clear();
        for v in values {
            v.pack_into(&mut self.packed);
        }
        let packed = std::mem::take(&mut self.packed);
        self.chunkify(&packed);
        self.packed = packed;
    }

    fn chunkify(&mut self, bytes: &[u8]) {
        self.chunks.clear();
        for block in bytes.chunks(CHUNK_SIZE) {
            let mut chunk = Chunk::ZERO;
            chunk[..block.len()].copy_from_slice(block);
            self.chunks.push(chunk);
        }
    }
}
