//! Hash walker: builds the Merkle tree of an object from the sequence of
//! leaf chunks and merge instructions its `hash_tree_root_with` emits.

use crate::constant::{ceil_log2, next_power_of_two, CHUNK_SIZE};
use crate::error::MerkleError;
use crate::traits::HashTreeRoot;
use crate::tree::node::Node;
use crate::types::{chunk_of_u64, Chunk};
use std::collections::VecDeque;

/// Build the Merkle tree of an object by walking it in SSZ field order.
pub fn from_object<T: HashTreeRoot + ?Sized>(obj: &T) -> Result<Node, MerkleError> {
    let mut w = TreeWalker::new();
    obj.hash_tree_root_with(&mut w)?;
    Ok(w.finish())
}

/// Records leaf chunks and merge instructions into a node stack. Each
/// commit pops the open slice of the stack and replaces it with the root of
/// the subtree built over it, padded to the next power of two.
#[derive(Debug, Default)]
pub struct TreeWalker {
    nodes: Vec<Node>,
    buf: Vec<u8>,
}

impl TreeWalker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current top of the node stack; pass back to a commit.
    pub fn index(&self) -> usize {
        self.nodes.len()
    }

    /// Buffer raw bytes for a packed region; flushed into whole leaf
    /// chunks by the next commit.
    pub fn append(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Buffer a little-endian u64.
    pub fn append_u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    /// Right-pad the buffered bytes to a whole number of chunks.
    pub fn fill_up_to_32(&mut self) {
        let rest = self.buf.len() % CHUNK_SIZE;
        if rest != 0 {
            self.buf.resize(self.buf.len() + CHUNK_SIZE - rest, 0);
        }
    }

    /// One leaf per 32 bytes: payloads up to a chunk become a single
    /// right-padded leaf, longer payloads a committed run of leaves.
    pub fn put_bytes(&mut self, bytes: &[u8]) -> Result<(), MerkleError> {
        if bytes.len() <= CHUNK_SIZE {
            let mut chunk = Chunk::ZERO;
            chunk[..bytes.len()].copy_from_slice(bytes);
            self.nodes.push(Node::leaf(chunk));
            return Ok(());
        }
        let idx = self.index();
        self.append_bytes_as_leaves(bytes);
        self.commit(idx)
    }

    /// One leaf holding a little-endian u64.
    pub fn put_u64(&mut self, v: u64) {
        self.nodes.push(Node::leaf(chunk_of_u64(v)));
    }

    /// One leaf holding a bool byte.
    pub fn put_bool(&mut self, v: bool) {
        let mut chunk = Chunk::ZERO;
        chunk[0] = v as u8;
        self.nodes.push(Node::leaf(chunk));
    }

    /// A list of u64s packed four to a chunk, merkleized under the list's
    /// chunk capacity with the element count mixed in.
    pub fn put_u64_list(&mut self, values: &[u64], max_capacity: u64) -> Result<(), MerkleError> {
        let idx = self.index();
        for v in values {
            self.append_u64(*v);
        }
        self.fill_up_to_32();
        let limit = (max_capacity * 8).div_ceil(CHUNK_SIZE as u64);
        self.merkleize_with_mixin(idx, values.len() as u64, limit)
    }

    /// Flush buffered bytes and commit everything above `idx` into one
    /// subtree node.
    pub fn merkleize(&mut self, idx: usize) -> Result<(), MerkleError> {
        self.flush();
        self.commit(idx)
    }

    /// Flush buffered bytes and commit everything above `idx` into a list
    /// subtree of `limit` virtual chunks with `count` mixed in.
    pub fn merkleize_with_mixin(
        &mut self,
        idx: usize,
        count: u64,
        limit: u64,
    ) -> Result<(), MerkleError> {
        self.flush();
        self.commit_with_mixin(idx, count, limit)
    }

    /// The finished tree. The walk must have committed down to one root.
    pub fn finish(mut self) -> Node {
        debug_assert_eq!(self.nodes.len(), 1, "unbalanced walk");
        self.nodes.pop().expect("walker finished with no nodes")
    }

    fn flush(&mut self) {
        if self.buf.is_empty() {
            return;
        }
        let buf = std::mem::take(&mut self.buf);
        self.append_bytes_as_leaves(&buf);
    }

    fn append_bytes_as_leaves(&mut self, bytes: &[u8]) {
        for block in bytes.chunks(CHUNK_SIZE) {
            let mut chunk = Chunk::ZERO;
            chunk[..block.len()].copy_from_slice(block);
            self.nodes.push(Node::leaf(chunk));
        }
    }

    fn commit(&mut self, idx: usize) -> Result<(), MerkleError> {
        let leaves = self.nodes.split_off(idx);
        let limit = next_power_of_two(leaves.len() as u64);
        let node = tree_from_leaves(leaves, limit)?;
        self.nodes.push(node);
        Ok(())
    }

    fn commit_with_mixin(&mut self, idx: usize, count: u64, limit: u64) -> Result<(), MerkleError> {
        let leaves = self.nodes.split_off(idx);
        let data = tree_from_leaves(leaves, next_power_of_two(limit))?;
        let mixin = Node::leaf(chunk_of_u64(count));
        self.nodes.push(Node::internal(data, mixin));
        Ok(())
    }
}

/// Build the subtree over `leaves` padded virtually to `limit` (a power of
/// two). Absent ranges collapse into single empty nodes carrying the
/// zero-hash of their depth.
fn tree_from_leaves(leaves: Vec<Node>, limit: u64) -> Result<Node, MerkleError> {
    if leaves.len() as u64 > limit {
        return Err(MerkleError::InputExceedsLimit);
    }
    let depth = ceil_log2(limit);
    let mut queue = VecDeque::from(leaves);
    Ok(build_subtree(&mut queue, depth))
}

fn build_subtree(leaves: &mut VecDeque<Node>, depth: u32) -> Node {
    if leaves.is_empty() {
        return Node::zero(depth);
    }
    if depth == 0 {
        return leaves.pop_front().expect("checked non-empty");
    }
    // The left side takes as many materialized leaves as fit under it.
    let half = 1u64 << (depth - 1);
    let take = (leaves.len() as u64).min(half) as usize;
    let mut left_leaves: VecDeque<Node> = leaves.drain(..take).collect();
    let left = build_subtree(&mut left_leaves, depth - 1);
    let right = build_subtree(leaves, depth - 1);
    Node::internal(left, right)
}
