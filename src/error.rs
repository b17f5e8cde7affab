//! Error types for merkleization, schema traversal, decoding, and storage.

use crate::types::Gindex;
use thiserror::Error;

/// Errors from the merkleization primitives.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MerkleError {
    /// Merkleize was given more chunks than its limit allows.
    #[error("input exceeds limit")]
    InputExceedsLimit,
    /// The level reducer received an odd number of blocks.
    #[error("odd length tree roots")]
    OddLengthTreeRoots,
}

/// Errors from resolving an object path against a schema.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchemaError {
    /// A container has no field under the given name.
    #[error("field {0} not found")]
    FieldNotFound(String),
    /// `__len__` was applied to a type that is not a list.
    #[error("type is not a list")]
    NotAList,
    /// The path continues past a basic type.
    #[error("path continues past a basic type")]
    PathOverrun,
    /// A name segment was applied to an enumerable type.
    #[error("expected index, got name {0}")]
    ExpectedIndex(String),
}

/// Errors from decoding stored nodes or the chunk-aligned byte stream.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    /// The node flags byte carries reserved bits.
    #[error("unknown node format: flags {0:#04x}")]
    UnknownNodeFormat(u8),
    /// A stored node payload has an impossible length.
    #[error("malformed node encoding of {0} bytes")]
    MalformedNode(usize),
    /// The byte stream is not a whole number of chunks.
    #[error("buffer of {0} bytes is not chunk aligned")]
    Misaligned(usize),
    /// The byte stream ends before the schema does.
    #[error("buffer too short: expected at least {expected} chunks, found {found}")]
    Short { expected: usize, found: usize },
    /// A length mix-in chunk has non-zero padding.
    #[error("length chunk has non-zero padding")]
    BadLengthChunk,
    /// A decoded list length exceeds the type's capacity.
    #[error("list length {length} exceeds limit {limit}")]
    LengthOverLimit { length: u64, limit: u64 },
    /// The list regions do not tile the buffer.
    #[error("list regions do not tile the buffer")]
    RegionMismatch,
}

/// Errors surfaced by the persistence layer and the readers. Generic over
/// the engine's error type.
#[derive(Debug, Error)]
pub enum StoreError<E> {
    /// A stored node has exactly one child.
    #[error("node at gindex {0} has only one child")]
    UnbalancedNode(Gindex),
    /// A required gindex is missing from the engine.
    #[error("node not found at gindex {0}")]
    NodeNotFound(Gindex),
    /// Merkleization failed while building the tree to save.
    #[error(transparent)]
    Merkle(#[from] MerkleError),
    /// Path resolution failed.
    #[error(transparent)]
    Schema(#[from] SchemaError),
    /// A stored node or the reassembled byte stream is malformed.
    #[error(transparent)]
    Decode(#[from] DecodeError),
    /// The underlying engine failed.
    #[error("kv engine error: {0:?}")]
    Kv(E),
}
