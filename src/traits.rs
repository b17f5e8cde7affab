//! Contracts between the store, its engine, and the objects it persists.

use crate::error::{DecodeError, MerkleError};
use crate::tree::TreeWalker;
use std::fmt::Debug;

/// Minimal contract over an ordered byte key/value engine.
///
/// Implementations must preserve byte-for-byte fidelity on get-after-set
/// within a session. Writes need not be synchronously durable: the engine
/// holds a cache of a derivable tree, and durability is an operator
/// concern.
pub trait KvStore {
    /// Engine failure type.
    type Error: Debug + Send;

    /// Fetch a value. `Ok(None)` is the not-found signal.
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, Self::Error>;

    /// Store a value, replacing any previous one under the same key.
    fn set(&self, key: &[u8], value: &[u8]) -> Result<(), Self::Error>;

    /// Release the engine. Further calls are a caller bug.
    fn close(&mut self) -> Result<(), Self::Error>;
}

/// Chunk-aligned serialization: the exact in-order concatenation of the
/// non-empty leaf chunks of the object's tree. Each materialized leaf
/// contributes 32 bytes; a list contributes its data chunks followed by its
/// length chunk.
pub trait SszSerialize {
    fn serialize_ssz(&self) -> Vec<u8>;
}

/// Inverse of [`SszSerialize`].
pub trait SszUnmarshal: Sized {
    fn unmarshal_ssz(bytes: &[u8]) -> Result<Self, DecodeError>;
}

/// Capability to drive a [`TreeWalker`] over the object in SSZ field order,
/// recording leaf chunks and merge instructions.
pub trait HashTreeRoot {
    fn hash_tree_root_with(&self, w: &mut TreeWalker) -> Result<(), MerkleError>;
}
