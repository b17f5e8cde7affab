//! The persistence layer: saving an object's full Merkle tree under gindex
//! keys and reading it back, whole or leaf by leaf.

use crate::error::StoreError;
use crate::traits::{HashTreeRoot, KvStore, SszUnmarshal};
use crate::tree::{self, Node};
use crate::types::{key_bytes, Chunk, Gindex};

/// Merkle-indexed store over a key/value engine.
///
/// The store is stateless beyond the open engine: the root object is passed
/// explicitly to [`SszDb::save_monolith`], the in-memory tree lives only
/// for the duration of that call, and reads are served straight from the
/// engine.
#[derive(Debug)]
pub struct SszDb<S> {
    store: S,
}

impl<S: KvStore> SszDb<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// The underlying engine.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Consume the db and release the engine.
    pub fn close(mut self) -> Result<(), StoreError<S::Error>> {
        self.store.close().map_err(StoreError::Kv)
    }

    /// Build the object's tree, hash it, and persist every node under its
    /// gindex key, pre-order from the root.
    pub fn save_monolith<T: HashTreeRoot>(&self, obj: &T) -> Result<(), StoreError<S::Error>> {
        let mut root = tree::from_object(obj)?;
        let root_hash = root.cached_hash();
        tracing::debug!(root = %root_hash, "saving object tree");
        self.save(&root, 1)
    }

    fn save(&self, node: &Node, gindex: Gindex) -> Result<(), StoreError<S::Error>> {
        self.store
            .set(&key_bytes(gindex), &node.encode())
            .map_err(StoreError::Kv)?;

        match (&node.left, &node.right) {
            (None, None) => Ok(()),
            (Some(left), Some(right)) => {
                self.save(left, 2 * gindex)?;
                self.save(right, 2 * gindex + 1)
            }
            _ => Err(StoreError::UnbalancedNode(gindex)),
        }
    }

    /// The persisted root hash: `value(1)`.
    pub fn root_hash(&self) -> Result<Chunk, StoreError<S::Error>> {
        Ok(self.must_get_node(1)?.chunk())
    }

    /// Reassemble the in-order leaf byte stream and decode it.
    pub fn load<T: SszUnmarshal>(&self) -> Result<T, StoreError<S::Error>> {
        let root = self.must_get_node(1)?;
        let mut buf = Vec::new();
        self.leaf_bytes(&root, 1, &mut buf)?;
        tracing::debug!(bytes = buf.len(), "loaded leaf stream");
        Ok(T::unmarshal_ssz(&buf)?)
    }

    fn leaf_bytes(
        &self,
        node: &Node,
        gindex: Gindex,
        out: &mut Vec<u8>,
    ) -> Result<(), StoreError<S::Error>> {
        let left = self.get_node(2 * gindex)?;
        let right = self.get_node(2 * gindex + 1)?;
        match (left, right) {
            (None, None) => {
                // Empty subtrees are virtual padding, not serialized bytes.
                if !node.is_empty {
                    out.extend_from_slice(node.chunk().as_slice());
                }
                Ok(())
            }
            (Some(left), Some(right)) => {
                self.leaf_bytes(&left, 2 * gindex, out)?;
                self.leaf_bytes(&right, 2 * gindex + 1, out)
            }
            _ => Err(StoreError::UnbalancedNode(gindex)),
        }
    }

    /// `byte_len` contiguous bytes spanning consecutive leaves starting at
    /// `gindex`; the final leaf is truncated to the remainder.
    pub fn get_node_bytes(
        &self,
        gindex: Gindex,
        byte_len: u64,
    ) -> Result<Vec<u8>, StoreError<S::Error>> {
        let num_nodes = byte_len.div_ceil(32);
        let rem = (byte_len % 32) as usize;

        let mut buf = Vec::with_capacity(byte_len as usize);
        for i in 0..num_nodes {
            let node = self.must_get_node(gindex + i)?;
            let chunk = node.chunk();
            if i == num_nodes - 1 && rem != 0 {
                buf.extend_from_slice(&chunk[..rem]);
            } else {
                buf.extend_from_slice(chunk.as_slice());
            }
        }
        Ok(buf)
    }

    fn get_node(&self, gindex: Gindex) -> Result<Option<Node>, StoreError<S::Error>> {
        match self.store.get(&key_bytes(gindex)).map_err(StoreError::Kv)? {
            None => Ok(None),
            Some(bytes) => Ok(Some(Node::decode(&bytes)?)),
        }
    }

    fn must_get_node(&self, gindex: Gindex) -> Result<Node, StoreError<S::Error>> {
        self.get_node(gindex)?
            .ok_or(StoreError::NodeNotFound(gindex))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MerkleError;
    use crate::mem_store::MemStore;
    use crate::tree::TreeWalker;
    use crate::types::{hash_pair, u64_from_le};

    /// A two-field container: one chunk field and a u64 list.
    struct Pair {
        word: Chunk,
        values: Vec<u64>,
    }

    impl HashTreeRoot for Pair {
        fn hash_tree_root_with(&self, w: &mut TreeWalker) -> Result<(), MerkleError> {
            let idx = w.index();
            w.put_bytes(self.word.as_slice())?;
            w.put_u64_list(&self.values, 16)?;
            w.merkleize(idx)
        }
    }

    fn sample() -> Pair {
        Pair {
            word: Chunk::repeat_byte(3),
            values: vec![5, 6, 7],
        }
    }

    #[test]
    fn test_save_writes_root_and_leaves() {
        let db = SszDb::new(MemStore::new());
        db.save_monolith(&sample()).unwrap();

        // Root, word leaf at 2, list anchor at 3 with data and length below.
        assert_eq!(db.get_node_bytes(2, 32).unwrap(), vec![3u8; 32]);
        let len = db.get_node_bytes(2 * 3 + 1, 8).unwrap();
        assert_eq!(u64_from_le(&len), 3);

        // 16 u64s of capacity pack into 4 chunks: element 2 sits in the
        // first data chunk at byte offset 16.
        let data = db.get_node_bytes(3 * 2 * 4, 32).unwrap();
        assert_eq!(u64_from_le(&data[16..]), 7);
    }

    /// Every stored internal node must hash its stored children.
    #[test]
    fn test_parent_hash_invariant() {
        let db = SszDb::new(MemStore::new());
        db.save_monolith(&sample()).unwrap();

        let mut checked = 0;
        for key in db.store().keys() {
            let gindex = u64_from_le(&key);
            let (left, right) = (
                db.get_node(2 * gindex).unwrap(),
                db.get_node(2 * gindex + 1).unwrap(),
            );
            if let (Some(left), Some(right)) = (left, right) {
                if left.is_empty || right.is_empty {
                    continue;
                }
                let parent = db.must_get_node(gindex).unwrap();
                assert_eq!(parent.chunk(), hash_pair(&left.chunk(), &right.chunk()));
                checked += 1;
            }
        }
        assert!(checked > 0);
    }

    #[test]
    fn test_missing_node_is_not_found() {
        let db = SszDb::new(MemStore::new());
        assert!(matches!(
            db.get_node_bytes(42, 32),
            Err(StoreError::NodeNotFound(42))
        ));
        assert!(matches!(db.root_hash(), Err(StoreError::NodeNotFound(1))));
    }

    #[test]
    fn test_unbalanced_stored_tree_rejected() {
        let store = MemStore::new();
        let db = SszDb::new(store);
        db.save_monolith(&sample()).unwrap();

        // Orphan a right child: give gindex 4 a sibling-less parent by
        // planting a child under the word leaf at gindex 2.
        db.store()
            .set(&key_bytes(4), &Node::leaf(Chunk::ZERO).encode())
            .unwrap();
        assert!(matches!(
            db.load::<RawStream>(),
            Err(StoreError::UnbalancedNode(2))
        ));
    }

    /// Unmarshaler that accepts any leaf stream.
    struct RawStream;

    impl SszUnmarshal for RawStream {
        fn unmarshal_ssz(_: &[u8]) -> Result<Self, crate::error::DecodeError> {
            Ok(RawStream)
        }
    }
}
