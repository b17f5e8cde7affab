//! In-memory storage engine for the tree store.
//!
//! [`MemStore`] implements the [`KvStore`] trait over a [`BTreeMap`]. It is
//! not a tree itself, merely the byte storage underneath one.
//!
//! # Usage
//!
//! `MemStore` is primarily intended for:
//! - Unit testing and integration testing
//! - Development and debugging
//! - Serving as a reference implementation of the storage trait
//!
//! For production use cases requiring persistence, use a database-backed
//! engine instead of this in-memory version.
//!
//! # Thread Safety
//!
//! All operations are thread-safe through the use of [`RwLock`] for
//! interior mutability: multiple concurrent readers or a single writer.

use crate::traits::KvStore;
use std::{
    collections::BTreeMap,
    convert::Infallible,
    sync::atomic::{AtomicBool, Ordering},
    sync::RwLock,
};

/// In-memory key/value engine backed by an ordered map.
#[derive(Debug, Default)]
pub struct MemStore {
    kvs: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
    closed: AtomicBool,
}

impl Clone for MemStore {
    fn clone(&self) -> Self {
        Self {
            kvs: RwLock::new(self.kvs.read().expect("kv lock poisoned").clone()),
            closed: AtomicBool::new(self.closed.load(Ordering::Relaxed)),
        }
    }
}

impl MemStore {
    /// Creates a new empty `MemStore`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.kvs.read().expect("kv lock poisoned").len()
    }

    /// True when nothing has been stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of all stored keys, in byte order.
    pub fn keys(&self) -> Vec<Vec<u8>> {
        self.kvs
            .read()
            .expect("kv lock poisoned")
            .keys()
            .cloned()
            .collect()
    }
}

impl KvStore for MemStore {
    type Error = Infallible;

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, Self::Error> {
        debug_assert!(!self.closed.load(Ordering::Relaxed), "read after close");
        Ok(self.kvs.read().expect("kv lock poisoned").get(key).cloned())
    }

    fn set(&self, key: &[u8], value: &[u8]) -> Result<(), Self::Error> {
        debug_assert!(!self.closed.load(Ordering::Relaxed), "write after close");
        self.kvs
            .write()
            .expect("kv lock poisoned")
            .insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn close(&mut self) -> Result<(), Self::Error> {
        self.closed.store(true, Ordering::Relaxed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Get-after-set must be byte-for-byte faithful, and overwrites must
    /// replace the previous value.
    #[test]
    fn test_get_after_set() {
        let store = MemStore::new();
        assert_eq!(store.get(b"missing").unwrap(), None);

        store.set(b"key", &[1, 2, 3]).unwrap();
        assert_eq!(store.get(b"key").unwrap(), Some(vec![1, 2, 3]));

        store.set(b"key", &[4]).unwrap();
        assert_eq!(store.get(b"key").unwrap(), Some(vec![4]));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_clone_is_deep() {
        let store = MemStore::new();
        store.set(b"a", &[1]).unwrap();

        let copy = store.clone();
        store.set(b"b", &[2]).unwrap();

        assert_eq!(copy.len(), 1);
        assert_eq!(store.len(), 2);
    }
}
