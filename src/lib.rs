#![doc = include_str!("../README.md")]

pub mod constant;
pub mod error;
pub mod types;

pub mod traits;

pub mod mem_store;
pub use mem_store::MemStore;

pub mod merkle;
pub use merkle::Merkleizer;

pub mod tree;
pub use tree::{Node, TreeWalker};

pub mod schema;
pub use schema::{get_tree_node, ObjectPath, SszType};

pub mod db;
pub use db::SszDb;

pub mod bespoke;
pub use bespoke::BespokeReader;
pub mod metadata;
pub use metadata::MetadataReader;

pub mod state;

pub use error::{DecodeError, MerkleError, SchemaError, StoreError};
pub use traits::{HashTreeRoot, KvStore, SszSerialize, SszUnmarshal};
pub use types::{Chunk, Gindex};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{BeaconState, Fork, Validator, Version};
    use alloy_primitives::B256;

    /// A simple end-to-end test demonstrating the complete workflow: build
    /// a state, persist its tree, read fields back through both readers,
    /// and reload the whole object.
    #[test]
    fn basic_integration_test() -> Result<(), Box<dyn std::error::Error>> {
        let mut state = BeaconState {
            genesis_validators_root: B256::repeat_byte(7),
            slot: 777,
            fork: Fork {
                previous_version: Version::from([1, 2, 3, 4]),
                current_version: Version::from([5, 6, 7, 8]),
                epoch: 123,
            },
            ..Default::default()
        };
        state.latest_block_header.slot = 777;
        state.latest_block_header.proposer_index = 123;
        fn root_from_prefix(prefix: [u8; 4]) -> B256 {
            let mut bytes = [0u8; 32];
            bytes[..4].copy_from_slice(&prefix);
            B256::from(bytes)
        }
        state.block_roots = vec![
            root_from_prefix([1, 2, 3, 4]),
            root_from_prefix([5, 6, 7, 8]),
            root_from_prefix([9, 10, 11, 12]),
            root_from_prefix([13, 14, 15, 16]),
        ];
        state.validators = vec![Validator {
            effective_balance: 32_000_000_000,
            ..Default::default()
        }];
        state.balances = vec![32_000_000_000];

        let db = SszDb::new(MemStore::new());
        db.save_monolith(&state)?;

        // The persisted root is the object's hash tree root.
        assert_eq!(db.root_hash()?, state.hash_tree_root()?);

        let bespoke = BespokeReader::new(&db);
        let metadata = MetadataReader::new(&db);

        assert_eq!(bespoke.slot()?, 777);
        assert_eq!(metadata.slot()?, 777);
        assert_eq!(
            bespoke.genesis_validators_root()?,
            state.genesis_validators_root
        );
        assert_eq!(bespoke.fork()?, state.fork);
        assert_eq!(metadata.fork()?, state.fork);
        assert_eq!(bespoke.latest_block_header()?, state.latest_block_header);
        assert_eq!(metadata.latest_block_header()?, state.latest_block_header);

        assert_eq!(bespoke.block_roots_len()?, 4);
        assert_eq!(metadata.block_roots_len()?, 4);
        assert_eq!(bespoke.block_root(2)?, state.block_roots[2]);
        assert_eq!(metadata.block_root(2)?, state.block_roots[2]);

        assert_eq!(bespoke.validators()?, state.validators);
        assert_eq!(metadata.validators()?, state.validators);
        assert_eq!(bespoke.balance(0)?, 32_000_000_000);
        assert_eq!(metadata.balance(0)?, 32_000_000_000);

        // The leaf stream reassembles to the serialized object.
        let loaded: BeaconState = db.load()?;
        assert_eq!(loaded, state);
        assert_eq!(loaded.hash_tree_root()?, db.root_hash()?);

        db.close()?;
        Ok(())
    }

    /// The reassembled leaf stream must be byte-identical to the object's
    /// serialization.
    #[test]
    fn test_leaf_stream_matches_serialization() {
        struct CaptureStream(Vec<u8>);

        impl SszUnmarshal for CaptureStream {
            fn unmarshal_ssz(bytes: &[u8]) -> Result<Self, DecodeError> {
                Ok(CaptureStream(bytes.to_vec()))
            }
        }

        let state = crate::state::tests::sample_state();
        let db = SszDb::new(MemStore::new());
        db.save_monolith(&state).unwrap();

        let stream: CaptureStream = db.load().unwrap();
        assert_eq!(stream.0, state.serialize_ssz());
    }
}
