//! Reader with hand-written gindex arithmetic for the beacon-state layout.
//!
//! Every accessor hard-codes the position math with local constants. The
//! schema-driven [`MetadataReader`](crate::metadata::MetadataReader) derives
//! the same positions; the two cross-check each other.

use crate::constant::next_power_of_two;
use crate::db::SszDb;
use crate::error::StoreError;
use crate::state::{BeaconBlockHeader, Fork, Pubkey, Validator, Version};
use crate::traits::KvStore;
use crate::types::{u64_from_le, Gindex};
use alloy_primitives::B256;

/// The root container holds eight fields, so its leaves start at gindex 8.
const STATE_NUM_FIELDS: u64 = 8;

#[derive(Debug)]
pub struct BespokeReader<'a, S> {
    db: &'a SszDb<S>,
}

impl<'a, S: KvStore> BespokeReader<'a, S> {
    pub fn new(db: &'a SszDb<S>) -> Self {
        Self { db }
    }

    pub fn genesis_validators_root(&self) -> Result<B256, StoreError<S::Error>> {
        const FIELD_INDEX: u64 = 0;
        const LENGTH: u64 = 32;

        let gindex = next_power_of_two(STATE_NUM_FIELDS) + FIELD_INDEX;
        let bz = self.db.get_node_bytes(gindex, LENGTH)?;
        Ok(B256::from_slice(&bz))
    }

    pub fn slot(&self) -> Result<u64, StoreError<S::Error>> {
        const FIELD_INDEX: u64 = 1;
        const LENGTH: u64 = 8;

        let gindex = next_power_of_two(STATE_NUM_FIELDS) + FIELD_INDEX;
        let bz = self.db.get_node_bytes(gindex, LENGTH)?;
        Ok(u64_from_le(&bz))
    }

    pub fn fork(&self) -> Result<Fork, StoreError<S::Error>> {
        const ANCHOR: Gindex = 10; // field 2 under the root
        const NUM_FIELDS: u64 = 3;

        let mut gindex = ANCHOR * next_power_of_two(NUM_FIELDS);
        let bz = self.db.get_node_bytes(gindex, 4)?;
        let previous_version = Version::from_slice(&bz);
        gindex += 1;
        let bz = self.db.get_node_bytes(gindex, 4)?;
        let current_version = Version::from_slice(&bz);
        gindex += 1;
        let bz = self.db.get_node_bytes(gindex, 8)?;
        Ok(Fork {
            previous_version,
            current_version,
            epoch: u64_from_le(&bz),
        })
    }

    pub fn latest_block_header(&self) -> Result<BeaconBlockHeader, StoreError<S::Error>> {
        const ANCHOR: Gindex = 11; // field 3 under the root
        const NUM_FIELDS: u64 = 5;

        let base = ANCHOR * next_power_of_two(NUM_FIELDS);
        Ok(BeaconBlockHeader {
            slot: u64_from_le(&self.db.get_node_bytes(base, 8)?),
            proposer_index: u64_from_le(&self.db.get_node_bytes(base + 1, 8)?),
            parent_block_root: B256::from_slice(&self.db.get_node_bytes(base + 2, 32)?),
            state_root: B256::from_slice(&self.db.get_node_bytes(base + 3, 32)?),
            body_root: B256::from_slice(&self.db.get_node_bytes(base + 4, 32)?),
        })
    }

    pub fn block_roots_len(&self) -> Result<u64, StoreError<S::Error>> {
        const ANCHOR: Gindex = 12;
        self.list_len(ANCHOR)
    }

    pub fn block_root(&self, index: u64) -> Result<B256, StoreError<S::Error>> {
        const ANCHOR: Gindex = 12;
        const CHUNKS: u64 = 8192;

        let gindex = ANCHOR * 2 * next_power_of_two(CHUNKS) + index;
        let bz = self.db.get_node_bytes(gindex, 32)?;
        Ok(B256::from_slice(&bz))
    }

    pub fn block_roots(&self) -> Result<Vec<B256>, StoreError<S::Error>> {
        (0..self.block_roots_len()?)
            .map(|i| self.block_root(i))
            .collect()
    }

    pub fn state_roots_len(&self) -> Result<u64, StoreError<S::Error>> {
        const ANCHOR: Gindex = 13;
        self.list_len(ANCHOR)
    }

    pub fn state_root(&self, index: u64) -> Result<B256, StoreError<S::Error>> {
        const ANCHOR: Gindex = 13;
        const CHUNKS: u64 = 8192;

        let gindex = ANCHOR * 2 * next_power_of_two(CHUNKS) + index;
        let bz = self.db.get_node_bytes(gindex, 32)?;
        Ok(B256::from_slice(&bz))
    }

    pub fn state_roots(&self) -> Result<Vec<B256>, StoreError<S::Error>> {
        (0..self.state_roots_len()?)
            .map(|i| self.state_root(i))
            .collect()
    }

    pub fn validators_len(&self) -> Result<u64, StoreError<S::Error>> {
        const ANCHOR: Gindex = 14;
        self.list_len(ANCHOR)
    }

    pub fn validator(&self, index: u64) -> Result<Validator, StoreError<S::Error>> {
        const ANCHOR: Gindex = 14;
        const CHUNKS: u64 = 1 << 40; // one chunk per element root
        const ELEMENT_NUM_FIELDS: u64 = 8;

        let element = ANCHOR * 2 * CHUNKS + index;
        let base = element * ELEMENT_NUM_FIELDS;

        // The pubkey occupies a two-chunk subtree of its own.
        let bz = self.db.get_node_bytes(base * 2, 48)?;
        let pubkey = Pubkey::from_slice(&bz);

        Ok(Validator {
            pubkey,
            withdrawal_credentials: B256::from_slice(&self.db.get_node_bytes(base + 1, 32)?),
            effective_balance: u64_from_le(&self.db.get_node_bytes(base + 2, 8)?),
            slashed: self.db.get_node_bytes(base + 3, 1)?[0] != 0,
            activation_eligibility_epoch: u64_from_le(&self.db.get_node_bytes(base + 4, 8)?),
            activation_epoch: u64_from_le(&self.db.get_node_bytes(base + 5, 8)?),
            exit_epoch: u64_from_le(&self.db.get_node_bytes(base + 6, 8)?),
            withdrawable_epoch: u64_from_le(&self.db.get_node_bytes(base + 7, 8)?),
        })
    }

    pub fn validators(&self) -> Result<Vec<Validator>, StoreError<S::Error>> {
        (0..self.validators_len()?)
            .map(|i| self.validator(i))
            .collect()
    }

    pub fn balances_len(&self) -> Result<u64, StoreError<S::Error>> {
        const ANCHOR: Gindex = 15;
        self.list_len(ANCHOR)
    }

    pub fn balance(&self, index: u64) -> Result<u64, StoreError<S::Error>> {
        const ANCHOR: Gindex = 15;
        const CHUNKS: u64 = 1 << 38; // four u64s per chunk at capacity 2^40

        let gindex = ANCHOR * 2 * CHUNKS + index / 4;
        let offset = (index % 4) as usize * 8;
        let bz = self.db.get_node_bytes(gindex, 32)?;
        Ok(u64_from_le(&bz[offset..]))
    }

    pub fn balances(&self) -> Result<Vec<u64>, StoreError<S::Error>> {
        (0..self.balances_len()?).map(|i| self.balance(i)).collect()
    }

    /// The list's length node lives at the right child of its anchor:
    /// 8 bytes, little-endian.
    fn list_len(&self, anchor: Gindex) -> Result<u64, StoreError<S::Error>> {
        let bz = self.db.get_node_bytes(2 * anchor + 1, 8)?;
        Ok(u64_from_le(&bz))
    }
}
