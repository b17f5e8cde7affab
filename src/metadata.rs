//! Reader that resolves every access through the reflective schema.
//!
//! Same surface as [`BespokeReader`](crate::bespoke::BespokeReader): each
//! accessor builds an object path, asks the schema for `{gindex, offset}`,
//! and fetches only the leaves that position needs.

use crate::constant::next_power_of_two;
use crate::db::SszDb;
use crate::error::StoreError;
use crate::schema::{get_tree_node, ObjectPath};
use crate::state::{beacon_state_schema, BeaconBlockHeader, Fork, Pubkey, Validator, Version};
use crate::traits::KvStore;
use crate::types::u64_from_le;
use alloy_primitives::B256;

#[derive(Debug)]
pub struct MetadataReader<'a, S> {
    db: &'a SszDb<S>,
}

impl<'a, S: KvStore> MetadataReader<'a, S> {
    pub fn new(db: &'a SszDb<S>) -> Self {
        Self { db }
    }

    /// Resolve a path and fetch the bytes of the leaf it names. Multi-chunk
    /// byte vectors anchor an internal node, so the read steps down to
    /// their first chunk; packed basic leaves are sliced at the resolved
    /// intra-chunk offset.
    fn leaf_bytes(&self, path: &ObjectPath) -> Result<Vec<u8>, StoreError<S::Error>> {
        let node = get_tree_node(beacon_state_schema(), path)?;
        let size = node.typ.leaf_size();

        let mut gindex = node.gindex;
        let chunks = node.typ.chunks();
        if chunks > 1 {
            gindex *= next_power_of_two(chunks);
        }

        if node.offset > 0 {
            let bz = self
                .db
                .get_node_bytes(gindex, node.offset as u64 + size)?;
            Ok(bz[node.offset as usize..].to_vec())
        } else {
            self.db.get_node_bytes(gindex, size)
        }
    }

    fn list_len(&self, name: &str) -> Result<u64, StoreError<S::Error>> {
        let bz = self.leaf_bytes(&ObjectPath::named(&[name]).append_length())?;
        Ok(u64_from_le(&bz))
    }

    pub fn genesis_validators_root(&self) -> Result<B256, StoreError<S::Error>> {
        let bz = self.leaf_bytes(&ObjectPath::named(&["genesis_validators_root"]))?;
        Ok(B256::from_slice(&bz))
    }

    pub fn slot(&self) -> Result<u64, StoreError<S::Error>> {
        let bz = self.leaf_bytes(&ObjectPath::named(&["slot"]))?;
        Ok(u64_from_le(&bz))
    }

    pub fn fork(&self) -> Result<Fork, StoreError<S::Error>> {
        let bz = self.leaf_bytes(&ObjectPath::named(&["fork", "previous_version"]))?;
        let previous_version = Version::from_slice(&bz);
        let bz = self.leaf_bytes(&ObjectPath::named(&["fork", "current_version"]))?;
        let current_version = Version::from_slice(&bz);
        let bz = self.leaf_bytes(&ObjectPath::named(&["fork", "epoch"]))?;
        Ok(Fork {
            previous_version,
            current_version,
            epoch: u64_from_le(&bz),
        })
    }

    pub fn latest_block_header(&self) -> Result<BeaconBlockHeader, StoreError<S::Error>> {
        let field = |name| ObjectPath::named(&["latest_block_header", name]);
        Ok(BeaconBlockHeader {
            slot: u64_from_le(&self.leaf_bytes(&field("slot"))?),
            proposer_index: u64_from_le(&self.leaf_bytes(&field("proposer_index"))?),
            parent_block_root: B256::from_slice(&self.leaf_bytes(&field("parent_block_root"))?),
            state_root: B256::from_slice(&self.leaf_bytes(&field("state_root"))?),
            body_root: B256::from_slice(&self.leaf_bytes(&field("body_root"))?),
        })
    }

    pub fn block_roots_len(&self) -> Result<u64, StoreError<S::Error>> {
        self.list_len("block_roots")
    }

    pub fn block_root(&self, index: u64) -> Result<B256, StoreError<S::Error>> {
        let bz = self.leaf_bytes(&ObjectPath::named(&["block_roots"]).append_index(index))?;
        Ok(B256::from_slice(&bz))
    }

    pub fn block_roots(&self) -> Result<Vec<B256>, StoreError<S::Error>> {
        (0..self.block_roots_len()?)
            .map(|i| self.block_root(i))
            .collect()
    }

    pub fn state_roots_len(&self) -> Result<u64, StoreError<S::Error>> {
        self.list_len("state_roots")
    }

    pub fn state_root(&self, index: u64) -> Result<B256, StoreError<S::Error>> {
        let bz = self.leaf_bytes(&ObjectPath::named(&["state_roots"]).append_index(index))?;
        Ok(B256::from_slice(&bz))
    }

    pub fn state_roots(&self) -> Result<Vec<B256>, StoreError<S::Error>> {
        (0..self.state_roots_len()?)
            .map(|i| self.state_root(i))
            .collect()
    }

    pub fn validators_len(&self) -> Result<u64, StoreError<S::Error>> {
        self.list_len("validators")
    }

    pub fn validator(&self, index: u64) -> Result<Validator, StoreError<S::Error>> {
        let base = ObjectPath::named(&["validators"]).append_index(index);
        let field = |name| base.clone().append_name(name);

        let bz = self.leaf_bytes(&field("pubkey"))?;
        let pubkey = Pubkey::from_slice(&bz);

        Ok(Validator {
            pubkey,
            withdrawal_credentials: B256::from_slice(
                &self.leaf_bytes(&field("withdrawal_credentials"))?,
            ),
            effective_balance: u64_from_le(&self.leaf_bytes(&field("effective_balance"))?),
            slashed: self.leaf_bytes(&field("slashed"))?[0] != 0,
            activation_eligibility_epoch: u64_from_le(
                &self.leaf_bytes(&field("activation_eligibility_epoch"))?,
            ),
            activation_epoch: u64_from_le(&self.leaf_bytes(&field("activation_epoch"))?),
            exit_epoch: u64_from_le(&self.leaf_bytes(&field("exit_epoch"))?),
            withdrawable_epoch: u64_from_le(&self.leaf_bytes(&field("withdrawable_epoch"))?),
        })
    }

    pub fn validators(&self) -> Result<Vec<Validator>, StoreError<S::Error>> {
        (0..self.validators_len()?)
            .map(|i| self.validator(i))
            .collect()
    }

    pub fn balances_len(&self) -> Result<u64, StoreError<S::Error>> {
        self.list_len("balances")
    }

    pub fn balance(&self, index: u64) -> Result<u64, StoreError<S::Error>> {
        let bz = self.leaf_bytes(&ObjectPath::named(&["balances"]).append_index(index))?;
        Ok(u64_from_le(&bz))
    }

    pub fn balances(&self) -> Result<Vec<u64>, StoreError<S::Error>> {
        (0..self.balances_len()?).map(|i| self.balance(i)).collect()
    }
}
