//! The beacon-state aggregate the readers serve: data types, the
//! chunk-aligned codec, the tree walk, and the reflective schema.

use crate::constant::CHUNK_SIZE;
use crate::error::{DecodeError, MerkleError};
use crate::merkle::Merkleizer;
use crate::schema::SszType;
use crate::traits::{HashTreeRoot, SszSerialize, SszUnmarshal};
use crate::tree::TreeWalker;
use crate::types::{chunk_of_u64, u64_from_le, Chunk};
use alloy_primitives::{FixedBytes, B256};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// A four-byte fork version.
pub type Version = FixedBytes<4>;

/// A 48-byte BLS public key.
pub type Pubkey = FixedBytes<48>;

/// Capacity of the block and state root history lists.
pub const ROOTS_LIMIT: u64 = 8192;

/// Capacity of the validator registry and the balances list.
pub const VALIDATOR_REGISTRY_LIMIT: u64 = 1 << 40;

/// Number of fixed leading chunks in the serialized state: one each for
/// the genesis root and slot, three for the fork, five for the header.
const FIXED_CHUNKS: usize = 10;

/// Chunks per serialized validator: two for the pubkey, one per remaining
/// field.
const VALIDATOR_CHUNKS: usize = 9;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fork {
    pub previous_version: Version,
    pub current_version: Version,
    pub epoch: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BeaconBlockHeader {
    pub slot: u64,
    pub proposer_index: u64,
    pub parent_block_root: B256,
    pub state_root: B256,
    pub body_root: B256,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Validator {
    pub pubkey: Pubkey,
    pub withdrawal_credentials: B256,
    pub effective_balance: u64,
    pub slashed: bool,
    pub activation_eligibility_epoch: u64,
    pub activation_epoch: u64,
    pub exit_epoch: u64,
    pub withdrawable_epoch: u64,
}

impl Default for Validator {
    fn default() -> Self {
        Validator {
            pubkey: Pubkey::ZERO,
            withdrawal_credentials: B256::ZERO,
            effective_balance: 0,
            slashed: false,
            activation_eligibility_epoch: 0,
            activation_epoch: 0,
            exit_epoch: 0,
            withdrawable_epoch: 0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BeaconState {
    pub genesis_validators_root: B256,
    pub slot: u64,
    pub fork: Fork,
    pub latest_block_header: BeaconBlockHeader,
    pub block_roots: Vec<B256>,
    pub state_roots: Vec<B256>,
    pub validators: Vec<Validator>,
    pub balances: Vec<u64>,
}

// --- tree walk ---

impl HashTreeRoot for Fork {
    fn hash_tree_root_with(&self, w: &mut TreeWalker) -> Result<(), MerkleError> {
        let idx = w.index();
        w.put_bytes(self.previous_version.as_slice())?;
        w.put_bytes(self.current_version.as_slice())?;
        w.put_u64(self.epoch);
        w.merkleize(idx)
    }
}

impl HashTreeRoot for BeaconBlockHeader {
    fn hash_tree_root_with(&self, w: &mut TreeWalker) -> Result<(), MerkleError> {
        let idx = w.index();
        w.put_u64(self.slot);
        w.put_u64(self.proposer_index);
        w.put_bytes(self.parent_block_root.as_slice())?;
        w.put_bytes(self.state_root.as_slice())?;
        w.put_bytes(self.body_root.as_slice())?;
        w.merkleize(idx)
    }
}

impl HashTreeRoot for Validator {
    fn hash_tree_root_with(&self, w: &mut TreeWalker) -> Result<(), MerkleError> {
        let idx = w.index();
        w.put_bytes(self.pubkey.as_slice())?;
        w.put_bytes(self.withdrawal_credentials.as_slice())?;
        w.put_u64(self.effective_balance);
        w.put_bool(self.slashed);
        w.put_u64(self.activation_eligibility_epoch);
        w.put_u64(self.activation_epoch);
        w.put_u64(self.exit_epoch);
        w.put_u64(self.withdrawable_epoch);
        w.merkleize(idx)
    }
}

impl HashTreeRoot for BeaconState {
    fn hash_tree_root_with(&self, w: &mut TreeWalker) -> Result<(), MerkleError> {
        let idx = w.index();
        w.put_bytes(self.genesis_validators_root.as_slice())?;
        w.put_u64(self.slot);
        self.fork.hash_tree_root_with(w)?;
        self.latest_block_header.hash_tree_root_with(w)?;

        let sub = w.index();
        for root in &self.block_roots {
            w.append(root.as_slice());
        }
        w.merkleize_with_mixin(sub, self.block_roots.len() as u64, ROOTS_LIMIT)?;

        let sub = w.index();
        for root in &self.state_roots {
            w.append(root.as_slice());
        }
        w.merkleize_with_mixin(sub, self.state_roots.len() as u64, ROOTS_LIMIT)?;

        let sub = w.index();
        for validator in &self.validators {
            validator.hash_tree_root_with(w)?;
        }
        w.merkleize_with_mixin(sub, self.validators.len() as u64, VALIDATOR_REGISTRY_LIMIT)?;

        w.put_u64_list(&self.balances, VALIDATOR_REGISTRY_LIMIT)?;

        w.merkleize(idx)
    }
}

// --- merkleizer path ---
//
// The same roots computed through the merkleizer helpers instead of the
// tree walker; the two paths cross-check each other.

impl Fork {
    pub fn hash_tree_root(&self, m: &mut Merkleizer) -> Result<Chunk, MerkleError> {
        let roots = [
            m.merkleize_byte_slice(self.previous_version.as_slice())?,
            m.merkleize_byte_slice(self.current_version.as_slice())?,
            m.merkleize_basic(self.epoch)?,
        ];
        m.merkleize_container(&roots)
    }
}

impl BeaconBlockHeader {
    pub fn hash_tree_root(&self, m: &mut Merkleizer) -> Result<Chunk, MerkleError> {
        let roots = [
            m.merkleize_basic(self.slot)?,
            m.merkleize_basic(self.proposer_index)?,
            m.merkleize_byte_slice(self.parent_block_root.as_slice())?,
            m.merkleize_byte_slice(self.state_root.as_slice())?,
            m.merkleize_byte_slice(self.body_root.as_slice())?,
        ];
        m.merkleize_container(&roots)
    }
}

impl Validator {
    pub fn hash_tree_root(&self, m: &mut Merkleizer) -> Result<Chunk, MerkleError> {
        let roots = [
            m.merkleize_byte_slice(self.pubkey.as_slice())?,
            m.merkleize_byte_slice(self.withdrawal_credentials.as_slice())?,
            m.merkleize_basic(self.effective_balance)?,
            m.merkleize_basic(self.slashed)?,
            m.merkleize_basic(self.activation_eligibility_epoch)?,
            m.merkleize_basic(self.activation_epoch)?,
            m.merkleize_basic(self.exit_epoch)?,
            m.merkleize_basic(self.withdrawable_epoch)?,
        ];
        m.merkleize_container(&roots)
    }
}

impl BeaconState {
    /// Hash tree root computed through the merkleizer, independent of the
    /// tree walker and the persisted tree.
    pub fn hash_tree_root(&self) -> Result<Chunk, MerkleError> {
        let mut m = Merkleizer::new();

        let fork_root = self.fork.hash_tree_root(&mut m)?;
        let header_root = self.latest_block_header.hash_tree_root(&mut m)?;
        let validator_roots = self
            .validators
            .iter()
            .map(|v| v.hash_tree_root(&mut m))
            .collect::<Result<Vec<_>, _>>()?;

        let field_roots = [
            m.merkleize_byte_slice(self.genesis_validators_root.as_slice())?,
            m.merkleize_basic(self.slot)?,
            fork_root,
            header_root,
            m.merkleize_list_composite(&self.block_roots, ROOTS_LIMIT)?,
            m.merkleize_list_composite(&self.state_roots, ROOTS_LIMIT)?,
            m.merkleize_list_composite(&validator_roots, VALIDATOR_REGISTRY_LIMIT)?,
            m.merkleize_list_basic(&self.balances, VALIDATOR_REGISTRY_LIMIT)?,
        ];
        m.merkleize_container(&field_roots)
    }
}

// --- chunk-aligned codec ---

fn push_chunk(buf: &mut Vec<u8>, bytes: &[u8]) {
    debug_assert!(bytes.len() <= CHUNK_SIZE);
    let start = buf.len();
    buf.resize(start + CHUNK_SIZE, 0);
    buf[start..start + bytes.len()].copy_from_slice(bytes);
}

fn read_length_chunk(chunk: &[u8]) -> Result<u64, DecodeError> {
    if chunk[8..].iter().any(|&b| b != 0) {
        return Err(DecodeError::BadLengthChunk);
    }
    Ok(u64_from_le(chunk))
}

/// Locate the trailing list region of `chunks[floor..end]`: the length
/// chunk sits at `end - 1`, its data chunks immediately before it. Returns
/// the element count and the region start.
fn trailing_list(
    chunks: &[&[u8]],
    end: usize,
    floor: usize,
    limit: u64,
    data_chunks: impl Fn(u64) -> usize,
) -> Result<(u64, usize), DecodeError> {
    if end <= floor {
        return Err(DecodeError::Short {
            expected: floor + 1,
            found: end,
        });
    }
    let length = read_length_chunk(chunks[end - 1])?;
    if length > limit {
        return Err(DecodeError::LengthOverLimit { length, limit });
    }
    let start = end
        .checked_sub(1 + data_chunks(length))
        .filter(|s| *s >= floor)
        .ok_or(DecodeError::RegionMismatch)?;
    Ok((length, start))
}

impl SszSerialize for BeaconState {
    fn serialize_ssz(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        push_chunk(&mut buf, self.genesis_validators_root.as_slice());
        push_chunk(&mut buf, &self.slot.to_le_bytes());

        push_chunk(&mut buf, self.fork.previous_version.as_slice());
        push_chunk(&mut buf, self.fork.current_version.as_slice());
        push_chunk(&mut buf, &self.fork.epoch.to_le_bytes());

        let header = &self.latest_block_header;
        push_chunk(&mut buf, &header.slot.to_le_bytes());
        push_chunk(&mut buf, &header.proposer_index.to_le_bytes());
        push_chunk(&mut buf, header.parent_block_root.as_slice());
        push_chunk(&mut buf, header.state_root.as_slice());
        push_chunk(&mut buf, header.body_root.as_slice());

        for root in &self.block_roots {
            push_chunk(&mut buf, root.as_slice());
        }
        buf.extend_from_slice(chunk_of_u64(self.block_roots.len() as u64).as_slice());

        for root in &self.state_roots {
            push_chunk(&mut buf, root.as_slice());
        }
        buf.extend_from_slice(chunk_of_u64(self.state_roots.len() as u64).as_slice());

        for v in &self.validators {
            push_chunk(&mut buf, &v.pubkey.as_slice()[..32]);
            push_chunk(&mut buf, &v.pubkey.as_slice()[32..]);
            push_chunk(&mut buf, v.withdrawal_credentials.as_slice());
            push_chunk(&mut buf, &v.effective_balance.to_le_bytes());
            push_chunk(&mut buf, &[v.slashed as u8]);
            push_chunk(&mut buf, &v.activation_eligibility_epoch.to_le_bytes());
            push_chunk(&mut buf, &v.activation_epoch.to_le_bytes());
            push_chunk(&mut buf, &v.exit_epoch.to_le_bytes());
            push_chunk(&mut buf, &v.withdrawable_epoch.to_le_bytes());
        }
        buf.extend_from_slice(chunk_of_u64(self.validators.len() as u64).as_slice());

        for group in self.balances.chunks(4) {
            let mut chunk = [0u8; CHUNK_SIZE];
            for (i, b) in group.iter().enumerate() {
                chunk[i * 8..(i + 1) * 8].copy_from_slice(&b.to_le_bytes());
            }
            buf.extend_from_slice(&chunk);
        }
        buf.extend_from_slice(chunk_of_u64(self.balances.len() as u64).as_slice());

        buf
    }
}

impl Validator {
    fn from_chunks(c: &[&[u8]]) -> Self {
        let mut pubkey = [0u8; 48];
        pubkey[..32].copy_from_slice(c[0]);
        pubkey[32..].copy_from_slice(&c[1][..16]);
        Validator {
            pubkey: Pubkey::from(pubkey),
            withdrawal_credentials: B256::from_slice(c[2]),
            effective_balance: u64_from_le(c[3]),
            slashed: c[4][0] != 0,
            activation_eligibility_epoch: u64_from_le(c[5]),
            activation_epoch: u64_from_le(c[6]),
            exit_epoch: u64_from_le(c[7]),
            withdrawable_epoch: u64_from_le(c[8]),
        }
    }
}

impl SszUnmarshal for BeaconState {
    /// Decode the in-order leaf stream. The fixed fields occupy a known
    /// chunk prefix; the four list regions are located back to front from
    /// their trailing length chunks.
    fn unmarshal_ssz(bytes: &[u8]) -> Result<Self, DecodeError> {
        if bytes.len() % CHUNK_SIZE != 0 {
            return Err(DecodeError::Misaligned(bytes.len()));
        }
        let chunks: Vec<&[u8]> = bytes.chunks(CHUNK_SIZE).collect();

        let mut end = chunks.len();

        let (balances_len, start) =
            trailing_list(&chunks, end, FIXED_CHUNKS, VALIDATOR_REGISTRY_LIMIT, |l| {
                (l as usize).div_ceil(4)
            })?;
        let mut balances = Vec::with_capacity(balances_len as usize);
        for i in 0..balances_len as usize {
            balances.push(u64_from_le(&chunks[start + i / 4][(i % 4) * 8..]));
        }
        end = start;

        let (validators_len, start) =
            trailing_list(&chunks, end, FIXED_CHUNKS, VALIDATOR_REGISTRY_LIMIT, |l| {
                l as usize * VALIDATOR_CHUNKS
            })?;
        let mut validators = Vec::with_capacity(validators_len as usize);
        for i in 0..validators_len as usize {
            let at = start + i * VALIDATOR_CHUNKS;
            validators.push(Validator::from_chunks(&chunks[at..at + VALIDATOR_CHUNKS]));
        }
        end = start;

        let (state_roots_len, start) =
            trailing_list(&chunks, end, FIXED_CHUNKS, ROOTS_LIMIT, |l| l as usize)?;
        let state_roots = chunks[start..start + state_roots_len as usize]
            .iter()
            .map(|c| B256::from_slice(c))
            .collect();
        end = start;

        let (block_roots_len, start) =
            trailing_list(&chunks, end, FIXED_CHUNKS, ROOTS_LIMIT, |l| l as usize)?;
        let block_roots = chunks[start..start + block_roots_len as usize]
            .iter()
            .map(|c| B256::from_slice(c))
            .collect();

        if start != FIXED_CHUNKS {
            return Err(DecodeError::RegionMismatch);
        }

        Ok(BeaconState {
            genesis_validators_root: B256::from_slice(chunks[0]),
            slot: u64_from_le(chunks[1]),
            fork: Fork {
                previous_version: Version::from_slice(&chunks[2][..4]),
                current_version: Version::from_slice(&chunks[3][..4]),
                epoch: u64_from_le(chunks[4]),
            },
            latest_block_header: BeaconBlockHeader {
                slot: u64_from_le(chunks[5]),
                proposer_index: u64_from_le(chunks[6]),
                parent_block_root: B256::from_slice(chunks[7]),
                state_root: B256::from_slice(chunks[8]),
                body_root: B256::from_slice(chunks[9]),
            },
            block_roots,
            state_roots,
            validators,
            balances,
        })
    }
}

// --- schema ---

static BEACON_STATE_SCHEMA: Lazy<SszType> = Lazy::new(|| {
    SszType::container(vec![
        ("genesis_validators_root", SszType::byte_vector(32)),
        ("slot", SszType::uint64()),
        (
            "fork",
            SszType::container(vec![
                ("previous_version", SszType::byte_vector(4)),
                ("current_version", SszType::byte_vector(4)),
                ("epoch", SszType::uint64()),
            ]),
        ),
        (
            "latest_block_header",
            SszType::container(vec![
                ("slot", SszType::uint64()),
                ("proposer_index", SszType::uint64()),
                ("parent_block_root", SszType::byte_vector(32)),
                ("state_root", SszType::byte_vector(32)),
                ("body_root", SszType::byte_vector(32)),
            ]),
        ),
        (
            "block_roots",
            SszType::list(SszType::byte_vector(32), ROOTS_LIMIT),
        ),
        (
            "state_roots",
            SszType::list(SszType::byte_vector(32), ROOTS_LIMIT),
        ),
        (
            "validators",
            SszType::list(validator_schema(), VALIDATOR_REGISTRY_LIMIT),
        ),
        (
            "balances",
            SszType::list(SszType::uint64(), VALIDATOR_REGISTRY_LIMIT),
        ),
    ])
});

fn validator_schema() -> SszType {
    SszType::container(vec![
        ("pubkey", SszType::byte_vector(48)),
        ("withdrawal_credentials", SszType::byte_vector(32)),
        ("effective_balance", SszType::uint64()),
        ("slashed", SszType::boolean()),
        ("activation_eligibility_epoch", SszType::uint64()),
        ("activation_epoch", SszType::uint64()),
        ("exit_epoch", SszType::uint64()),
        ("withdrawable_epoch", SszType::uint64()),
    ])
}

/// The cached schema of [`BeaconState`], built on first use.
pub fn beacon_state_schema() -> &'static SszType {
    &BEACON_STATE_SCHEMA
}
