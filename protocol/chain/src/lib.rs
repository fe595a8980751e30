use alloy_primitives::{keccak256, Address, Bytes, B256, U256};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Fixed number of extra-data prefix bytes reserved for validator vanity.
pub const EXTRA_VANITY: usize = 32;
/// Fixed number of extra-data suffix bytes reserved for the validator seal.
pub const EXTRA_SEAL: usize = 65;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub parent_hash: B256,
    pub number: u64,
    pub coinbase: Address,
    pub timestamp: u64,
    pub root: B256,
    pub extra: Bytes,
}

impl BlockHeader {
    /// Keccak-256 over the fixed-width field concatenation. Stable across
    /// processes; used as the cache key for per-ancestor governance views.
    pub fn hash(&self) -> B256 {
        let mut buf = Vec::with_capacity(32 + 8 + 20 + 8 + 32 + self.extra.len());
        buf.extend_from_slice(self.parent_hash.as_slice());
        buf.extend_from_slice(&self.number.to_be_bytes());
        buf.extend_from_slice(self.coinbase.as_slice());
        buf.extend_from_slice(&self.timestamp.to_be_bytes());
        buf.extend_from_slice(self.root.as_slice());
        buf.extend_from_slice(&self.extra);
        keccak256(&buf)
    }

    /// Validator addresses packed between the vanity prefix and seal suffix.
    pub fn extra_validators(&self) -> Vec<Address> {
        if self.extra.len() < EXTRA_VANITY + EXTRA_SEAL {
            return Vec::new();
        }
        self.extra[EXTRA_VANITY..self.extra.len() - EXTRA_SEAL]
            .chunks_exact(Address::len_bytes())
            .map(Address::from_slice)
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Log {
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Bytes,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub nonce: u64,
    pub to: Option<Address>,
    pub value: U256,
    pub input: Bytes,
}

impl Transaction {
    pub fn hash(&self) -> B256 {
        let mut buf = Vec::with_capacity(8 + 21 + 32 + self.input.len());
        buf.extend_from_slice(&self.nonce.to_be_bytes());
        match &self.to {
            Some(to) => {
                buf.push(1);
                buf.extend_from_slice(to.as_slice());
            }
            None => buf.push(0),
        }
        buf.extend_from_slice(&self.value.to_be_bytes::<32>());
        buf.extend_from_slice(&self.input);
        keccak256(&buf)
    }
}

/// Chain-wide configuration, fixed at process start.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    pub chain_id: u64,
    /// Activation height of the meridian upgrade, if scheduled.
    pub meridian_block: Option<u64>,
    /// Validator-set refresh interval in blocks.
    pub epoch: u64,
    /// Gate contract creation on the on-chain developer allowlist.
    pub enable_dev_verification: bool,
}

impl ChainConfig {
    pub fn is_meridian(&self, number: u64) -> bool {
        matches!(self.meridian_block, Some(at) if number >= at)
    }
}

/// Ancestor lookup capability, backed by the chain database in a full node.
pub trait HeaderProvider: Send + Sync {
    fn header_by_hash(&self, hash: B256, number: u64) -> Option<BlockHeader>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorInfo {
    #[serde(rename = "signer")]
    pub address: Address,
    #[serde(rename = "owner")]
    pub manager: Address,
    #[serde(default)]
    pub rate: U256,
    #[serde(default)]
    pub stake: U256,
    #[serde(default, rename = "acceptDelegation")]
    pub accept_delegation: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisAccount {
    #[serde(default)]
    pub balance: U256,
    #[serde(default)]
    pub code: Bytes,
    #[serde(default)]
    pub storage: BTreeMap<B256, B256>,
    /// Admin handed to the contract's initialize method, for system accounts.
    #[serde(default)]
    pub admin: Option<Address>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenesisSpec {
    pub coinbase: Address,
    pub timestamp: u64,
    pub alloc: BTreeMap<Address, GenesisAccount>,
    pub validators: Vec<ValidatorInfo>,
}
