//! Scripted execution backend for bridge/cache/genesis tests: a tiny
//! governance-contract simulator that dispatches on ABI selectors, records
//! every invocation, and can be told to revert a specific method.

// each test binary uses its own subset of the harness
#![allow(dead_code)]

use alloy_primitives::{Address, B256, U256};
use chain::{BlockHeader, ChainConfig, HeaderProvider};
use parking_lot::Mutex;
use state::{MemoryState, StateAccessor, StateReader};
use std::collections::HashMap;
use std::sync::Arc;
use system::abi::{self, encode_revert, Value};
use system::{
    Registry, SystemContract, ADDRESS_LIST_ADDRESS, COMMUNITY_POOL_ADDRESS, ON_CHAIN_DAO_ADDRESS,
    STAKING_ADDRESS,
};
use vm::{Evm, EvmFactory, VmError};

pub fn test_config() -> ChainConfig {
    ChainConfig {
        chain_id: 9000,
        meridian_block: Some(1_000),
        epoch: 200,
        enable_dev_verification: false,
    }
}

pub fn header(number: u64, parent_hash: B256) -> BlockHeader {
    BlockHeader {
        parent_hash,
        number,
        coinbase: Address::repeat_byte(0xc0),
        timestamp: number,
        root: B256::ZERO,
        extra: vec![0u8; chain::EXTRA_VANITY + chain::EXTRA_SEAL].into(),
    }
}

#[derive(Default)]
pub struct MockChain {
    headers: Mutex<HashMap<B256, BlockHeader>>,
}

impl MockChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, header: BlockHeader) -> B256 {
        let hash = header.hash();
        self.headers.lock().insert(hash, header);
        hash
    }
}

impl HeaderProvider for MockChain {
    fn header_by_hash(&self, hash: B256, _number: u64) -> Option<BlockHeader> {
        self.headers.lock().get(&hash).cloned()
    }
}

#[derive(Default)]
pub struct GovState {
    pub froms: Vec<Address>,
    pub tos: Vec<Address>,
    /// (event signature, check index, raw check type), by rule index.
    pub rules: Vec<(B256, u64, u8)>,
    pub registered: Vec<Address>,
    pub active_set: Vec<Address>,
    pub punished: Vec<(B256, Address)>,
    pub passed_proposals: Vec<consensus::Proposal>,
    pub finished_proposals: Vec<U256>,
    pub fee_received: U256,
    /// Every dispatched method name, in invocation order.
    pub calls: Vec<String>,
    /// View-method invocations only, i.e. the expensive contract reads the
    /// snapshot caches exist to avoid.
    pub read_calls: usize,
    pub revert_on: Option<&'static str>,
}

pub struct ScriptedEvmFactory {
    pub gov: Arc<Mutex<GovState>>,
    registry: Arc<Registry>,
}

impl ScriptedEvmFactory {
    pub fn new(gov: Arc<Mutex<GovState>>, registry: Arc<Registry>) -> Self {
        Self { gov, registry }
    }
}

impl EvmFactory for ScriptedEvmFactory {
    fn open<'a>(
        &self,
        state: &'a mut dyn StateAccessor,
        header: &'a BlockHeader,
        config: &'a ChainConfig,
    ) -> Box<dyn Evm + 'a> {
        Box::new(ScriptedEvm {
            gov: Arc::clone(&self.gov),
            registry: Arc::clone(&self.registry),
            config: config.clone(),
            number: header.number,
            state,
        })
    }
}

pub struct ScriptedEvm<'a> {
    gov: Arc<Mutex<GovState>>,
    registry: Arc<Registry>,
    config: ChainConfig,
    number: u64,
    state: &'a mut dyn StateAccessor,
}

const STAKING_METHODS: &[&str] = &[
    "initialize",
    "initValidator",
    "getTopValidators",
    "getActiveValidators",
    "updateActiveValidatorSet",
    "decreaseMissedBlocksCounter",
    "distributeBlockFee",
    "lazyPunish",
    "doubleSignPunish",
    "isDoubleSignPunished",
];
const DAO_METHODS: &[&str] = &[
    "initialize",
    "getPassedProposalCount",
    "getPassedProposalByIndex",
    "finishProposalById",
];
const ADDRESS_LIST_METHODS: &[&str] = &[
    "initialize",
    "getBlacksFrom",
    "getBlacksTo",
    "rulesLen",
    "getRuleByIndex",
    "devVerifyEnabled",
    "isDeveloper",
    "blackLastUpdatedNumber",
    "rulesLastUpdatedNumber",
];
const COMMUNITY_POOL_METHODS: &[&str] = &["initialize"];

const READ_METHODS: &[&str] = &[
    "getTopValidators",
    "getActiveValidators",
    "isDoubleSignPunished",
    "getPassedProposalCount",
    "getPassedProposalByIndex",
    "getBlacksFrom",
    "getBlacksTo",
    "rulesLen",
    "getRuleByIndex",
    "devVerifyEnabled",
    "isDeveloper",
    "blackLastUpdatedNumber",
    "rulesLastUpdatedNumber",
];

fn arg_word(data: &[u8], index: usize) -> U256 {
    let start = 4 + 32 * index;
    U256::from_be_bytes::<32>(data[start..start + 32].try_into().unwrap())
}

fn arg_address(data: &[u8], index: usize) -> Address {
    let start = 4 + 32 * index;
    Address::from_slice(&data[start + 12..start + 32])
}

fn arg_address_array(data: &[u8], index: usize) -> Vec<Address> {
    let offset = usize::try_from(arg_word(data, index)).unwrap();
    let body = &data[4 + offset..];
    let len = usize::try_from(U256::from_be_bytes::<32>(body[..32].try_into().unwrap())).unwrap();
    (0..len)
        .map(|i| Address::from_slice(&body[32 + 32 * i + 12..32 + 32 * i + 32]))
        .collect()
}

impl ScriptedEvm<'_> {
    fn dispatch(
        &mut self,
        contract: SystemContract,
        to: Address,
        data: &[u8],
        value: U256,
    ) -> Result<Vec<u8>, VmError> {
        let descriptor = self.registry.resolve(contract, self.number, &self.config);
        assert_eq!(descriptor.address, to, "call routed to wrong contract");

        let names = match contract {
            SystemContract::Staking => STAKING_METHODS,
            SystemContract::OnChainDao => DAO_METHODS,
            SystemContract::AddressList => ADDRESS_LIST_METHODS,
            SystemContract::CommunityPool => COMMUNITY_POOL_METHODS,
        };
        let selector: [u8; 4] = data[..4].try_into().unwrap();
        let name = names
            .iter()
            .copied()
            .find(|name| {
                descriptor
                    .abi
                    .method(name)
                    .is_ok_and(|m| m.selector() == selector)
            })
            .unwrap_or_else(|| panic!("unknown selector for {}", contract.name()));
        let method = descriptor.abi.method(name).unwrap();

        let mut gov = self.gov.lock();
        gov.calls.push(name.to_string());
        if READ_METHODS.contains(&name) {
            gov.read_calls += 1;
        }
        if gov.revert_on == Some(name) {
            return Err(VmError::Reverted {
                output: encode_revert("scripted revert"),
            });
        }

        let outputs: Vec<Value> = match name {
            "getBlacksFrom" => vec![Value::AddressArray(gov.froms.clone())],
            "getBlacksTo" => vec![Value::AddressArray(gov.tos.clone())],
            "rulesLen" => vec![Value::Uint(U256::from(gov.rules.len()))],
            "getRuleByIndex" => {
                let index = usize::try_from(arg_word(data, 0)).unwrap();
                let (sig, check_index, check_type) = gov.rules[index];
                vec![
                    Value::FixedBytes32(sig),
                    Value::Uint(U256::from(check_index)),
                    Value::Uint(U256::from(check_type)),
                ]
            }
            "initValidator" => {
                gov.registered.push(arg_address(data, 0));
                vec![]
            }
            "updateActiveValidatorSet" => {
                gov.active_set = arg_address_array(data, 0);
                vec![]
            }
            "getActiveValidators" => vec![Value::AddressArray(gov.active_set.clone())],
            "getTopValidators" => vec![Value::AddressArray(gov.registered.clone())],
            "doubleSignPunish" => {
                let hash = B256::from(arg_word(data, 0).to_be_bytes::<32>());
                gov.punished.push((hash, arg_address(data, 1)));
                vec![]
            }
            "isDoubleSignPunished" => {
                let hash = B256::from(arg_word(data, 0).to_be_bytes::<32>());
                vec![Value::Bool(gov.punished.iter().any(|(h, _)| *h == hash))]
            }
            "distributeBlockFee" => {
                gov.fee_received += value;
                vec![]
            }
            "getPassedProposalCount" => {
                vec![Value::Uint(U256::from(gov.passed_proposals.len()))]
            }
            "getPassedProposalByIndex" => {
                let index = usize::try_from(arg_word(data, 0)).unwrap();
                let p = gov.passed_proposals[index].clone();
                vec![
                    Value::Uint(p.id),
                    Value::Uint(p.action),
                    Value::Address(p.from),
                    Value::Address(p.to),
                    Value::Uint(p.value),
                    Value::Bytes(p.data),
                ]
            }
            "finishProposalById" => {
                gov.finished_proposals.push(arg_word(data, 0));
                vec![]
            }
            // initialize, lazyPunish, decreaseMissedBlocksCounter and the
            // remaining views need no scripted behavior beyond recording
            _ => vec![],
        };
        Ok(abi::encode_values(&method.outputs, &outputs).unwrap())
    }
}

impl Evm for ScriptedEvm<'_> {
    fn call(
        &mut self,
        from: Address,
        to: Address,
        data: &[u8],
        _gas: u64,
        value: U256,
    ) -> Result<Vec<u8>, VmError> {
        // the caller account is touched by any call, like a real EVM would
        self.state.add_balance(from, U256::ZERO);
        let contract = match to {
            addr if addr == STAKING_ADDRESS => SystemContract::Staking,
            addr if addr == ON_CHAIN_DAO_ADDRESS => SystemContract::OnChainDao,
            addr if addr == ADDRESS_LIST_ADDRESS => SystemContract::AddressList,
            addr if addr == COMMUNITY_POOL_ADDRESS => SystemContract::CommunityPool,
            other => {
                // proposal targets land on ordinary accounts
                self.gov.lock().calls.push(format!("call:{other}"));
                return Ok(Vec::new());
            }
        };
        self.dispatch(contract, to, data, value)
    }

    fn state_mut(&mut self) -> &mut dyn StateAccessor {
        self.state
    }
}

/// State wrapper that counts finalize invocations.
#[derive(Default)]
pub struct FinalizeSpy {
    pub inner: MemoryState,
    pub finalize_calls: usize,
    pub deleted_empty: bool,
}

impl StateReader for FinalizeSpy {
    fn storage(&self, address: Address, slot: B256) -> B256 {
        self.inner.storage(address, slot)
    }

    fn balance(&self, address: Address) -> U256 {
        self.inner.balance(address)
    }

    fn code(&self, address: Address) -> Vec<u8> {
        self.inner.code(address)
    }

    fn exists(&self, address: Address) -> bool {
        self.inner.exists(address)
    }
}

impl StateAccessor for FinalizeSpy {
    fn set_storage(&mut self, address: Address, slot: B256, value: B256) {
        self.inner.set_storage(address, slot, value);
    }

    fn set_balance(&mut self, address: Address, balance: U256) {
        self.inner.set_balance(address, balance);
    }

    fn add_balance(&mut self, address: Address, amount: U256) {
        self.inner.add_balance(address, amount);
    }

    fn set_code(&mut self, address: Address, code: Vec<u8>) {
        self.inner.set_code(address, code);
    }

    fn finalize(&mut self, delete_empty_accounts: bool) {
        self.finalize_calls += 1;
        self.deleted_empty = delete_empty_accounts;
        self.inner.finalize(delete_empty_accounts);
    }
}
