//! Contract registry: which governance contract lives where, at which ABI
//! version, for a given chain height.
//!
//! The table is built once at startup and passed by reference into every
//! component that needs it. A name or version that fails to resolve is a
//! deployment defect, never a runtime input condition: resolution panics
//! rather than letting a consensus-critical call go to the wrong address.

use crate::abi::{Abi, Method, ParamType, StateMutability};
use alloy_primitives::{address, Address, U256};
use chain::ChainConfig;
use std::collections::HashMap;

/// Caller used for synthetic governance transactions. Zero balance; deleted
/// again by the post-call finalize.
pub const SYSTEM_CALLER: Address = address!("000000000000000000000000000000000000F0FF");

pub const STAKING_ADDRESS: Address = address!("000000000000000000000000000000000000F000");
pub const ON_CHAIN_DAO_ADDRESS: Address = address!("000000000000000000000000000000000000F001");
pub const ADDRESS_LIST_ADDRESS: Address = address!("000000000000000000000000000000000000F002");
pub const COMMUNITY_POOL_ADDRESS: Address = address!("000000000000000000000000000000000000F003");

/// Validator-set size cap passed to `getTopValidators`.
pub const MAX_VALIDATORS: u8 = 21;
/// Minimum self stake in whole tokens; scaled by 10^18 at genesis.
pub const MIN_SELF_STAKE: u64 = 100;
pub const SHARE_OUT_BONUS_PERCENT: u8 = 10;

pub fn min_self_stake_wei() -> U256 {
    U256::from(MIN_SELF_STAKE) * U256::from(10u64).pow(U256::from(18))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SystemContract {
    Staking,
    OnChainDao,
    AddressList,
    CommunityPool,
}

impl SystemContract {
    pub const ALL: [SystemContract; 4] = [
        SystemContract::Staking,
        SystemContract::OnChainDao,
        SystemContract::AddressList,
        SystemContract::CommunityPool,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            SystemContract::Staking => "Staking",
            SystemContract::OnChainDao => "OnChainDao",
            SystemContract::AddressList => "AddressList",
            SystemContract::CommunityPool => "CommunityPool",
        }
    }
}

/// Protocol upgrade tiers, newest last. Contract resolution walks a
/// contract's tier map from the most recent active tier downwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum UpgradeTier {
    Genesis,
    Meridian,
}

impl UpgradeTier {
    pub fn is_active(&self, config: &ChainConfig, height: u64) -> bool {
        match self {
            UpgradeTier::Genesis => true,
            UpgradeTier::Meridian => config.is_meridian(height),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ContractDescriptor {
    pub contract: SystemContract,
    pub version: u8,
    pub address: Address,
    pub abi: Abi,
}

struct ContractEntry {
    /// (tier, version) pairs ordered newest tier first.
    versions: Vec<(UpgradeTier, u8)>,
    by_version: HashMap<u8, ContractDescriptor>,
}

pub struct Registry {
    entries: HashMap<SystemContract, ContractEntry>,
}

impl Registry {
    /// The deployed governance table: all four contracts at version 0 under
    /// both tiers. The per-contract maps exist so a later tier can remap a
    /// single contract without touching the others.
    pub fn builtin() -> Self {
        let mut entries = HashMap::new();
        for (contract, address, abi) in [
            (SystemContract::Staking, STAKING_ADDRESS, staking_abi()),
            (SystemContract::OnChainDao, ON_CHAIN_DAO_ADDRESS, dao_abi()),
            (
                SystemContract::AddressList,
                ADDRESS_LIST_ADDRESS,
                address_list_abi(),
            ),
            (
                SystemContract::CommunityPool,
                COMMUNITY_POOL_ADDRESS,
                community_pool_abi(),
            ),
        ] {
            let descriptor = ContractDescriptor {
                contract,
                version: 0,
                address,
                abi,
            };
            entries.insert(
                contract,
                ContractEntry {
                    versions: vec![(UpgradeTier::Meridian, 0), (UpgradeTier::Genesis, 0)],
                    by_version: HashMap::from([(0, descriptor)]),
                },
            );
        }
        Self { entries }
    }

    /// Resolve the descriptor in effect at `height`. Panics when the table
    /// has no version for any active tier: a deployment defect that must
    /// halt the process.
    pub fn resolve(
        &self,
        contract: SystemContract,
        height: u64,
        config: &ChainConfig,
    ) -> &ContractDescriptor {
        let entry = self.entries.get(&contract).unwrap_or_else(|| {
            tracing::error!(contract = contract.name(), "unknown system contract");
            panic!("system contract not registered: {}", contract.name())
        });
        for (tier, version) in &entry.versions {
            if tier.is_active(config, height) {
                return entry.by_version.get(version).unwrap_or_else(|| {
                    tracing::error!(
                        contract = contract.name(),
                        version,
                        height,
                        "unknown system contract version"
                    );
                    panic!(
                        "system contract {} has no descriptor for version {} at height {}",
                        contract.name(),
                        version,
                        height
                    )
                });
            }
        }
        panic!(
            "system contract {} has no active version at height {}",
            contract.name(),
            height
        );
    }

    pub fn version_at(&self, contract: SystemContract, height: u64, config: &ChainConfig) -> u8 {
        self.resolve(contract, height, config).version
    }

    pub fn address_at(
        &self,
        contract: SystemContract,
        height: u64,
        config: &ChainConfig,
    ) -> Address {
        self.resolve(contract, height, config).address
    }
}

fn view(name: &'static str, inputs: Vec<ParamType>, outputs: Vec<ParamType>) -> Method {
    Method {
        name,
        inputs,
        outputs,
        mutability: StateMutability::View,
    }
}

fn write(name: &'static str, inputs: Vec<ParamType>) -> Method {
    Method {
        name,
        inputs,
        outputs: vec![],
        mutability: StateMutability::NonPayable,
    }
}

fn staking_abi() -> Abi {
    Abi::new(vec![
        write(
            "initialize",
            vec![
                ParamType::Address,
                ParamType::Uint(256),
                ParamType::Uint(256),
                ParamType::Address,
                ParamType::Uint(8),
            ],
        ),
        write(
            "initValidator",
            vec![
                ParamType::Address,
                ParamType::Address,
                ParamType::Uint(256),
                ParamType::Uint(256),
                ParamType::Bool,
            ],
        ),
        view(
            "getTopValidators",
            vec![ParamType::Uint(8)],
            vec![ParamType::AddressArray],
        ),
        view("getActiveValidators", vec![], vec![ParamType::AddressArray]),
        write("updateActiveValidatorSet", vec![ParamType::AddressArray]),
        write("decreaseMissedBlocksCounter", vec![]),
        Method {
            name: "distributeBlockFee",
            inputs: vec![],
            outputs: vec![],
            mutability: StateMutability::Payable,
        },
        write("lazyPunish", vec![ParamType::Address]),
        write(
            "doubleSignPunish",
            vec![ParamType::FixedBytes32, ParamType::Address],
        ),
        view(
            "isDoubleSignPunished",
            vec![ParamType::FixedBytes32],
            vec![ParamType::Bool],
        ),
    ])
}

fn dao_abi() -> Abi {
    Abi::new(vec![
        write("initialize", vec![ParamType::Address]),
        view("getPassedProposalCount", vec![], vec![ParamType::Uint(32)]),
        view(
            "getPassedProposalByIndex",
            vec![ParamType::Uint(32)],
            vec![
                ParamType::Uint(256),
                ParamType::Uint(256),
                ParamType::Address,
                ParamType::Address,
                ParamType::Uint(256),
                ParamType::Bytes,
            ],
        ),
        write("finishProposalById", vec![ParamType::Uint(256)]),
    ])
}

fn address_list_abi() -> Abi {
    Abi::new(vec![
        write("initialize", vec![ParamType::Address]),
        view("getBlacksFrom", vec![], vec![ParamType::AddressArray]),
        view("getBlacksTo", vec![], vec![ParamType::AddressArray]),
        view("rulesLen", vec![], vec![ParamType::Uint(32)]),
        view(
            "getRuleByIndex",
            vec![ParamType::Uint(32)],
            vec![
                ParamType::FixedBytes32,
                ParamType::Uint(128),
                ParamType::Uint(8),
            ],
        ),
        view("devVerifyEnabled", vec![], vec![ParamType::Bool]),
        view(
            "isDeveloper",
            vec![ParamType::Address],
            vec![ParamType::Bool],
        ),
        view("blackLastUpdatedNumber", vec![], vec![ParamType::Uint(256)]),
        view("rulesLastUpdatedNumber", vec![], vec![ParamType::Uint(256)]),
    ])
}

fn community_pool_abi() -> Abi {
    Abi::new(vec![write("initialize", vec![ParamType::Address])])
}
