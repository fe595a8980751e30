//! System-contract surface: the governance contracts' addresses, ABI
//! schemas, version resolution and storage-layout adapters.

pub mod abi;
pub mod layout;
pub mod registry;

pub use abi::{Abi, AbiError, Method, ParamType, StateMutability, Value};
pub use registry::{
    ContractDescriptor, Registry, SystemContract, UpgradeTier, ADDRESS_LIST_ADDRESS,
    COMMUNITY_POOL_ADDRESS, MAX_VALIDATORS, MIN_SELF_STAKE, ON_CHAIN_DAO_ADDRESS,
    SHARE_OUT_BONUS_PERCENT, STAKING_ADDRESS, SYSTEM_CALLER,
};
