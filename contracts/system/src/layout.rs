//! Storage layout adapter for the AddressList contract.
//!
//! The contract's state variables are declared as:
//!
//! ```text
//! bool public initialized;
//! bool public devVerifyEnabled;
//! bool public checkInnerCreation;
//! address public admin;                            // packed into slot 0
//! address public pendingAdmin;                     // slot 1
//! mapping(address => bool) private devs;           // position 2
//! address[] blacksFrom;                            // slot 3
//! address[] blacksTo;                              // slot 4
//! mapping(address => uint256) blacksFromMap;       // position 5
//! mapping(address => uint256) blacksToMap;         // position 6
//! uint256 public blackLastUpdatedNumber;           // slot 7
//! uint256 public rulesLastUpdatedNumber;           // slot 8
//! ```
//!
//! With the optimizer's packing, slot 0 holds
//! `[0..9 zero][9..29 admin][29 checkInnerCreation][30 devVerifyEnabled][31 initialized]`.
//! Any change to the declaration order invalidates these offsets; re-derive
//! them here, in one place, and keep the layout test in sync.

use crate::registry::{Registry, SystemContract};
use alloy_primitives::{keccak256, Address, B256};
use chain::ChainConfig;
use state::{decode_u64, encode_address, encode_u64, StateReader};

/// Byte offset of the `devVerifyEnabled` flag within packed slot 0.
pub const DEV_VERIFY_ENABLED_BYTE: usize = 30;

/// Declared position of the `devs` mapping.
pub const DEV_MAPPING_POSITION: u64 = 2;

/// Slot of `blackLastUpdatedNumber`.
pub const ACCESS_LAST_UPDATED_SLOT: B256 = B256::with_last_byte(0x07);

/// Slot of `rulesLastUpdatedNumber`.
pub const RULES_LAST_UPDATED_SLOT: B256 = B256::with_last_byte(0x08);

/// Per-address slot of the `devs` mapping:
/// keccak256(pad32(address) ++ pad32(position)).
pub fn developer_slot(address: Address) -> B256 {
    let mut preimage = [0u8; 64];
    preimage[..32].copy_from_slice(encode_address(address).as_slice());
    preimage[32..].copy_from_slice(encode_u64(DEV_MAPPING_POSITION).as_slice());
    keccak256(preimage)
}

/// Whether developer verification is switched on in contract storage. Read
/// directly from the packed slot; no contract execution involved.
pub fn is_developer_verification_enabled<S: StateReader + ?Sized>(
    state: &S,
    height: u64,
    config: &ChainConfig,
    registry: &Registry,
) -> bool {
    let contract = registry.address_at(SystemContract::AddressList, height, config);
    let word = state.storage(contract, B256::ZERO);
    word[DEV_VERIFY_ENABLED_BYTE] == 0x01
}

/// Block number of the most recent access-list update.
pub fn last_access_updated_number<S: StateReader + ?Sized>(
    state: &S,
    height: u64,
    config: &ChainConfig,
    registry: &Registry,
) -> u64 {
    let contract = registry.address_at(SystemContract::AddressList, height, config);
    decode_u64(state.storage(contract, ACCESS_LAST_UPDATED_SLOT))
}

/// Block number of the most recent event-rule update.
pub fn last_rules_updated_number<S: StateReader + ?Sized>(
    state: &S,
    height: u64,
    config: &ChainConfig,
    registry: &Registry,
) -> u64 {
    let contract = registry.address_at(SystemContract::AddressList, height, config);
    decode_u64(state.storage(contract, RULES_LAST_UPDATED_SLOT))
}
