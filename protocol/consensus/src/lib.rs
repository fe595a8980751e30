//! Proof-of-authority consensus component whose governance state lives in
//! versioned system contracts. This crate is the bridge between block
//! processing and those contracts: invoking them through the execution
//! capability, caching their read-only projections per block ancestor, and
//! answering access-control queries during transaction and log processing.

pub mod access;
pub mod bridge;
pub mod cache;
pub mod genesis;
pub mod ops;

pub use access::{
    merge_access_lists, AccessDirection, AddressAccessList, Agora, EventCheckRule,
    EventCheckRuleSet, GovernanceAccessFilter, TxFilterError,
};
pub use bridge::{CallContext, CallError};
pub use cache::SnapshotCache;
pub use genesis::GenesisInit;
pub use ops::Proposal;
