//! Governance-maintained address access lists and event check rules, the
//! per-ancestor caching that keeps them cheap, and the filter object handed
//! to transaction/log processing.

use crate::bridge::{CallContext, CallError};
use crate::cache::SnapshotCache;
use crate::ops;
use alloy_primitives::{Address, B256, U256};
use chain::{BlockHeader, ChainConfig, HeaderProvider, Log, Transaction};
use state::{StateAccessor, StateReader};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use system::{layout, Registry, SystemContract};
use thiserror::Error;
use tracing::{error, trace, warn};
use vm::{AccessFilter, AddressCheck, EvmFactory};

/// Which side of transactions an address is restricted on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDirection {
    From,
    To,
    Both,
}

/// Address → restricted direction. Built fresh per cache recomputation and
/// immutable once published.
pub type AddressAccessList = HashMap<Address, AccessDirection>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventCheckRule {
    pub event_sig: B256,
    /// Topic index → check kind. Multiple contract entries may share a
    /// signature, each contributing one index.
    pub checks: BTreeMap<u64, AddressCheck>,
}

pub type EventCheckRuleSet = HashMap<B256, EventCheckRule>;

/// Merge the from/to lists: an address on both sides resolves to `Both`.
pub fn merge_access_lists(froms: Vec<Address>, tos: Vec<Address>) -> AddressAccessList {
    let mut list = AddressAccessList::with_capacity(froms.len() + tos.len());
    for from in froms {
        list.insert(from, AccessDirection::From);
    }
    for to in tos {
        list.entry(to)
            .and_modify(|direction| *direction = AccessDirection::Both)
            .or_insert(AccessDirection::To);
    }
    list
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TxFilterError {
    #[error(transparent)]
    Call(#[from] CallError),
    #[error("address {0} denied by access list")]
    Denied(Address),
}

/// Per-block filter consulted during transaction and log processing. Cheap
/// to build from cached snapshots; discarded with the block.
pub struct GovernanceAccessFilter {
    accesses: Arc<AddressAccessList>,
    rules: Arc<EventCheckRuleSet>,
}

impl GovernanceAccessFilter {
    pub fn new(accesses: Arc<AddressAccessList>, rules: Arc<EventCheckRuleSet>) -> Self {
        Self { accesses, rules }
    }
}

impl AccessFilter for GovernanceAccessFilter {
    fn is_address_denied(&self, address: Address, check: AddressCheck) -> bool {
        let Some(direction) = self.accesses.get(&address) else {
            return false;
        };
        let hit = match check {
            // direction From or Both restricts sending
            AddressCheck::From => *direction != AccessDirection::To,
            AddressCheck::To => *direction != AccessDirection::From,
            AddressCheck::BothInAny => true,
            AddressCheck::Other(raw) => {
                warn!(raw, "access filter: unsupported address check kind");
                false
            }
        };
        if hit {
            trace!(%address, ?direction, ?check, "hit access filter");
        }
        hit
    }

    fn is_log_denied(&self, log: &Log) -> bool {
        // topic 0 carries the event signature; a rule needs at least one
        // more topic to have anything to check
        if log.topics.len() <= 1 {
            return false;
        }
        let Some(rule) = self.rules.get(&log.topics[0]) else {
            return false;
        };
        for (&index, &check) in &rule.checks {
            let Ok(index) = usize::try_from(index) else {
                error!(sig = %rule.event_sig, index, "rule check index out of range");
                continue;
            };
            if index >= log.topics.len() {
                error!(
                    sig = %rule.event_sig,
                    index,
                    topics = log.topics.len(),
                    "rule check index out of range"
                );
                continue;
            }
            let address = Address::from_slice(&log.topics[index][12..]);
            if self.is_address_denied(address, check) {
                return true;
            }
        }
        false
    }
}

/// The governance engine: resolves contract views for block processing,
/// caching them per ancestor hash.
pub struct Agora {
    config: ChainConfig,
    registry: Arc<Registry>,
    headers: Arc<dyn HeaderProvider>,
    evm: Arc<dyn EvmFactory>,
    access_lists: SnapshotCache<AddressAccessList>,
    event_rules: SnapshotCache<EventCheckRuleSet>,
}

/// Governance views are recomputed at most every few blocks in practice;
/// the caches only need to cover concurrent candidate blocks plus slack.
const SNAPSHOT_CACHE_CAPACITY: usize = 128;

impl Agora {
    pub fn new(
        config: ChainConfig,
        registry: Arc<Registry>,
        headers: Arc<dyn HeaderProvider>,
        evm: Arc<dyn EvmFactory>,
    ) -> Self {
        Self::with_cache_capacity(config, registry, headers, evm, SNAPSHOT_CACHE_CAPACITY)
    }

    pub fn with_cache_capacity(
        config: ChainConfig,
        registry: Arc<Registry>,
        headers: Arc<dyn HeaderProvider>,
        evm: Arc<dyn EvmFactory>,
        capacity: usize,
    ) -> Self {
        Self {
            config,
            registry,
            headers,
            evm,
            access_lists: SnapshotCache::new(capacity),
            event_rules: SnapshotCache::new(capacity),
        }
    }

    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Build a per-invocation call context over the supplied state.
    pub fn call_context<'a>(
        &'a self,
        header: &'a BlockHeader,
        state: &'a mut dyn StateAccessor,
    ) -> CallContext<'a> {
        CallContext {
            state,
            header,
            headers: self.headers.as_ref(),
            config: &self.config,
            registry: &self.registry,
            evm: self.evm.as_ref(),
        }
    }

    /// Governance address access list as of the header's parent state.
    ///
    /// Fast path is a lock-free cache read keyed by the parent hash. On a
    /// miss the recompute is serialized, and if the on-chain last-updated
    /// counter proves the list unchanged since the grandparent block, the
    /// grandparent's snapshot is reused instead of re-reading the contract.
    pub fn access_list(
        &self,
        header: &BlockHeader,
        parent_state: &mut dyn StateAccessor,
    ) -> Result<Arc<AddressAccessList>, CallError> {
        if let Some(list) = self.access_lists.get(&header.parent_hash) {
            return Ok(list);
        }
        let _refresh = self.access_lists.refresh_lock();
        if let Some(list) = self.access_lists.get(&header.parent_hash) {
            return Ok(list);
        }

        let number = header.number;
        let last_updated = layout::last_access_updated_number(
            &*parent_state,
            number,
            &self.config,
            &self.registry,
        );
        if number >= 2 && number > last_updated + 1 {
            if let Some(reused) = self.reuse_grandparent(&self.access_lists, header) {
                return Ok(reused);
            }
        }

        let mut ctx = self.call_context(header, parent_state);
        let froms = ops::access_list_from(&mut ctx)?;
        let tos = ops::access_list_to(&mut ctx)?;
        let list = Arc::new(merge_access_lists(froms, tos));
        self.access_lists.insert(header.parent_hash, Arc::clone(&list));
        Ok(list)
    }

    /// Event check rules as of the header's parent state. Same lookup shape
    /// as [`Self::access_list`], gated on the rules' own update counter.
    pub fn event_check_rules(
        &self,
        header: &BlockHeader,
        parent_state: &mut dyn StateAccessor,
    ) -> Result<Arc<EventCheckRuleSet>, CallError> {
        if let Some(rules) = self.event_rules.get(&header.parent_hash) {
            return Ok(rules);
        }
        let _refresh = self.event_rules.refresh_lock();
        if let Some(rules) = self.event_rules.get(&header.parent_hash) {
            return Ok(rules);
        }

        let number = header.number;
        let last_updated = layout::last_rules_updated_number(
            &*parent_state,
            number,
            &self.config,
            &self.registry,
        );
        if number >= 2 && number > last_updated + 1 {
            if let Some(reused) = self.reuse_grandparent(&self.event_rules, header) {
                return Ok(reused);
            }
        }

        let mut ctx = self.call_context(header, parent_state);
        let count = ops::rules_len(&mut ctx)?;
        let mut rules = EventCheckRuleSet::new();
        for index in 0..count {
            let (sig, check_index, check) =
                ops::rule_by_index(&mut ctx, index).map_err(|err| {
                    error!(index, number, %err, "rule fetch failed");
                    err
                })?;
            rules
                .entry(sig)
                .or_insert_with(|| EventCheckRule {
                    event_sig: sig,
                    checks: BTreeMap::new(),
                })
                .checks
                .insert(check_index, check);
        }
        let rules = Arc::new(rules);
        self.event_rules.insert(header.parent_hash, Arc::clone(&rules));
        Ok(rules)
    }

    /// The staleness shortcut: copy the grandparent's snapshot under the
    /// parent key. A missing ancestor header degrades to recomputation,
    /// never to an error.
    fn reuse_grandparent<T>(
        &self,
        cache: &SnapshotCache<T>,
        header: &BlockHeader,
    ) -> Option<Arc<T>> {
        match self
            .headers
            .header_by_hash(header.parent_hash, header.number - 1)
        {
            Some(parent) => {
                let snapshot = cache.get(&parent.parent_hash)?;
                cache.insert(header.parent_hash, Arc::clone(&snapshot));
                Some(snapshot)
            }
            None => {
                error!(
                    number = header.number,
                    parent_hash = %header.parent_hash,
                    "cannot fetch parent header for governance snapshot reuse"
                );
                None
            }
        }
    }

    /// Consensus-level validation of a transaction against the access list
    /// at the given header; `parent_state` must belong to the header's
    /// parent block.
    pub fn filter_tx(
        &self,
        sender: Address,
        tx: &Transaction,
        header: &BlockHeader,
        parent_state: &mut dyn StateAccessor,
    ) -> Result<(), TxFilterError> {
        let list = self.access_list(header, parent_state)?;
        if let Some(direction) = list.get(&sender) {
            if *direction != AccessDirection::To {
                trace!(tx = %tx.hash(), address = %sender, ?direction, "hit access filter");
                return Err(TxFilterError::Denied(sender));
            }
        }
        if let Some(to) = tx.to {
            if let Some(direction) = list.get(&to) {
                if *direction != AccessDirection::From {
                    trace!(tx = %tx.hash(), address = %to, ?direction, "hit access filter");
                    return Err(TxFilterError::Denied(to));
                }
            }
        }
        Ok(())
    }

    /// Build the filter handed to the execution capability for one block.
    /// Failures are logged and yield no filter, not a hard error.
    pub fn build_access_filter(
        &self,
        header: &BlockHeader,
        parent_state: &mut dyn StateAccessor,
    ) -> Option<GovernanceAccessFilter> {
        let accesses = match self.access_list(header, parent_state) {
            Ok(accesses) => accesses,
            Err(err) => {
                error!(%err, "building access filter: access list failed");
                return None;
            }
        };
        let rules = match self.event_check_rules(header, parent_state) {
            Ok(rules) => rules,
            Err(err) => {
                error!(%err, "building access filter: event check rules failed");
                return None;
            }
        };
        Some(GovernanceAccessFilter::new(accesses, rules))
    }

    /// Whether `address` may create a contract at `height`. Consults the
    /// developer allowlist directly through the storage layout adapter when
    /// the gate is enabled both in config and on chain.
    pub fn can_create<S: StateReader + ?Sized>(
        &self,
        state: &S,
        address: Address,
        height: u64,
    ) -> bool {
        if self.config.enable_dev_verification
            && layout::is_developer_verification_enabled(state, height, &self.config, &self.registry)
        {
            let contract =
                self.registry
                    .address_at(SystemContract::AddressList, height, &self.config);
            let word = state.storage(contract, layout::developer_slot(address));
            // non-zero value means registered
            return !U256::from_be_bytes(word.0).is_zero();
        }
        true
    }
}
