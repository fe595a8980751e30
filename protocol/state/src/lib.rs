use alloy_primitives::{Address, B256, U256};
use std::collections::{HashMap, HashSet};

/// Read-only view over per-account storage, balances and code.
pub trait StateReader {
    fn storage(&self, address: Address, slot: B256) -> B256;
    fn balance(&self, address: Address) -> U256;
    fn code(&self, address: Address) -> Vec<u8>;
    fn exists(&self, address: Address) -> bool;
}

/// Mutable state capability handed to the call bridge. Callers must not
/// share one accessor across concurrent invocations; the bridge assumes
/// exclusive access for the duration of a call plus its finalize step.
pub trait StateAccessor: StateReader {
    fn set_storage(&mut self, address: Address, slot: B256, value: B256);
    fn set_balance(&mut self, address: Address, balance: U256);
    fn add_balance(&mut self, address: Address, amount: U256);
    fn set_code(&mut self, address: Address, code: Vec<u8>);

    /// Settle pending changes. With `delete_empty_accounts`, touched
    /// accounts that ended up empty (zero balance, no code) are removed,
    /// including the synthetic system caller after a governance call.
    fn finalize(&mut self, delete_empty_accounts: bool);
}

pub fn encode_address(addr: Address) -> B256 {
    let mut word = [0u8; 32];
    word[12..32].copy_from_slice(addr.as_slice());
    B256::from(word)
}

pub fn decode_address(word: B256) -> Address {
    Address::from_slice(&word[12..32])
}

pub fn encode_u64(value: u64) -> B256 {
    B256::from(U256::from(value).to_be_bytes())
}

pub fn decode_u64(word: B256) -> u64 {
    U256::from_be_bytes(word.0).saturating_to()
}

pub fn decode_bool(word: B256) -> bool {
    word[31] != 0
}

#[derive(Debug, Clone, Default)]
struct Account {
    balance: U256,
    code: Vec<u8>,
    storage: HashMap<B256, B256>,
}

impl Account {
    fn is_empty(&self) -> bool {
        self.balance.is_zero() && self.code.is_empty()
    }
}

/// HashMap-backed state used by tests and dev tooling. A full node plugs in
/// its trie-backed accessor instead.
#[derive(Debug, Clone, Default)]
pub struct MemoryState {
    accounts: HashMap<Address, Account>,
    touched: HashSet<Address>,
}

impl MemoryState {
    pub fn new() -> Self {
        Self::default()
    }

    fn account_mut(&mut self, address: Address) -> &mut Account {
        self.touched.insert(address);
        self.accounts.entry(address).or_default()
    }
}

impl StateReader for MemoryState {
    fn storage(&self, address: Address, slot: B256) -> B256 {
        self.accounts
            .get(&address)
            .and_then(|account| account.storage.get(&slot).copied())
            .unwrap_or(B256::ZERO)
    }

    fn balance(&self, address: Address) -> U256 {
        self.accounts
            .get(&address)
            .map(|account| account.balance)
            .unwrap_or(U256::ZERO)
    }

    fn code(&self, address: Address) -> Vec<u8> {
        self.accounts
            .get(&address)
            .map(|account| account.code.clone())
            .unwrap_or_default()
    }

    fn exists(&self, address: Address) -> bool {
        self.accounts.contains_key(&address)
    }
}

impl StateAccessor for MemoryState {
    fn set_storage(&mut self, address: Address, slot: B256, value: B256) {
        self.account_mut(address).storage.insert(slot, value);
    }

    fn set_balance(&mut self, address: Address, balance: U256) {
        self.account_mut(address).balance = balance;
    }

    fn add_balance(&mut self, address: Address, amount: U256) {
        let account = self.account_mut(address);
        account.balance = account.balance.saturating_add(amount);
    }

    fn set_code(&mut self, address: Address, code: Vec<u8>) {
        self.account_mut(address).code = code;
    }

    fn finalize(&mut self, delete_empty_accounts: bool) {
        if delete_empty_accounts {
            for address in self.touched.drain() {
                if self
                    .accounts
                    .get(&address)
                    .is_some_and(|account| account.is_empty())
                {
                    self.accounts.remove(&address);
                }
            }
        } else {
            self.touched.clear();
        }
    }
}
