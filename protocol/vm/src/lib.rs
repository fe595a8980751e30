use alloy_primitives::{Address, B256, U256};
use chain::{BlockHeader, ChainConfig, Log};
use state::StateAccessor;
use thiserror::Error;

/// Deterministic execution failures. A failed invocation performs no
/// corrective work on retry; callers never repeat it.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum VmError {
    /// Execution reverted; `output` carries the raw return data, which may
    /// hold an ABI-encoded reason string.
    #[error("execution reverted")]
    Reverted { output: Vec<u8> },
    #[error("out of gas")]
    OutOfGas,
    #[error("vm error: {0}")]
    Other(String),
}

/// An open execution context bound to one state accessor and block header.
/// Exactly one caller may drive it at a time.
pub trait Evm {
    fn call(
        &mut self,
        from: Address,
        to: Address,
        data: &[u8],
        gas: u64,
        value: U256,
    ) -> Result<Vec<u8>, VmError>;

    fn state_mut(&mut self) -> &mut dyn StateAccessor;
}

/// Execution capability: opens an [`Evm`] for a given state and header.
/// Implemented by the interpreter layer; mocked in tests.
pub trait EvmFactory: Send + Sync {
    fn open<'a>(
        &self,
        state: &'a mut dyn StateAccessor,
        header: &'a BlockHeader,
        config: &'a ChainConfig,
    ) -> Box<dyn Evm + 'a>;
}

/// Which side of an address access rule to evaluate. Values originate from
/// governance contract storage as raw u8; unrecognized values are preserved
/// so the filter can default-permit them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressCheck {
    From,
    To,
    BothInAny,
    Other(u8),
}

impl AddressCheck {
    pub fn from_u8(raw: u8) -> Self {
        match raw {
            1 => AddressCheck::From,
            2 => AddressCheck::To,
            3 => AddressCheck::BothInAny,
            other => AddressCheck::Other(other),
        }
    }
}

/// Consulted by the interpreter during contract creation and log emission.
/// Decision logic lives in the consensus layer; execution only asks.
pub trait AccessFilter: Send + Sync {
    fn is_address_denied(&self, address: Address, check: AddressCheck) -> bool;
    fn is_log_denied(&self, log: &Log) -> bool;
}

/// Event signature helper for filter construction and tests.
pub fn event_signature(declaration: &str) -> B256 {
    alloy_primitives::keccak256(declaration.as_bytes())
}
