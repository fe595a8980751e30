//! Call bridge: executes invocations against system contracts through the
//! execution capability, with the finalize and revert-unwrapping semantics
//! governance calls require.

use alloy_primitives::{Address, U256};
use chain::{BlockHeader, ChainConfig, HeaderProvider};
use state::StateAccessor;
use system::abi::{self, AbiError};
use system::{ContractDescriptor, Registry, SystemContract, SYSTEM_CALLER};
use thiserror::Error;
use vm::{Evm, EvmFactory, VmError};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CallError {
    /// Revert with its decoded reason string ("internal error" when the
    /// return data carries no decodable reason).
    #[error("execution reverted: {0}")]
    Reverted(String),
    #[error(transparent)]
    Vm(VmError),
    #[error(transparent)]
    Abi(#[from] AbiError),
    #[error("{method}: {detail}")]
    BadResult {
        method: &'static str,
        detail: &'static str,
    },
}

/// Per-invocation context. Holds exclusive access to the state accessor for
/// the duration of each call plus its finalize step; never shared across
/// concurrent invocations.
pub struct CallContext<'a> {
    pub state: &'a mut dyn StateAccessor,
    pub header: &'a BlockHeader,
    pub headers: &'a dyn HeaderProvider,
    pub config: &'a ChainConfig,
    pub registry: &'a Registry,
    pub evm: &'a dyn EvmFactory,
}

impl<'a> CallContext<'a> {
    pub fn descriptor(&self, contract: SystemContract) -> &'a ContractDescriptor {
        self.registry
            .resolve(contract, self.header.number, self.config)
    }

    pub fn contract_version(&self, contract: SystemContract) -> u8 {
        self.descriptor(contract).version
    }

    pub fn contract_address(&self, contract: SystemContract) -> Address {
        self.descriptor(contract).address
    }

    /// Invoke a system contract from the synthetic system caller with zero
    /// value and maximal gas. Read calls must never run out of gas.
    pub fn call(&mut self, to: Address, data: &[u8]) -> Result<Vec<u8>, CallError> {
        self.call_with_value(SYSTEM_CALLER, to, data, U256::ZERO)
    }

    /// As [`Self::call`], but from an explicit caller with an attached token
    /// value (fee distribution, proposal execution).
    pub fn call_with_value(
        &mut self,
        from: Address,
        to: Address,
        data: &[u8],
        value: U256,
    ) -> Result<Vec<u8>, CallError> {
        let mut evm = self.evm.open(&mut *self.state, self.header, self.config);
        let result = evm.call(from, to, data, u64::MAX, value);
        // Finalize so any changes take effect before whatever runs next, and
        // so an empty `from` account (the system caller) is deleted again.
        evm.state_mut().finalize(true);
        result.map_err(wrap_vm_error)
    }
}

/// Invoke through an already-open execution context supplied by the
/// surrounding block-processing pipeline, keeping the governance call atomic
/// with the enclosing transaction's execution trace.
pub fn call_with_evm(
    evm: &mut dyn Evm,
    from: Address,
    to: Address,
    data: &[u8],
    gas: u64,
) -> Result<Vec<u8>, CallError> {
    let result = evm.call(from, to, data, gas, U256::ZERO);
    evm.state_mut().finalize(true);
    result.map_err(wrap_vm_error)
}

/// Attach a readable reason to reverts; every other execution failure
/// propagates verbatim.
pub(crate) fn wrap_vm_error(err: VmError) -> CallError {
    match err {
        VmError::Reverted { output } => {
            let reason =
                abi::decode_revert(&output).unwrap_or_else(|| "internal error".to_string());
            CallError::Reverted(reason)
        }
        other => CallError::Vm(other),
    }
}
