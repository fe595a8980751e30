//! Typed governance operations: one function per system-contract method,
//! packing arguments per the resolved ABI version and decoding results into
//! concrete types.

use crate::bridge::{call_with_evm, CallContext, CallError};
use alloy_primitives::{Address, B256, U256};
use system::abi::Value;
use system::{SystemContract, MAX_VALIDATORS};
use tracing::{debug, error};
use vm::{AddressCheck, Evm};

/// A passed governance proposal, materialized from a single contract read
/// and discarded after execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Proposal {
    pub id: U256,
    pub action: U256,
    pub from: Address,
    pub to: Address,
    pub value: U256,
    pub data: Vec<u8>,
}

fn read_all(
    ctx: &mut CallContext<'_>,
    contract: SystemContract,
    method: &'static str,
    args: &[Value],
) -> Result<Vec<Value>, CallError> {
    let descriptor = ctx.descriptor(contract);
    let data = descriptor.abi.encode_call(method, args)?;
    let ret = ctx.call(descriptor.address, &data)?;
    Ok(descriptor.abi.decode_output(method, &ret)?)
}

fn read_one(
    ctx: &mut CallContext<'_>,
    contract: SystemContract,
    method: &'static str,
    args: &[Value],
) -> Result<Value, CallError> {
    let mut values = read_all(ctx, contract, method, args)?;
    if values.len() != 1 {
        return Err(CallError::BadResult {
            method,
            detail: "invalid result length",
        });
    }
    Ok(values.remove(0))
}

fn write_call(
    ctx: &mut CallContext<'_>,
    contract: SystemContract,
    method: &'static str,
    args: &[Value],
) -> Result<(), CallError> {
    let descriptor = ctx.descriptor(contract);
    let data = descriptor.abi.encode_call(method, args)?;
    ctx.call(descriptor.address, &data)?;
    Ok(())
}

/// Top staked candidates, sorted ascending byte-wise so every node derives
/// the same ordering.
pub fn get_top_validators(ctx: &mut CallContext<'_>) -> Result<Vec<Address>, CallError> {
    const METHOD: &str = "getTopValidators";
    let result = read_one(
        ctx,
        SystemContract::Staking,
        METHOD,
        &[Value::Uint(U256::from(MAX_VALIDATORS))],
    )
    .map_err(|err| {
        error!(%err, "getTopValidators read failed");
        err
    })?;
    let mut validators = result.as_address_array()?;
    validators.sort();
    Ok(validators)
}

pub fn get_active_validators(ctx: &mut CallContext<'_>) -> Result<Vec<Address>, CallError> {
    let result = read_one(ctx, SystemContract::Staking, "getActiveValidators", &[])?;
    Ok(result.as_address_array()?)
}

pub fn update_active_validator_set(
    ctx: &mut CallContext<'_>,
    new_set: &[Address],
) -> Result<(), CallError> {
    write_call(
        ctx,
        SystemContract::Staking,
        "updateActiveValidatorSet",
        &[Value::AddressArray(new_set.to_vec())],
    )
    .map_err(|err| {
        error!(?new_set, %err, "updateActiveValidatorSet failed");
        err
    })
}

pub fn decrease_missed_blocks_counter(ctx: &mut CallContext<'_>) -> Result<(), CallError> {
    write_call(ctx, SystemContract::Staking, "decreaseMissedBlocksCounter", &[]).map_err(|err| {
        error!(%err, "decreaseMissedBlocksCounter failed");
        err
    })
}

/// Distribute collected block fees into the staking contract, attached as
/// value from the coinbase.
pub fn distribute_block_fee(ctx: &mut CallContext<'_>, fee: U256) -> Result<(), CallError> {
    let descriptor = ctx.descriptor(SystemContract::Staking);
    let data = descriptor.abi.encode_call("distributeBlockFee", &[])?;
    let coinbase = ctx.header.coinbase;
    ctx.call_with_value(coinbase, descriptor.address, &data, fee)
        .map_err(|err| {
            error!(%fee, %err, "distributeBlockFee failed");
            err
        })?;
    Ok(())
}

pub fn lazy_punish(ctx: &mut CallContext<'_>, validator: Address) -> Result<(), CallError> {
    write_call(
        ctx,
        SystemContract::Staking,
        "lazyPunish",
        &[Value::Address(validator)],
    )
    .map_err(|err| {
        error!(%validator, %err, "lazyPunish failed");
        err
    })
}

/// Record a double-sign punishment against a validator.
pub fn double_sign_punish(
    ctx: &mut CallContext<'_>,
    punish_hash: B256,
    validator: Address,
) -> Result<(), CallError> {
    write_call(
        ctx,
        SystemContract::Staking,
        "doubleSignPunish",
        &[Value::FixedBytes32(punish_hash), Value::Address(validator)],
    )
    .map_err(|err| {
        error!(%punish_hash, %validator, %err, "doubleSignPunish failed");
        err
    })
}

/// As [`double_sign_punish`], but atomic with the enclosing transaction's
/// execution trace: reuses the pipeline's open execution context.
pub fn double_sign_punish_with_evm(
    evm: &mut dyn Evm,
    registry: &system::Registry,
    config: &chain::ChainConfig,
    height: u64,
    from: Address,
    punish_hash: B256,
    validator: Address,
) -> Result<(), CallError> {
    let descriptor = registry.resolve(SystemContract::Staking, height, config);
    let data = descriptor.abi.encode_call(
        "doubleSignPunish",
        &[Value::FixedBytes32(punish_hash), Value::Address(validator)],
    )?;
    call_with_evm(evm, from, descriptor.address, &data, u64::MAX).map_err(|err| {
        error!(%punish_hash, %validator, %err, "doubleSignPunish with open context failed");
        err
    })?;
    Ok(())
}

pub fn is_double_sign_punished(
    ctx: &mut CallContext<'_>,
    punish_hash: B256,
) -> Result<bool, CallError> {
    let result = read_one(
        ctx,
        SystemContract::Staking,
        "isDoubleSignPunished",
        &[Value::FixedBytes32(punish_hash)],
    )
    .map_err(|err| {
        error!(%punish_hash, %err, "isDoubleSignPunished read failed");
        err
    })?;
    Ok(result.as_bool()?)
}

/// Addresses denied as transaction senders.
pub fn access_list_from(ctx: &mut CallContext<'_>) -> Result<Vec<Address>, CallError> {
    let result = read_one(ctx, SystemContract::AddressList, "getBlacksFrom", &[]).map_err(|err| {
        error!(%err, "access from-list read failed");
        err
    })?;
    Ok(result.as_address_array()?)
}

/// Addresses denied as transaction recipients.
pub fn access_list_to(ctx: &mut CallContext<'_>) -> Result<Vec<Address>, CallError> {
    let result = read_one(ctx, SystemContract::AddressList, "getBlacksTo", &[]).map_err(|err| {
        error!(%err, "access to-list read failed");
        err
    })?;
    Ok(result.as_address_array()?)
}

pub fn rules_len(ctx: &mut CallContext<'_>) -> Result<u32, CallError> {
    let result = read_one(ctx, SystemContract::AddressList, "rulesLen", &[])?;
    Ok(result.as_u32()?)
}

/// One event check rule: (event signature, topic check index, check kind).
pub fn rule_by_index(
    ctx: &mut CallContext<'_>,
    index: u32,
) -> Result<(B256, u64, AddressCheck), CallError> {
    const METHOD: &str = "getRuleByIndex";
    let results = read_all(
        ctx,
        SystemContract::AddressList,
        METHOD,
        &[Value::Uint(U256::from(index))],
    )?;
    if results.len() != 3 {
        return Err(CallError::BadResult {
            method: METHOD,
            detail: "invalid results length",
        });
    }
    let sig = results[0].as_bytes32()?;
    let check_index = results[1].as_u64()?;
    let check = AddressCheck::from_u8(results[2].as_u8()?);
    Ok((sig, check_index, check))
}

pub fn get_passed_proposal_count(ctx: &mut CallContext<'_>) -> Result<u32, CallError> {
    let result =
        read_one(ctx, SystemContract::OnChainDao, "getPassedProposalCount", &[]).map_err(|err| {
            error!(%err, "getPassedProposalCount read failed");
            err
        })?;
    Ok(result.as_u32()?)
}

pub fn get_passed_proposal_by_index(
    ctx: &mut CallContext<'_>,
    index: u32,
) -> Result<Proposal, CallError> {
    const METHOD: &str = "getPassedProposalByIndex";
    let results = read_all(
        ctx,
        SystemContract::OnChainDao,
        METHOD,
        &[Value::Uint(U256::from(index))],
    )
    .map_err(|err| {
        error!(index, %err, "getPassedProposalByIndex read failed");
        err
    })?;
    if results.len() != 6 {
        return Err(CallError::BadResult {
            method: METHOD,
            detail: "invalid results length",
        });
    }
    Ok(Proposal {
        id: results[0].as_u256()?,
        action: results[1].as_u256()?,
        from: results[2].as_address()?,
        to: results[3].as_address()?,
        value: results[4].as_u256()?,
        data: results[5].as_bytes()?,
    })
}

pub fn finish_proposal_by_id(ctx: &mut CallContext<'_>, id: U256) -> Result<(), CallError> {
    write_call(
        ctx,
        SystemContract::OnChainDao,
        "finishProposalById",
        &[Value::Uint(id)],
    )
    .map_err(|err| {
        error!(%id, %err, "finishProposalById failed");
        err
    })
}

/// Execute a passed proposal's embedded call.
pub fn execute_proposal(ctx: &mut CallContext<'_>, proposal: &Proposal) -> Result<(), CallError> {
    ctx.call_with_value(proposal.from, proposal.to, &proposal.data, proposal.value)
        .map_err(|err| {
            error!(id = %proposal.id, %err, "proposal execution failed");
            err
        })?;
    Ok(())
}

pub fn execute_proposal_with_evm(
    evm: &mut dyn Evm,
    proposal: &Proposal,
    gas: u64,
) -> Result<Vec<u8>, CallError> {
    call_with_evm(evm, proposal.from, proposal.to, &proposal.data, gas).map_err(|err| {
        error!(id = %proposal.id, %err, "proposal execution with open context failed");
        err
    })
}

/// Drain the passed-proposal queue: execute each proposal, then mark it
/// finished. Returns the number processed.
pub fn execute_passed_proposals(ctx: &mut CallContext<'_>) -> Result<u32, CallError> {
    let count = get_passed_proposal_count(ctx)?;
    for index in 0..count {
        let proposal = get_passed_proposal_by_index(ctx, index)?;
        debug!(id = %proposal.id, index, "executing passed proposal");
        execute_proposal(ctx, &proposal)?;
        finish_proposal_by_id(ctx, proposal.id)?;
    }
    Ok(count)
}
