//! One-shot genesis bootstrap: seeds the governance contracts' constructor
//! state and encodes the initial validator set into the header's extra-data.
//! Any failure aborts genesis construction entirely; a half-initialized
//! genesis is unrecoverable.

use crate::bridge::wrap_vm_error;
use alloy_primitives::{Address, Bytes, U256};
use anyhow::{bail, ensure, Context};
use chain::{BlockHeader, ChainConfig, GenesisSpec, EXTRA_SEAL, EXTRA_VANITY};
use state::StateAccessor;
use system::abi::Value;
use system::{registry, SystemContract};
use tracing::info;
use vm::EvmFactory;

/// Bootstrap environment. Runs before any block exists, so it drives the
/// call bridge path directly and never touches the snapshot caches.
pub struct GenesisInit<'a> {
    pub state: &'a mut dyn StateAccessor,
    pub header: &'a mut BlockHeader,
    pub spec: &'a GenesisSpec,
    pub config: &'a ChainConfig,
    pub registry: &'a system::Registry,
    pub evm: &'a dyn EvmFactory,
}

impl GenesisInit<'_> {
    /// Run the full bootstrap sequence and return the rewritten extra-data.
    pub fn bootstrap(mut self) -> anyhow::Result<Bytes> {
        self.init_staking()?;
        self.init_community_pool()?;
        self.init_address_list()?;
        self.init_validators()?;
        info!(
            validators = self.spec.validators.len(),
            "genesis governance contracts initialized"
        );
        Ok(self.header.extra.clone())
    }

    fn call_contract(
        &mut self,
        contract: SystemContract,
        method: &str,
        args: &[Value],
    ) -> anyhow::Result<Vec<u8>> {
        let descriptor = self
            .registry
            .resolve(contract, self.header.number, self.config);
        let data = descriptor.abi.encode_call(method, args)?;
        let mut evm = self.evm.open(&mut *self.state, self.header, self.config);
        let result = evm.call(
            self.spec.coinbase,
            descriptor.address,
            &data,
            u64::MAX,
            U256::ZERO,
        );
        evm.state_mut().finalize(true);
        let ret = result
            .map_err(wrap_vm_error)
            .with_context(|| format!("genesis call {}.{} failed", contract.name(), method))?;
        Ok(ret)
    }

    fn system_admin(&self, contract: SystemContract) -> anyhow::Result<Address> {
        let address = self
            .registry
            .resolve(contract, self.header.number, self.config)
            .address;
        let account = self
            .spec
            .alloc
            .get(&address)
            .with_context(|| format!("{} contract missing from genesis alloc", contract.name()))?;
        account
            .admin
            .with_context(|| format!("{} admin missing from genesis alloc", contract.name()))
    }

    /// Fund the staking contract with the validators' total stake, then run
    /// its initializer.
    fn init_staking(&mut self) -> anyhow::Result<()> {
        if self.spec.validators.is_empty() {
            bail!("validators missing from genesis spec");
        }
        let admin = self.system_admin(SystemContract::Staking)?;
        let staking = self
            .registry
            .resolve(SystemContract::Staking, self.header.number, self.config)
            .address;
        let community_pool = self
            .registry
            .resolve(SystemContract::CommunityPool, self.header.number, self.config)
            .address;

        let mut total_stake = U256::ZERO;
        for validator in &self.spec.validators {
            total_stake = total_stake
                .checked_add(validator.stake)
                .context("genesis validator stakes overflow")?;
        }
        self.state.set_balance(staking, total_stake);

        self.call_contract(
            SystemContract::Staking,
            "initialize",
            &[
                Value::Address(admin),
                Value::Uint(U256::from(self.config.epoch)),
                Value::Uint(registry::min_self_stake_wei()),
                Value::Address(community_pool),
                Value::Uint(U256::from(registry::SHARE_OUT_BONUS_PERCENT)),
            ],
        )?;
        Ok(())
    }

    fn init_community_pool(&mut self) -> anyhow::Result<()> {
        let admin = self.system_admin(SystemContract::CommunityPool)?;
        self.call_contract(
            SystemContract::CommunityPool,
            "initialize",
            &[Value::Address(admin)],
        )?;
        Ok(())
    }

    fn init_address_list(&mut self) -> anyhow::Result<()> {
        let admin = self.system_admin(SystemContract::AddressList)?;
        self.call_contract(
            SystemContract::AddressList,
            "initialize",
            &[Value::Address(admin)],
        )?;
        Ok(())
    }

    /// Register every genesis validator, pack their addresses into the
    /// extra-data between vanity and seal, and install the active set.
    fn init_validators(&mut self) -> anyhow::Result<()> {
        let validators = self.spec.validators.clone();
        ensure!(!validators.is_empty(), "validators missing from genesis spec");
        ensure!(
            self.header.extra.len() >= EXTRA_VANITY + EXTRA_SEAL,
            "genesis extra-data shorter than vanity plus seal"
        );

        let mut active_set = Vec::with_capacity(validators.len());
        let mut extra = Vec::with_capacity(
            EXTRA_VANITY + Address::len_bytes() * validators.len() + EXTRA_SEAL,
        );
        extra.extend_from_slice(&self.header.extra[..EXTRA_VANITY]);

        for validator in &validators {
            self.call_contract(
                SystemContract::Staking,
                "initValidator",
                &[
                    Value::Address(validator.address),
                    Value::Address(validator.manager),
                    Value::Uint(validator.rate),
                    Value::Uint(validator.stake),
                    Value::Bool(validator.accept_delegation),
                ],
            )?;
            extra.extend_from_slice(validator.address.as_slice());
            active_set.push(validator.address);
        }

        let seal_start = self.header.extra.len() - EXTRA_SEAL;
        extra.extend_from_slice(&self.header.extra[seal_start..]);
        self.header.extra = extra.into();

        self.call_contract(
            SystemContract::Staking,
            "updateActiveValidatorSet",
            &[Value::AddressArray(active_set)],
        )?;
        Ok(())
    }
}
