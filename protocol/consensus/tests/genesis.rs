mod common;

use alloy_primitives::{Address, B256, U256};
use chain::{BlockHeader, GenesisAccount, GenesisSpec, ValidatorInfo, EXTRA_SEAL, EXTRA_VANITY};
use common::{test_config, FinalizeSpy, GovState, MockChain, ScriptedEvmFactory};
use consensus::{ops, CallContext, GenesisInit};
use parking_lot::Mutex;
use state::StateReader;
use std::sync::Arc;
use system::{
    Registry, ADDRESS_LIST_ADDRESS, COMMUNITY_POOL_ADDRESS, STAKING_ADDRESS,
};

const ADMIN: Address = Address::repeat_byte(0xad);

fn validator(seed: u8, stake: u64) -> ValidatorInfo {
    ValidatorInfo {
        address: Address::repeat_byte(seed),
        manager: Address::repeat_byte(seed + 1),
        rate: U256::from(10u64),
        stake: U256::from(stake),
        accept_delegation: seed % 2 == 0,
    }
}

fn system_account() -> GenesisAccount {
    GenesisAccount {
        admin: Some(ADMIN),
        ..Default::default()
    }
}

fn genesis_spec(validators: Vec<ValidatorInfo>) -> GenesisSpec {
    GenesisSpec {
        coinbase: Address::repeat_byte(0xc0),
        timestamp: 0,
        alloc: [
            (STAKING_ADDRESS, system_account()),
            (COMMUNITY_POOL_ADDRESS, system_account()),
            (ADDRESS_LIST_ADDRESS, system_account()),
        ]
        .into(),
        validators,
    }
}

fn genesis_header() -> BlockHeader {
    let mut extra = vec![0xaa_u8; EXTRA_VANITY];
    extra.extend_from_slice(&[0xbb_u8; EXTRA_SEAL]);
    BlockHeader {
        parent_hash: B256::ZERO,
        number: 0,
        coinbase: Address::repeat_byte(0xc0),
        timestamp: 0,
        root: B256::ZERO,
        extra: extra.into(),
    }
}

struct Harness {
    gov: Arc<Mutex<GovState>>,
    registry: Arc<Registry>,
    factory: ScriptedEvmFactory,
    chain_db: MockChain,
    config: chain::ChainConfig,
}

impl Harness {
    fn new(gov: GovState) -> Self {
        let registry = Arc::new(Registry::builtin());
        let gov = Arc::new(Mutex::new(gov));
        Self {
            factory: ScriptedEvmFactory::new(Arc::clone(&gov), Arc::clone(&registry)),
            gov,
            registry,
            chain_db: MockChain::new(),
            config: test_config(),
        }
    }

    fn bootstrap(
        &self,
        spec: &GenesisSpec,
        header: &mut BlockHeader,
        state: &mut FinalizeSpy,
    ) -> anyhow::Result<alloy_primitives::Bytes> {
        GenesisInit {
            state,
            header,
            spec,
            config: &self.config,
            registry: &self.registry,
            evm: &self.factory,
        }
        .bootstrap()
    }
}

#[test]
fn bootstrap_packs_extra_data_and_installs_the_active_set() {
    let v1 = validator(0x10, 100);
    let v2 = validator(0x20, 200);
    let spec = genesis_spec(vec![v1.clone(), v2.clone()]);
    let harness = Harness::new(GovState::default());
    let mut header = genesis_header();
    let mut state = FinalizeSpy::default();

    let extra = harness.bootstrap(&spec, &mut header, &mut state).unwrap();

    // vanity ++ V1 ++ V2 ++ seal
    let mut expected = vec![0xaa_u8; EXTRA_VANITY];
    expected.extend_from_slice(v1.address.as_slice());
    expected.extend_from_slice(v2.address.as_slice());
    expected.extend_from_slice(&[0xbb_u8; EXTRA_SEAL]);
    assert_eq!(extra.as_ref(), expected.as_slice());
    assert_eq!(header.extra.as_ref(), expected.as_slice());
    assert_eq!(header.extra_validators(), vec![v1.address, v2.address]);

    // staking received the summed stakes as its initial balance
    assert_eq!(state.balance(STAKING_ADDRESS), U256::from(300u64));

    let gov = harness.gov.lock();
    assert_eq!(gov.registered, vec![v1.address, v2.address]);
    assert_eq!(gov.active_set, vec![v1.address, v2.address]);
    let calls: Vec<&str> = gov.calls.iter().map(String::as_str).collect();
    assert_eq!(
        calls,
        vec![
            "initialize",    // staking
            "initialize",    // community pool
            "initialize",    // address list
            "initValidator", // v1
            "initValidator", // v2
            "updateActiveValidatorSet",
        ]
    );
}

#[test]
fn active_set_query_after_bootstrap_returns_the_registered_validators() {
    let v1 = validator(0x10, 100);
    let v2 = validator(0x20, 200);
    let spec = genesis_spec(vec![v1.clone(), v2.clone()]);
    let harness = Harness::new(GovState::default());
    let mut header = genesis_header();
    let mut state = FinalizeSpy::default();

    harness.bootstrap(&spec, &mut header, &mut state).unwrap();

    let mut ctx = CallContext {
        state: &mut state,
        header: &header,
        headers: &harness.chain_db,
        config: &harness.config,
        registry: &harness.registry,
        evm: &harness.factory,
    };
    assert_eq!(
        ops::get_active_validators(&mut ctx).unwrap(),
        vec![v1.address, v2.address]
    );
}

#[test]
fn missing_system_account_aborts_before_any_call() {
    let mut spec = genesis_spec(vec![validator(0x10, 100)]);
    spec.alloc.remove(&STAKING_ADDRESS);
    let harness = Harness::new(GovState::default());
    let mut header = genesis_header();
    let mut state = FinalizeSpy::default();

    let err = harness
        .bootstrap(&spec, &mut header, &mut state)
        .unwrap_err();
    assert!(err.to_string().contains("Staking"));
    assert!(harness.gov.lock().calls.is_empty());
}

#[test]
fn empty_validator_set_aborts() {
    let spec = genesis_spec(vec![]);
    let harness = Harness::new(GovState::default());
    let mut header = genesis_header();
    let mut state = FinalizeSpy::default();

    assert!(harness.bootstrap(&spec, &mut header, &mut state).is_err());
}

#[test]
fn failure_mid_sequence_aborts_the_whole_bootstrap() {
    let spec = genesis_spec(vec![validator(0x10, 100), validator(0x20, 200)]);
    let harness = Harness::new(GovState {
        revert_on: Some("initValidator"),
        ..Default::default()
    });
    let mut header = genesis_header();
    let mut state = FinalizeSpy::default();

    let err = harness
        .bootstrap(&spec, &mut header, &mut state)
        .unwrap_err();
    assert!(err.to_string().contains("initValidator"));
    // no active set was ever installed
    assert!(harness.gov.lock().active_set.is_empty());
}

#[test]
fn short_extra_data_is_rejected() {
    let spec = genesis_spec(vec![validator(0x10, 100)]);
    let harness = Harness::new(GovState::default());
    let mut header = genesis_header();
    header.extra = vec![0u8; 16].into();
    let mut state = FinalizeSpy::default();

    let err = harness
        .bootstrap(&spec, &mut header, &mut state)
        .unwrap_err();
    assert!(err.to_string().contains("extra-data"));
}
