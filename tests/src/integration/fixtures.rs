//! Shared two-node fixtures: deterministic keys, engine wiring over one
//! in-process bus, and a funding helper that forges the jointly-signed
//! free balance attestation (both test keys are available here).

use std::sync::Arc;
use std::time::Duration;

use shared_bus::InMemoryChannelBus;
use shared_crypto::ChannelKeypair;
use shared_types::{
    AbiEncodings, Address, AppChallenge, Bytes32, NetworkContext, OutcomeType, ProposeParams,
    PublicIdentifier, SetupParams, U256,
};
use sl_01_channel_model::{FreeBalance, StateChannel};
use sl_02_commitments::SetStateCommitment;
use sl_03_protocols::adapters::{
    CoinTransferAppLogic, InMemoryLockService, InMemoryStateChannelStore, LocalChannelSigner,
    StaticAppRegistry, StaticChainProvider,
};
use sl_03_protocols::ports::{AppRegistryInfo, StateChannelStore};
use sl_04_engine::{ChannelEngine, EngineConfig};

pub const A_PRIVATE_KEY: [u8; 32] = [0xA1; 32];
pub const B_PRIVATE_KEY: [u8; 32] = [0xB2; 32];

pub const MULTISIG: Address = Address([0x44; 20]);
pub const TOKEN: Address = Address([0x77; 20]);
pub const TRANSFER_APP: Address = Address([0x55; 20]);

pub const TRANSFER_STATE_ENCODING: &str =
    "tuple(tuple(address to, uint256 amount)[2] coinTransfers)";
pub const TRANSFER_ACTION_ENCODING: &str = "tuple(uint256 transferAmount)";

pub fn network_context() -> NetworkContext {
    NetworkContext {
        proxy_factory: Address([0x01; 20]),
        multisig_mastercopy: Address([0x02; 20]),
        identity_app: Address([0x03; 20]),
        challenge_registry: Address([0x04; 20]),
        conditional_transaction_delegate: Address([0x05; 20]),
        two_party_fixed_outcome_interpreter: Address([0x06; 20]),
        single_asset_two_party_coin_transfer_interpreter: Address([0x07; 20]),
        multi_asset_multi_party_coin_transfer_interpreter: Address([0x08; 20]),
    }
}

pub struct TestNode {
    pub engine: Arc<ChannelEngine>,
    pub store: Arc<InMemoryStateChannelStore>,
    pub identifier: PublicIdentifier,
    pub address: Address,
    secret: [u8; 32],
}

impl TestNode {
    pub fn keypair(&self) -> ChannelKeypair {
        ChannelKeypair::from_bytes(self.secret).expect("test key is valid")
    }

    pub async fn channel(&self) -> StateChannel {
        let json = self
            .store
            .get_state_channel(MULTISIG)
            .await
            .expect("store read")
            .expect("channel exists");
        StateChannel::from_json(json).expect("channel parses")
    }
}

pub fn spawn_node(bus: &Arc<InMemoryChannelBus>, secret: [u8; 32]) -> TestNode {
    let keypair = ChannelKeypair::from_bytes(secret).expect("test key is valid");
    let identifier = keypair.public_identifier();
    let address = keypair.address();

    let store = Arc::new(InMemoryStateChannelStore::new());
    let registry = StaticAppRegistry::new()
        .with_app(AppRegistryInfo {
            name: "SimpleTransferApp".into(),
            app_definition_address: TRANSFER_APP,
            state_encoding: TRANSFER_STATE_ENCODING.into(),
            action_encoding: Some(TRANSFER_ACTION_ENCODING.into()),
            outcome_type: OutcomeType::SingleAssetTwoPartyCoinTransfer,
        })
        .with_supported_token(Address::zero())
        .with_supported_token(TOKEN);

    let mut config = EngineConfig::default();
    config.protocol_timeouts.round_timeout = Duration::from_secs(5);
    config.lock_timeout = Duration::from_secs(5);

    let engine = ChannelEngine::new(
        config,
        network_context(),
        Arc::clone(bus),
        Arc::clone(&store) as Arc<dyn StateChannelStore>,
        Arc::new(LocalChannelSigner::new(keypair)),
        Arc::new(registry),
        Arc::new(CoinTransferAppLogic::new()),
        Arc::new(StaticChainProvider::new(U256::from(1_000_000u64))),
        Arc::new(InMemoryLockService::new()),
    );
    let _inbound = engine.start();

    TestNode {
        engine,
        store,
        identifier,
        address,
        secret,
    }
}

/// Two nodes on one bus: `(a, b)` with deterministic keys.
pub fn two_nodes() -> (Arc<InMemoryChannelBus>, TestNode, TestNode) {
    let bus = Arc::new(InMemoryChannelBus::new());
    let a = spawn_node(&bus, A_PRIVATE_KEY);
    let b = spawn_node(&bus, B_PRIVATE_KEY);
    (bus, a, b)
}

/// Run the setup protocol from `a` toward `b` and return the channel's
/// multisig address.
pub async fn create_channel(a: &TestNode, b: &TestNode) -> Address {
    a.engine
        .setup(SetupParams {
            multisig_address: MULTISIG,
            initiator_identifier: a.identifier,
            responder_identifier: b.identifier,
            addresses: network_context().channel_addresses(),
        })
        .await
        .expect("setup succeeds");
    MULTISIG
}

/// Replace both nodes' free balance with `amount` per owner for the
/// native asset and the test token, re-signing the attestation with both
/// deterministic test keys.
pub async fn fund_channel(a: &TestNode, b: &TestNode, amount: u64) {
    let key_a = a.keypair();
    let key_b = b.keypair();

    for node in [a, b] {
        let channel = node.channel().await;
        let free_balance = FreeBalance::create_with_funded_token_amounts(
            channel.multisig_owners().to_vec(),
            U256::from(amount),
            vec![Address::zero(), TOKEN],
        )
        .expect("two owners");
        let funded = channel.set_free_balance(&free_balance).expect("set free balance");

        let fb_app = funded.free_balance_app_instance();
        let mut attestation = SetStateCommitment::new(
            network_context().challenge_registry,
            fb_app.identity(),
            fb_app.state_hash(),
            fb_app.latest_version_number(),
            fb_app.state_timeout(),
        )
        .expect("commitment builds");
        let digest = attestation.hash_to_sign();
        attestation
            .add_signature(key_a.sign_digest(&digest).expect("sign"))
            .expect("owner signature");
        attestation
            .add_signature(key_b.sign_digest(&digest).expect("sign"))
            .expect("owner signature");

        let set_states = node
            .store
            .get_set_state_commitments(MULTISIG)
            .await
            .expect("set states");
        let conditionals = node
            .store
            .get_conditional_commitments(MULTISIG)
            .await
            .expect("conditionals");
        node.store
            .save_synced_channel(
                &funded.to_json(),
                &attestation.to_json(),
                &set_states,
                &conditionals,
            )
            .await
            .expect("funding persists");
    }
}

/// Proposal params for the transfer app: `initiator` deposits
/// `initiator_deposit` of `token`, the responder deposits nothing.
pub fn transfer_proposal(
    initiator: &TestNode,
    responder: &TestNode,
    initiator_deposit: u64,
    token: Address,
) -> ProposeParams {
    ProposeParams {
        multisig_address: MULTISIG,
        initiator_identifier: initiator.identifier,
        responder_identifier: responder.identifier,
        app_definition: TRANSFER_APP,
        abi_encodings: AbiEncodings {
            state_encoding: TRANSFER_STATE_ENCODING.into(),
            action_encoding: Some(TRANSFER_ACTION_ENCODING.into()),
        },
        initiator_deposit: U256::from(initiator_deposit),
        initiator_deposit_token_address: token,
        responder_deposit: U256::zero(),
        responder_deposit_token_address: Address::zero(),
        default_timeout: U256::from(600u64),
        state_timeout: U256::zero(),
        initial_state: serde_json::json!({
            "coinTransfers": [
                { "to": initiator.address, "amount": U256::from(initiator_deposit) },
                { "to": responder.address, "amount": U256::zero() },
            ]
        }),
        outcome_type: OutcomeType::SingleAssetTwoPartyCoinTransfer,
        meta: None,
    }
}

pub fn challenge(identity_hash: Bytes32, version_number: u64) -> AppChallenge {
    AppChallenge {
        identity_hash,
        app_state_hash: Bytes32([version_number as u8; 32]),
        version_number,
        finalizes_at: U256::from(10_000u64),
    }
}
