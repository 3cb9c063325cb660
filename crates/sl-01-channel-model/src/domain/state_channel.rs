//! # State Channel Aggregate
//!
//! The channel-level entity composing the free balance with installed and
//! proposed apps. The aggregate is pure data: every transition is a
//! function `StateChannel -> StateChannel` returning a new immutable
//! value, never an in-place mutation. Legal transition *sequences* are
//! enforced by the protocol layer on top.
//!
//! ## Invariants
//!
//! - The free balance app always exists and never appears in
//!   `app_instances` or `proposed_app_instances`
//! - `app_instances` and `proposed_app_instances` have disjoint key sets
//! - An app becomes active in the same transition that debits its funding
//!   from free balance; a reader can never observe one without the other
//! - `monotonic_num_proposed_apps` only ever increases

use std::collections::BTreeMap;

use shared_crypto::signer_address_of;
use shared_types::{
    Address, AppInterface, AppInstanceJson, Bytes32, ChannelAddresses, InterpreterParams,
    OutcomeType, PublicIdentifier, StateChannelJson, TokenIndexedBalances, U256,
};

use super::app_instance::{AppInstance, AppInstanceSeed};
use super::errors::ChannelError;
use super::free_balance::{FreeBalance, FREE_BALANCE_STATE_ENCODING};

/// Version of the persisted channel document schema.
pub const CHANNEL_SCHEMA_VERSION: u64 = 1;

/// The free balance occupies sequence number zero; proposals start at one.
pub const FREE_BALANCE_APP_SEQ_NO: u64 = 0;

/// Dispute timeout (in blocks) for the free balance app.
pub const FREE_BALANCE_DEFAULT_TIMEOUT: u64 = 172_800;

/// A bilateral state channel backed by one multisig.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateChannel {
    schema_version: u64,
    multisig_address: Address,
    addresses: ChannelAddresses,
    /// `[initiator, responder]` in fixed order.
    user_identifiers: [PublicIdentifier; 2],
    /// Signer addresses derived from the identifiers, same order.
    multisig_owners: [Address; 2],
    free_balance_app_instance: AppInstance,
    app_instances: BTreeMap<Bytes32, AppInstance>,
    proposed_app_instances: BTreeMap<Bytes32, AppInstance>,
    monotonic_num_proposed_apps: u64,
}

impl StateChannel {
    /// Initial channel: zero-funded free balance, no apps, no proposals.
    pub fn setup_channel(
        free_balance_app_definition: Address,
        addresses: ChannelAddresses,
        multisig_address: Address,
        initiator: PublicIdentifier,
        responder: PublicIdentifier,
    ) -> Result<Self, ChannelError> {
        let owners = [signer_address_of(&initiator)?, signer_address_of(&responder)?];
        if owners[0] == owners[1] {
            return Err(ChannelError::IdenticalParticipants { address: owners[0] });
        }

        let free_balance = FreeBalance::create_empty(owners.to_vec())?;
        let free_balance_app_instance = AppInstance::new(AppInstanceSeed {
            multisig_address,
            initiator_identifier: initiator,
            responder_identifier: responder,
            default_timeout: U256::from(FREE_BALANCE_DEFAULT_TIMEOUT),
            app_interface: AppInterface {
                addr: free_balance_app_definition,
                state_encoding: FREE_BALANCE_STATE_ENCODING.to_string(),
                action_encoding: None,
            },
            app_seq_no: FREE_BALANCE_APP_SEQ_NO,
            initiator_deposit: U256::zero(),
            initiator_deposit_token_address: Address::zero(),
            responder_deposit: U256::zero(),
            responder_deposit_token_address: Address::zero(),
            initial_state: free_balance.to_app_state(),
            state_timeout: U256::zero(),
            outcome_type: OutcomeType::MultiAssetMultiPartyCoinTransfer,
            interpreter_params: InterpreterParams::MultiAssetMultiPartyCoinTransfer {
                limit: vec![],
                token_addresses: vec![],
            },
            meta: None,
        })?;

        Ok(Self {
            schema_version: CHANNEL_SCHEMA_VERSION,
            multisig_address,
            addresses,
            user_identifiers: [initiator, responder],
            multisig_owners: owners,
            free_balance_app_instance,
            app_instances: BTreeMap::new(),
            proposed_app_instances: BTreeMap::new(),
            monotonic_num_proposed_apps: 0,
        })
    }

    // =========================================================================
    // ACCESSORS
    // =========================================================================

    #[must_use]
    pub fn schema_version(&self) -> u64 {
        self.schema_version
    }

    #[must_use]
    pub fn multisig_address(&self) -> Address {
        self.multisig_address
    }

    #[must_use]
    pub fn addresses(&self) -> ChannelAddresses {
        self.addresses
    }

    /// `[initiator, responder]` in fixed order.
    #[must_use]
    pub fn user_identifiers(&self) -> [PublicIdentifier; 2] {
        self.user_identifiers
    }

    /// Derived signer addresses, same order as the identifiers.
    #[must_use]
    pub fn multisig_owners(&self) -> [Address; 2] {
        self.multisig_owners
    }

    #[must_use]
    pub fn free_balance_app_instance(&self) -> &AppInstance {
        &self.free_balance_app_instance
    }

    #[must_use]
    pub fn app_instances(&self) -> &BTreeMap<Bytes32, AppInstance> {
        &self.app_instances
    }

    #[must_use]
    pub fn proposed_app_instances(&self) -> &BTreeMap<Bytes32, AppInstance> {
        &self.proposed_app_instances
    }

    #[must_use]
    pub fn num_active_apps(&self) -> usize {
        self.app_instances.len()
    }

    #[must_use]
    pub fn num_proposed_apps(&self) -> usize {
        self.proposed_app_instances.len()
    }

    #[must_use]
    pub fn monotonic_num_proposed_apps(&self) -> u64 {
        self.monotonic_num_proposed_apps
    }

    /// Sequence number the next proposal must carry.
    #[must_use]
    pub fn next_app_seq_no(&self) -> u64 {
        self.monotonic_num_proposed_apps + 1
    }

    /// Whether `identity_hash` is the free balance's own hash.
    #[must_use]
    pub fn is_free_balance(&self, identity_hash: &Bytes32) -> bool {
        self.free_balance_app_instance.identity_hash() == *identity_hash
    }

    /// Look up an active app.
    pub fn get_app_instance(&self, identity_hash: &Bytes32) -> Result<&AppInstance, ChannelError> {
        self.app_instances
            .get(identity_hash)
            .ok_or(ChannelError::AppNotFound {
                identity_hash: *identity_hash,
            })
    }

    /// Look up a pending proposal.
    pub fn get_proposal(&self, identity_hash: &Bytes32) -> Result<&AppInstance, ChannelError> {
        self.proposed_app_instances
            .get(identity_hash)
            .ok_or(ChannelError::ProposalNotFound {
                identity_hash: *identity_hash,
            })
    }

    /// Typed view over the free balance app state.
    pub fn free_balance(&self) -> Result<FreeBalance, ChannelError> {
        FreeBalance::from_app_state(
            self.multisig_owners.to_vec(),
            self.free_balance_app_instance.latest_state(),
        )
    }

    // =========================================================================
    // TRANSITIONS (pure: each returns a new aggregate)
    // =========================================================================

    /// Replace the free balance wholesale (setup and deposit flows only).
    ///
    /// The free balance app's version number advances by one.
    pub fn set_free_balance(&self, free_balance: &FreeBalance) -> Result<Self, ChannelError> {
        let mut next = self.clone();
        next.free_balance_app_instance = self.free_balance_app_instance.set_state(
            free_balance.to_app_state(),
            self.free_balance_app_instance.latest_version_number() + 1,
            U256::zero(),
        )?;
        Ok(next)
    }

    /// Insert a proposal and advance the monotonic proposal counter.
    ///
    /// The proposal's sequence number must continue the channel sequence;
    /// `app_seq_no` is the tie-break that keeps proposal ordering
    /// deterministic across both parties.
    pub fn add_proposal(&self, proposal: AppInstance) -> Result<Self, ChannelError> {
        let identity_hash = proposal.identity_hash();
        if proposal.app_seq_no() != self.next_app_seq_no() {
            return Err(ChannelError::NonSequentialAppSeqNo {
                expected: self.next_app_seq_no(),
                actual: proposal.app_seq_no(),
            });
        }
        if self.is_free_balance(&identity_hash)
            || self.app_instances.contains_key(&identity_hash)
            || self.proposed_app_instances.contains_key(&identity_hash)
        {
            return Err(ChannelError::AppAlreadyExists { identity_hash });
        }

        let mut next = self.clone();
        next.proposed_app_instances.insert(identity_hash, proposal);
        next.monotonic_num_proposed_apps += 1;
        Ok(next)
    }

    /// Drop a pending proposal. The monotonic proposal counter is
    /// deliberately untouched; it only ever increases.
    pub fn remove_proposal(&self, identity_hash: &Bytes32) -> Result<Self, ChannelError> {
        let mut next = self.clone();
        if next.proposed_app_instances.remove(identity_hash).is_none() {
            return Err(ChannelError::ProposalNotFound {
                identity_hash: *identity_hash,
            });
        }
        Ok(next)
    }

    /// Promote a proposal to active and debit its funding from free
    /// balance in one transition.
    ///
    /// `balance_decrements` is `{token: {owner: deposit}}`; an app is
    /// never observable as active without its funding reflected here.
    pub fn add_active_app_and_increment_free_balance(
        &self,
        identity_hash: &Bytes32,
        balance_decrements: &TokenIndexedBalances,
    ) -> Result<Self, ChannelError> {
        let mut next = self.clone();
        let app = next
            .proposed_app_instances
            .remove(identity_hash)
            .ok_or(ChannelError::ProposalNotFound {
                identity_hash: *identity_hash,
            })?;

        let free_balance = self
            .free_balance()?
            .decrement(self.multisig_address, balance_decrements)?
            .register_app(*identity_hash);

        next.app_instances.insert(*identity_hash, app);
        next.free_balance_app_instance = self.free_balance_app_instance.set_state(
            free_balance.to_app_state(),
            self.free_balance_app_instance.latest_version_number() + 1,
            U256::zero(),
        )?;
        Ok(next)
    }

    /// Remove an active app and credit its outcome to free balance in one
    /// transition. The free balance itself is structurally protected and
    /// can never be the target.
    pub fn remove_app_and_increment_free_balance(
        &self,
        identity_hash: &Bytes32,
        balance_increments: &TokenIndexedBalances,
    ) -> Result<Self, ChannelError> {
        if self.is_free_balance(identity_hash) {
            return Err(ChannelError::CannotUninstallFreeBalance {
                multisig_address: self.multisig_address,
            });
        }

        let mut next = self.clone();
        if next.app_instances.remove(identity_hash).is_none() {
            return Err(ChannelError::AppNotFound {
                identity_hash: *identity_hash,
            });
        }

        let free_balance = self
            .free_balance()?
            .increment(balance_increments)
            .release_app(identity_hash);

        next.free_balance_app_instance = self.free_balance_app_instance.set_state(
            free_balance.to_app_state(),
            self.free_balance_app_instance.latest_version_number() + 1,
            U256::zero(),
        )?;
        Ok(next)
    }

    /// Replace an active app with an advanced-state successor
    /// (take-action flow).
    pub fn update_app(&self, app: AppInstance) -> Result<Self, ChannelError> {
        let identity_hash = app.identity_hash();
        if !self.app_instances.contains_key(&identity_hash) {
            return Err(ChannelError::AppNotFound { identity_hash });
        }
        let mut next = self.clone();
        next.app_instances.insert(identity_hash, app);
        Ok(next)
    }

    // =========================================================================
    // SERIALIZATION
    // =========================================================================

    /// Canonical persisted document. Lossless for every field; see
    /// `from_json`.
    #[must_use]
    pub fn to_json(&self) -> StateChannelJson {
        let to_pairs = |apps: &BTreeMap<Bytes32, AppInstance>| {
            apps.iter()
                .map(|(hash, app)| (*hash, app.to_json()))
                .collect::<BTreeMap<Bytes32, AppInstanceJson>>()
        };
        StateChannelJson {
            schema_version: self.schema_version,
            multisig_address: self.multisig_address,
            addresses: self.addresses,
            user_identifiers: self.user_identifiers.to_vec(),
            free_balance_app_instance: self.free_balance_app_instance.to_json(),
            app_instances: to_pairs(&self.app_instances),
            proposed_app_instances: to_pairs(&self.proposed_app_instances),
            monotonic_num_proposed_apps: self.monotonic_num_proposed_apps,
        }
    }

    /// Rehydrate from the persisted document, re-deriving signer
    /// addresses and re-checking structural invariants.
    pub fn from_json(json: StateChannelJson) -> Result<Self, ChannelError> {
        if json.user_identifiers.len() != 2 {
            return Err(ChannelError::InvalidOwnerCount {
                actual: json.user_identifiers.len(),
            });
        }
        let user_identifiers = [json.user_identifiers[0], json.user_identifiers[1]];
        let multisig_owners = [
            signer_address_of(&user_identifiers[0])?,
            signer_address_of(&user_identifiers[1])?,
        ];

        let free_balance_app_instance = AppInstance::from_json(json.free_balance_app_instance)?;

        let from_pairs = |apps: BTreeMap<Bytes32, AppInstanceJson>| {
            apps.into_iter()
                .map(|(hash, app)| Ok((hash, AppInstance::from_json(app)?)))
                .collect::<Result<BTreeMap<Bytes32, AppInstance>, ChannelError>>()
        };
        let app_instances = from_pairs(json.app_instances)?;
        let proposed_app_instances = from_pairs(json.proposed_app_instances)?;

        for identity_hash in app_instances.keys() {
            if proposed_app_instances.contains_key(identity_hash)
                || *identity_hash == free_balance_app_instance.identity_hash()
            {
                return Err(ChannelError::AppAlreadyExists {
                    identity_hash: *identity_hash,
                });
            }
        }

        Ok(Self {
            schema_version: json.schema_version,
            multisig_address: json.multisig_address,
            addresses: json.addresses,
            user_identifiers,
            multisig_owners,
            free_balance_app_instance,
            app_instances,
            proposed_app_instances,
            monotonic_num_proposed_apps: json.monotonic_num_proposed_apps,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::app_instance::AppInstanceSeed;
    use serde_json::json;
    use shared_crypto::ChannelKeypair;
    use shared_types::NATIVE_TOKEN_ADDRESS;
    use std::collections::BTreeMap;

    struct Fixture {
        channel: StateChannel,
        initiator: ChannelKeypair,
        responder: ChannelKeypair,
        token: Address,
    }

    fn addresses() -> ChannelAddresses {
        ChannelAddresses {
            proxy_factory: Address([0x21; 20]),
            multisig_mastercopy: Address([0x22; 20]),
        }
    }

    fn fixture() -> Fixture {
        let initiator = ChannelKeypair::generate();
        let responder = ChannelKeypair::generate();
        let channel = StateChannel::setup_channel(
            Address([0x33; 20]),
            addresses(),
            Address([0x44; 20]),
            initiator.public_identifier(),
            responder.public_identifier(),
        )
        .unwrap();
        Fixture {
            channel,
            initiator,
            responder,
            token: Address([0x77; 20]),
        }
    }

    fn proposal_for(fx: &Fixture, channel: &StateChannel) -> AppInstance {
        AppInstance::new(AppInstanceSeed {
            multisig_address: channel.multisig_address(),
            initiator_identifier: fx.responder.public_identifier(),
            responder_identifier: fx.initiator.public_identifier(),
            default_timeout: U256::from(600u64),
            app_interface: AppInterface {
                addr: Address([0x55; 20]),
                state_encoding: "tuple(uint256 counter)".into(),
                action_encoding: None,
            },
            app_seq_no: channel.next_app_seq_no(),
            initiator_deposit: U256::from(7u64),
            initiator_deposit_token_address: fx.token,
            responder_deposit: U256::zero(),
            responder_deposit_token_address: NATIVE_TOKEN_ADDRESS,
            initial_state: json!({ "counter": "0x0" }),
            state_timeout: U256::zero(),
            outcome_type: OutcomeType::SingleAssetTwoPartyCoinTransfer,
            interpreter_params: InterpreterParams::SingleAssetTwoPartyCoinTransfer {
                limit: U256::from(7u64),
                token_address: fx.token,
            },
            meta: None,
        })
        .unwrap()
    }

    /// Fund both owners with `amount` of ETH and the fixture token.
    fn funded(fx: &Fixture, amount: u64) -> StateChannel {
        let free_balance = FreeBalance::create_with_funded_token_amounts(
            fx.channel.multisig_owners().to_vec(),
            U256::from(amount),
            vec![NATIVE_TOKEN_ADDRESS, fx.token],
        )
        .unwrap();
        fx.channel.set_free_balance(&free_balance).unwrap()
    }

    #[test]
    fn test_setup_channel_is_empty() {
        let fx = fixture();
        assert_eq!(fx.channel.num_active_apps(), 0);
        assert_eq!(fx.channel.num_proposed_apps(), 0);
        assert_eq!(fx.channel.monotonic_num_proposed_apps(), 0);
        assert_eq!(
            fx.channel.user_identifiers(),
            [fx.initiator.public_identifier(), fx.responder.public_identifier()]
        );
        assert_eq!(
            fx.channel.multisig_owners(),
            [fx.initiator.address(), fx.responder.address()]
        );
    }

    #[test]
    fn test_install_debits_channel_responder_on_token() {
        // App initiator is the channel's second multisig owner, deposits 7
        // on the token; app responder deposits nothing. Only the channel
        // responder's token balance may change.
        let fx = fixture();
        let channel = funded(&fx, 15);
        let proposal = proposal_for(&fx, &channel);
        let identity_hash = proposal.identity_hash();
        let channel = channel.add_proposal(proposal).unwrap();

        let mut decrements: TokenIndexedBalances = BTreeMap::new();
        decrements
            .entry(fx.token)
            .or_default()
            .insert(channel.multisig_owners()[1], U256::from(7u64));

        let installed = channel
            .add_active_app_and_increment_free_balance(&identity_hash, &decrements)
            .unwrap();

        let balances = installed.free_balance().unwrap().to_token_indexed_map();
        let [owner_a, owner_b] = installed.multisig_owners();
        assert_eq!(balances[&NATIVE_TOKEN_ADDRESS][&owner_a], U256::from(15u64));
        assert_eq!(balances[&NATIVE_TOKEN_ADDRESS][&owner_b], U256::from(15u64));
        assert_eq!(balances[&fx.token][&owner_a], U256::from(15u64));
        assert_eq!(balances[&fx.token][&owner_b], U256::from(8u64));

        assert_eq!(installed.num_active_apps(), 1);
        assert_eq!(installed.num_proposed_apps(), 0);
        assert!(installed.free_balance().unwrap().active_apps().any(|h| *h == identity_hash));
    }

    #[test]
    fn test_install_then_uninstall_restores_free_balance() {
        let fx = fixture();
        let channel = funded(&fx, 15);
        let proposal = proposal_for(&fx, &channel);
        let identity_hash = proposal.identity_hash();
        let channel = channel.add_proposal(proposal).unwrap();

        let mut delta: TokenIndexedBalances = BTreeMap::new();
        delta
            .entry(fx.token)
            .or_default()
            .insert(channel.multisig_owners()[1], U256::from(7u64));

        let installed = channel
            .add_active_app_and_increment_free_balance(&identity_hash, &delta)
            .unwrap();
        let uninstalled = installed
            .remove_app_and_increment_free_balance(&identity_hash, &delta)
            .unwrap();

        assert_eq!(
            uninstalled.free_balance().unwrap().to_token_indexed_map(),
            channel.free_balance().unwrap().to_token_indexed_map()
        );
        assert_eq!(uninstalled.num_active_apps(), 0);
    }

    #[test]
    fn test_install_rejects_overdraft_without_side_effects() {
        let fx = fixture();
        let channel = funded(&fx, 5);
        let proposal = proposal_for(&fx, &channel);
        let identity_hash = proposal.identity_hash();
        let channel = channel.add_proposal(proposal).unwrap();

        let mut decrements: TokenIndexedBalances = BTreeMap::new();
        decrements
            .entry(fx.token)
            .or_default()
            .insert(channel.multisig_owners()[1], U256::from(9u64));

        let err = channel
            .add_active_app_and_increment_free_balance(&identity_hash, &decrements)
            .unwrap_err();
        assert!(matches!(err, ChannelError::InsufficientBalance { .. }));
        // The source aggregate is untouched: the proposal is still pending.
        assert!(channel.get_proposal(&identity_hash).is_ok());
    }

    #[test]
    fn test_cannot_uninstall_free_balance() {
        let fx = fixture();
        let hash = fx.channel.free_balance_app_instance().identity_hash();

        let err = fx
            .channel
            .remove_app_and_increment_free_balance(&hash, &BTreeMap::new())
            .unwrap_err();
        assert!(matches!(err, ChannelError::CannotUninstallFreeBalance { .. }));
    }

    #[test]
    fn test_remove_proposal_keeps_monotonic_counter() {
        let fx = fixture();
        let proposal = proposal_for(&fx, &fx.channel);
        let identity_hash = proposal.identity_hash();

        let proposed = fx.channel.add_proposal(proposal).unwrap();
        assert_eq!(proposed.monotonic_num_proposed_apps(), 1);

        let removed = proposed.remove_proposal(&identity_hash).unwrap();
        assert_eq!(removed.num_proposed_apps(), 0);
        assert_eq!(removed.monotonic_num_proposed_apps(), 1);
    }

    #[test]
    fn test_add_proposal_rejects_gap_in_sequence() {
        let fx = fixture();
        let mut proposal_seed_channel = fx.channel.clone();
        // Build a proposal against a channel that is one proposal ahead.
        proposal_seed_channel = proposal_seed_channel
            .add_proposal(proposal_for(&fx, &proposal_seed_channel))
            .unwrap();
        let stale = proposal_for(&fx, &proposal_seed_channel);

        let err = fx.channel.add_proposal(stale).unwrap_err();
        assert!(matches!(
            err,
            ChannelError::NonSequentialAppSeqNo { expected: 1, actual: 2 }
        ));
    }

    #[test]
    fn test_json_round_trip_is_lossless() {
        let fx = fixture();
        let channel = funded(&fx, 15);
        let proposal = proposal_for(&fx, &channel);
        let identity_hash = proposal.identity_hash();
        let channel = channel.add_proposal(proposal).unwrap();

        let mut delta: TokenIndexedBalances = BTreeMap::new();
        delta
            .entry(fx.token)
            .or_default()
            .insert(channel.multisig_owners()[1], U256::from(7u64));
        let channel = channel
            .add_active_app_and_increment_free_balance(&identity_hash, &delta)
            .unwrap();

        let json = channel.to_json();
        let text = serde_json::to_string(&json).unwrap();
        let parsed: StateChannelJson = serde_json::from_str(&text).unwrap();
        let back = StateChannel::from_json(parsed).unwrap();

        assert_eq!(back, channel);
    }

    #[test]
    fn test_update_app_requires_active_app() {
        let fx = fixture();
        let proposal = proposal_for(&fx, &fx.channel);

        let err = fx.channel.update_app(proposal).unwrap_err();
        assert!(matches!(err, ChannelError::AppNotFound { .. }));
    }
}
