//! # Channel Engine
//!
//! The node-facing surface: one method per protocol plus read queries.
//! Each protocol call validates its parameters, then runs under the
//! per-channel lock via the protocol runner; completion and failure are
//! also published as bounded engine events on the shared bus, so clients
//! can consume results as return values and still observe out-of-band
//! activity (counterparty proposals, syncs) through a subscription.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use shared_bus::{ChannelEvent, EventFilter, EventPublisher, InMemoryChannelBus, Subscription};
use shared_types::{
    Address, AppChallenge, AppInstanceJson, Bytes32, InstallParams, ProposeParams,
    ProtocolParams, SetupParams, StateChannelJson, SyncParams, TakeActionParams, UninstallParams,
};
use sl_03_protocols::adapters::BusMessagingService;
use sl_03_protocols::domain::{
    InboundOutcome, ProtocolContext, ProtocolOutput, ProtocolRunError, ProtocolRunner,
    ProtocolTimeouts,
};
use sl_03_protocols::ports::{
    AppLogic, AppRegistry, ChainProvider, ChannelSigner, LockService, StateChannelStore,
    StoreError,
};
use sl_01_channel_model::ChannelError;
use sl_03_protocols::ProtocolError;

use crate::retry::retry_transient;

/// Engine policy knobs.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Per-round countersignature budget.
    pub protocol_timeouts: ProtocolTimeouts,
    /// Budget for acquiring the per-channel lock.
    pub lock_timeout: Duration,
    /// Bounded retries for transient store I/O.
    pub store_retries: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            protocol_timeouts: ProtocolTimeouts::default(),
            lock_timeout: Duration::from_secs(30),
            store_retries: 3,
        }
    }
}

/// One node's channel engine.
pub struct ChannelEngine {
    runner: ProtocolRunner,
    bus: Arc<InMemoryChannelBus>,
    messaging: Arc<BusMessagingService>,
    store: Arc<dyn StateChannelStore>,
    config: EngineConfig,
}

impl ChannelEngine {
    /// Wire an engine from its collaborators. The lock service must be
    /// node-local: it serializes this node's protocol executions per
    /// channel.
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn new(
        config: EngineConfig,
        network: shared_types::NetworkContext,
        bus: Arc<InMemoryChannelBus>,
        store: Arc<dyn StateChannelStore>,
        signer: Arc<dyn ChannelSigner>,
        app_registry: Arc<dyn AppRegistry>,
        app_logic: Arc<dyn AppLogic>,
        chain: Arc<dyn ChainProvider>,
        locks: Arc<dyn LockService>,
    ) -> Arc<Self> {
        let messaging = Arc::new(BusMessagingService::new(
            Arc::clone(&bus),
            signer.public_identifier(),
        ));
        let ctx = ProtocolContext {
            network,
            store: Arc::clone(&store),
            messaging: Arc::clone(&messaging) as Arc<dyn sl_03_protocols::ports::MessagingService>,
            signer,
            app_registry,
            app_logic,
            chain,
            timeouts: config.protocol_timeouts,
        };
        let runner = ProtocolRunner::new(ctx, locks, config.lock_timeout);
        Arc::new(Self {
            runner,
            bus,
            messaging,
            store,
            config,
        })
    }

    /// Spawn the inbound loop draining protocol messages addressed to
    /// this node. Runs until the bus is dropped.
    #[must_use]
    pub fn start(self: &Arc<Self>) -> JoinHandle<()> {
        let engine = Arc::clone(self);
        let mut inbound = engine.messaging.inbound_subscription();
        tokio::spawn(async move {
            info!("Engine inbound loop started");
            while let Some(event) = inbound.recv().await {
                let ChannelEvent::Protocol(envelope) = event else {
                    continue;
                };
                engine.handle_inbound(envelope.message).await;
            }
            debug!("Engine inbound loop stopped");
        })
    }

    async fn handle_inbound(&self, message: shared_types::ProtocolMessage) {
        match self.runner.handle_message(message).await {
            Ok(Some(outcome)) => {
                self.bus.publish(outcome_event(outcome)).await;
            }
            Ok(None) => {}
            Err(err) => {
                error!(%err, "Inbound protocol handling failed");
                self.bus
                    .publish(ChannelEvent::ProtocolFailed {
                        protocol: err.protocol,
                        multisig_address: err.multisig_address,
                        reason: err.to_string(),
                    })
                    .await;
            }
        }
    }

    /// Subscribe to engine notification events (bounded per subscriber).
    #[must_use]
    pub fn subscribe(&self) -> Subscription {
        self.bus.subscribe(EventFilter::engine())
    }

    // =========================================================================
    // PROTOCOL METHODS (exposed surface, one per protocol)
    // =========================================================================

    pub async fn setup(&self, params: SetupParams) -> Result<StateChannelJson, ProtocolRunError> {
        let multisig_address = params.multisig_address;
        let output = self.runner.initiate(ProtocolParams::Setup(params)).await?;
        self.bus
            .publish(ChannelEvent::SetupCompleted { multisig_address })
            .await;
        expect_channel(output)
    }

    pub async fn propose_install(
        &self,
        params: ProposeParams,
    ) -> Result<AppInstanceJson, ProtocolRunError> {
        let output = self.runner.initiate(ProtocolParams::Propose(params)).await?;
        expect_app(output)
    }

    pub async fn install(
        &self,
        params: InstallParams,
    ) -> Result<AppInstanceJson, ProtocolRunError> {
        let multisig_address = params.multisig_address;
        let identity_hash = params.identity_hash;
        let output = self.runner.initiate(ProtocolParams::Install(params)).await?;
        self.bus
            .publish(ChannelEvent::InstallCompleted {
                multisig_address,
                identity_hash,
            })
            .await;
        expect_app(output)
    }

    pub async fn take_action(
        &self,
        params: TakeActionParams,
    ) -> Result<AppInstanceJson, ProtocolRunError> {
        let output = self
            .runner
            .initiate(ProtocolParams::TakeAction(params))
            .await?;
        expect_app(output)
    }

    pub async fn uninstall(
        &self,
        params: UninstallParams,
    ) -> Result<StateChannelJson, ProtocolRunError> {
        let multisig_address = params.multisig_address;
        let identity_hash = params.identity_hash;
        let output = self
            .runner
            .initiate(ProtocolParams::Uninstall(params))
            .await?;
        self.bus
            .publish(ChannelEvent::UninstallCompleted {
                multisig_address,
                identity_hash,
            })
            .await;
        expect_channel(output)
    }

    pub async fn sync(&self, multisig_address: Address) -> Result<StateChannelJson, ProtocolRunError> {
        let output = self
            .runner
            .initiate(ProtocolParams::Sync(SyncParams {
                multisig_address,
                snapshot: None,
            }))
            .await?;
        expect_channel(output)
    }

    /// Reject (remove) a pending proposal on this node. Purely local; the
    /// counterparty's copy expires by its own policy. The monotonic
    /// proposal counter is untouched.
    pub async fn reject_proposal(
        &self,
        multisig_address: Address,
        identity_hash: Bytes32,
    ) -> Result<StateChannelJson, ProtocolError> {
        let channel = self.checked_out_channel(multisig_address).await?;
        let next = channel.remove_proposal(&identity_hash)?;
        let next_json = next.to_json();
        retry_transient(self.config.store_retries, || {
            let store = Arc::clone(&self.store);
            let channel = next_json.clone();
            async move { store.remove_app_proposal(&channel, identity_hash).await }
        })
        .await?;
        Ok(next_json)
    }

    // =========================================================================
    // READ QUERIES
    // =========================================================================

    pub async fn get_state_channel(
        &self,
        multisig_address: Address,
    ) -> Result<StateChannelJson, ProtocolError> {
        retry_transient(self.config.store_retries, || {
            let store = Arc::clone(&self.store);
            async move { store.get_state_channel(multisig_address).await }
        })
        .await?
        .ok_or(ProtocolError::ChannelNotFound { multisig_address })
    }

    pub async fn get_app_instance(
        &self,
        multisig_address: Address,
        identity_hash: Bytes32,
    ) -> Result<AppInstanceJson, ProtocolError> {
        let channel = self.get_state_channel(multisig_address).await?;
        channel
            .app_instances
            .get(&identity_hash)
            .or_else(|| channel.proposed_app_instances.get(&identity_hash))
            .cloned()
            .ok_or(ProtocolError::Channel(ChannelError::AppNotFound {
                identity_hash,
            }))
    }

    /// Record an observed challenge; keeps the highest version under
    /// concurrent writers.
    pub async fn save_app_challenge(&self, challenge: AppChallenge) -> Result<bool, StoreError> {
        retry_transient(self.config.store_retries, || {
            let store = Arc::clone(&self.store);
            let challenge = challenge.clone();
            async move { store.save_app_challenge(&challenge).await }
        })
        .await
    }

    pub async fn get_app_challenge(
        &self,
        identity_hash: Bytes32,
    ) -> Result<Option<AppChallenge>, StoreError> {
        retry_transient(self.config.store_retries, || {
            let store = Arc::clone(&self.store);
            async move { store.get_app_challenge(identity_hash).await }
        })
        .await
    }

    async fn checked_out_channel(
        &self,
        multisig_address: Address,
    ) -> Result<sl_01_channel_model::StateChannel, ProtocolError> {
        let json = self.get_state_channel(multisig_address).await?;
        Ok(sl_01_channel_model::StateChannel::from_json(json)?)
    }
}

fn expect_channel(output: ProtocolOutput) -> Result<StateChannelJson, ProtocolRunError> {
    match output {
        ProtocolOutput::Channel(channel) => Ok(channel),
        ProtocolOutput::App(app) => unreachable!(
            "channel protocol returned app output for {}",
            app.identity_hash
        ),
    }
}

fn expect_app(output: ProtocolOutput) -> Result<AppInstanceJson, ProtocolRunError> {
    match output {
        ProtocolOutput::App(app) => Ok(app),
        ProtocolOutput::Channel(channel) => unreachable!(
            "app protocol returned channel output for {}",
            channel.multisig_address
        ),
    }
}

fn outcome_event(outcome: InboundOutcome) -> ChannelEvent {
    match outcome {
        InboundOutcome::SetupCompleted { multisig_address } => {
            ChannelEvent::SetupCompleted { multisig_address }
        }
        InboundOutcome::ProposeReceived {
            multisig_address,
            identity_hash,
        } => ChannelEvent::ProposeReceived {
            multisig_address,
            identity_hash,
        },
        InboundOutcome::InstallCompleted {
            multisig_address,
            identity_hash,
        } => ChannelEvent::InstallCompleted {
            multisig_address,
            identity_hash,
        },
        InboundOutcome::TakeActionCompleted {
            multisig_address,
            identity_hash,
            version_number,
        } => ChannelEvent::TakeActionCompleted {
            multisig_address,
            identity_hash,
            version_number,
        },
        InboundOutcome::UninstallCompleted {
            multisig_address,
            identity_hash,
        } => ChannelEvent::UninstallCompleted {
            multisig_address,
            identity_hash,
        },
        InboundOutcome::SyncProcessed {
            multisig_address, ..
        } => ChannelEvent::SyncReceived { multisig_address },
    }
}
