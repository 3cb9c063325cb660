//! # Protocol Runner
//!
//! Drives protocol execution behind the per-channel named-lock
//! discipline. Dispatch is an explicit mapping from protocol name to
//! handler with typed parameters and results per entry — built once at
//! compile time, no reflection.
//!
//! Locking: every execution (initiating or responding) first acquires the
//! exclusive lock named after the multisig address on this node's lock
//! service, reads committed state only after acquisition, and releases
//! only after the new state (or the failure) is settled. Two protocols
//! touching the same channel never interleave on one node.

use std::sync::Arc;
use std::time::Duration;

use shared_types::{
    Address, AppInstanceJson, Bytes32, ProtocolMessage, ProtocolName, ProtocolParams,
    StateChannelJson,
};
use tracing::debug;

use crate::ports::{LockService, LockToken};

use super::common::message_identity_hash;
use super::context::ProtocolContext;
use super::errors::{ProtocolError, ProtocolRunError};
use super::sync::SyncResponse;
use super::{install, propose, setup, sync, take_action, uninstall};

/// Lock name for a channel's multisig address.
#[must_use]
pub fn channel_lock_name(multisig_address: Address) -> String {
    format!("channel/{multisig_address}")
}

/// Typed result of an initiated protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolOutput {
    Channel(StateChannelJson),
    App(AppInstanceJson),
}

/// What handling an inbound round produced, for event emission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundOutcome {
    SetupCompleted {
        multisig_address: Address,
    },
    ProposeReceived {
        multisig_address: Address,
        identity_hash: Bytes32,
    },
    InstallCompleted {
        multisig_address: Address,
        identity_hash: Bytes32,
    },
    TakeActionCompleted {
        multisig_address: Address,
        identity_hash: Bytes32,
        version_number: u64,
    },
    UninstallCompleted {
        multisig_address: Address,
        identity_hash: Bytes32,
    },
    SyncProcessed {
        multisig_address: Address,
        adopted: bool,
    },
}

/// Runs protocols under this node's lock service.
#[derive(Clone)]
pub struct ProtocolRunner {
    ctx: ProtocolContext,
    locks: Arc<dyn LockService>,
    lock_timeout: Duration,
}

impl ProtocolRunner {
    #[must_use]
    pub fn new(ctx: ProtocolContext, locks: Arc<dyn LockService>, lock_timeout: Duration) -> Self {
        Self {
            ctx,
            locks,
            lock_timeout,
        }
    }

    #[must_use]
    pub fn context(&self) -> &ProtocolContext {
        &self.ctx
    }

    async fn with_channel_lock<T, F>(
        &self,
        multisig_address: Address,
        run: F,
    ) -> Result<T, ProtocolError>
    where
        F: std::future::Future<Output = Result<T, ProtocolError>>,
    {
        let token: LockToken = self
            .locks
            .acquire(&channel_lock_name(multisig_address), self.lock_timeout)
            .await?;
        debug!(%multisig_address, "Channel lock acquired");
        let result = run.await;
        // The failure path releases too; abort leaves committed state
        // untouched, so the next holder sees a consistent aggregate.
        let _ = self.locks.release(token).await;
        debug!(%multisig_address, "Channel lock released");
        result
    }

    /// Cheap checks that must reject before the lock is taken or any
    /// message is sent.
    fn pre_lock_validate(&self, params: &ProtocolParams) -> Result<(), ProtocolError> {
        if let ProtocolParams::Propose(p) = params {
            let registry_info = self.ctx.app_registry.get_app_info(p.app_definition).ok_or(
                ProtocolError::AppRegistryMismatch {
                    app_definition: p.app_definition,
                    detail: "app definition not present in registry".into(),
                },
            )?;
            super::validation::common_app_proposal_validation(
                p,
                &registry_info,
                &self.ctx.app_registry.supported_token_addresses(),
            )?;
        }
        Ok(())
    }

    /// Initiate a protocol. One entry per protocol; parameter and result
    /// types are checked per entry at compile time.
    pub async fn initiate(
        &self,
        params: ProtocolParams,
    ) -> Result<ProtocolOutput, ProtocolRunError> {
        let protocol = params.protocol();
        let multisig_address = params.multisig_address();
        let identity_hash = match &params {
            ProtocolParams::Install(p) => Some(p.identity_hash),
            ProtocolParams::TakeAction(p) => Some(p.identity_hash),
            ProtocolParams::Uninstall(p) => Some(p.identity_hash),
            _ => None,
        };
        let wrap = |source: ProtocolError| {
            ProtocolRunError::new(protocol, multisig_address, identity_hash, source)
        };

        self.pre_lock_validate(&params).map_err(wrap)?;

        let result = self
            .with_channel_lock(multisig_address, async {
                match params {
                    ProtocolParams::Setup(p) => {
                        setup::initiate(&self.ctx, p).await.map(ProtocolOutput::Channel)
                    }
                    ProtocolParams::Propose(p) => {
                        propose::initiate(&self.ctx, p).await.map(ProtocolOutput::App)
                    }
                    ProtocolParams::Install(p) => {
                        install::initiate(&self.ctx, p).await.map(ProtocolOutput::App)
                    }
                    ProtocolParams::TakeAction(p) => {
                        take_action::initiate(&self.ctx, p).await.map(ProtocolOutput::App)
                    }
                    ProtocolParams::Uninstall(p) => {
                        uninstall::initiate(&self.ctx, p).await.map(ProtocolOutput::Channel)
                    }
                    ProtocolParams::Sync(p) => {
                        sync::initiate(&self.ctx, p).await.map(ProtocolOutput::Channel)
                    }
                }
            })
            .await;

        result.map_err(wrap)
    }

    /// Handle an inbound protocol message. Returns `None` for response
    /// rounds (`seq > 1`), which are consumed by the waiting initiator.
    pub async fn handle_message(
        &self,
        message: ProtocolMessage,
    ) -> Result<Option<InboundOutcome>, ProtocolRunError> {
        if message.seq != 1 {
            return Ok(None);
        }
        let protocol = message.protocol();
        let multisig_address = message.multisig_address();
        let identity_hash = message_identity_hash(&message);
        let wrap = |source: ProtocolError| {
            ProtocolRunError::new(protocol, multisig_address, identity_hash, source)
        };

        let outcome = self
            .with_channel_lock(multisig_address, async {
                match protocol {
                    ProtocolName::Setup => {
                        let channel = setup::respond(&self.ctx, message).await?;
                        Ok(InboundOutcome::SetupCompleted {
                            multisig_address: channel.multisig_address,
                        })
                    }
                    ProtocolName::Propose => {
                        let proposal = propose::respond(&self.ctx, message).await?;
                        Ok(InboundOutcome::ProposeReceived {
                            multisig_address: proposal.multisig_address,
                            identity_hash: proposal.identity_hash,
                        })
                    }
                    ProtocolName::Install => {
                        let app = install::respond(&self.ctx, message).await?;
                        Ok(InboundOutcome::InstallCompleted {
                            multisig_address: app.multisig_address,
                            identity_hash: app.identity_hash,
                        })
                    }
                    ProtocolName::TakeAction => {
                        let app = take_action::respond(&self.ctx, message).await?;
                        Ok(InboundOutcome::TakeActionCompleted {
                            multisig_address: app.multisig_address,
                            identity_hash: app.identity_hash,
                            version_number: app.latest_version_number,
                        })
                    }
                    ProtocolName::Uninstall => {
                        let identity_hash =
                            identity_hash.unwrap_or_default();
                        let channel = uninstall::respond(&self.ctx, message).await?;
                        Ok(InboundOutcome::UninstallCompleted {
                            multisig_address: channel.multisig_address,
                            identity_hash,
                        })
                    }
                    ProtocolName::Sync => {
                        let response = sync::respond(&self.ctx, message).await?;
                        let (channel, adopted) = match response {
                            SyncResponse::Adopted(c) => (c, true),
                            SyncResponse::OfferedOurs(c) | SyncResponse::AlreadyInSync(c) => {
                                (c, false)
                            }
                        };
                        Ok(InboundOutcome::SyncProcessed {
                            multisig_address: channel.multisig_address,
                            adopted,
                        })
                    }
                }
            })
            .await;

        outcome.map(Some).map_err(wrap)
    }
}
