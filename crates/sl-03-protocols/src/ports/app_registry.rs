//! # App Registry and App Logic Ports
//!
//! The registry resolves an app definition to its declared encodings and
//! outcome type for propose-time validation. App logic is the app's own
//! pure transition and outcome functions; the engine never reimplements
//! them, it only enforces version monotonicity around them.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use shared_types::{Address, OutcomeType, TokenIndexedBalances};
use sl_01_channel_model::AppInstance;

/// Registry entry for one supported app definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppRegistryInfo {
    pub name: String,
    pub app_definition_address: Address,
    pub state_encoding: String,
    pub action_encoding: Option<String>,
    pub outcome_type: OutcomeType,
}

/// Resolves app definitions for propose-time validation.
pub trait AppRegistry: Send + Sync {
    /// Registry entry for an app definition, if supported.
    fn get_app_info(&self, app_definition: Address) -> Option<AppRegistryInfo>;

    /// Token addresses this node accepts deposits in.
    fn supported_token_addresses(&self) -> Vec<Address>;
}

/// Errors from app transition/outcome evaluation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AppLogicError {
    #[error("Action not applicable: {0}")]
    InvalidAction(String),

    #[error("Malformed app state: {0}")]
    MalformedState(String),

    #[error("No outcome computable: {0}")]
    NoOutcome(String),
}

/// The app's own pure functions, consumed as an external collaborator.
#[async_trait]
pub trait AppLogic: Send + Sync {
    /// Apply an action to the app's latest state, producing the next
    /// state document. Both parties must compute identical results.
    async fn apply_action(
        &self,
        app: &AppInstance,
        action: &Value,
    ) -> Result<Value, AppLogicError>;

    /// Resolve the app's final state to the free-balance credits its
    /// uninstall pays out: `{token: {owner: amount}}`.
    async fn compute_outcome(
        &self,
        app: &AppInstance,
    ) -> Result<TokenIndexedBalances, AppLogicError>;
}
