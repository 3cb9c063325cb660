pub mod app_instance;
pub mod errors;
pub mod free_balance;
pub mod state_channel;

pub use app_instance::{app_identity_hash, hash_of_state, AppInstance, AppInstanceSeed};
pub use errors::ChannelError;
pub use free_balance::{FreeBalance, FreeBalanceStateJson, FREE_BALANCE_STATE_ENCODING};
pub use state_channel::{
    StateChannel, CHANNEL_SCHEMA_VERSION, FREE_BALANCE_APP_SEQ_NO, FREE_BALANCE_DEFAULT_TIMEOUT,
};
