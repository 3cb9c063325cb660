pub mod app_registry;
pub mod chain;
pub mod locking;
pub mod messaging;
pub mod signer;
pub mod store;

pub use app_registry::{AppLogic, AppLogicError, AppRegistry, AppRegistryInfo};
pub use chain::{ChainError, ChainProvider};
pub use locking::{acquire_all, LockError, LockService, LockToken};
pub use messaging::{MessagingError, MessagingService};
pub use signer::{ChannelSigner, SignerError};
pub use store::{StateChannelStore, StoreError};
