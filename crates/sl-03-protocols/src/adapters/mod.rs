pub mod bus_messaging;
pub mod coin_transfer_logic;
pub mod local_signer;
pub mod memory_lock;
pub mod memory_store;
pub mod static_registry;

pub use bus_messaging::BusMessagingService;
pub use coin_transfer_logic::CoinTransferAppLogic;
pub use local_signer::LocalChannelSigner;
pub use memory_lock::InMemoryLockService;
pub use memory_store::InMemoryStateChannelStore;
pub use static_registry::{StaticAppRegistry, StaticChainProvider};
