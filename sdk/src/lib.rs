pub mod addresses;
pub mod auction_subscriber;
pub mod constants;
pub mod drift;
pub mod drift_client;
pub mod drift_client_config;
pub mod event_emitter;
pub mod market_map;
pub mod math;
pub mod oracle_map;
pub mod slot_subscriber;
pub mod types;
pub mod user;
pub mod utils;
pub mod wallet;

pub use drift_client::{AccountProvider, DriftClient, RpcAccountProvider};
pub use event_emitter::{Event, EventEmitter};
pub use types::{SdkError, SdkResult};
pub use wallet::Wallet;
