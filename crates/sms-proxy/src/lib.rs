//! SMS Proxy - relays text messages between two participants through a
//! virtual number so neither learns the other's real number.
//!
//! The service:
//! - Keeps a pool of virtual numbers and tracks which are in use
//! - Binds a free number to each new two-party session, atomically in the store
//! - Forwards messages arriving on a virtual number to the other participant
//! - Returns numbers to the pool when sessions are deleted or expire

pub mod api;
pub mod config;
pub mod error;
pub mod pool;
pub mod session;
pub mod sweeper;

pub use config::Config;
pub use error::ProxyError;
pub use pool::{PoolEntry, PoolStats, TnPool};
pub use session::{DeliveryReceipt, SessionManager, SessionNotices};
pub use sweeper::{spawn_sweeper, ExpirySweeper};
