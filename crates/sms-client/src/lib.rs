//! Outbound SMS carrier client.

mod client;
mod error;
mod sender;
mod types;

pub use client::SmsClient;
pub use error::SmsError;
pub use sender::MessageSender;
pub use types::*;
