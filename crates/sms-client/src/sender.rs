//! The outbound messaging capability.

use crate::error::SmsError;
use async_trait::async_trait;

/// Sends a text message from one of our virtual numbers.
#[async_trait]
pub trait MessageSender: Send + Sync {
    /// Deliver `body` to `to`, appearing to come from `from`.
    async fn send(&self, from: &str, to: &str, body: &str) -> Result<(), SmsError>;

    /// Whether the carrier is reachable.
    async fn health_check(&self) -> bool {
        true
    }
}
