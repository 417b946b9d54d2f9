//! The transactional store seam shared by every backend.

use crate::error::StoreError;
use crate::types::{BindOutcome, PoolSnapshot, ProxySession, VirtualTn};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Persistence for virtual numbers and proxy sessions.
///
/// Every method is one transaction. Callers never hold state between calls,
/// so several service instances may share one backing store.
#[async_trait]
pub trait ProxyStore: Send + Sync {
    /// Insert an unbound number. Fails with `DuplicateNumber` if present.
    async fn insert_number(&self, value: &str) -> Result<VirtualTn, StoreError>;

    /// Delete a number.
    ///
    /// Fails with `NumberInUse` while the number is bound to a session live at
    /// `now`, and with `NumberNotFound` if it is absent. An expired session
    /// still holding the number is deleted along with it.
    async fn delete_number(&self, value: &str, now: DateTime<Utc>)
        -> Result<VirtualTn, StoreError>;

    /// Read all numbers and sessions consistently.
    async fn snapshot(&self) -> Result<PoolSnapshot, StoreError>;

    /// Fetch a session record by id, expired or not.
    async fn session(&self, id: &str) -> Result<Option<ProxySession>, StoreError>;

    /// Fetch the session record referencing `virtual_tn`, expired or not.
    async fn session_for_number(&self, virtual_tn: &str)
        -> Result<Option<ProxySession>, StoreError>;

    /// Atomically bind `session.virtual_tn` to `session` and insert it.
    ///
    /// Succeeds only if the number exists and holds no session live at
    /// `now`. Returns `Taken` otherwise, leaving everything untouched.
    async fn bind_number(
        &self,
        session: &ProxySession,
        now: DateTime<Utc>,
    ) -> Result<BindOutcome, StoreError>;

    /// Atomically delete a session and unbind its number.
    ///
    /// Returns `None` if the session no longer exists.
    async fn release_session(&self, id: &str) -> Result<Option<ProxySession>, StoreError>;

    /// Whether the backend is reachable.
    async fn health_check(&self) -> bool;
}
