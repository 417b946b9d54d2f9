//! In-memory store for tests and single-instance development.

use crate::error::StoreError;
use crate::store::ProxyStore;
use crate::types::{BindOutcome, PoolSnapshot, ProxySession, TnBinding, VirtualTn};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

#[derive(Debug, Default)]
struct MemoryState {
    numbers: HashMap<String, VirtualTn>,
    sessions: HashMap<String, ProxySession>,
}

impl MemoryState {
    /// Session id of a live holder of `value`, if any.
    fn live_holder(&self, value: &str, now: DateTime<Utc>) -> Option<String> {
        let session_id = self.numbers.get(value)?.session_id()?;
        self.sessions
            .get(session_id)
            .filter(|s| s.is_live_at(now))
            .map(|s| s.id.clone())
    }
}

/// In-memory proxy store.
///
/// Each operation runs under one write lock, which makes it a transaction
/// for every clone of the store in this process. Nothing survives a restart.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<RwLock<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProxyStore for MemoryStore {
    #[instrument(skip(self))]
    async fn insert_number(&self, value: &str) -> Result<VirtualTn, StoreError> {
        let mut state = self.state.write().await;
        if state.numbers.contains_key(value) {
            return Err(StoreError::DuplicateNumber(value.to_string()));
        }

        let tn = VirtualTn::new(value);
        state.numbers.insert(value.to_string(), tn.clone());
        Ok(tn)
    }

    #[instrument(skip(self))]
    async fn delete_number(
        &self,
        value: &str,
        now: DateTime<Utc>,
    ) -> Result<VirtualTn, StoreError> {
        let mut state = self.state.write().await;
        if let Some(session_id) = state.live_holder(value, now) {
            return Err(StoreError::NumberInUse {
                number: value.to_string(),
                session_id,
            });
        }

        let tn = state
            .numbers
            .remove(value)
            .ok_or_else(|| StoreError::NumberNotFound(value.to_string()))?;

        if let Some(stale) = tn.session_id() {
            if state.sessions.remove(stale).is_some() {
                debug!(session_id = %stale, "Dropped expired session with its number");
            }
        }

        Ok(tn)
    }

    async fn snapshot(&self) -> Result<PoolSnapshot, StoreError> {
        let state = self.state.read().await;
        let mut numbers: Vec<VirtualTn> = state.numbers.values().cloned().collect();
        let mut sessions: Vec<ProxySession> = state.sessions.values().cloned().collect();
        numbers.sort_by(|a, b| a.value.cmp(&b.value));
        sessions.sort_by(|a, b| a.created_at.cmp(&b.created_at));

        Ok(PoolSnapshot { numbers, sessions })
    }

    async fn session(&self, id: &str) -> Result<Option<ProxySession>, StoreError> {
        Ok(self.state.read().await.sessions.get(id).cloned())
    }

    async fn session_for_number(
        &self,
        virtual_tn: &str,
    ) -> Result<Option<ProxySession>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .numbers
            .get(virtual_tn)
            .and_then(|tn| tn.session_id())
            .and_then(|id| state.sessions.get(id))
            .cloned())
    }

    #[instrument(skip(self, session), fields(session_id = %session.id, virtual_tn = %session.virtual_tn))]
    async fn bind_number(
        &self,
        session: &ProxySession,
        now: DateTime<Utc>,
    ) -> Result<BindOutcome, StoreError> {
        let mut state = self.state.write().await;
        if state.live_holder(&session.virtual_tn, now).is_some() {
            return Ok(BindOutcome::Taken);
        }

        let Some(tn) = state.numbers.get_mut(&session.virtual_tn) else {
            return Ok(BindOutcome::Taken);
        };

        let previous = std::mem::replace(&mut tn.binding, TnBinding::BoundTo(session.id.clone()));
        let reclaimed = previous
            .session_id()
            .and_then(|stale| state.sessions.remove(stale))
            .map(|stale| stale.id);

        state.sessions.insert(session.id.clone(), session.clone());
        Ok(BindOutcome::Bound { reclaimed })
    }

    #[instrument(skip(self))]
    async fn release_session(&self, id: &str) -> Result<Option<ProxySession>, StoreError> {
        let mut state = self.state.write().await;
        let Some(session) = state.sessions.remove(id) else {
            return Ok(None);
        };

        if let Some(tn) = state.numbers.get_mut(&session.virtual_tn) {
            if tn.session_id() == Some(id) {
                tn.binding = TnBinding::Unbound;
            }
        }

        Ok(Some(session))
    }

    async fn health_check(&self) -> bool {
        true
    }
}
