//! The virtual number pool.

use crate::error::ProxyError;
use chrono::{DateTime, Utc};
use proxy_store::{normalize_phone_number, PoolSnapshot, ProxyStore, VirtualTn};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument};

/// Pool counts taken from one store snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    pub total: usize,
    pub available: usize,
    pub in_use: usize,
}

/// A pool number together with the live session holding it, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolEntry {
    pub number: VirtualTn,
    pub session_id: Option<String>,
}

impl PoolEntry {
    pub fn in_use(&self) -> bool {
        self.session_id.is_some()
    }
}

/// Administrative access to the set of virtual numbers.
///
/// Holds no state of its own; every call is answered from the store.
#[derive(Clone)]
pub struct TnPool {
    store: Arc<dyn ProxyStore>,
}

impl TnPool {
    pub fn new(store: Arc<dyn ProxyStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn ProxyStore> {
        &self.store
    }

    /// Add a number to the pool, unbound.
    #[instrument(skip(self))]
    pub async fn add(&self, number: &str) -> Result<VirtualTn, ProxyError> {
        let number = normalize_phone_number(number).map_err(ProxyError::InvalidPhoneNumber)?;
        let tn = self.store.insert_number(&number).await?;
        info!(virtual_tn = %tn.value, "Added number to pool");
        Ok(tn)
    }

    /// Remove a number that is not in use.
    #[instrument(skip(self))]
    pub async fn remove(&self, number: &str) -> Result<VirtualTn, ProxyError> {
        let number = normalize_phone_number(number).map_err(ProxyError::InvalidPhoneNumber)?;
        let tn = self.store.delete_number(&number, Utc::now()).await?;
        info!(virtual_tn = %tn.value, "Removed number from pool");
        Ok(tn)
    }

    /// Every number in the pool, ordered by value.
    pub async fn list(&self) -> Result<Vec<PoolEntry>, ProxyError> {
        self.list_at(Utc::now()).await
    }

    pub async fn list_at(&self, now: DateTime<Utc>) -> Result<Vec<PoolEntry>, ProxyError> {
        let snapshot = self.store.snapshot().await?;
        let mut entries: Vec<PoolEntry> = snapshot
            .numbers
            .iter()
            .map(|tn| PoolEntry {
                number: tn.clone(),
                session_id: snapshot.live_session_for(tn, now).map(|s| s.id.clone()),
            })
            .collect();
        entries.sort_by(|a, b| a.number.value.cmp(&b.number.value));
        Ok(entries)
    }

    /// Numbers with no live session.
    pub async fn list_available(&self) -> Result<Vec<VirtualTn>, ProxyError> {
        self.available_at(Utc::now()).await
    }

    pub async fn available_at(&self, now: DateTime<Utc>) -> Result<Vec<VirtualTn>, ProxyError> {
        let snapshot = self.store.snapshot().await?;
        Ok(available_in(&snapshot, now))
    }

    /// Total, available and in-use counts.
    pub async fn stats(&self) -> Result<PoolStats, ProxyError> {
        self.stats_at(Utc::now()).await
    }

    pub async fn stats_at(&self, now: DateTime<Utc>) -> Result<PoolStats, ProxyError> {
        let snapshot = self.store.snapshot().await?;
        let total = snapshot.numbers.len();
        let available = available_in(&snapshot, now).len();

        Ok(PoolStats {
            total,
            available,
            in_use: total - available,
        })
    }
}

fn available_in(snapshot: &PoolSnapshot, now: DateTime<Utc>) -> Vec<VirtualTn> {
    let mut available: Vec<VirtualTn> = snapshot
        .numbers
        .iter()
        .filter(|tn| snapshot.live_session_for(tn, now).is_none())
        .cloned()
        .collect();
    available.sort_by(|a, b| a.value.cmp(&b.value));
    available
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;
    use proxy_store::{BindOutcome, MemoryStore, ProxySession};
    use std::time::Duration;

    fn create_test_pool() -> TnPool {
        TnPool::new(Arc::new(MemoryStore::new()))
    }

    async fn bind(pool: &TnPool, tn: &str, window: Option<Duration>) -> ProxySession {
        let session = ProxySession::new(tn, "+13334445555", "+14445556666", window, Utc::now());
        let outcome = pool.store().bind_number(&session, Utc::now()).await.unwrap();
        assert!(matches!(outcome, BindOutcome::Bound { .. }));
        session
    }

    #[tokio::test]
    async fn test_add_normalizes_number() {
        let pool = create_test_pool();
        let tn = pool.add("555-1234").await;
        assert!(matches!(tn, Err(ProxyError::InvalidPhoneNumber(_))));

        let tn = pool.add("+1 (222) 333-4444").await.unwrap();
        assert_eq!(tn.value, "+12223334444");
    }

    #[tokio::test]
    async fn test_add_duplicate() {
        let pool = create_test_pool();
        pool.add("+12223334444").await.unwrap();

        let result = pool.add("12223334444").await;
        assert!(matches!(result, Err(ProxyError::DuplicateNumber(n)) if n == "+12223334444"));
        assert_eq!(pool.stats().await.unwrap().total, 1);
    }

    #[tokio::test]
    async fn test_add_duplicate_of_bound_number() {
        let pool = create_test_pool();
        pool.add("+12223334444").await.unwrap();
        bind(&pool, "+12223334444", None).await;

        let result = pool.add("+12223334444").await;
        assert!(matches!(result, Err(ProxyError::DuplicateNumber(_))));
    }

    #[tokio::test]
    async fn test_remove_missing_number() {
        let pool = create_test_pool();
        let result = pool.remove("+12223334444").await;
        assert!(matches!(
            result,
            Err(ProxyError::NotFound { entity: "Number", .. })
        ));
    }

    #[tokio::test]
    async fn test_remove_in_use_number_leaves_state_unchanged() {
        let pool = create_test_pool();
        pool.add("+12223334444").await.unwrap();
        let session = bind(&pool, "+12223334444", None).await;
        let before = pool.stats().await.unwrap();

        let result = pool.remove("+12223334444").await;
        match result {
            Err(ProxyError::NumberInUse { number, session_id }) => {
                assert_eq!(number, "+12223334444");
                assert_eq!(session_id, session.id);
            }
            other => panic!("expected NumberInUse, got {:?}", other),
        }

        assert_eq!(pool.stats().await.unwrap(), before);
        assert!(pool.store().session(&session.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_remove_available_number() {
        let pool = create_test_pool();
        pool.add("+12223334444").await.unwrap();
        pool.add("+12223335555").await.unwrap();

        let removed = pool.remove("+12223334444").await.unwrap();
        assert_eq!(removed.value, "+12223334444");

        let available = pool.list_available().await.unwrap();
        assert_eq!(available.len(), 1);
        assert_eq!(available[0].value, "+12223335555");
    }

    #[tokio::test]
    async fn test_stats_and_listing() {
        let pool = create_test_pool();
        assert_eq!(
            pool.stats().await.unwrap(),
            PoolStats {
                total: 0,
                available: 0,
                in_use: 0
            }
        );

        pool.add("+12223336666").await.unwrap();
        pool.add("+12223334444").await.unwrap();
        pool.add("+12223335555").await.unwrap();
        let session = bind(&pool, "+12223335555", None).await;

        let stats = pool.stats().await.unwrap();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.available, 2);
        assert_eq!(stats.in_use, 1);

        let entries = pool.list().await.unwrap();
        let values: Vec<&str> = entries.iter().map(|e| e.number.value.as_str()).collect();
        assert_eq!(values, vec!["+12223334444", "+12223335555", "+12223336666"]);
        assert!(!entries[0].in_use());
        assert_eq!(entries[1].session_id.as_deref(), Some(session.id.as_str()));
    }

    #[tokio::test]
    async fn test_expired_binding_counts_as_available() {
        let pool = create_test_pool();
        pool.add("+12223334444").await.unwrap();
        let session = bind(&pool, "+12223334444", Some(Duration::from_secs(60))).await;

        let before_expiry = session.created_at + TimeDelta::seconds(59);
        let after_expiry = session.created_at + TimeDelta::seconds(60);

        assert_eq!(pool.stats_at(before_expiry).await.unwrap().in_use, 1);
        assert!(pool.available_at(before_expiry).await.unwrap().is_empty());

        let stats = pool.stats_at(after_expiry).await.unwrap();
        assert_eq!(stats.available, 1);
        assert_eq!(stats.in_use, 0);
        assert_eq!(pool.available_at(after_expiry).await.unwrap().len(), 1);
    }
}
