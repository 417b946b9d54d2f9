//! Proxy session lifecycle and inbound routing.
//!
//! The manager is stateless: numbers are allocated with the store's atomic
//! `bind_number`, released with `release_session`, and every read filters
//! sessions through [`ProxySession::is_live_at`]. Lazy expiry on access and
//! the background sweep therefore always agree on what is live.

use crate::error::ProxyError;
use crate::pool::TnPool;
use chrono::{DateTime, Utc};
use proxy_store::{normalize_phone_number, BindOutcome, Leg, ProxySession, ProxyStore};
use rand::seq::SliceRandom;
use serde::Serialize;
use sms_client::MessageSender;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Optional texts sent to both participants when a session starts or ends.
#[derive(Debug, Clone, Default)]
pub struct SessionNotices {
    pub start: Option<String>,
    pub end: Option<String>,
}

/// Result of relaying an inbound message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeliveryReceipt {
    pub session_id: String,
    /// The virtual number the message was sent from
    pub from_virtual_tn: String,
    /// The leg that received the message
    pub delivered_to: Leg,
}

/// Allocates virtual numbers to sessions and relays messages within them.
pub struct SessionManager {
    store: Arc<dyn ProxyStore>,
    pool: TnPool,
    sender: Arc<dyn MessageSender>,
    notices: SessionNotices,
}

impl SessionManager {
    pub fn new(store: Arc<dyn ProxyStore>, sender: Arc<dyn MessageSender>) -> Self {
        Self {
            pool: TnPool::new(store.clone()),
            store,
            sender,
            notices: SessionNotices::default(),
        }
    }

    pub fn with_notices(mut self, notices: SessionNotices) -> Self {
        self.notices = notices;
        self
    }

    pub fn pool(&self) -> &TnPool {
        &self.pool
    }

    /// Create a session between two participants on any available number.
    pub async fn create_session(
        &self,
        participant_a: &str,
        participant_b: &str,
        expiry_window: Option<Duration>,
    ) -> Result<ProxySession, ProxyError> {
        self.create_session_at(participant_a, participant_b, expiry_window, Utc::now())
            .await
    }

    #[instrument(skip(self, participant_a, participant_b))]
    pub async fn create_session_at(
        &self,
        participant_a: &str,
        participant_b: &str,
        expiry_window: Option<Duration>,
        now: DateTime<Utc>,
    ) -> Result<ProxySession, ProxyError> {
        let participant_a =
            normalize_phone_number(participant_a).map_err(ProxyError::InvalidPhoneNumber)?;
        let participant_b =
            normalize_phone_number(participant_b).map_err(ProxyError::InvalidPhoneNumber)?;
        if participant_a == participant_b {
            return Err(ProxyError::InvalidRequest(
                "participants must be different numbers".to_string(),
            ));
        }

        let mut candidates = self.pool.available_at(now).await?;
        if candidates.is_empty() {
            warn!("No virtual numbers available for new session");
            return Err(ProxyError::NoAvailableNumbers);
        }
        candidates.shuffle(&mut rand::thread_rng());

        for tn in candidates {
            let session = ProxySession::new(
                &tn.value,
                &participant_a,
                &participant_b,
                expiry_window,
                now,
            );

            match self.store.bind_number(&session, now).await? {
                BindOutcome::Bound { reclaimed } => {
                    if let Some(stale) = reclaimed {
                        debug!(session_id = %stale, virtual_tn = %tn.value, "Reclaimed expired session");
                    }
                    info!(
                        session_id = %session.id,
                        virtual_tn = %session.virtual_tn,
                        "Created session"
                    );
                    self.notify(&session, self.notices.start.as_deref()).await;
                    return Ok(session);
                }
                BindOutcome::Taken => {
                    debug!(virtual_tn = %tn.value, "Number taken concurrently, trying next");
                }
            }
        }

        warn!("Every candidate number was taken concurrently");
        Err(ProxyError::NoAvailableNumbers)
    }

    /// Delete a session and return its number to the pool.
    pub async fn delete_session(&self, id: &str) -> Result<ProxySession, ProxyError> {
        self.delete_session_at(id, Utc::now()).await
    }

    /// An already-expired session is reclaimed but reported as not found.
    #[instrument(skip(self))]
    pub async fn delete_session_at(
        &self,
        id: &str,
        now: DateTime<Utc>,
    ) -> Result<ProxySession, ProxyError> {
        let Some(session) = self.store.release_session(id).await? else {
            return Err(ProxyError::session_not_found(id));
        };

        if !session.is_live_at(now) {
            debug!(session_id = %id, virtual_tn = %session.virtual_tn, "Reclaimed expired session");
            return Err(ProxyError::session_not_found(id));
        }

        info!(session_id = %id, virtual_tn = %session.virtual_tn, "Deleted session");
        self.notify(&session, self.notices.end.as_deref()).await;
        Ok(session)
    }

    /// Release every session expired at `now`.
    ///
    /// Sessions released concurrently by another caller are skipped, so each
    /// expired session is reported by exactly one sweep.
    #[instrument(skip(self))]
    pub async fn expire_sweep(&self, now: DateTime<Utc>) -> Result<Vec<ProxySession>, ProxyError> {
        let snapshot = self.store.snapshot().await?;
        let mut released = Vec::new();

        for expired in snapshot.sessions.iter().filter(|s| s.is_expired_at(now)) {
            match self.store.release_session(&expired.id).await? {
                Some(session) => {
                    info!(
                        session_id = %session.id,
                        virtual_tn = %session.virtual_tn,
                        "Expired session"
                    );
                    released.push(session);
                }
                None => debug!(session_id = %expired.id, "Session already released"),
            }
        }

        for session in &released {
            self.notify(session, self.notices.end.as_deref()).await;
        }

        Ok(released)
    }

    /// Relay a message received on a virtual number to the other participant.
    pub async fn route_inbound(
        &self,
        from: &str,
        to: &str,
        body: &str,
    ) -> Result<DeliveryReceipt, ProxyError> {
        self.route_inbound_at(from, to, body, Utc::now()).await
    }

    #[instrument(skip(self, from, body))]
    pub async fn route_inbound_at(
        &self,
        from: &str,
        to: &str,
        body: &str,
        now: DateTime<Utc>,
    ) -> Result<DeliveryReceipt, ProxyError> {
        // A number that does not normalize can be neither a pool number nor a leg.
        let Ok(to) = normalize_phone_number(to) else {
            return Err(ProxyError::NoActiveSession(to.to_string()));
        };

        let session = self
            .store
            .session_for_number(&to)
            .await?
            .filter(|s| s.is_live_at(now))
            .ok_or_else(|| ProxyError::NoActiveSession(to.clone()))?;

        let from = normalize_phone_number(from).unwrap_or_else(|_| from.to_string());
        let Some(leg) = session.leg_of(&from) else {
            warn!(virtual_tn = %to, "Inbound message from non-participant");
            return Err(ProxyError::UnknownParticipant {
                number: from,
                virtual_tn: to,
            });
        };

        let delivered_to = leg.other();
        let recipient = session.participant(delivered_to);

        if let Err(e) = self.sender.send(&session.virtual_tn, recipient, body).await {
            warn!(session_id = %session.id, error = %e, "Failed to relay message");
            return Err(e.into());
        }

        debug!(%from, to = %recipient, "Relayed between participants");
        info!(
            session_id = %session.id,
            virtual_tn = %session.virtual_tn,
            leg = ?delivered_to,
            "Relayed message"
        );

        Ok(DeliveryReceipt {
            session_id: session.id,
            from_virtual_tn: session.virtual_tn,
            delivered_to,
        })
    }

    /// A live session by id.
    pub async fn get_session(&self, id: &str) -> Result<ProxySession, ProxyError> {
        self.get_session_at(id, Utc::now()).await
    }

    pub async fn get_session_at(
        &self,
        id: &str,
        now: DateTime<Utc>,
    ) -> Result<ProxySession, ProxyError> {
        self.store
            .session(id)
            .await?
            .filter(|s| s.is_live_at(now))
            .ok_or_else(|| ProxyError::session_not_found(id))
    }

    /// All live sessions, oldest first.
    pub async fn list_sessions(&self) -> Result<Vec<ProxySession>, ProxyError> {
        self.list_sessions_at(Utc::now()).await
    }

    pub async fn list_sessions_at(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<ProxySession>, ProxyError> {
        let snapshot = self.store.snapshot().await?;
        let mut sessions: Vec<ProxySession> = snapshot
            .sessions
            .into_iter()
            .filter(|s| s.is_live_at(now))
            .collect();
        sessions.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(sessions)
    }

    pub async fn store_healthy(&self) -> bool {
        self.store.health_check().await
    }

    pub async fn carrier_healthy(&self) -> bool {
        self.sender.health_check().await
    }

    async fn notify(&self, session: &ProxySession, notice: Option<&str>) {
        let Some(text) = notice else {
            return;
        };

        for leg in [Leg::A, Leg::B] {
            let to = session.participant(leg);
            if let Err(e) = self.sender.send(&session.virtual_tn, to, text).await {
                warn!(session_id = %session.id, leg = ?leg, error = %e, "Failed to send session notice");
            }
        }
    }
}
