//! API request and response types.

use crate::pool::{PoolEntry, PoolStats};
use crate::session::DeliveryReceipt;
use proxy_store::{ProxySession, VirtualTn};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Request to add a number to the pool.
#[derive(Debug, Deserialize)]
pub struct AddNumberRequest {
    /// Phone number, normalized to E.164
    pub value: String,
}

/// Response after adding or removing a number.
#[derive(Debug, Serialize)]
pub struct NumberResponse {
    pub virtual_tn: VirtualTnInfo,
    pub message: String,
}

/// A pool number as returned by the API.
#[derive(Debug, Serialize)]
pub struct VirtualTnInfo {
    pub value: String,
    pub added_at: String,
    pub in_use: bool,
    pub session_id: Option<String>,
}

impl From<PoolEntry> for VirtualTnInfo {
    fn from(entry: PoolEntry) -> Self {
        Self {
            in_use: entry.in_use(),
            value: entry.number.value,
            added_at: entry.number.added_at.to_rfc3339(),
            session_id: entry.session_id,
        }
    }
}

impl From<VirtualTn> for VirtualTnInfo {
    /// For numbers just added or removed, which hold no live session.
    fn from(tn: VirtualTn) -> Self {
        PoolEntry {
            number: tn,
            session_id: None,
        }
        .into()
    }
}

/// Pool listing with counts.
#[derive(Debug, Serialize)]
pub struct PoolResponse {
    pub virtual_tns: Vec<VirtualTnInfo>,
    pub pool_size: usize,
    pub available: usize,
    pub in_use: usize,
}

impl PoolResponse {
    pub fn new(entries: Vec<PoolEntry>) -> Self {
        let pool_size = entries.len();
        let in_use = entries.iter().filter(|e| e.in_use()).count();

        Self {
            virtual_tns: entries.into_iter().map(VirtualTnInfo::from).collect(),
            pool_size,
            available: pool_size - in_use,
            in_use,
        }
    }
}

/// Pool counts.
pub type StatsResponse = PoolStats;

/// Request to create a proxy session.
#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    pub participant_a: String,
    pub participant_b: String,

    /// Session lifetime such as "30m" or "2h"; omitted means no expiry
    #[serde(default, with = "humantime_serde")]
    pub expiry_window: Option<Duration>,
}

/// A proxy session as returned by the API.
#[derive(Debug, Serialize)]
pub struct SessionInfo {
    pub id: String,
    pub virtual_tn: String,
    pub participant_a: String,
    pub participant_b: String,
    #[serde(with = "humantime_serde")]
    pub expiry_window: Option<Duration>,
    pub created_at: String,
    pub expires_at: Option<String>,
}

impl From<ProxySession> for SessionInfo {
    fn from(session: ProxySession) -> Self {
        Self {
            expires_at: session.expires_at().map(|t| t.to_rfc3339()),
            created_at: session.created_at.to_rfc3339(),
            id: session.id,
            virtual_tn: session.virtual_tn,
            participant_a: session.participant_a,
            participant_b: session.participant_b,
            expiry_window: session.expiry_window,
        }
    }
}

/// Response after creating or deleting a session.
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub session: SessionInfo,
    pub message: String,
}

/// List of live sessions.
#[derive(Debug, Serialize)]
pub struct SessionsResponse {
    pub sessions: Vec<SessionInfo>,
    pub total: usize,
}

/// Inbound message reported by the carrier.
#[derive(Debug, Deserialize)]
pub struct InboundMessageRequest {
    pub from: String,
    pub to: String,
    #[serde(default)]
    pub body: String,
}

/// Response after relaying an inbound message.
pub type InboundMessageResponse = DeliveryReceipt;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub store_healthy: bool,
    pub pool_size: usize,
    pub carrier_healthy: bool,
}
