//! Virtual TN and proxy session records.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// Binding between a virtual number and a proxy session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "session_id", rename_all = "snake_case")]
pub enum TnBinding {
    /// Not bound to any session.
    Unbound,
    /// Bound to the session with this id.
    BoundTo(String),
}

impl TnBinding {
    /// Session id this binding points at, if any.
    pub fn session_id(&self) -> Option<&str> {
        match self {
            TnBinding::Unbound => None,
            TnBinding::BoundTo(id) => Some(id),
        }
    }
}

/// A virtual phone number owned by the pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualTn {
    /// The number in E.164 format (e.g., "+12223334444")
    pub value: String,

    /// Session this number is bound to
    pub binding: TnBinding,

    /// When the number was added to the pool
    pub added_at: DateTime<Utc>,
}

impl VirtualTn {
    /// Create an unbound virtual number.
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            binding: TnBinding::Unbound,
            added_at: truncate_millis(Utc::now()),
        }
    }

    pub fn session_id(&self) -> Option<&str> {
        self.binding.session_id()
    }
}

/// Which participant of a session a number belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Leg {
    A,
    B,
}

impl Leg {
    /// The opposite leg.
    pub fn other(self) -> Leg {
        match self {
            Leg::A => Leg::B,
            Leg::B => Leg::A,
        }
    }
}

/// A proxy session relaying messages between two participants through one
/// virtual number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxySession {
    pub id: String,
    pub virtual_tn: String,
    pub participant_a: String,
    pub participant_b: String,

    /// Lifetime of the session; `None` never expires
    #[serde(default, with = "humantime_serde")]
    pub expiry_window: Option<Duration>,

    pub created_at: DateTime<Utc>,
}

impl ProxySession {
    /// Create a new session record with a fresh id.
    ///
    /// `created_at` is truncated and `expiry_window` rounded up to whole
    /// milliseconds so the record round-trips through storage unchanged.
    pub fn new(
        virtual_tn: impl Into<String>,
        participant_a: impl Into<String>,
        participant_b: impl Into<String>,
        expiry_window: Option<Duration>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            virtual_tn: virtual_tn.into(),
            participant_a: participant_a.into(),
            participant_b: participant_b.into(),
            expiry_window: expiry_window.map(round_up_millis),
            created_at: truncate_millis(now),
        }
    }

    /// Instant at which the session expires.
    ///
    /// `None` when there is no expiry window, or when the window reaches
    /// past the representable time range.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        let window = TimeDelta::from_std(self.expiry_window?).ok()?;
        self.created_at.checked_add_signed(window)
    }

    /// Whether the session is expired at `now` (`created_at + window <= now`).
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at().is_some_and(|expires_at| expires_at <= now)
    }

    /// Whether the session may still be used for routing at `now`.
    pub fn is_live_at(&self, now: DateTime<Utc>) -> bool {
        !self.is_expired_at(now)
    }

    /// Which leg `number` is, if it is a participant at all.
    pub fn leg_of(&self, number: &str) -> Option<Leg> {
        if number == self.participant_a {
            Some(Leg::A)
        } else if number == self.participant_b {
            Some(Leg::B)
        } else {
            None
        }
    }

    /// The participant on the given leg.
    pub fn participant(&self, leg: Leg) -> &str {
        match leg {
            Leg::A => &self.participant_a,
            Leg::B => &self.participant_b,
        }
    }

    /// The other participant of the leg `number` belongs to.
    pub fn counterpart(&self, number: &str) -> Option<&str> {
        self.leg_of(number).map(|leg| self.participant(leg.other()))
    }
}

/// Numbers and sessions read in a single store transaction.
#[derive(Debug, Clone, Default)]
pub struct PoolSnapshot {
    pub numbers: Vec<VirtualTn>,
    pub sessions: Vec<ProxySession>,
}

impl PoolSnapshot {
    /// The live session holding `tn` at `now`, if any.
    ///
    /// A binding to a missing or expired session does not count.
    pub fn live_session_for(&self, tn: &VirtualTn, now: DateTime<Utc>) -> Option<&ProxySession> {
        let session_id = tn.session_id()?;
        self.sessions
            .iter()
            .find(|s| s.id == session_id)
            .filter(|s| s.is_live_at(now))
    }
}

/// Result of an attempt to bind a session to a number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindOutcome {
    /// The number was free and is now bound. `reclaimed` names an expired
    /// session that held the number and was deleted in the same transaction.
    Bound { reclaimed: Option<String> },
    /// The number is held by a live session or no longer in the pool.
    Taken,
}

/// Sub-millisecond windows are never shortened.
pub(crate) fn round_up_millis(window: Duration) -> Duration {
    let millis = Duration::from_millis(u64::try_from(window.as_millis()).unwrap_or(u64::MAX));
    if millis < window {
        millis.saturating_add(Duration::from_millis(1))
    } else {
        millis
    }
}

pub(crate) fn truncate_millis(ts: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ts.timestamp_millis()).unwrap_or(ts)
}
