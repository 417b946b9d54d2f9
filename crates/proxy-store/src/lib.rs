//! Persistence for the virtual number pool and its proxy sessions.
//!
//! The store is the single source of truth: every pool or session mutation
//! is one transaction against a [`ProxyStore`]. Two backends are provided:
//! - [`SqliteStore`] for durable, multi-process deployments
//! - [`MemoryStore`] for tests and single-instance development

mod error;
mod memory;
mod phone;
mod sqlite;
mod store;
mod types;

pub use error::StoreError;
pub use memory::MemoryStore;
pub use phone::normalize_phone_number;
pub use sqlite::{SqliteStore, SCHEMA_SQL};
pub use store::ProxyStore;
pub use types::*;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeDelta, TimeZone, Utc};
    use std::time::Duration;

    fn session_with(window: Option<Duration>) -> ProxySession {
        let created = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        ProxySession::new("+12223334444", "+13334445555", "+14445556666", window, created)
    }

    #[test]
    fn test_new_session_has_unique_id() {
        let a = session_with(None);
        let b = session_with(None);
        assert_ne!(a.id, b.id);
        assert_eq!(a.virtual_tn, "+12223334444");
    }

    #[test]
    fn test_session_without_window_never_expires() {
        let session = session_with(None);
        let far_future = session.created_at + TimeDelta::days(365 * 100);

        assert!(session.expires_at().is_none());
        assert!(session.is_live_at(far_future));
    }

    #[test]
    fn test_session_expiry_boundary() {
        let session = session_with(Some(Duration::from_secs(60)));
        let expires_at = session.created_at + TimeDelta::seconds(60);

        assert_eq!(session.expires_at(), Some(expires_at));
        assert!(session.is_live_at(expires_at - TimeDelta::milliseconds(1)));
        assert!(session.is_expired_at(expires_at));
        assert!(!session.is_live_at(expires_at + TimeDelta::seconds(1)));
    }

    #[test]
    fn test_zero_window_expires_immediately() {
        let session = session_with(Some(Duration::ZERO));
        assert!(session.is_expired_at(session.created_at));
    }

    #[test]
    fn test_oversized_window_never_expires() {
        let session = session_with(Some(Duration::from_secs(u64::MAX)));
        assert!(session.expires_at().is_none());
        assert!(session.is_live_at(session.created_at + TimeDelta::days(365 * 1000)));
    }

    #[test]
    fn test_created_at_truncated_to_millis() {
        let now = Utc::now();
        let session = ProxySession::new("+12223334444", "+13334445555", "+14445556666", None, now);
        assert_eq!(
            session.created_at.timestamp_millis(),
            now.timestamp_millis()
        );
        assert_eq!(session.created_at.timestamp_subsec_nanos() % 1_000_000, 0);
    }

    #[test]
    fn test_counterpart() {
        let session = session_with(None);

        assert_eq!(session.leg_of("+13334445555"), Some(Leg::A));
        assert_eq!(session.leg_of("+14445556666"), Some(Leg::B));
        assert_eq!(session.counterpart("+13334445555"), Some("+14445556666"));
        assert_eq!(session.counterpart("+14445556666"), Some("+13334445555"));
        assert_eq!(session.counterpart("+19998887777"), None);
    }

    #[test]
    fn test_sub_millisecond_window_rounds_up() {
        let session = session_with(Some(Duration::from_micros(1500)));
        assert_eq!(session.expiry_window, Some(Duration::from_millis(2)));

        let session = session_with(Some(Duration::from_nanos(1)));
        assert_eq!(session.expiry_window, Some(Duration::from_millis(1)));
        assert!(session.is_live_at(session.created_at));

        let session = session_with(Some(Duration::from_millis(250)));
        assert_eq!(session.expiry_window, Some(Duration::from_millis(250)));
    }

    #[test]
    fn test_binding_serialization() {
        let json = serde_json::to_string(&TnBinding::Unbound).unwrap();
        assert_eq!(json, r#"{"state":"unbound"}"#);

        let json = serde_json::to_string(&TnBinding::BoundTo("abc".into())).unwrap();
        assert_eq!(json, r#"{"state":"bound_to","session_id":"abc"}"#);
    }

    #[test]
    fn test_session_window_serializes_as_humantime() {
        let session = session_with(Some(Duration::from_secs(7200)));
        let json = serde_json::to_value(&session).unwrap();
        assert_eq!(json["expiry_window"], "2h");

        let restored: ProxySession = serde_json::from_value(json).unwrap();
        assert_eq!(restored, session);
    }

    #[test]
    fn test_snapshot_ignores_expired_and_dangling_bindings() {
        let live = session_with(None);
        let expired = ProxySession {
            virtual_tn: "+12223335555".into(),
            ..session_with(Some(Duration::ZERO))
        };
        let now = live.created_at + TimeDelta::seconds(1);

        let snapshot = PoolSnapshot {
            numbers: vec![
                VirtualTn {
                    binding: TnBinding::BoundTo(live.id.clone()),
                    ..VirtualTn::new("+12223334444")
                },
                VirtualTn {
                    binding: TnBinding::BoundTo(expired.id.clone()),
                    ..VirtualTn::new("+12223335555")
                },
                VirtualTn {
                    binding: TnBinding::BoundTo("missing".into()),
                    ..VirtualTn::new("+12223336666")
                },
            ],
            sessions: vec![live.clone(), expired],
        };

        assert_eq!(
            snapshot.live_session_for(&snapshot.numbers[0], now).map(|s| &s.id),
            Some(&live.id)
        );
        assert!(snapshot.live_session_for(&snapshot.numbers[1], now).is_none());
        assert!(snapshot.live_session_for(&snapshot.numbers[2], now).is_none());
    }
}
