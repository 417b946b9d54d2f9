//! SQLite-backed store.
//!
//! Every operation is a single transaction. Writers take the database lock
//! up front (`BEGIN IMMEDIATE`), so conditional updates stay atomic across
//! processes sharing the same file, not just across tasks in this one.

use crate::error::StoreError;
use crate::store::ProxyStore;
use crate::types::{
    round_up_millis, BindOutcome, PoolSnapshot, ProxySession, TnBinding, VirtualTn,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row, TransactionBehavior};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info, instrument};

/// Schema for the pool. `virtual_tns.session_id` is the binding; the unique
/// index keeps at most one session record per number.
pub const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS virtual_tns (
    value TEXT PRIMARY KEY,
    session_id TEXT,
    added_at_ms INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS proxy_sessions (
    id TEXT PRIMARY KEY,
    virtual_tn TEXT NOT NULL REFERENCES virtual_tns(value),
    participant_a TEXT NOT NULL,
    participant_b TEXT NOT NULL,
    created_at_ms INTEGER NOT NULL,
    expiry_window_ms INTEGER
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_proxy_sessions_virtual_tn
    ON proxy_sessions(virtual_tn);
";

const SESSION_COLUMNS: &str =
    "id, virtual_tn, participant_a, participant_b, created_at_ms, expiry_window_ms";

/// SQLite proxy store.
///
/// Clones share one connection. Separate `open` calls on the same path get
/// separate connections and are coordinated by SQLite locking.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open (or create) a database file and apply the schema.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::Backend(format!("Failed to create {}: {}", parent.display(), e))
            })?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch(
            "PRAGMA journal_mode=WAL; PRAGMA busy_timeout=5000; PRAGMA foreign_keys=ON;",
        )?;
        conn.execute_batch(SCHEMA_SQL)?;

        info!(path = %path.display(), "Opened SQLite proxy store");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        conn.execute_batch(SCHEMA_SQL)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run blocking SQLite work off the async runtime.
    async fn with_conn<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut Connection) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|_| StoreError::Backend("SQLite connection lock poisoned".into()))?;
            f(&mut *guard)
        })
        .await?
    }
}

fn timestamp_from_ms(idx: usize, ms: i64) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(idx, Type::Integer, "timestamp out of range".into())
    })
}

fn row_to_number(row: &Row<'_>) -> rusqlite::Result<VirtualTn> {
    let session_id: Option<String> = row.get(1)?;
    Ok(VirtualTn {
        value: row.get(0)?,
        binding: session_id.map_or(TnBinding::Unbound, TnBinding::BoundTo),
        added_at: timestamp_from_ms(2, row.get(2)?)?,
    })
}

fn row_to_session(row: &Row<'_>) -> rusqlite::Result<ProxySession> {
    let expiry_window_ms: Option<i64> = row.get(5)?;
    Ok(ProxySession {
        id: row.get(0)?,
        virtual_tn: row.get(1)?,
        participant_a: row.get(2)?,
        participant_b: row.get(3)?,
        created_at: timestamp_from_ms(4, row.get(4)?)?,
        expiry_window: expiry_window_ms.map(|ms| Duration::from_millis(ms.max(0) as u64)),
    })
}

fn load_number(conn: &Connection, value: &str) -> rusqlite::Result<Option<VirtualTn>> {
    conn.query_row(
        "SELECT value, session_id, added_at_ms FROM virtual_tns WHERE value = ?1",
        [value],
        row_to_number,
    )
    .optional()
}

fn load_session(conn: &Connection, id: &str) -> rusqlite::Result<Option<ProxySession>> {
    conn.query_row(
        &format!("SELECT {} FROM proxy_sessions WHERE id = ?1", SESSION_COLUMNS),
        [id],
        row_to_session,
    )
    .optional()
}

fn delete_session_row(conn: &Connection, id: &str) -> rusqlite::Result<usize> {
    conn.execute("DELETE FROM proxy_sessions WHERE id = ?1", [id])
}

#[async_trait]
impl ProxyStore for SqliteStore {
    #[instrument(skip(self))]
    async fn insert_number(&self, value: &str) -> Result<VirtualTn, StoreError> {
        let tn = VirtualTn::new(value);
        self.with_conn(move |conn| {
            let inserted = conn.execute(
                "INSERT INTO virtual_tns (value, session_id, added_at_ms) VALUES (?1, NULL, ?2)",
                params![tn.value, tn.added_at.timestamp_millis()],
            );

            match inserted {
                Ok(_) => Ok(tn),
                Err(rusqlite::Error::SqliteFailure(e, _))
                    if e.code == ErrorCode::ConstraintViolation =>
                {
                    Err(StoreError::DuplicateNumber(tn.value))
                }
                Err(e) => Err(e.into()),
            }
        })
        .await
    }

    #[instrument(skip(self))]
    async fn delete_number(
        &self,
        value: &str,
        now: DateTime<Utc>,
    ) -> Result<VirtualTn, StoreError> {
        let value = value.to_string();
        self.with_conn(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let tn = load_number(&tx, &value)?
                .ok_or_else(|| StoreError::NumberNotFound(value.clone()))?;

            if let Some(session_id) = tn.session_id() {
                match load_session(&tx, session_id)? {
                    Some(holder) if holder.is_live_at(now) => {
                        return Err(StoreError::NumberInUse {
                            number: value,
                            session_id: holder.id,
                        });
                    }
                    Some(stale) => {
                        delete_session_row(&tx, &stale.id)?;
                        debug!(session_id = %stale.id, "Dropped expired session with its number");
                    }
                    None => {}
                }
            }

            tx.execute("DELETE FROM virtual_tns WHERE value = ?1", [&value])?;
            tx.commit()?;
            Ok(tn)
        })
        .await
    }

    async fn snapshot(&self) -> Result<PoolSnapshot, StoreError> {
        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            let numbers = {
                let mut stmt = tx.prepare(
                    "SELECT value, session_id, added_at_ms FROM virtual_tns ORDER BY value",
                )?;
                let rows = stmt.query_map([], row_to_number)?;
                rows.collect::<Result<Vec<_>, _>>()?
            };
            let sessions = {
                let mut stmt = tx.prepare(&format!(
                    "SELECT {} FROM proxy_sessions ORDER BY created_at_ms",
                    SESSION_COLUMNS
                ))?;
                let rows = stmt.query_map([], row_to_session)?;
                rows.collect::<Result<Vec<_>, _>>()?
            };
            tx.commit()?;

            Ok(PoolSnapshot { numbers, sessions })
        })
        .await
    }

    async fn session(&self, id: &str) -> Result<Option<ProxySession>, StoreError> {
        let id = id.to_string();
        self.with_conn(move |conn| Ok(load_session(conn, &id)?))
            .await
    }

    async fn session_for_number(
        &self,
        virtual_tn: &str,
    ) -> Result<Option<ProxySession>, StoreError> {
        let virtual_tn = virtual_tn.to_string();
        self.with_conn(move |conn| {
            let session = conn
                .query_row(
                    "SELECT s.id, s.virtual_tn, s.participant_a, s.participant_b,
                            s.created_at_ms, s.expiry_window_ms
                     FROM proxy_sessions s
                     JOIN virtual_tns t ON t.session_id = s.id
                     WHERE t.value = ?1",
                    [&virtual_tn],
                    row_to_session,
                )
                .optional()?;
            Ok(session)
        })
        .await
    }

    #[instrument(skip(self, session), fields(session_id = %session.id, virtual_tn = %session.virtual_tn))]
    async fn bind_number(
        &self,
        session: &ProxySession,
        now: DateTime<Utc>,
    ) -> Result<BindOutcome, StoreError> {
        let session = session.clone();
        self.with_conn(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let Some(tn) = load_number(&tx, &session.virtual_tn)? else {
                return Ok(BindOutcome::Taken);
            };

            let mut reclaimed = None;
            if let Some(held_by) = tn.session_id() {
                match load_session(&tx, held_by)? {
                    Some(holder) if holder.is_live_at(now) => return Ok(BindOutcome::Taken),
                    Some(stale) => {
                        delete_session_row(&tx, &stale.id)?;
                        reclaimed = Some(stale.id);
                    }
                    None => {}
                }
            }

            tx.execute(
                "UPDATE virtual_tns SET session_id = ?1 WHERE value = ?2",
                params![session.id, session.virtual_tn],
            )?;
            tx.execute(
                &format!(
                    "INSERT INTO proxy_sessions ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    SESSION_COLUMNS
                ),
                params![
                    session.id,
                    session.virtual_tn,
                    session.participant_a,
                    session.participant_b,
                    session.created_at.timestamp_millis(),
                    session
                        .expiry_window
                        .map(|w| i64::try_from(round_up_millis(w).as_millis()).unwrap_or(i64::MAX)),
                ],
            )?;
            tx.commit()?;

            Ok(BindOutcome::Bound { reclaimed })
        })
        .await
    }

    #[instrument(skip(self))]
    async fn release_session(&self, id: &str) -> Result<Option<ProxySession>, StoreError> {
        let id = id.to_string();
        self.with_conn(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let Some(session) = load_session(&tx, &id)? else {
                return Ok(None);
            };

            delete_session_row(&tx, &id)?;
            tx.execute(
                "UPDATE virtual_tns SET session_id = NULL WHERE value = ?1 AND session_id = ?2",
                params![session.virtual_tn, id],
            )?;
            tx.commit()?;

            Ok(Some(session))
        })
        .await
    }

    async fn health_check(&self) -> bool {
        self.with_conn(|conn| Ok(conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?))
            .await
            .is_ok()
    }
}
