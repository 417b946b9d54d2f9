//! Background expiry sweeper.
//!
//! Periodically releases sessions whose expiry window has elapsed so their
//! records are reclaimed even when nobody touches the number again.

use crate::session::SessionManager;
use chrono::Utc;
use proxy_store::ProxySession;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

/// Runs `expire_sweep` on a fixed interval.
pub struct ExpirySweeper {
    sessions: Arc<SessionManager>,
    interval: Duration,
}

impl ExpirySweeper {
    pub fn new(sessions: Arc<SessionManager>, interval: Duration) -> Self {
        Self { sessions, interval }
    }

    /// Run a single sweep cycle.
    ///
    /// Failures are logged and reported as an empty cycle.
    pub async fn sweep_once(&self) -> Vec<ProxySession> {
        match self.sessions.expire_sweep(Utc::now()).await {
            Ok(released) => released,
            Err(e) => {
                error!("Expiry sweep failed: {}", e);
                Vec::new()
            }
        }
    }

    /// Run the sweeper as a background task.
    ///
    /// This will run indefinitely, sleeping between sweep cycles.
    pub async fn run(&self) {
        info!("Starting expiry sweeper, interval: {:?}", self.interval);

        loop {
            tokio::time::sleep(self.interval).await;

            let released = self.sweep_once().await;
            if released.is_empty() {
                debug!("No expired sessions this cycle");
            } else {
                info!("Sweep cycle complete: {} sessions expired", released.len());
            }
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

/// Spawn the expiry sweeper as a background task.
pub fn spawn_sweeper(
    sessions: Arc<SessionManager>,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    let sweeper = ExpirySweeper::new(sessions, interval);

    tokio::spawn(async move {
        sweeper.run().await;
    })
}
