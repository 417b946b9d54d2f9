//! SMS Proxy - Entry point.

use proxy_store::{MemoryStore, ProxyStore, SqliteStore};
use sms_client::SmsClient;
use sms_proxy::{
    api::{create_router_with_rate_limit, AppState, RateLimitState},
    config::{Config, StoreBackend},
    spawn_sweeper, SessionManager, SessionNotices,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() {
    // Load configuration
    let config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {:#}", e);
            std::process::exit(1);
        }
    };

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log.level));

    if config.log.json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    info!("Starting SMS Proxy");

    // Initialize storage
    let store: Arc<dyn ProxyStore> = match config.store.backend {
        StoreBackend::Sqlite => match SqliteStore::open(&config.store.path) {
            Ok(s) => {
                info!("Using SQLite store at {}", config.store.path.display());
                Arc::new(s)
            }
            Err(e) => {
                error!("Failed to open store at {}: {}", config.store.path.display(), e);
                std::process::exit(1);
            }
        },
        StoreBackend::Memory => {
            info!("Persistence disabled, using in-memory storage");
            Arc::new(MemoryStore::new())
        }
    };

    // Initialize carrier client
    let carrier = match SmsClient::new(
        &config.carrier.api_url,
        config.carrier.api_token.clone(),
        config.carrier.timeout,
    ) {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to create carrier client: {}", e);
            std::process::exit(1);
        }
    };

    let notices = SessionNotices {
        start: config.sessions.start_notice.clone(),
        end: config.sessions.end_notice.clone(),
    };
    let sessions = Arc::new(SessionManager::new(store, Arc::new(carrier)).with_notices(notices));

    match sessions.pool().stats().await {
        Ok(stats) => info!(
            "Loaded pool with {} numbers ({} in use)",
            stats.total, stats.in_use
        ),
        Err(e) => error!("Failed to read pool: {}", e),
    }

    // Start the expiry sweeper
    let sweeper = if config.sweeper.enabled {
        Some(spawn_sweeper(sessions.clone(), config.sweeper.interval))
    } else {
        info!("Expiry sweeper disabled; expired sessions are reclaimed on access");
        None
    };

    let state = AppState::new(sessions);
    let rate_limit = RateLimitState::new(config.rate_limit.global_per_minute);
    let app = create_router_with_rate_limit(state, rate_limit);

    // Bind to address
    let addr = SocketAddr::new(
        config.server.listen_addr.parse().unwrap_or([0, 0, 0, 0].into()),
        config.server.port,
    );

    info!("Listening on {}", addr);

    let listener = match TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            error!("Failed to bind to {}: {}", addr, e);
            std::process::exit(1);
        }
    };

    // Run server
    let result = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    if let Some(handle) = sweeper {
        handle.abort();
    }

    if let Err(e) = result {
        error!("Server error: {}", e);
        std::process::exit(1);
    }

    info!("SMS Proxy stopped");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
