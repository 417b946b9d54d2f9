//! HTTP request handlers.

use super::types::{
    AddNumberRequest, CreateSessionRequest, HealthResponse, InboundMessageRequest,
    InboundMessageResponse, NumberResponse, PoolResponse, SessionInfo, SessionResponse,
    SessionsResponse, StatsResponse,
};
use super::AppState;
use crate::error::ProxyError;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use tracing::info;

/// Health check endpoint.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let store_healthy = state.sessions.store_healthy().await;
    let pool_size = match state.sessions.pool().stats().await {
        Ok(stats) => stats.total,
        Err(_) => 0,
    };
    let carrier_healthy = state.sessions.carrier_healthy().await;

    Json(HealthResponse {
        status: if store_healthy { "ok" } else { "degraded" }.to_string(),
        store_healthy,
        pool_size,
        carrier_healthy,
    })
}

/// Add a number to the pool.
pub async fn add_number(
    State(state): State<AppState>,
    Json(request): Json<AddNumberRequest>,
) -> Result<(StatusCode, Json<NumberResponse>), ProxyError> {
    let tn = state.sessions.pool().add(&request.value).await?;

    Ok((
        StatusCode::CREATED,
        Json(NumberResponse {
            virtual_tn: tn.into(),
            message: "Successfully added TN to pool".to_string(),
        }),
    ))
}

/// List every number in the pool.
pub async fn list_numbers(State(state): State<AppState>) -> Result<Json<PoolResponse>, ProxyError> {
    let entries = state.sessions.pool().list().await?;
    Ok(Json(PoolResponse::new(entries)))
}

/// Pool counts.
pub async fn pool_stats(State(state): State<AppState>) -> Result<Json<StatsResponse>, ProxyError> {
    Ok(Json(state.sessions.pool().stats().await?))
}

/// Remove a number from the pool.
pub async fn remove_number(
    State(state): State<AppState>,
    Path(number): Path<String>,
) -> Result<Json<NumberResponse>, ProxyError> {
    let tn = state.sessions.pool().remove(&number).await?;

    Ok(Json(NumberResponse {
        virtual_tn: tn.into(),
        message: "Successfully removed TN from pool".to_string(),
    }))
}

/// Create a proxy session.
pub async fn create_session(
    State(state): State<AppState>,
    Json(request): Json<CreateSessionRequest>,
) -> Result<(StatusCode, Json<SessionResponse>), ProxyError> {
    let session = state
        .sessions
        .create_session(
            &request.participant_a,
            &request.participant_b,
            request.expiry_window,
        )
        .await?;

    info!(session_id = %session.id, "Session created via API");

    Ok((
        StatusCode::CREATED,
        Json(SessionResponse {
            session: session.into(),
            message: "Created new session".to_string(),
        }),
    ))
}

/// List live sessions.
pub async fn list_sessions(
    State(state): State<AppState>,
) -> Result<Json<SessionsResponse>, ProxyError> {
    let sessions: Vec<SessionInfo> = state
        .sessions
        .list_sessions()
        .await?
        .into_iter()
        .map(SessionInfo::from)
        .collect();

    let total = sessions.len();
    Ok(Json(SessionsResponse { sessions, total }))
}

/// Get a live session.
pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionInfo>, ProxyError> {
    let session = state.sessions.get_session(&id).await?;
    Ok(Json(session.into()))
}

/// Delete a session.
pub async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionResponse>, ProxyError> {
    let session = state.sessions.delete_session(&id).await?;

    Ok(Json(SessionResponse {
        session: session.into(),
        message: "Deleted session".to_string(),
    }))
}

/// Carrier webhook for messages received on a virtual number.
pub async fn inbound_message(
    State(state): State<AppState>,
    Json(request): Json<InboundMessageRequest>,
) -> Result<Json<InboundMessageResponse>, ProxyError> {
    let receipt = state
        .sessions
        .route_inbound(&request.from, &request.to, &request.body)
        .await?;

    Ok(Json(receipt))
}
