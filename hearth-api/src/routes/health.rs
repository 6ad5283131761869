/// Health check endpoint
///
/// ```text
/// GET /health
/// ```
///
/// ```json
/// {
///   "status": "healthy",
///   "version": "0.1.0",
///   "database": "connected",
///   "redis": "disabled",
///   "realtime": { "sessions": 3, "users": 2 }
/// }
/// ```
///
/// `status` is `degraded` when the database or a configured Redis is
/// unreachable. The endpoint always answers 200 so load balancers can read
/// the body.

use crate::{app::AppState, error::ApiResult};
use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub database: String,

    /// `connected`, `disconnected` or `disabled`
    pub redis: String,

    pub realtime: RealtimeHealth,
}

/// Sessions attached to this instance
#[derive(Debug, Serialize, Deserialize)]
pub struct RealtimeHealth {
    pub sessions: usize,
    pub users: usize,
}

pub async fn health_check(State(state): State<AppState>) -> ApiResult<Json<HealthResponse>> {
    let database_ok = hearth_shared::db::pool::health_check(&state.db).await.is_ok();

    let redis = match &state.redis {
        None => "disabled",
        Some(client) => match client.ping().await {
            Ok(_) => "connected",
            Err(_) => "disconnected",
        },
    };

    let healthy = database_ok && redis != "disconnected";

    Ok(Json(HealthResponse {
        status: if healthy { "healthy" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database: if database_ok { "connected" } else { "disconnected" }.to_string(),
        redis: redis.to_string(),
        realtime: RealtimeHealth {
            sessions: state.registry.session_count(),
            users: state.registry.connected_users(),
        },
    }))
}
