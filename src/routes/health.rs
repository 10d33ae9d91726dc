use axum::{extract::State, Json};
use serde::Serialize;
use tracing::warn;

use crate::state::AppState;

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: &'static str,
    pub version: &'static str,
}

/// GET /up. Always 200; the body says whether the database answered.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let version = env!("CARGO_PKG_VERSION");
    match state.store.ping().await {
        Ok(()) => Json(HealthResponse {
            status: "ok",
            database: "connected",
            version,
        }),
        Err(e) => {
            warn!(error = %e, "health check: database unreachable");
            Json(HealthResponse {
                status: "error",
                database: "error",
                version,
            })
        }
    }
}
