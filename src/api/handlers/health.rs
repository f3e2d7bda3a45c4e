use super::types::HealthResponse;
use crate::AppState;
use axum::{Json, extract::State, http::StatusCode};

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Stage and sink reachable", body = HealthResponse),
        (status = 503, description = "A backend is unreachable", body = HealthResponse)
    ),
    tag = "system"
)]
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    // A missing probe key is fine; only transport failures count.
    let storage_ok = state.storage.file_exists("health-check").await.is_ok();
    let database_ok = state.sink.ping().await;

    let label = |ok: bool| (if ok { "connected" } else { "disconnected" }).to_string();
    let status = if storage_ok && database_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(HealthResponse {
            status: (if status.is_success() { "ok" } else { "degraded" }).to_string(),
            storage: label(storage_ok),
            database: label(database_ok),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }),
    )
}
