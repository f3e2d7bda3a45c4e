use super::request_id::X_REQUEST_ID;
use axum::{extract::Request, middleware::Next, response::Response};
use std::time::Instant;
use tracing::{info, warn};

/// One structured line per request under the `metrics` target. Pipeline
/// calls can run for minutes, so the latency is the interesting field.
pub async fn metrics_middleware(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let request_id = req
        .headers()
        .get(&X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string();

    let response = next.run(req).await;

    let latency_ms = start.elapsed().as_millis();
    let status = response.status().as_u16();

    if response.status().is_server_error() {
        warn!(
            target: "metrics",
            %method, %path, %status, %latency_ms, %request_id,
            "request_failed"
        );
    } else {
        info!(
            target: "metrics",
            %method, %path, %status, %latency_ms, %request_id,
            "request_completed"
        );
    }

    response
}
