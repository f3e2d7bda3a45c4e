pub mod api;
pub mod config;
pub mod infrastructure;
pub mod services;
pub mod utils;

use crate::config::IngestConfig;
use crate::services::pipeline::IngestPipeline;
use crate::services::sink::TableSink;
use crate::services::storage::StorageService;
use axum::{
    Router,
    http::HeaderValue,
    middleware::from_fn,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(title = "Raw Data Ingestion Layer"),
    paths(
        api::handlers::pipeline::upload_data,
        api::handlers::pipeline::ingest_kaggle,
        api::handlers::pipeline::load_raw_to_db,
        api::handlers::health::health_check,
    ),
    components(
        schemas(
            api::handlers::types::StageResponse,
            api::handlers::types::LoadResponse,
            api::handlers::types::ErrorResponse,
            api::handlers::types::HealthResponse,
        )
    ),
    tags(
        (name = "pipeline", description = "Stage and load raw datasets"),
        (name = "system", description = "Service health")
    )
)]
pub struct ApiDoc;

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<IngestPipeline>,
    pub storage: Arc<dyn StorageService>,
    pub sink: Arc<dyn TableSink>,
    pub config: IngestConfig,
}

fn cors_layer(config: &IngestConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(Any)
        .allow_headers(Any)
}

pub fn create_app(state: AppState) -> Router {
    use api::handlers::{health, pipeline};

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/health", get(health::health_check))
        .route("/upload_data/", post(pipeline::upload_data))
        .route("/upload_data", post(pipeline::upload_data))
        .route("/ingest_kaggle/", post(pipeline::ingest_kaggle))
        .route("/ingest_kaggle", post(pipeline::ingest_kaggle))
        .route("/load_raw_to_db/", post(pipeline::load_raw_to_db))
        .route("/load_raw_to_db", post(pipeline::load_raw_to_db))
        .layer(from_fn(api::middleware::metrics::metrics_middleware))
        .layer(from_fn(api::middleware::request_id::request_id_middleware))
        .layer(cors_layer(&state.config))
        .layer(axum::extract::DefaultBodyLimit::max(
            state.config.max_upload_size + 1024 * 1024, // multipart framing overhead
        ))
        .with_state(state)
}
