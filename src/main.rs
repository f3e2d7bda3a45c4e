use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use rust_ingest_backend::api::error::{AppError, PipelineContext};
use rust_ingest_backend::config::IngestConfig;
use rust_ingest_backend::infrastructure::{database, fetcher, storage};
use rust_ingest_backend::services::pipeline::{IngestPipeline, PipelineSettings};
use rust_ingest_backend::services::sink::SqlTableSink;
use rust_ingest_backend::{AppState, create_app};
use serde_json::json;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Port for the API server
    #[arg(short, long, default_value_t = 8000)]
    port: u16,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP API (default)
    Serve,
    /// Download the configured dataset and stage it once
    IngestKaggle,
    /// Load the newest staged object into the raw table once
    LoadRawToDb,
    /// Stage a local file once
    Upload { path: PathBuf },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Initial Environment & Logging Setup
    dotenv().ok();
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rust_ingest_backend=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = IngestConfig::from_env();
    info!("🚀 Starting Rust Ingest Backend...");

    // 2. Collaborators
    let storage_service = storage::setup_storage(&config.storage).await;
    let db = database::setup_database(&config.database).await?;
    let sink = Arc::new(SqlTableSink::new(db));
    let dataset_fetcher = fetcher::setup_fetcher(&config.kaggle);

    let pipeline = Arc::new(IngestPipeline::new(
        storage_service.clone(),
        dataset_fetcher,
        sink.clone(),
        PipelineSettings {
            prefix: config.storage.prefix.clone(),
            dataset: config.kaggle.dataset.clone(),
            raw_table: config.database.raw_table.clone(),
        },
    ));

    // 3. One-shot commands
    let outcome = match args.command.unwrap_or(Command::Serve) {
        Command::Serve => None,
        Command::IngestKaggle => Some(
            pipeline
                .ingest_dataset()
                .await
                .context("Kaggle ingestion failed")
                .map(|s| json!({ "status": "success", "s3_path": s.url })),
        ),
        Command::LoadRawToDb => Some(
            pipeline
                .load_latest()
                .await
                .context("Load from stage to database failed")
                .map(|o| {
                    json!({
                        "status": "success",
                        "table": o.table,
                        "source_key": o.source_key,
                        "rows_loaded": o.rows_loaded,
                    })
                }),
        ),
        Command::Upload { path } => {
            let data = tokio::fs::read(&path)
                .await
                .map_err(|e| anyhow::anyhow!("reading {}: {}", path.display(), e))?;
            let filename = path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or_default()
                .to_string();
            Some(
                pipeline
                    .upload_raw(&filename, data)
                    .await
                    .context("Upload to stage failed")
                    .map(|s| json!({ "status": "success", "s3_path": s.url })),
            )
        }
    };

    if let Some(result) = outcome {
        return report(result);
    }

    // 4. HTTP API
    let state = AppState {
        pipeline,
        storage: storage_service,
        sink,
        config: config.clone(),
    };

    // Configure tracing layer for HTTP requests
    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(|request: &axum::http::Request<_>| {
            let request_id = request
                .headers()
                .get("x-request-id")
                .and_then(|v| v.to_str().ok())
                .unwrap_or("unknown");
            tracing::info_span!(
                "http_request",
                method = %request.method(),
                uri = %request.uri(),
                request_id = %request_id,
            )
        })
        .on_request(|request: &axum::http::Request<_>, _span: &tracing::Span| {
            info!("📥 {} {}", request.method(), request.uri());
        })
        .on_response(
            |response: &axum::http::Response<_>,
             latency: std::time::Duration,
             _span: &tracing::Span| {
                info!(
                    "📤 Finished in {:?} with status {}",
                    latency,
                    response.status()
                );
            },
        );

    let app = create_app(state).layer(trace_layer);
    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("✅ API Server listening on: http://0.0.0.0:{}", args.port);
    info!(
        "📖 Swagger UI documentation: http://localhost:{}/swagger-ui",
        args.port
    );

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!("❌ Server runtime error: {}", e);
        return Err(e.into());
    }

    info!("👋 Backend exited cleanly.");
    Ok(())
}

/// Print the structured result of a one-shot command; failures exit non-zero.
fn report(result: Result<serde_json::Value, AppError>) -> anyhow::Result<()> {
    match result {
        Ok(body) => {
            println!("{}", body);
            Ok(())
        }
        Err(e) => {
            let body = json!({ "status": "error", "message": e.to_string() });
            println!("{}", body);
            anyhow::bail!("{} (HTTP-equivalent status {})", e, e.status_code())
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("⌨️  Ctrl+C received, initiating graceful shutdown...");
        },
        _ = terminate => {
            info!("💤 SIGTERM received, initiating graceful shutdown...");
        },
    }
}
