use super::types::{LoadResponse, STATUS_SUCCESS, StageResponse};
use crate::AppState;
use crate::api::error::{AppError, PipelineContext};
use axum::{
    Json,
    extract::{Multipart, State, multipart::MultipartError},
    http::StatusCode,
};

fn multipart_error(e: MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge("Request body exceeds the maximum allowed limit".to_string())
    } else {
        AppError::BadRequest(format!("Malformed multipart body: {}", e))
    }
}

#[utoipa::path(
    post,
    path = "/upload_data/",
    request_body(content = Multipart, description = "Raw file in the `file` field"),
    responses(
        (status = 200, description = "Payload staged", body = StageResponse),
        (status = 400, description = "No file or empty filename", body = ErrorResponse),
        (status = 413, description = "Body larger than MAX_UPLOAD_SIZE", body = ErrorResponse),
        (status = 500, description = "Stage write failed", body = ErrorResponse)
    ),
    tag = "pipeline"
)]
pub async fn upload_data(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<StageResponse>, AppError> {
    let mut upload: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        let data = field.bytes().await.map_err(multipart_error)?;
        upload = Some((filename, data.to_vec()));
    }

    let (filename, data) =
        upload.ok_or_else(|| AppError::BadRequest("No file provided".to_string()))?;

    let staged = state
        .pipeline
        .upload_raw(&filename, data)
        .await
        .context("Upload to stage failed")?;

    Ok(Json(StageResponse {
        status: STATUS_SUCCESS.to_string(),
        message: "Raw data staged via manual upload.".to_string(),
        s3_path: staged.url,
    }))
}

#[utoipa::path(
    post,
    path = "/ingest_kaggle/",
    responses(
        (status = 200, description = "Dataset downloaded and staged", body = StageResponse),
        (status = 500, description = "Download, extraction or stage write failed", body = ErrorResponse)
    ),
    tag = "pipeline"
)]
pub async fn ingest_kaggle(State(state): State<AppState>) -> Result<Json<StageResponse>, AppError> {
    let staged = state
        .pipeline
        .ingest_dataset()
        .await
        .context("Kaggle ingestion failed")?;

    Ok(Json(StageResponse {
        status: STATUS_SUCCESS.to_string(),
        message: format!(
            "Dataset '{}' downloaded from Kaggle and staged.",
            state.pipeline.settings().dataset
        ),
        s3_path: staged.url,
    }))
}

#[utoipa::path(
    post,
    path = "/load_raw_to_db/",
    responses(
        (status = 200, description = "Newest staged object loaded", body = LoadResponse),
        (status = 404, description = "Nothing staged yet", body = ErrorResponse),
        (status = 500, description = "Read, parse or database write failed", body = ErrorResponse)
    ),
    tag = "pipeline"
)]
pub async fn load_raw_to_db(State(state): State<AppState>) -> Result<Json<LoadResponse>, AppError> {
    let outcome = state
        .pipeline
        .load_latest()
        .await
        .context("Load from stage to database failed")?;

    Ok(Json(LoadResponse {
        status: STATUS_SUCCESS.to_string(),
        message: format!("Raw data loaded into table: {}", outcome.table),
        table: outcome.table,
        source_key: outcome.source_key,
        rows_loaded: outcome.rows_loaded,
    }))
}
