use crate::api::handlers::types::{ErrorResponse, STATUS_ERROR};
use crate::services::error::PipelineError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Bad Request: {0}")]
    BadRequest(String),

    #[error("Payload Too Large: {0}")]
    PayloadTooLarge(String),

    /// A pipeline step failed; `context` names the operation.
    #[error("{context}: {source}")]
    Pipeline {
        context: &'static str,
        source: PipelineError,
    },
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::Pipeline { source, .. } => match source {
                PipelineError::NoStagedObjectsFound { .. } => StatusCode::NOT_FOUND,
                PipelineError::InvalidUpload(_) => StatusCode::BAD_REQUEST,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

/// Attach the operation name to a pipeline failure.
pub trait PipelineContext<T> {
    fn context(self, context: &'static str) -> Result<T, AppError>;
}

impl<T> PipelineContext<T> for Result<T, PipelineError> {
    fn context(self, context: &'static str) -> Result<T, AppError> {
        self.map_err(|source| AppError::Pipeline { context, source })
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = self.to_string();

        if status.is_server_error() {
            tracing::error!("{}", message);
        } else {
            tracing::warn!("{}", message);
        }

        let body = Json(ErrorResponse {
            status: STATUS_ERROR.to_string(),
            message,
        });

        (status, body).into_response()
    }
}
