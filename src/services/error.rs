use std::path::PathBuf;
use thiserror::Error;

/// Failures of the object stage backend
#[derive(Error, Debug)]
pub enum StageError {
    #[error("stage unavailable: {0}")]
    Unavailable(String),

    #[error("key not found: {0}")]
    KeyNotFound(String),
}

/// Failures while pulling a dataset from the external provider
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("provider request failed: {0}")]
    Provider(String),

    #[error("no CSV file found in download directory {}", .0.display())]
    NoTabularFilePresent(PathBuf),

    #[error("local I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("payload has no header row")]
    MissingHeader,

    #[error("invalid CSV: {0}")]
    Csv(#[from] csv::Error),
}

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("table has no columns")]
    NoColumns,
}

/// Everything a pipeline operation can fail with
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    ExternalProvider(#[from] FetchError),

    #[error(transparent)]
    Stage(#[from] StageError),

    #[error("no staged objects found under '{prefix}'")]
    NoStagedObjectsFound { prefix: String },

    #[error(transparent)]
    Sink(#[from] SinkError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("invalid upload: {0}")]
    InvalidUpload(String),
}
