use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub const STATUS_SUCCESS: &str = "success";
pub const STATUS_ERROR: &str = "error";

/// Result of the two staging operations
#[derive(Serialize, Deserialize, ToSchema)]
pub struct StageResponse {
    pub status: String,
    pub message: String,
    /// Fully qualified stage location, e.g. `s3://bucket/raw_data/t_1700000000.csv`
    pub s3_path: String,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct LoadResponse {
    pub status: String,
    pub message: String,
    pub table: String,
    pub source_key: String,
    pub rows_loaded: u64,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub status: String,
    pub message: String,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub storage: String,
    pub database: String,
    pub version: String,
}
