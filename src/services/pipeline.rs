use crate::services::error::{FetchError, PipelineError};
use crate::services::fetcher::DatasetFetcher;
use crate::services::sink::TableSink;
use crate::services::storage::{StagedObjectSummary, StorageService};
use crate::services::table::parse_csv;
use crate::utils::keys::{sanitize_filename, stage_key};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Prefix every staged key starts with, e.g. `raw_data/`
    pub prefix: String,
    /// Dataset slug pulled by `ingest_dataset`
    pub dataset: String,
    /// Table replaced by `load_latest`
    pub raw_table: String,
}

/// Where a staging operation put its object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedLocation {
    pub key: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadOutcome {
    pub source_key: String,
    pub table: String,
    pub rows_loaded: u64,
}

/// Drives the three pipeline steps. Each call is independent; nothing is
/// shared between calls except the collaborators.
pub struct IngestPipeline {
    storage: Arc<dyn StorageService>,
    fetcher: Arc<DatasetFetcher>,
    sink: Arc<dyn TableSink>,
    settings: PipelineSettings,
}

/// Newest by stage-assigned time; ties (and missing times) go to the
/// lexicographically greatest key, which for one base name is the newest
/// embedded timestamp.
pub fn select_latest(objects: &[StagedObjectSummary]) -> Option<&StagedObjectSummary> {
    objects.iter().max_by(|a, b| {
        a.last_modified
            .cmp(&b.last_modified)
            .then_with(|| a.key.cmp(&b.key))
    })
}

impl IngestPipeline {
    pub fn new(
        storage: Arc<dyn StorageService>,
        fetcher: Arc<DatasetFetcher>,
        sink: Arc<dyn TableSink>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            storage,
            fetcher,
            sink,
            settings,
        }
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    fn now() -> i64 {
        chrono::Utc::now().timestamp()
    }

    async fn stage(&self, key: String, data: Vec<u8>) -> Result<StagedLocation, PipelineError> {
        let size = data.len();
        self.storage.upload_file(&key, data).await?;
        let url = self.storage.object_url(&key);
        tracing::info!("Staged {} bytes at {}", size, url);
        Ok(StagedLocation { key, url })
    }

    /// Stage a client-supplied payload verbatim.
    pub async fn upload_raw(
        &self,
        filename: &str,
        data: Vec<u8>,
    ) -> Result<StagedLocation, PipelineError> {
        let filename = sanitize_filename(filename)
            .ok_or_else(|| PipelineError::InvalidUpload("filename is empty".to_string()))?;
        let key = stage_key(&self.settings.prefix, &filename, Self::now(), None);
        self.stage(key, data).await
    }

    /// Pull the configured dataset from the provider and stage its CSV file.
    pub async fn ingest_dataset(&self) -> Result<StagedLocation, PipelineError> {
        let fetched = self.fetcher.fetch(&self.settings.dataset).await?;
        tracing::info!(
            "Using {} from dataset {}",
            fetched.path.display(),
            self.settings.dataset
        );

        // `fetched` owns the download directory; every return below drops it.
        let data = tokio::fs::read(&fetched.path)
            .await
            .map_err(FetchError::from)?;
        let key = stage_key(
            &self.settings.prefix,
            fetched.file_name(),
            Self::now(),
            Some("csv"),
        );
        let staged = self.stage(key, data).await;
        fetched.release().await;
        staged
    }

    /// Replace the raw table with the newest staged object.
    pub async fn load_latest(&self) -> Result<LoadOutcome, PipelineError> {
        let objects = self.storage.list_objects(&self.settings.prefix).await?;
        let latest = select_latest(&objects).ok_or_else(|| PipelineError::NoStagedObjectsFound {
            prefix: self.settings.prefix.clone(),
        })?;
        tracing::info!(
            "Loading {} (last modified {:?}) of {} staged objects",
            latest.key,
            latest.last_modified,
            objects.len()
        );

        let data = self.storage.get_file(&latest.key).await?;
        let table = parse_csv(&data)?;
        let rows_loaded = self
            .sink
            .replace_table(&self.settings.raw_table, &table)
            .await?;

        tracing::info!(
            "Loaded {} rows into {} from {}",
            rows_loaded,
            self.settings.raw_table,
            latest.key
        );
        Ok(LoadOutcome {
            source_key: latest.key.clone(),
            table: self.settings.raw_table.clone(),
            rows_loaded,
        })
    }
}
