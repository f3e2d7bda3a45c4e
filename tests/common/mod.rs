#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use rust_ingest_backend::config::IngestConfig;
use rust_ingest_backend::services::error::{FetchError, StageError};
use rust_ingest_backend::services::fetcher::{DatasetFetcher, DatasetProvider};
use rust_ingest_backend::services::pipeline::{IngestPipeline, PipelineSettings};
use rust_ingest_backend::services::sink::{SqlTableSink, TableSink, quote_ident};
use rust_ingest_backend::services::storage::{StagedObjectSummary, StorageService};
use rust_ingest_backend::{AppState, create_app};
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Statement};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

pub const RAW_TABLE: &str = "heart_disease_raw";
pub const DATASET: &str = "sid321axn/heart-statlog-cleveland-hungary-final";

/// In-memory stage. Every write gets a strictly later `last_modified`.
pub struct MockStorageService {
    files: Mutex<BTreeMap<String, (Vec<u8>, DateTime<Utc>)>>,
    clock: Mutex<DateTime<Utc>>,
    pub fail_writes: AtomicBool,
    pub fail_reads: AtomicBool,
}

impl MockStorageService {
    pub fn new() -> Self {
        Self {
            files: Mutex::new(BTreeMap::new()),
            clock: Mutex::new(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()),
            fail_writes: AtomicBool::new(false),
            fail_reads: AtomicBool::new(false),
        }
    }

    pub fn insert_at(&self, key: &str, data: &[u8], last_modified: DateTime<Utc>) {
        self.files
            .lock()
            .unwrap()
            .insert(key.to_string(), (data.to_vec(), last_modified));
    }

    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.files.lock().unwrap().get(key).map(|(d, _)| d.clone())
    }

    pub fn keys(&self) -> Vec<String> {
        self.files.lock().unwrap().keys().cloned().collect()
    }
}

#[async_trait]
impl StorageService for MockStorageService {
    async fn upload_file(&self, key: &str, data: Vec<u8>) -> Result<(), StageError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StageError::Unavailable("mock stage is down".to_string()));
        }
        let mut clock = self.clock.lock().unwrap();
        *clock += Duration::seconds(1);
        self.files
            .lock()
            .unwrap()
            .insert(key.to_string(), (data, *clock));
        Ok(())
    }

    async fn get_file(&self, key: &str) -> Result<Vec<u8>, StageError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StageError::Unavailable("mock stage is down".to_string()));
        }
        self.get(key)
            .ok_or_else(|| StageError::KeyNotFound(key.to_string()))
    }

    async fn list_objects(&self, prefix: &str) -> Result<Vec<StagedObjectSummary>, StageError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StageError::Unavailable("mock stage is down".to_string()));
        }
        let files = self.files.lock().unwrap();
        // Reverse key order so selection can't lean on listing order.
        Ok(files
            .iter()
            .rev()
            .filter(|(k, _)| k.starts_with(prefix))
            .map(|(k, (data, modified))| StagedObjectSummary {
                key: k.clone(),
                last_modified: Some(*modified),
                size: data.len() as i64,
            })
            .collect())
    }

    async fn file_exists(&self, key: &str) -> Result<bool, StageError> {
        Ok(self.files.lock().unwrap().contains_key(key))
    }

    fn object_url(&self, key: &str) -> String {
        format!("s3://mock-bucket/{}", key)
    }
}

pub enum ProviderBehavior {
    /// Write these files into the download directory
    Files(Vec<(&'static str, &'static [u8])>),
    /// Fail without touching the directory
    Fail(&'static str),
    /// Delete the directory, then fail
    VanishThenFail(&'static str),
}

/// Provider that records the directory it was handed.
pub struct ScriptedProvider {
    behavior: ProviderBehavior,
    pub last_dest: Mutex<Option<PathBuf>>,
}

impl ScriptedProvider {
    pub fn new(behavior: ProviderBehavior) -> Self {
        Self {
            behavior,
            last_dest: Mutex::new(None),
        }
    }

    pub fn last_dest(&self) -> PathBuf {
        self.last_dest
            .lock()
            .unwrap()
            .clone()
            .expect("provider was never called")
    }
}

#[async_trait]
impl DatasetProvider for ScriptedProvider {
    async fn download(&self, _dataset: &str, dest: &Path) -> Result<(), FetchError> {
        *self.last_dest.lock().unwrap() = Some(dest.to_path_buf());
        match &self.behavior {
            ProviderBehavior::Files(files) => {
                for (name, data) in files {
                    tokio::fs::write(dest.join(name), data).await?;
                }
                Ok(())
            }
            ProviderBehavior::Fail(msg) => Err(FetchError::Provider(msg.to_string())),
            ProviderBehavior::VanishThenFail(msg) => {
                tokio::fs::remove_dir_all(dest).await?;
                Err(FetchError::Provider(msg.to_string()))
            }
        }
    }
}

pub async fn setup_test_db() -> DatabaseConnection {
    // One connection, so every query sees the same in-memory database.
    let mut opt = ConnectOptions::new("sqlite::memory:");
    opt.max_connections(1).min_connections(1).sqlx_logging(false);
    Database::connect(opt).await.unwrap()
}

pub async fn count_rows(db: &DatabaseConnection, table: &str) -> i64 {
    let backend = db.get_database_backend();
    let row = db
        .query_one(Statement::from_string(
            backend,
            format!("SELECT COUNT(*) AS n FROM {}", quote_ident(backend, table)),
        ))
        .await
        .unwrap()
        .unwrap();
    row.try_get::<i64>("", "n").unwrap()
}

pub async fn column_names(db: &DatabaseConnection, table: &str) -> Vec<String> {
    let backend = db.get_database_backend();
    let rows = db
        .query_all(Statement::from_string(
            backend,
            format!("PRAGMA table_info({})", quote_ident(backend, table)),
        ))
        .await
        .unwrap();
    rows.iter()
        .map(|r| r.try_get::<String>("", "name").unwrap())
        .collect()
}

pub struct Harness {
    pub storage: Arc<MockStorageService>,
    pub provider: Arc<ScriptedProvider>,
    pub db: DatabaseConnection,
    pub sink: Arc<SqlTableSink>,
    pub pipeline: Arc<IngestPipeline>,
}

impl Harness {
    pub async fn new(behavior: ProviderBehavior) -> Self {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("rust_ingest_backend=debug")
            .with_test_writer()
            .try_init();

        let storage = Arc::new(MockStorageService::new());
        let provider = Arc::new(ScriptedProvider::new(behavior));
        let db = setup_test_db().await;
        let sink = Arc::new(SqlTableSink::new(db.clone()));
        let pipeline = Arc::new(IngestPipeline::new(
            storage.clone(),
            Arc::new(DatasetFetcher::new(provider.clone())),
            sink.clone(),
            PipelineSettings {
                prefix: "raw_data/".to_string(),
                dataset: DATASET.to_string(),
                raw_table: RAW_TABLE.to_string(),
            },
        ));

        Self {
            storage,
            provider,
            db,
            sink,
            pipeline,
        }
    }

    pub fn app(&self) -> axum::Router {
        let mut config = IngestConfig::default();
        config.max_upload_size = 1024 * 1024;
        create_app(AppState {
            pipeline: self.pipeline.clone(),
            storage: self.storage.clone(),
            sink: self.sink.clone(),
            config,
        })
    }
}

pub async fn seed_table(sink: &dyn TableSink, csv: &[u8]) {
    let table = rust_ingest_backend::services::table::parse_csv(csv).unwrap();
    sink.replace_table(RAW_TABLE, &table).await.unwrap();
}
