use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use std::env;

/// Object stage (S3-compatible) settings
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Bucket holding the staged raw files
    pub bucket: String,

    /// AWS region (default: "us-east-1")
    pub region: String,

    /// Static access key; the default provider chain is used when unset
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,

    /// Custom endpoint for MinIO-style stores (path-style addressing)
    pub endpoint_url: Option<String>,

    /// Prefix under which every staged object lives (default: "raw_data/")
    pub prefix: String,
}

/// Relational sink settings
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Full connection URL; takes precedence over the individual fields
    pub url: Option<String>,
    pub user: String,
    pub password: String,
    pub host: String,
    pub port: u16,
    pub name: String,

    /// Table replaced by every load (default: "heart_disease_raw")
    pub raw_table: String,
}

/// External dataset provider settings
#[derive(Debug, Clone)]
pub struct KaggleConfig {
    pub username: Option<String>,
    pub key: Option<String>,

    /// API root (default: "https://www.kaggle.com/api/v1")
    pub api_base: String,

    /// Dataset slug fetched by the ingest operation
    pub dataset: String,
}

#[derive(Debug, Clone)]
pub struct IngestConfig {
    pub storage: StorageConfig,
    pub database: DatabaseConfig,
    pub kaggle: KaggleConfig,

    /// Maximum accepted upload body in bytes (default: 256 MB)
    pub max_upload_size: usize,

    /// Allowed CORS Origins (comma separated)
    pub allowed_origins: Vec<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            bucket: "raw-data".to_string(),
            region: "us-east-1".to_string(),
            access_key_id: None,
            secret_access_key: None,
            endpoint_url: None,
            prefix: "raw_data/".to_string(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            user: "postgres".to_string(),
            password: "postgres".to_string(),
            host: "localhost".to_string(),
            port: 5432,
            name: "postgres".to_string(),
            raw_table: "heart_disease_raw".to_string(),
        }
    }
}

impl Default for KaggleConfig {
    fn default() -> Self {
        Self {
            username: None,
            key: None,
            api_base: "https://www.kaggle.com/api/v1".to_string(),
            dataset: "sid321axn/heart-statlog-cleveland-hungary-final".to_string(),
        }
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            database: DatabaseConfig::default(),
            kaggle: KaggleConfig::default(),
            max_upload_size: 256 * 1024 * 1024, // 256 MB
            allowed_origins: vec![
                "http://localhost:3000".to_string(),
                "http://localhost:8000".to_string(),
                "http://127.0.0.1:8000".to_string(),
            ],
        }
    }
}

impl DatabaseConfig {
    /// Connection URL for the sink. Credentials are percent-encoded so
    /// passwords containing `@` or `/` survive.
    pub fn connection_url(&self) -> String {
        if let Some(url) = &self.url {
            return url.clone();
        }
        format!(
            "postgres://{}:{}@{}:{}/{}",
            utf8_percent_encode(&self.user, NON_ALPHANUMERIC),
            utf8_percent_encode(&self.password, NON_ALPHANUMERIC),
            self.host,
            self.port,
            self.name
        )
    }

    /// Same as `connection_url` with the password masked, for logs.
    pub fn redacted_url(&self) -> String {
        match &self.url {
            Some(url) => match url::Url::parse(url) {
                Ok(mut parsed) if parsed.password().is_some() => {
                    let _ = parsed.set_password(Some("****"));
                    parsed.to_string()
                }
                _ => url.clone(),
            },
            None => format!(
                "postgres://{}:****@{}:{}/{}",
                self.user, self.host, self.port, self.name
            ),
        }
    }
}

fn non_empty(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl IngestConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let default = Self::default();
        let storage = default.storage;
        let database = default.database;
        let kaggle = default.kaggle;

        Self {
            storage: StorageConfig {
                bucket: env::var("S3_BUCKET_NAME").unwrap_or(storage.bucket),
                region: env::var("AWS_REGION").unwrap_or(storage.region),
                access_key_id: non_empty("AWS_ACCESS_KEY_ID"),
                secret_access_key: non_empty("AWS_SECRET_ACCESS_KEY"),
                endpoint_url: non_empty("S3_ENDPOINT"),
                prefix: env::var("S3_PREFIX").unwrap_or(storage.prefix),
            },

            database: DatabaseConfig {
                url: non_empty("DATABASE_URL"),
                user: env::var("POSTGRES_USER").unwrap_or(database.user),
                password: env::var("POSTGRES_PASSWORD").unwrap_or(database.password),
                host: env::var("DB_HOST").unwrap_or(database.host),
                port: env::var("DB_PORT")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(database.port),
                name: env::var("POSTGRES_DB").unwrap_or(database.name),
                raw_table: env::var("RAW_TABLE_NAME").unwrap_or(database.raw_table),
            },

            kaggle: KaggleConfig {
                username: non_empty("KAGGLE_USERNAME"),
                key: non_empty("KAGGLE_KEY"),
                api_base: env::var("KAGGLE_API_BASE").unwrap_or(kaggle.api_base),
                dataset: env::var("KAGGLE_DATASET").unwrap_or(kaggle.dataset),
            },

            max_upload_size: env::var("MAX_UPLOAD_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_upload_size),

            allowed_origins: env::var("ALLOWED_ORIGINS")
                .ok()
                .map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or(default.allowed_origins),
        }
    }

    /// Local MinIO + Postgres from docker-compose
    pub fn development() -> Self {
        let mut config = Self::default();
        config.storage.endpoint_url = Some("http://127.0.0.1:9000".to_string());
        config.storage.access_key_id = Some("minioadmin".to_string());
        config.storage.secret_access_key = Some("minioadmin".to_string());
        config.database.host = "127.0.0.1".to_string();
        config
    }
}
