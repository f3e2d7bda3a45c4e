use crate::config::KaggleConfig;
use crate::services::error::FetchError;
use async_trait::async_trait;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

/// External source of named datasets
#[async_trait]
pub trait DatasetProvider: Send + Sync {
    /// Materialize `dataset` as plain files directly under `dest`.
    async fn download(&self, dataset: &str, dest: &Path) -> Result<(), FetchError>;
}

/// Temporary directory owned by a single fetch. Removed exactly once, on
/// `release` or on drop, whichever comes first. Removal errors are logged
/// and never returned. `release` deletes on the blocking pool; drop deletes
/// inline.
pub struct EphemeralDownload {
    dir: Option<TempDir>,
    path: PathBuf,
}

impl EphemeralDownload {
    pub fn create() -> Result<Self, FetchError> {
        let dir = tempfile::Builder::new().prefix("dataset-").tempdir()?;
        let path = dir.path().to_path_buf();
        Ok(Self {
            dir: Some(dir),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn release(mut self) {
        let Some(dir) = self.dir.take() else {
            return;
        };
        let path = self.path.clone();
        match tokio::task::spawn_blocking(move || dir.close()).await {
            Ok(result) => log_removal(&path, result),
            Err(e) => tracing::warn!("Cleanup task for {} failed: {}", path.display(), e),
        }
    }
}

fn log_removal(path: &Path, result: std::io::Result<()>) {
    match result {
        Ok(()) => tracing::debug!("Removed download directory {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(
            "Failed to remove download directory {}: {}",
            path.display(),
            e
        ),
    }
}

impl Drop for EphemeralDownload {
    fn drop(&mut self) {
        if let Some(dir) = self.dir.take() {
            log_removal(&self.path, dir.close());
        }
    }
}

/// A located CSV file plus the directory it lives in
pub struct FetchedDataset {
    pub path: PathBuf,
    download: EphemeralDownload,
}

impl FetchedDataset {
    pub fn file_name(&self) -> &str {
        self.path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("dataset.csv")
    }

    pub async fn release(self) {
        self.download.release().await;
    }
}

/// CSV files directly under `dir`, sorted by file name.
pub async fn find_csv_files(dir: &Path) -> Result<Vec<PathBuf>, FetchError> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let is_csv = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("csv"));
        if is_csv && entry.file_type().await?.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

pub struct DatasetFetcher {
    provider: Arc<dyn DatasetProvider>,
}

impl DatasetFetcher {
    pub fn new(provider: Arc<dyn DatasetProvider>) -> Self {
        Self { provider }
    }

    /// Download `dataset` into a fresh temporary directory and pick its CSV
    /// file. The directory is gone before this returns an error.
    pub async fn fetch(&self, dataset: &str) -> Result<FetchedDataset, FetchError> {
        let download = EphemeralDownload::create()?;
        tracing::info!(
            "Downloading dataset {} into {}",
            dataset,
            download.path().display()
        );

        self.provider.download(dataset, download.path()).await?;

        let candidates = find_csv_files(download.path()).await?;
        let path = match candidates.as_slice() {
            [] => {
                return Err(FetchError::NoTabularFilePresent(
                    download.path().to_path_buf(),
                ));
            }
            [only] => only.clone(),
            [first, ..] => {
                tracing::warn!(
                    "Dataset {} contains {} CSV files, using {}",
                    dataset,
                    candidates.len(),
                    first.display()
                );
                first.clone()
            }
        };

        Ok(FetchedDataset { path, download })
    }
}

/// Kaggle public API. The download endpoint returns a zip archive of the
/// whole dataset.
pub struct KaggleProvider {
    client: reqwest::Client,
    config: KaggleConfig,
}

impl KaggleProvider {
    pub fn new(config: KaggleConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    pub fn download_url(&self, dataset: &str) -> Result<url::Url, FetchError> {
        let mut url = url::Url::parse(&self.config.api_base)
            .map_err(|e| FetchError::Provider(format!("invalid API base: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| FetchError::Provider("API base cannot hold a path".to_string()))?
            .pop_if_empty()
            .extend(["datasets", "download"])
            .extend(dataset.split('/').filter(|s| !s.is_empty()));
        Ok(url)
    }
}

#[async_trait]
impl DatasetProvider for KaggleProvider {
    async fn download(&self, dataset: &str, dest: &Path) -> Result<(), FetchError> {
        let url = self.download_url(dataset)?;
        let mut request = self.client.get(url.clone());
        if let (Some(user), Some(key)) = (&self.config.username, &self.config.key) {
            request = request.basic_auth(user, Some(key));
        }

        let response = request
            .send()
            .await
            .map_err(|e| FetchError::Provider(format!("GET {} failed: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Provider(format!(
                "GET {} returned {}",
                url, status
            )));
        }

        let archive: bytes::Bytes = response
            .bytes()
            .await
            .map_err(|e| FetchError::Provider(format!("reading archive failed: {}", e)))?;
        tracing::debug!("Downloaded {} bytes for {}", archive.len(), dataset);

        let dest = dest.to_path_buf();
        tokio::task::spawn_blocking(move || extract_archive(archive, &dest))
            .await
            .map_err(|e| FetchError::Provider(format!("extraction task failed: {}", e)))?
    }
}

fn extract_archive(data: bytes::Bytes, dest: &Path) -> Result<(), FetchError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(data))
        .map_err(|e| FetchError::Provider(format!("Failed to parse ZIP: {}", e)))?;
    archive
        .extract(dest)
        .map_err(|e| FetchError::Provider(format!("Failed to extract ZIP: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        Router,
        http::{HeaderMap, StatusCode, header},
        response::IntoResponse,
        routing::get,
    };
    use std::io::Write;

    fn zip_with(name: &str, content: &[u8]) -> Vec<u8> {
        let mut buf = Vec::new();
        {
            let mut writer = zip::ZipWriter::new(Cursor::new(&mut buf));
            writer
                .start_file(name, zip::write::FileOptions::default())
                .unwrap();
            writer.write_all(content).unwrap();
            writer.finish().unwrap();
        }
        buf
    }

    /// Local stand-in for the dataset API; returns its base URL.
    async fn serve_datasets() -> String {
        let archive = zip_with("heart.csv", b"a,b\n1,2\n");
        let app = Router::new()
            .route(
                "/api/v1/datasets/download/owner/heart",
                get(move |headers: HeaderMap| {
                    let archive = archive.clone();
                    async move {
                        let auth = headers
                            .get(header::AUTHORIZATION)
                            .and_then(|v| v.to_str().ok());
                        // user:secret
                        if auth == Some("Basic dXNlcjpzZWNyZXQ=") {
                            (StatusCode::OK, archive).into_response()
                        } else {
                            StatusCode::UNAUTHORIZED.into_response()
                        }
                    }
                }),
            )
            .route(
                "/api/v1/datasets/download/owner/private",
                get(|| async { StatusCode::FORBIDDEN }),
            );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}/api/v1", addr)
    }

    fn provider_for(api_base: String, credentials: bool) -> KaggleProvider {
        KaggleProvider::new(KaggleConfig {
            api_base,
            username: credentials.then(|| "user".to_string()),
            key: credentials.then(|| "secret".to_string()),
            ..KaggleConfig::default()
        })
    }

    #[test]
    fn test_download_url() {
        let provider = KaggleProvider::new(KaggleConfig::default());
        let url = provider
            .download_url("sid321axn/heart-statlog-cleveland-hungary-final")
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://www.kaggle.com/api/v1/datasets/download/sid321axn/heart-statlog-cleveland-hungary-final"
        );
    }

    #[test]
    fn test_download_url_trailing_slash_base() {
        let provider = KaggleProvider::new(KaggleConfig {
            api_base: "http://localhost:9999/api/v1/".to_string(),
            ..KaggleConfig::default()
        });
        let url = provider.download_url("owner/name").unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:9999/api/v1/datasets/download/owner/name"
        );
    }

    #[test]
    fn test_extract_archive() {
        let buf = zip_with("heart.csv", b"a,b\n1,2\n");

        let dir = tempfile::tempdir().unwrap();
        extract_archive(bytes::Bytes::from(buf), dir.path()).unwrap();
        let content = std::fs::read(dir.path().join("heart.csv")).unwrap();
        assert_eq!(content, b"a,b\n1,2\n");
    }

    #[test]
    fn test_extract_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let err = extract_archive(bytes::Bytes::from_static(b"not a zip"), dir.path());
        assert!(matches!(err, Err(FetchError::Provider(_))));
    }

    #[tokio::test]
    async fn test_release_removes_directory_once() {
        let download = EphemeralDownload::create().unwrap();
        let path = download.path().to_path_buf();
        std::fs::write(path.join("x.csv"), b"a\n1\n").unwrap();
        assert!(path.exists());
        download.release().await;
        assert!(!path.exists());
    }

    #[test]
    fn test_drop_tolerates_missing_directory() {
        let download = EphemeralDownload::create().unwrap();
        let path = download.path().to_path_buf();
        std::fs::remove_dir_all(&path).unwrap();
        drop(download);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_find_csv_files_sorted_and_filtered() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.csv"), b"").unwrap();
        std::fs::write(dir.path().join("A.CSV"), b"").unwrap();
        std::fs::write(dir.path().join("readme.txt"), b"").unwrap();
        std::fs::create_dir(dir.path().join("nested.csv")).unwrap();

        let files = find_csv_files(dir.path()).await.unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["A.CSV", "b.csv"]);
    }

    #[tokio::test]
    async fn test_download_extracts_archive_with_basic_auth() {
        let base = serve_datasets().await;
        let provider = provider_for(base, true);
        let dest = tempfile::tempdir().unwrap();

        provider.download("owner/heart", dest.path()).await.unwrap();
        let content = std::fs::read(dest.path().join("heart.csv")).unwrap();
        assert_eq!(content, b"a,b\n1,2\n");
    }

    #[tokio::test]
    async fn test_download_non_success_status_is_provider_error() {
        let base = serve_datasets().await;
        let dest = tempfile::tempdir().unwrap();

        let err = provider_for(base.clone(), true)
            .download("owner/private", dest.path())
            .await
            .unwrap_err();
        match err {
            FetchError::Provider(msg) => assert!(msg.contains("403"), "{msg}"),
            other => panic!("unexpected error: {other:?}"),
        }

        // Without credentials the archive endpoint refuses too.
        let err = provider_for(base, false)
            .download("owner/heart", dest.path())
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Provider(_)));
        assert!(!dest.path().join("heart.csv").exists());
    }
}
