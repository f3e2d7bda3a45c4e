use crate::services::error::StageError;
use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::primitives::ByteStream;
use chrono::{DateTime, Utc};

/// One entry of a prefix listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedObjectSummary {
    pub key: String,
    /// Assigned by the stage on write
    pub last_modified: Option<DateTime<Utc>>,
    pub size: i64,
}

#[async_trait]
pub trait StorageService: Send + Sync {
    async fn upload_file(&self, key: &str, data: Vec<u8>) -> Result<(), StageError>;
    async fn get_file(&self, key: &str) -> Result<Vec<u8>, StageError>;
    async fn list_objects(&self, prefix: &str) -> Result<Vec<StagedObjectSummary>, StageError>;
    async fn file_exists(&self, key: &str) -> Result<bool, StageError>;
    /// Fully qualified location of `key`, e.g. `s3://bucket/key`
    fn object_url(&self, key: &str) -> String;
}

pub struct S3StorageService {
    client: Client,
    bucket: String,
}

impl S3StorageService {
    pub fn new(client: Client, bucket: String) -> Self {
        Self { client, bucket }
    }
}

/// Token for the following listing page, if there is one to fetch.
fn next_page_token(is_truncated: Option<bool>, token: Option<String>) -> Option<String> {
    token.filter(|_| is_truncated.unwrap_or(false))
}

fn unavailable<E: std::fmt::Display>(op: &str, e: E) -> StageError {
    StageError::Unavailable(format!("{} failed: {}", op, e))
}

#[async_trait]
impl StorageService for S3StorageService {
    async fn upload_file(&self, key: &str, data: Vec<u8>) -> Result<(), StageError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| {
                tracing::error!(
                    "S3 put_object failed: bucket={}, key={}, error={:?}",
                    self.bucket,
                    key,
                    e
                );
                unavailable("put_object", e.into_service_error())
            })?;
        Ok(())
    }

    async fn get_file(&self, key: &str) -> Result<Vec<u8>, StageError> {
        let res = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                let service_error = e.into_service_error();
                if service_error.is_no_such_key() {
                    StageError::KeyNotFound(key.to_string())
                } else {
                    unavailable("get_object", service_error)
                }
            })?;

        let data = res
            .body
            .collect()
            .await
            .map_err(|e| unavailable("get_object body", e))?
            .to_vec();
        Ok(data)
    }

    async fn list_objects(&self, prefix: &str) -> Result<Vec<StagedObjectSummary>, StageError> {
        let mut objects = Vec::new();
        let mut continuation_token = None;

        loop {
            let res = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(prefix)
                .set_continuation_token(continuation_token)
                .send()
                .await
                .map_err(|e| unavailable("list_objects_v2", e.into_service_error()))?;

            if let Some(contents) = res.contents {
                for object in contents {
                    if let Some(key) = object.key {
                        let last_modified = object.last_modified.and_then(|d| {
                            DateTime::from_timestamp(d.secs(), d.subsec_nanos())
                        });
                        objects.push(StagedObjectSummary {
                            key,
                            last_modified,
                            size: object.size.unwrap_or(0),
                        });
                    }
                }
            }

            match next_page_token(res.is_truncated, res.next_continuation_token) {
                Some(token) => continuation_token = Some(token),
                None => break,
            }
        }

        Ok(objects)
    }

    async fn file_exists(&self, key: &str) -> Result<bool, StageError> {
        let res = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await;

        match res {
            Ok(_) => Ok(true),
            Err(e) => {
                let service_error = e.into_service_error();
                if service_error.is_not_found() {
                    Ok(false)
                } else {
                    Err(unavailable("head_object", service_error))
                }
            }
        }
    }

    fn object_url(&self, key: &str) -> String {
        format!("s3://{}/{}", self.bucket, key)
    }
}
