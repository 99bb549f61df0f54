use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use derive_more::derive::Display;
use walkdir::WalkDir;

use crate::server_config::StorageConfig;

#[derive(Debug, Display)]
pub enum StorageError {
    #[display("object not found: {_0}")]
    NotFound(String),
    #[display("invalid object key: {_0:?}")]
    InvalidKey(String),
    #[display("storage io error: {_0}")]
    Io(String),
    #[display("listing is truncated but carries no continuation token")]
    MissingToken,
}

impl std::error::Error for StorageError {}

impl From<std::io::Error> for StorageError {
    fn from(e: std::io::Error) -> Self {
        StorageError::Io(e.to_string())
    }
}

/// One page of a prefix listing, in ascending key order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectPage {
    pub keys: Vec<String>,
    pub is_truncated: bool,
    pub next_token: Option<String>,
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StorageError>;

    async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        continuation_token: Option<&str>,
    ) -> Result<ObjectPage, StorageError>;
}

/// Buckets are directories under `root`; keys are `/`-separated paths inside them.
///
/// Listings include directory placeholders as `dir/` keys, the way object stores
/// report "folder" markers. The continuation token is the last key of the page.
#[derive(Debug, Clone)]
pub struct LocalObjectStore {
    root: PathBuf,
    page_size: usize,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>, page_size: usize) -> Self {
        Self {
            root: root.into(),
            page_size: page_size.max(1),
        }
    }

    pub fn from_config(config: &StorageConfig, page_size: usize) -> Self {
        Self::new(config.root.clone(), page_size)
    }

    fn bucket_dir(&self, bucket: &str) -> Result<PathBuf, StorageError> {
        if bucket.is_empty() || !is_plain_relative(Path::new(bucket)) || bucket.contains('/') {
            return Err(StorageError::InvalidKey(bucket.to_string()));
        }
        Ok(self.root.join(bucket))
    }
}

fn is_plain_relative(path: &Path) -> bool {
    path.components().all(|c| matches!(c, Component::Normal(_)))
}

fn validate_key(key: &str) -> Result<(), StorageError> {
    if key.is_empty() || key.ends_with('/') || !is_plain_relative(Path::new(key)) {
        return Err(StorageError::InvalidKey(key.to_string()));
    }
    Ok(())
}

fn collect_keys(bucket_dir: &Path) -> Result<Vec<String>, StorageError> {
    let mut keys = Vec::new();
    for entry in WalkDir::new(bucket_dir).min_depth(1) {
        let entry = entry.map_err(|e| StorageError::Io(e.to_string()))?;
        let relative = entry
            .path()
            .strip_prefix(bucket_dir)
            .map_err(|e| StorageError::Io(e.to_string()))?;
        let mut key = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        if entry.file_type().is_dir() {
            key.push('/');
        }
        keys.push(key);
    }
    keys.sort();
    Ok(keys)
}

fn page_of(keys: Vec<String>, prefix: &str, after: Option<&str>, page_size: usize) -> ObjectPage {
    let mut matching = keys
        .into_iter()
        .filter(|k| k.starts_with(prefix))
        .filter(|k| after.map_or(true, |t| k.as_str() > t));

    let page: Vec<String> = matching.by_ref().take(page_size).collect();
    let is_truncated = matching.next().is_some();
    let next_token = if is_truncated { page.last().cloned() } else { None };

    ObjectPage {
        keys: page,
        is_truncated,
        next_token,
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StorageError> {
        validate_key(key)?;
        let path = self.bucket_dir(bucket)?.join(key);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(format!("{bucket}/{key}")))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        continuation_token: Option<&str>,
    ) -> Result<ObjectPage, StorageError> {
        let bucket_dir = self.bucket_dir(bucket)?;
        if !tokio::fs::try_exists(&bucket_dir).await? {
            return Err(StorageError::NotFound(bucket.to_string()));
        }

        let keys = tokio::task::spawn_blocking(move || collect_keys(&bucket_dir))
            .await
            .map_err(|e| StorageError::Io(e.to_string()))??;

        Ok(page_of(keys, prefix, continuation_token, self.page_size))
    }
}
