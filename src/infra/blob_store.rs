use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::debug;

use crate::app::{BlobStore, BucketTier};
use crate::config::StorageConfig;
use crate::error::{EltError, Result};

fn object_key(tier: BucketTier, object_path: &str) -> String {
    format!("{tier}/{object_path}")
}

/// Bucket directories under a local root, one per tier.
pub struct FsBlobStore {
    config: StorageConfig,
}

impl FsBlobStore {
    pub fn new(config: StorageConfig) -> Self {
        Self { config }
    }

    fn bucket_dir(&self, tier: BucketTier) -> PathBuf {
        self.config.root.join(self.config.bucket(tier))
    }

    fn object_file(&self, tier: BucketTier, object_path: &str) -> Result<PathBuf> {
        let relative = Path::new(object_path);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if object_path.is_empty() || escapes {
            return Err(EltError::sink(
                object_key(tier, object_path),
                "object path must be relative and stay inside its bucket",
            ));
        }
        Ok(self.bucket_dir(tier).join(relative))
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn put(&self, tier: BucketTier, object_path: &str, bytes: Vec<u8>) -> Result<()> {
        let path = self.object_file(tier, object_path)?;
        let target = || object_key(tier, object_path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| EltError::sink(target(), e))?;
        }
        let size = bytes.len();
        fs::write(&path, bytes)
            .await
            .map_err(|e| EltError::sink(target(), e))?;
        debug!(bucket = self.config.bucket(tier), object = object_path, size, "Wrote blob");
        Ok(())
    }

    async fn get(&self, tier: BucketTier, object_path: &str) -> Result<Vec<u8>> {
        let path = self.object_file(tier, object_path)?;
        fs::read(&path)
            .await
            .map_err(|e| EltError::sink(object_key(tier, object_path), e))
    }

    async fn list(&self, tier: BucketTier) -> Result<Vec<String>> {
        let root = self.bucket_dir(tier);
        let mut objects = Vec::new();
        let mut pending = vec![root.clone()];
        while let Some(dir) = pending.pop() {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if entry.file_type().await?.is_dir() {
                    pending.push(path);
                } else if let Ok(relative) = path.strip_prefix(&root) {
                    let parts: Vec<String> = relative
                        .components()
                        .map(|c| c.as_os_str().to_string_lossy().into_owned())
                        .collect();
                    objects.push(parts.join("/"));
                }
            }
        }
        objects.sort();
        Ok(objects)
    }
}

/// Process-local blob store.
#[derive(Default)]
pub struct InMemoryBlobStore {
    objects: Mutex<BTreeMap<(BucketTier, String), Vec<u8>>>,
}

impl InMemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn put(&self, tier: BucketTier, object_path: &str, bytes: Vec<u8>) -> Result<()> {
        self.objects
            .lock()
            .await
            .insert((tier, object_path.to_string()), bytes);
        Ok(())
    }

    async fn get(&self, tier: BucketTier, object_path: &str) -> Result<Vec<u8>> {
        self.objects
            .lock()
            .await
            .get(&(tier, object_path.to_string()))
            .cloned()
            .ok_or_else(|| EltError::sink(object_key(tier, object_path), "object not found"))
    }

    async fn list(&self, tier: BucketTier) -> Result<Vec<String>> {
        Ok(self
            .objects
            .lock()
            .await
            .keys()
            .filter(|(t, _)| *t == tier)
            .map(|(_, path)| path.clone())
            .collect())
    }
}
