use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{EltError, Result};
use crate::pipeline::artifact::{sha256_hex, Artifact, ArtifactRef, ArtifactStore};

const CAS_PREFIX: &str = "cas:sha256:";

/// Write `bytes` under `root/sha256/ab/cd/<hex>` and return the `cas:sha256:<hex>` key.
/// Identical content is written once.
pub async fn write_cas(root: &Path, bytes: &[u8]) -> Result<String> {
    let hex = sha256_hex(bytes);
    let path = cas_path(root, &hex);
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).await?;
    }
    if !fs::try_exists(&path).await? {
        fs::write(&path, bytes).await?;
    }
    Ok(format!("{CAS_PREFIX}{hex}"))
}

fn cas_path(root: &Path, hex: &str) -> PathBuf {
    root.join("sha256").join(&hex[0..2]).join(&hex[2..4]).join(hex)
}

/// Content-addressed artifact files. Identical artifacts share one file, so
/// handles are reference counted and the file goes with the last release.
pub struct FsArtifactStore {
    root: PathBuf,
    live: Mutex<HashMap<ArtifactRef, usize>>,
}

impl FsArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            live: Mutex::new(HashMap::new()),
        }
    }

    fn path_of(&self, reference: &ArtifactRef) -> Result<PathBuf> {
        let hex = reference
            .as_str()
            .strip_prefix(CAS_PREFIX)
            .filter(|h| h.len() == 64 && h.chars().all(|c| c.is_ascii_hexdigit()))
            .ok_or_else(|| EltError::Artifact(format!("bad artifact reference {reference}")))?;
        Ok(cas_path(&self.root, hex))
    }
}

#[async_trait]
impl ArtifactStore for FsArtifactStore {
    async fn put(&self, artifact: Artifact) -> Result<ArtifactRef> {
        let bytes = artifact.to_bytes()?;
        // Held across the write so a concurrent release of the same content
        // cannot delete the file between the existence check and the count.
        let mut live = self.live.lock().await;
        let reference = ArtifactRef::new(write_cas(&self.root, &bytes).await?);
        *live.entry(reference.clone()).or_insert(0) += 1;
        debug!(artifact = %reference, size = bytes.len(), "Stored artifact");
        Ok(reference)
    }

    async fn get(&self, reference: &ArtifactRef) -> Result<Arc<Artifact>> {
        let path = self.path_of(reference)?;
        let bytes = fs::read(&path)
            .await
            .map_err(|e| EltError::Artifact(format!("cannot read {reference}: {e}")))?;
        Ok(Arc::new(Artifact::from_bytes(&bytes)?))
    }

    async fn release(&self, reference: &ArtifactRef) -> Result<()> {
        let path = self.path_of(reference)?;
        let mut live = self.live.lock().await;
        let count = live
            .get_mut(reference)
            .ok_or_else(|| EltError::Artifact(format!("unknown artifact {reference}")))?;
        *count -= 1;
        if *count == 0 {
            live.remove(reference);
            fs::remove_file(&path).await?;
            debug!(artifact = %reference, "Released artifact");
        }
        Ok(())
    }

    async fn len(&self) -> usize {
        self.live.lock().await.len()
    }
}
