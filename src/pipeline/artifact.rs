//! Artifacts handed along graph edges, and the stores that hold them between
//! the producing unit and its consumers.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::{EltError, Result};
use crate::types::RecordSet;

/// A bundle of named record sets produced by one unit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    tables: BTreeMap<String, RecordSet>,
}

impl Artifact {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(name: impl Into<String>, records: RecordSet) -> Self {
        Self::new().with(name, records)
    }

    pub fn with(mut self, name: impl Into<String>, records: RecordSet) -> Self {
        self.insert(name, records);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, records: RecordSet) {
        self.tables.insert(name.into(), records);
    }

    pub fn table(&self, name: &str) -> Result<&RecordSet> {
        self.tables
            .get(name)
            .ok_or_else(|| EltError::Artifact(format!("artifact has no table '{name}'")))
    }

    pub fn tables(&self) -> impl Iterator<Item = (&str, &RecordSet)> {
        self.tables.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Rows across every table in the bundle.
    pub fn row_count(&self) -> usize {
        self.tables.values().map(RecordSet::len).sum()
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Hex SHA-256 of the canonical encoding. Equal digests mean bit-identical
    /// artifacts.
    pub fn digest(&self) -> Result<String> {
        Ok(sha256_hex(&self.to_bytes()?))
    }
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Opaque handle to a stored artifact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ArtifactRef(String);

impl ArtifactRef {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArtifactRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Holds artifacts from production until every consumer is done.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    async fn put(&self, artifact: Artifact) -> Result<ArtifactRef>;
    async fn get(&self, reference: &ArtifactRef) -> Result<Arc<Artifact>>;
    /// Drop the artifact. Releasing an unknown reference is an error.
    async fn release(&self, reference: &ArtifactRef) -> Result<()>;
    /// Number of artifacts currently held.
    async fn len(&self) -> usize;

    async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

/// Artifacts kept as shared in-process handles.
#[derive(Default)]
pub struct InMemoryArtifactStore {
    artifacts: Mutex<HashMap<ArtifactRef, Arc<Artifact>>>,
}

impl InMemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ArtifactStore for InMemoryArtifactStore {
    async fn put(&self, artifact: Artifact) -> Result<ArtifactRef> {
        let reference = ArtifactRef::new(format!("mem:{}", Uuid::new_v4()));
        self.artifacts
            .lock()
            .await
            .insert(reference.clone(), Arc::new(artifact));
        Ok(reference)
    }

    async fn get(&self, reference: &ArtifactRef) -> Result<Arc<Artifact>> {
        self.artifacts
            .lock()
            .await
            .get(reference)
            .cloned()
            .ok_or_else(|| EltError::Artifact(format!("unknown artifact {reference}")))
    }

    async fn release(&self, reference: &ArtifactRef) -> Result<()> {
        self.artifacts
            .lock()
            .await
            .remove(reference)
            .map(|_| ())
            .ok_or_else(|| EltError::Artifact(format!("unknown artifact {reference}")))
    }

    async fn len(&self) -> usize {
        self.artifacts.lock().await.len()
    }
}
