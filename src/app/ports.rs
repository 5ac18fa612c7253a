use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::Result;
use crate::types::RecordSet;

/// Pipeline stage a blob belongs to. Each tier maps to one bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BucketTier {
    Raw,
    Staging,
    Curated,
}

impl BucketTier {
    pub const ALL: [BucketTier; 3] = [BucketTier::Raw, BucketTier::Staging, BucketTier::Curated];

    pub fn as_str(&self) -> &'static str {
        match self {
            BucketTier::Raw => "raw",
            BucketTier::Staging => "staging",
            BucketTier::Curated => "curated",
        }
    }
}

impl fmt::Display for BucketTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Object storage organized in bucket tiers. `put` overwrites.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(&self, tier: BucketTier, object_path: &str, bytes: Vec<u8>) -> Result<()>;
    async fn get(&self, tier: BucketTier, object_path: &str) -> Result<Vec<u8>>;
    async fn list(&self, tier: BucketTier) -> Result<Vec<String>>;
}

/// Relational sink with skip-on-conflict bulk inserts.
#[async_trait]
pub trait RelationalSink: Send + Sync {
    /// Insert every row of `records` into `table`, skipping rows whose unique
    /// key already exists. Returns the number of rows actually inserted.
    async fn bulk_insert(&self, table: &str, records: &RecordSet) -> Result<usize>;
}
