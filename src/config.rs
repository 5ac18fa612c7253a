use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::app::BucketTier;
use crate::constants::{RAW_CSV_OBJECT, RAW_JSON_OBJECT};
use crate::error::{EltError, Result};
use crate::types::SourceTag;

/// Process configuration, built once at start-up and handed to the adapters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub storage: StorageConfig,
    pub sources: SourcesConfig,
    pub artifacts: ArtifactConfig,
    pub warehouse: WarehouseConfig,
    pub metrics: MetricsConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding one sub-directory per bucket.
    pub root: PathBuf,
    pub raw_bucket: String,
    pub staging_bucket: String,
    pub curated_bucket: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("data/lake"),
            raw_bucket: "telco-raw".to_string(),
            staging_bucket: "telco-staging".to_string(),
            curated_bucket: "telco-curated".to_string(),
        }
    }
}

impl StorageConfig {
    pub fn bucket(&self, tier: BucketTier) -> &str {
        match tier {
            BucketTier::Raw => &self.raw_bucket,
            BucketTier::Staging => &self.staging_bucket,
            BucketTier::Curated => &self.curated_bucket,
        }
    }
}

/// Raw-tier object paths of the two source snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    pub csv_object: String,
    pub json_object: String,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            csv_object: RAW_CSV_OBJECT.to_string(),
            json_object: RAW_JSON_OBJECT.to_string(),
        }
    }
}

impl SourcesConfig {
    pub fn object(&self, tag: SourceTag) -> &str {
        match tag {
            SourceTag::Csv => &self.csv_object,
            SourceTag::Json => &self.json_object,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactBackend {
    #[default]
    Memory,
    Filesystem,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactConfig {
    pub backend: ArtifactBackend,
    /// Root of the content-addressed store when `backend = "filesystem"`.
    pub dir: PathBuf,
}

impl Default for ArtifactConfig {
    fn default() -> Self {
        Self {
            backend: ArtifactBackend::Memory,
            dir: PathBuf::from("data/artifacts"),
        }
    }
}

/// SQLite files backing the main database and the attached `staging` and
/// `warehouse` schemas. `:memory:` is accepted for each.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WarehouseConfig {
    pub path: String,
    pub staging_path: String,
    pub warehouse_path: String,
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        Self {
            path: "data/warehouse/main.db".to_string(),
            staging_path: "data/warehouse/staging.db".to_string(),
            warehouse_path: "data/warehouse/warehouse.db".to_string(),
        }
    }
}

impl WarehouseConfig {
    pub fn in_memory() -> Self {
        Self {
            path: ":memory:".to_string(),
            staging_path: ":memory:".to_string(),
            warehouse_path: ":memory:".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Prometheus listen address, e.g. `0.0.0.0:9464`. Unset disables export.
    pub addr: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub dir: PathBuf,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("logs"),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            EltError::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Overlay `TELCO_*` process environment variables.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(root) = lookup("TELCO_DATA_ROOT") {
            self.storage.root = PathBuf::from(root);
        }
        if let Some(bucket) = lookup("TELCO_RAW_BUCKET") {
            self.storage.raw_bucket = bucket;
        }
        if let Some(bucket) = lookup("TELCO_STAGING_BUCKET") {
            self.storage.staging_bucket = bucket;
        }
        if let Some(bucket) = lookup("TELCO_CURATED_BUCKET") {
            self.storage.curated_bucket = bucket;
        }
        if let Some(backend) = lookup("TELCO_ARTIFACT_BACKEND") {
            self.artifacts.backend = match backend.to_lowercase().as_str() {
                "memory" => ArtifactBackend::Memory,
                "filesystem" => ArtifactBackend::Filesystem,
                other => {
                    return Err(EltError::Config(format!(
                        "unknown artifact backend '{other}' (expected memory or filesystem)"
                    )))
                }
            };
        }
        if let Some(dir) = lookup("TELCO_ARTIFACT_DIR") {
            self.artifacts.dir = PathBuf::from(dir);
        }
        if let Some(path) = lookup("TELCO_WAREHOUSE_DB") {
            self.warehouse.path = path;
        }
        if let Some(path) = lookup("TELCO_STAGING_DB") {
            self.warehouse.staging_path = path;
        }
        if let Some(path) = lookup("TELCO_WAREHOUSE_SCHEMA_DB") {
            self.warehouse.warehouse_path = path;
        }
        if let Some(addr) = lookup("TELCO_METRICS_ADDR") {
            self.metrics.addr = Some(addr).filter(|a| !a.is_empty());
        }
        if let Some(dir) = lookup("TELCO_LOG_DIR") {
            self.logging.dir = PathBuf::from(dir);
        }
        Ok(())
    }
}
