use std::sync::Arc;
use tracing::info;

use super::artifact::{ArtifactStore, InMemoryArtifactStore};
use super::dag::{RunReport, TaskGraph};
use super::steps::*;
use crate::app::{BlobStore, RelationalSink};
use crate::config::{ArtifactBackend, ArtifactConfig, SourcesConfig};
use crate::error::Result;
use crate::infra::FsArtifactStore;
use crate::types::SourceTag;

/// The eight churn units: extract and clean per source, then the shared
/// silver, feature and load stages.
pub fn churn_steps(
    blobs: Arc<dyn BlobStore>,
    sink: Arc<dyn RelationalSink>,
    sources: &SourcesConfig,
) -> Vec<Arc<dyn PipelineStep>> {
    let mut steps: Vec<Arc<dyn PipelineStep>> = Vec::new();
    for tag in SourceTag::ALL {
        steps.push(Arc::new(ExtractStep::new(tag, blobs.clone(), sources.object(tag))));
        steps.push(Arc::new(CleanStep::new(tag)));
    }
    steps.push(Arc::new(LoadSilverStep::new(blobs.clone())));
    steps.push(Arc::new(FeatureEngineeringStep));
    steps.push(Arc::new(LoadGoldStep::new(blobs)));
    steps.push(Arc::new(LoadWarehouseStep::new(sink)));
    steps
}

pub fn artifact_store(config: &ArtifactConfig) -> Arc<dyn ArtifactStore> {
    match config.backend {
        ArtifactBackend::Memory => Arc::new(InMemoryArtifactStore::new()),
        ArtifactBackend::Filesystem => Arc::new(FsArtifactStore::new(config.dir.clone())),
    }
}

/// Runs the churn task graph against one set of stores.
pub struct PipelineOrchestrator {
    graph: TaskGraph,
    artifacts: Arc<dyn ArtifactStore>,
}

impl PipelineOrchestrator {
    pub fn new(steps: Vec<Arc<dyn PipelineStep>>, artifacts: Arc<dyn ArtifactStore>) -> Result<Self> {
        Ok(Self {
            graph: TaskGraph::new(steps)?,
            artifacts,
        })
    }

    pub fn from_config(
        blobs: Arc<dyn BlobStore>,
        sink: Arc<dyn RelationalSink>,
        sources: &SourcesConfig,
        artifacts: &ArtifactConfig,
    ) -> Result<Self> {
        Self::new(churn_steps(blobs, sink, sources), artifact_store(artifacts))
    }

    pub fn graph(&self) -> &TaskGraph {
        &self.graph
    }

    pub async fn run(&self) -> RunReport {
        info!("📋 Running {} units", self.graph.len());
        self.graph.run(self.artifacts.clone()).await
    }
}
