use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{EltError, Result};
use crate::pipeline::artifact::Artifact;

/// Common trait for all pipeline steps
#[async_trait]
pub trait PipelineStep: Send + Sync {
    /// Run the step against the artifacts of its upstream units.
    async fn execute(&self, ctx: &StepContext) -> Result<StepResult>;

    /// Get the name of this pipeline step
    fn step_name(&self) -> &'static str;

    /// Upstream steps that must succeed before this one starts
    fn dependencies(&self) -> Vec<&'static str>;
}

/// What a step sees when it runs: the run id and one artifact per upstream
/// unit that produced one.
#[derive(Debug, Clone)]
pub struct StepContext {
    pub run_id: Uuid,
    inputs: BTreeMap<&'static str, Arc<Artifact>>,
}

impl StepContext {
    pub fn new(run_id: Uuid, inputs: BTreeMap<&'static str, Arc<Artifact>>) -> Self {
        Self { run_id, inputs }
    }

    pub fn input(&self, unit: &str) -> Result<&Artifact> {
        self.inputs
            .get(unit)
            .map(Arc::as_ref)
            .ok_or_else(|| EltError::Artifact(format!("no artifact from upstream unit '{unit}'")))
    }

    pub fn upstream_units(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.inputs.keys().copied()
    }
}

/// Result of executing a pipeline step
#[derive(Debug, Clone)]
pub struct StepResult {
    /// Handed to downstream units; terminal sinks produce none.
    pub artifact: Option<Artifact>,
    pub processed_count: usize,
    pub message: String,
}

impl StepResult {
    pub fn produced(artifact: Artifact, message: impl Into<String>) -> Self {
        Self {
            processed_count: artifact.row_count(),
            artifact: Some(artifact),
            message: message.into(),
        }
    }

    pub fn terminal(processed: usize, message: impl Into<String>) -> Self {
        Self {
            artifact: None,
            processed_count: processed,
            message: message.into(),
        }
    }
}

pub mod clean;
pub mod extract;
pub mod feature_engineering;
pub mod load_gold;
pub mod load_silver;
pub mod load_warehouse;

pub use clean::CleanStep;
pub use extract::ExtractStep;
pub use feature_engineering::FeatureEngineeringStep;
pub use load_gold::LoadGoldStep;
pub use load_silver::LoadSilverStep;
pub use load_warehouse::LoadWarehouseStep;
