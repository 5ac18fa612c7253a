use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

use super::{PipelineStep, StepContext, StepResult};
use crate::app::{BlobStore, BucketTier};
use crate::constants::{extract_unit, CHURN, RAW_TABLE};
use crate::error::Result;
use crate::pipeline::artifact::Artifact;
use crate::source::{read_source, value_counts};
use crate::types::SourceTag;

/// Reads one raw source snapshot from the raw tier.
pub struct ExtractStep {
    tag: SourceTag,
    blobs: Arc<dyn BlobStore>,
    object: String,
}

impl ExtractStep {
    pub fn new(tag: SourceTag, blobs: Arc<dyn BlobStore>, object: impl Into<String>) -> Self {
        Self {
            tag,
            blobs,
            object: object.into(),
        }
    }
}

#[async_trait]
impl PipelineStep for ExtractStep {
    async fn execute(&self, _ctx: &StepContext) -> Result<StepResult> {
        info!("📥 Extracting {} source from {}", self.tag, self.object);
        let payload = self.blobs.get(BucketTier::Raw, &self.object).await?;
        let records = read_source(self.tag, &payload)?;
        info!(source = %self.tag, churn = ?value_counts(&records, CHURN), "Churn distribution");

        let message = format!("extracted {} {} rows", records.len(), self.tag);
        Ok(StepResult::produced(Artifact::single(RAW_TABLE, records), message))
    }

    fn step_name(&self) -> &'static str {
        extract_unit(self.tag)
    }

    fn dependencies(&self) -> Vec<&'static str> {
        vec![]
    }
}
