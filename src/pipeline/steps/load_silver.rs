use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

use super::{PipelineStep, StepContext, StepResult};
use crate::app::{BlobStore, BucketTier};
use crate::constants::{branch_key, clean_unit, silver_object, CLEAN_TABLE, LOAD_SILVER};
use crate::error::Result;
use crate::infra::parquet_out::encode_parquet;
use crate::metrics::PipelineMetrics;
use crate::pipeline::artifact::Artifact;
use crate::types::SourceTag;

/// Staging barrier: both cleaned branches are written to the staging tier
/// and handed on together.
pub struct LoadSilverStep {
    blobs: Arc<dyn BlobStore>,
}

impl LoadSilverStep {
    pub fn new(blobs: Arc<dyn BlobStore>) -> Self {
        Self { blobs }
    }
}

#[async_trait]
impl PipelineStep for LoadSilverStep {
    async fn execute(&self, ctx: &StepContext) -> Result<StepResult> {
        let mut bundle = Artifact::new();
        for tag in SourceTag::ALL {
            let cleaned = ctx.input(clean_unit(tag))?.table(CLEAN_TABLE)?;
            let object = silver_object(tag);
            self.blobs
                .put(BucketTier::Staging, object, encode_parquet(cleaned)?)
                .await?;
            PipelineMetrics::record_rows_written(object, cleaned.len());
            info!(source = %tag, object, rows = cleaned.len(), "📦 Wrote staging object");
            bundle.insert(branch_key(tag, CLEAN_TABLE), cleaned.clone());
        }
        let message = format!("staged {} rows across both branches", bundle.row_count());
        Ok(StepResult::produced(bundle, message))
    }

    fn step_name(&self) -> &'static str {
        LOAD_SILVER
    }

    fn dependencies(&self) -> Vec<&'static str> {
        SourceTag::ALL.into_iter().map(clean_unit).collect()
    }
}
