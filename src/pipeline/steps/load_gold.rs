use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

use super::{PipelineStep, StepContext, StepResult};
use crate::app::{BlobStore, BucketTier};
use crate::constants::{gold_objects, FEATURE_ENGINEERING, LOAD_GOLD};
use crate::error::Result;
use crate::infra::parquet_out::encode_parquet;
use crate::metrics::PipelineMetrics;
use crate::types::SourceTag;

/// Writes every curated table of both branches to the curated tier.
pub struct LoadGoldStep {
    blobs: Arc<dyn BlobStore>,
}

impl LoadGoldStep {
    pub fn new(blobs: Arc<dyn BlobStore>) -> Self {
        Self { blobs }
    }
}

#[async_trait]
impl PipelineStep for LoadGoldStep {
    async fn execute(&self, ctx: &StepContext) -> Result<StepResult> {
        let curated = ctx.input(FEATURE_ENGINEERING)?;
        let mut rows = 0;
        let mut objects = 0;
        for tag in SourceTag::ALL {
            for (table, object) in gold_objects(tag) {
                let records = curated.table(&table)?;
                self.blobs
                    .put(BucketTier::Curated, &object, encode_parquet(records)?)
                    .await?;
                PipelineMetrics::record_rows_written(&object, records.len());
                info!(object = %object, rows = records.len(), "📦 Wrote curated object");
                rows += records.len();
                objects += 1;
            }
        }
        Ok(StepResult::terminal(rows, format!("wrote {objects} curated objects")))
    }

    fn step_name(&self) -> &'static str {
        LOAD_GOLD
    }

    fn dependencies(&self) -> Vec<&'static str> {
        vec![FEATURE_ENGINEERING]
    }
}
