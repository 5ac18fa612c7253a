use async_trait::async_trait;
use tracing::info;

use super::{PipelineStep, StepContext, StepResult};
use crate::constants::{clean_unit, extract_unit, CLEAN_TABLE, RAW_TABLE};
use crate::error::Result;
use crate::metrics::PipelineMetrics;
use crate::pipeline::artifact::Artifact;
use crate::transform::clean_with_stats;
use crate::types::SourceTag;

pub struct CleanStep {
    tag: SourceTag,
}

impl CleanStep {
    pub fn new(tag: SourceTag) -> Self {
        Self { tag }
    }
}

#[async_trait]
impl PipelineStep for CleanStep {
    async fn execute(&self, ctx: &StepContext) -> Result<StepResult> {
        info!("🧹 Cleaning {} records", self.tag);
        let raw = ctx.input(extract_unit(self.tag))?.table(RAW_TABLE)?;
        let (cleaned, stats) = clean_with_stats(raw, self.tag)?;
        PipelineMetrics::record_duplicates_dropped(self.tag.as_str(), stats.duplicates_dropped);

        let message = format!(
            "cleaned {} -> {} {} rows ({} duplicates dropped)",
            stats.input_rows, stats.output_rows, self.tag, stats.duplicates_dropped
        );
        Ok(StepResult::produced(Artifact::single(CLEAN_TABLE, cleaned), message))
    }

    fn step_name(&self) -> &'static str {
        clean_unit(self.tag)
    }

    fn dependencies(&self) -> Vec<&'static str> {
        vec![extract_unit(self.tag)]
    }
}
