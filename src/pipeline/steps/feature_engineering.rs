use async_trait::async_trait;
use tracing::info;

use super::{PipelineStep, StepContext, StepResult};
use crate::constants::*;
use crate::error::Result;
use crate::pipeline::artifact::Artifact;
use crate::transform::{create_churn_insights, enrich, model};
use crate::types::SourceTag;

/// Derives features, insights and the star schema for each branch.
pub struct FeatureEngineeringStep;

/// All curated tables of one branch, plus the cleaned set for staging loads.
pub fn curate_branch(bundle: &mut Artifact, staged: &Artifact, tag: SourceTag) -> Result<()> {
    let cleaned = staged.table(&branch_key(tag, CLEAN_TABLE))?;
    let enriched = enrich(cleaned)?;
    let insights = create_churn_insights(&enriched, tag)?;
    let star = model(cleaned, tag)?;

    bundle.insert(branch_key(tag, CLEAN_TABLE), cleaned.clone());
    bundle.insert(branch_key(tag, GOLD_FEATURES), enriched);
    bundle.insert(branch_key(tag, GOLD_INSIGHTS), insights);
    bundle.insert(branch_key(tag, GOLD_DIM_CUSTOMER), star.customers);
    bundle.insert(branch_key(tag, GOLD_DIM_SERVICE), star.services);
    bundle.insert(branch_key(tag, GOLD_DIM_CONTRACT), star.contracts);
    bundle.insert(branch_key(tag, GOLD_FACT_CHURN), star.facts);
    Ok(())
}

#[async_trait]
impl PipelineStep for FeatureEngineeringStep {
    async fn execute(&self, ctx: &StepContext) -> Result<StepResult> {
        let staged = ctx.input(LOAD_SILVER)?;
        let mut bundle = Artifact::new();
        for tag in SourceTag::ALL {
            info!("🔧 Engineering features for {} branch", tag);
            curate_branch(&mut bundle, staged, tag)?;
        }
        let tables = bundle.tables().count();
        Ok(StepResult::produced(bundle, format!("built {tables} curated tables")))
    }

    fn step_name(&self) -> &'static str {
        FEATURE_ENGINEERING
    }

    fn dependencies(&self) -> Vec<&'static str> {
        vec![LOAD_SILVER]
    }
}
