use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

use super::{PipelineStep, StepContext, StepResult};
use crate::app::RelationalSink;
use crate::constants::*;
use crate::error::Result;
use crate::metrics::PipelineMetrics;
use crate::source::SourceSchema;
use crate::types::{Column, ColumnType, RecordSet, SourceTag, Value};

const FEATURE_COLUMNS: [&str; 11] = [
    CUSTOMER_ID,
    TENURE_GROUP,
    MONTHLY_CHARGES_GROUP,
    TOTAL_SERVICES,
    HAS_STREAMING,
    HAS_SECURITY,
    IS_HIGH_VALUE,
    AVG_MONTHLY_SPEND,
    CONTRACT_RISK_SCORE,
    "has_churned",
    "data_source",
];

/// Cleaned branch restricted to the columns its staging table declares.
pub fn staging_projection(cleaned: &RecordSet, tag: SourceTag) -> RecordSet {
    let schema = SourceSchema::for_source(tag);
    let names: Vec<&str> = schema
        .required
        .iter()
        .chain(schema.optional.iter())
        .copied()
        .collect();
    cleaned.project(&names)
}

/// Feature rows shaped for `warehouse.customer_features`. Any churn value
/// other than `Yes` counts as not churned.
pub fn customer_features_projection(enriched: &RecordSet, tag: SourceTag) -> Result<RecordSet> {
    let churn = enriched.require_column(CHURN, LOAD_WAREHOUSE)?;
    let has_churned = enriched
        .column_values(churn)
        .map(|v| Value::Bool(v.as_str() == Some("Yes")))
        .collect::<Vec<_>>();
    let data_source = vec![Value::Str(tag.as_str().to_string()); enriched.len()];

    let shaped = enriched
        .with_columns(vec![
            (Column::new("has_churned", ColumnType::Bool), has_churned),
            (Column::new("data_source", ColumnType::Str), data_source),
        ])?
        .project(&FEATURE_COLUMNS)
        .rename_column(CUSTOMER_ID, "customer_id");
    Ok(shaped)
}

/// Loads staging copies, the star schema and the analytical tables.
pub struct LoadWarehouseStep {
    sink: Arc<dyn RelationalSink>,
}

impl LoadWarehouseStep {
    pub fn new(sink: Arc<dyn RelationalSink>) -> Self {
        Self { sink }
    }

    async fn load(&self, table: &str, records: &RecordSet) -> Result<usize> {
        let inserted = self.sink.bulk_insert(table, records).await?;
        PipelineMetrics::record_rows_written(table, inserted);
        Ok(inserted)
    }
}

#[async_trait]
impl PipelineStep for LoadWarehouseStep {
    async fn execute(&self, ctx: &StepContext) -> Result<StepResult> {
        let curated = ctx.input(FEATURE_ENGINEERING)?;
        let mut total = 0;

        for tag in SourceTag::ALL {
            let key = |table: &str| branch_key(tag, table);
            let staged = staging_projection(curated.table(&key(CLEAN_TABLE))?, tag);
            let features = customer_features_projection(curated.table(&key(GOLD_FEATURES))?, tag)?;

            let mut loads = vec![
                (staging_table(tag), staged),
                (DIM_CUSTOMER_TABLE, curated.table(&key(GOLD_DIM_CUSTOMER))?.clone()),
                (FACT_CHURN_TABLE, curated.table(&key(GOLD_FACT_CHURN))?.clone()),
                (CHURN_INSIGHTS_TABLE, curated.table(&key(GOLD_INSIGHTS))?.clone()),
                (CUSTOMER_FEATURES_TABLE, features),
            ];
            // Service and contract dimensions are keyed by customer alone,
            // so only the CSV branch feeds them.
            if tag == SourceTag::Csv {
                loads.push((DIM_SERVICE_TABLE, curated.table(&key(GOLD_DIM_SERVICE))?.clone()));
                loads.push((DIM_CONTRACT_TABLE, curated.table(&key(GOLD_DIM_CONTRACT))?.clone()));
            }

            for (table, records) in &loads {
                total += self.load(table, records).await?;
            }
            info!("🏛️ Loaded {} branch into the warehouse", tag);
        }

        Ok(StepResult::terminal(total, format!("inserted {total} warehouse rows")))
    }

    fn step_name(&self) -> &'static str {
        LOAD_WAREHOUSE
    }

    fn dependencies(&self) -> Vec<&'static str> {
        vec![FEATURE_ENGINEERING]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::SqliteWarehouse;
    use crate::pipeline::artifact::Artifact;
    use crate::pipeline::steps::feature_engineering::curate_branch;
    use crate::source::REQUIRED_COLUMNS;
    use crate::transform::clean;
    use std::collections::BTreeMap;
    use uuid::Uuid;

    fn cleaned(tag: SourceTag, ids: &[&str]) -> RecordSet {
        let mut columns: Vec<Column> = REQUIRED_COLUMNS
            .iter()
            .map(|c| Column::new(*c, ColumnType::Any))
            .collect();
        columns.push(Column::new(CUSTOMER_FEEDBACK, ColumnType::Any));
        let mut rs = RecordSet::new(columns);
        for (i, id) in ids.iter().enumerate() {
            let mut row: Vec<Value> = REQUIRED_COLUMNS
                .iter()
                .map(|c| match *c {
                    CUSTOMER_ID => Value::Str(id.to_string()),
                    SENIOR_CITIZEN => Value::Int(0),
                    TENURE => Value::Int(12 * i as i64),
                    MONTHLY_CHARGES => Value::Float(20.0 + 30.0 * i as f64),
                    TOTAL_CHARGES => Value::Float(100.0),
                    CONTRACT => Value::Str("Month-to-month".into()),
                    CHURN => Value::Str(if i % 2 == 0 { "Yes" } else { "No" }.into()),
                    GENDER => Value::Str("Female".into()),
                    INTERNET_SERVICE => Value::Str("DSL".into()),
                    PAYMENT_METHOD => Value::Str("Mailed check".into()),
                    _ => Value::Str("No".into()),
                })
                .collect();
            row.push(Value::Str("fine".into()));
            rs.push_row(row).unwrap();
        }
        clean(&rs, tag).unwrap()
    }

    fn context() -> StepContext {
        let staged = Artifact::new()
            .with(branch_key(SourceTag::Csv, CLEAN_TABLE), cleaned(SourceTag::Csv, &["A", "B", "C"]))
            .with(branch_key(SourceTag::Json, CLEAN_TABLE), cleaned(SourceTag::Json, &["A", "D"]));
        let mut bundle = Artifact::new();
        for tag in SourceTag::ALL {
            curate_branch(&mut bundle, &staged, tag).unwrap();
        }
        let mut inputs = BTreeMap::new();
        inputs.insert(FEATURE_ENGINEERING, Arc::new(bundle));
        StepContext::new(Uuid::new_v4(), inputs)
    }

    #[test]
    fn features_projection_renames_key_and_tags_source() {
        let enriched = crate::transform::enrich(&cleaned(SourceTag::Json, &["A", "B"])).unwrap();
        let shaped = customer_features_projection(&enriched, SourceTag::Json).unwrap();
        assert_eq!(shaped.column_names(), {
            let mut names = FEATURE_COLUMNS.to_vec();
            names[0] = "customer_id";
            names
        });
        let row = &shaped.rows()[0];
        assert_eq!(shaped.value(row, "has_churned"), &Value::Bool(true));
        assert_eq!(shaped.value(row, "data_source"), &Value::Str("json".into()));
    }

    #[test]
    fn staging_projection_keeps_declared_columns_only() {
        let rs = cleaned(SourceTag::Csv, &["A"])
            .with_columns(vec![(Column::new("extra", ColumnType::Int), vec![Value::Int(1)])])
            .unwrap();
        let staged = staging_projection(&rs, SourceTag::Csv);
        assert!(!staged.has_column("extra"));
        assert!(staged.has_column(CUSTOMER_FEEDBACK));
        assert_eq!(staged.columns().len(), REQUIRED_COLUMNS.len() + 1);
    }

    #[tokio::test]
    async fn loads_every_table_and_is_idempotent() {
        let wh = Arc::new(SqliteWarehouse::open_in_memory().unwrap());
        wh.migrate().unwrap();
        let step = LoadWarehouseStep::new(wh.clone());
        let ctx = context();

        let first = step.execute(&ctx).await.unwrap();
        assert!(first.artifact.is_none());
        assert!(first.processed_count > 0);

        assert_eq!(wh.row_count(STAGING_CSV_TABLE).unwrap(), 3);
        assert_eq!(wh.row_count(STAGING_JSON_TABLE).unwrap(), 2);
        assert_eq!(wh.row_count(DIM_CUSTOMER_TABLE).unwrap(), 5);
        assert_eq!(wh.row_count(FACT_CHURN_TABLE).unwrap(), 5);
        assert_eq!(wh.row_count(DIM_SERVICE_TABLE).unwrap(), 3);
        assert_eq!(wh.row_count(DIM_CONTRACT_TABLE).unwrap(), 3);
        assert_eq!(wh.row_count(CUSTOMER_FEATURES_TABLE).unwrap(), 5);
        assert!(wh.row_count(CHURN_INSIGHTS_TABLE).unwrap() > 0);

        let second = step.execute(&ctx).await.unwrap();
        assert_eq!(second.processed_count, 0);
        assert_eq!(wh.row_count(FACT_CHURN_TABLE).unwrap(), 5);
    }
}
