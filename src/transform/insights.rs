//! Pre-aggregated churn statistics over an enriched record set.

use std::collections::BTreeMap;
use tracing::info;

use crate::constants::*;
use crate::error::Result;
use crate::types::{Column, ColumnType, RecordSet, SourceTag, TableRow, Value};

/// Category used for rows whose grouping cell is null.
pub const UNKNOWN_CATEGORY: &str = "Unknown";

/// One grouped statistic, keyed by `(insight_name, dimension, category, data_source)`.
#[derive(Debug, Clone, PartialEq)]
pub struct InsightRow {
    pub insight_name: String,
    pub dimension: String,
    pub category: String,
    pub total_customers: i64,
    pub churned_customers: i64,
    pub churn_rate: f64,
    pub avg_monthly_charges: Option<f64>,
    pub avg_tenure: Option<f64>,
    pub avg_total_charges: Option<f64>,
    pub data_source: SourceTag,
}

impl TableRow for InsightRow {
    fn columns() -> Vec<Column> {
        vec![
            Column::new("insight_name", ColumnType::Str),
            Column::new("dimension", ColumnType::Str),
            Column::new("category", ColumnType::Str),
            Column::new("total_customers", ColumnType::Int),
            Column::new("churned_customers", ColumnType::Int),
            Column::new("churn_rate", ColumnType::Float),
            Column::new("avg_monthly_charges", ColumnType::Float),
            Column::new("avg_tenure", ColumnType::Float),
            Column::new("avg_total_charges", ColumnType::Float),
            Column::new("data_source", ColumnType::Str),
        ]
    }

    fn into_row(self) -> Vec<Value> {
        vec![
            Value::Str(self.insight_name),
            Value::Str(self.dimension),
            Value::Str(self.category),
            Value::Int(self.total_customers),
            Value::Int(self.churned_customers),
            Value::Float(self.churn_rate),
            Value::from_opt_f64(self.avg_monthly_charges),
            Value::from_opt_f64(self.avg_tenure),
            Value::from_opt_f64(self.avg_total_charges),
            Value::Str(self.data_source.to_string()),
        ]
    }
}

/// How a dimension's grouping key is derived from a cell.
#[derive(Debug, Clone, Copy)]
enum Grouping {
    Literal,
    SeniorFlag,
}

/// `(insight_name, dimension column, grouping)` for every grouped insight.
const CATALOGUE: [(&str, &str, Grouping); 7] = [
    ("churn_by_contract", CONTRACT, Grouping::Literal),
    ("churn_by_internet", INTERNET_SERVICE, Grouping::Literal),
    ("churn_by_payment", PAYMENT_METHOD, Grouping::Literal),
    ("churn_by_tenure_group", TENURE_GROUP, Grouping::Literal),
    ("churn_by_gender", GENDER, Grouping::Literal),
    ("churn_by_senior", SENIOR_CITIZEN, Grouping::SeniorFlag),
    ("churn_by_charges_group", MONTHLY_CHARGES_GROUP, Grouping::Literal),
];

pub const OVERALL_SUMMARY: &str = "overall_summary";

fn category_of(value: &Value, grouping: Grouping) -> String {
    match grouping {
        Grouping::SeniorFlag => {
            let senior = value.as_f64() == Some(1.0);
            if senior { "Senior" } else { "Non-Senior" }.to_string()
        }
        Grouping::Literal => value
            .render()
            .unwrap_or_else(|| UNKNOWN_CATEGORY.to_string()),
    }
}

/// Round half to even at `decimals` places, so `0.25` rounds to `0.2`.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round_ties_even() / factor
}

/// Running sums for one group.
#[derive(Debug, Default)]
struct GroupStats {
    total: i64,
    churned: i64,
    monthly: (f64, usize),
    tenure: (f64, usize),
    total_charges: (f64, usize),
}

impl GroupStats {
    fn add(&mut self, churned: bool, monthly: Option<f64>, tenure: Option<f64>, total: Option<f64>) {
        self.total += 1;
        self.churned += churned as i64;
        for (acc, v) in [
            (&mut self.monthly, monthly),
            (&mut self.tenure, tenure),
            (&mut self.total_charges, total),
        ] {
            if let Some(v) = v {
                acc.0 += v;
                acc.1 += 1;
            }
        }
    }

    /// Zero for an empty group.
    fn churn_rate(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        round_to(self.churned as f64 / self.total as f64 * 100.0, 2)
    }

    fn mean((sum, n): (f64, usize), decimals: i32) -> Option<f64> {
        (n > 0).then(|| round_to(sum / n as f64, decimals))
    }

    fn into_row(self, name: &str, dimension: &str, category: String, tag: SourceTag) -> InsightRow {
        InsightRow {
            insight_name: name.to_string(),
            dimension: dimension.to_string(),
            category,
            total_customers: self.total,
            churned_customers: self.churned,
            churn_rate: self.churn_rate(),
            avg_monthly_charges: Self::mean(self.monthly, 2),
            avg_tenure: Self::mean(self.tenure, 1),
            avg_total_charges: Self::mean(self.total_charges, 2),
            data_source: tag,
        }
    }
}

/// Compute the full insight catalogue for one branch.
pub fn aggregate(records: &RecordSet, tag: SourceTag) -> Result<Vec<InsightRow>> {
    let ctx = "churn insights";
    let churn = records.require_column(CHURN, ctx)?;
    let monthly = records.require_column(MONTHLY_CHARGES, ctx)?;
    let tenure = records.require_column(TENURE, ctx)?;
    let total = records.require_column(TOTAL_CHARGES, ctx)?;
    let dimensions = CATALOGUE
        .iter()
        .map(|(name, column, grouping)| Ok((*name, *column, *grouping, records.require_column(column, ctx)?)))
        .collect::<Result<Vec<_>>>()?;

    let mut groups: Vec<BTreeMap<String, GroupStats>> =
        dimensions.iter().map(|_| BTreeMap::new()).collect();
    let mut overall = GroupStats::default();

    for row in records.rows() {
        let churned = row[churn].as_str() == Some("Yes");
        let measures = (row[monthly].as_f64(), row[tenure].as_f64(), row[total].as_f64());

        overall.add(churned, measures.0, measures.1, measures.2);
        for ((_, _, grouping, idx), groups) in dimensions.iter().zip(groups.iter_mut()) {
            groups
                .entry(category_of(&row[*idx], *grouping))
                .or_default()
                .add(churned, measures.0, measures.1, measures.2);
        }
    }

    let mut insights = Vec::new();
    for ((name, column, _, _), groups) in dimensions.iter().zip(groups) {
        insights.extend(
            groups
                .into_iter()
                .map(|(category, stats)| stats.into_row(name, column, category, tag)),
        );
    }
    insights.push(overall.into_row(OVERALL_SUMMARY, "ALL", "Total".to_string(), tag));

    info!(source = %tag, insights = insights.len(), "Created churn insights");
    Ok(insights)
}

/// Insight catalogue laid out as a record set.
pub fn create_churn_insights(records: &RecordSet, tag: SourceTag) -> Result<RecordSet> {
    aggregate(records, tag).map(RecordSet::from_rows)
}
