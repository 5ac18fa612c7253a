//! Star-schema projections of a cleaned record set.

use tracing::info;

use crate::constants::*;
use crate::error::Result;
use crate::types::{Column, ColumnType, RecordSet, SourceTag, TableRow, Value};

/// Strict Yes/No to boolean; anything outside `{Yes, No}` is null.
pub fn yes_no_flag(value: &Value) -> Option<bool> {
    match value.as_str() {
        Some("Yes") => Some(true),
        Some("No") => Some(false),
        _ => None,
    }
}

fn id_of(value: &Value) -> String {
    value.render().unwrap_or_default()
}

#[derive(Debug, Clone, PartialEq)]
pub struct CustomerDimRow {
    pub customer_id: String,
    pub gender: Value,
    pub is_senior_citizen: bool,
    pub has_partner: Option<bool>,
    pub has_dependents: Option<bool>,
    pub data_source: SourceTag,
}

impl TableRow for CustomerDimRow {
    fn columns() -> Vec<Column> {
        vec![
            Column::new("customer_id", ColumnType::Str),
            Column::new("gender", ColumnType::Str),
            Column::new("is_senior_citizen", ColumnType::Bool),
            Column::new("has_partner", ColumnType::Bool),
            Column::new("has_dependents", ColumnType::Bool),
            Column::new("data_source", ColumnType::Str),
        ]
    }

    fn into_row(self) -> Vec<Value> {
        vec![
            Value::Str(self.customer_id),
            self.gender,
            Value::Bool(self.is_senior_citizen),
            Value::from_opt_bool(self.has_partner),
            Value::from_opt_bool(self.has_dependents),
            Value::Str(self.data_source.to_string()),
        ]
    }
}

/// Categorical service columns are passed through verbatim since several
/// carry a third "No internet service" state.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceDimRow {
    pub customer_id: String,
    pub phone_service: Option<bool>,
    pub multiple_lines: Value,
    pub internet_service: Value,
    pub online_security: Value,
    pub online_backup: Value,
    pub device_protection: Value,
    pub tech_support: Value,
    pub streaming_tv: Value,
    pub streaming_movies: Value,
}

impl TableRow for ServiceDimRow {
    fn columns() -> Vec<Column> {
        let mut columns = vec![
            Column::new("customer_id", ColumnType::Str),
            Column::new("phone_service", ColumnType::Bool),
        ];
        columns.extend(
            [
                "multiple_lines",
                "internet_service",
                "online_security",
                "online_backup",
                "device_protection",
                "tech_support",
                "streaming_tv",
                "streaming_movies",
            ]
            .into_iter()
            .map(|name| Column::new(name, ColumnType::Any)),
        );
        columns
    }

    fn into_row(self) -> Vec<Value> {
        vec![
            Value::Str(self.customer_id),
            Value::from_opt_bool(self.phone_service),
            self.multiple_lines,
            self.internet_service,
            self.online_security,
            self.online_backup,
            self.device_protection,
            self.tech_support,
            self.streaming_tv,
            self.streaming_movies,
        ]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContractDimRow {
    pub customer_id: String,
    pub contract_type: Value,
    pub paperless_billing: Option<bool>,
    pub payment_method: Value,
}

impl TableRow for ContractDimRow {
    fn columns() -> Vec<Column> {
        vec![
            Column::new("customer_id", ColumnType::Str),
            Column::new("contract_type", ColumnType::Any),
            Column::new("paperless_billing", ColumnType::Bool),
            Column::new("payment_method", ColumnType::Any),
        ]
    }

    fn into_row(self) -> Vec<Value> {
        vec![
            Value::Str(self.customer_id),
            self.contract_type,
            Value::from_opt_bool(self.paperless_billing),
            self.payment_method,
        ]
    }
}

/// One row per customer per branch. `customer_id` links the fact to the
/// dimensions.
#[derive(Debug, Clone, PartialEq)]
pub struct FactChurnRow {
    pub customer_id: String,
    pub tenure_months: i64,
    pub monthly_charges: Option<f64>,
    pub total_charges: Option<f64>,
    pub has_churned: Option<bool>,
    pub customer_feedback: String,
    pub data_source: SourceTag,
}

impl TableRow for FactChurnRow {
    fn columns() -> Vec<Column> {
        vec![
            Column::new("customer_id", ColumnType::Str),
            Column::new("tenure_months", ColumnType::Int),
            Column::new("monthly_charges", ColumnType::Float),
            Column::new("total_charges", ColumnType::Float),
            Column::new("has_churned", ColumnType::Bool),
            Column::new("customer_feedback", ColumnType::Str),
            Column::new("data_source", ColumnType::Str),
        ]
    }

    fn into_row(self) -> Vec<Value> {
        vec![
            Value::Str(self.customer_id),
            Value::Int(self.tenure_months),
            Value::from_opt_f64(self.monthly_charges),
            Value::from_opt_f64(self.total_charges),
            Value::from_opt_bool(self.has_churned),
            Value::Str(self.customer_feedback),
            Value::Str(self.data_source.to_string()),
        ]
    }
}

pub fn customer_dimension(records: &RecordSet, tag: SourceTag) -> Result<RecordSet> {
    let ctx = "dim_customer";
    let id = records.require_column(CUSTOMER_ID, ctx)?;
    let gender = records.require_column(GENDER, ctx)?;
    let senior = records.require_column(SENIOR_CITIZEN, ctx)?;
    let partner = records.require_column(PARTNER, ctx)?;
    let dependents = records.require_column(DEPENDENTS, ctx)?;

    let rows = records.rows().iter().map(|row| CustomerDimRow {
        customer_id: id_of(&row[id]),
        gender: row[gender].clone(),
        is_senior_citizen: row[senior].as_f64().is_some_and(|n| n != 0.0),
        has_partner: yes_no_flag(&row[partner]),
        has_dependents: yes_no_flag(&row[dependents]),
        data_source: tag,
    });
    let dim = RecordSet::from_rows(rows);
    info!(source = %tag, rows = dim.len(), "Built dim_customer");
    Ok(dim)
}

pub fn service_dimension(records: &RecordSet) -> Result<RecordSet> {
    let ctx = "dim_service";
    let col = |name: &str| records.require_column(name, ctx);
    let id = col(CUSTOMER_ID)?;
    let phone = col(PHONE_SERVICE)?;
    let passthrough = [
        MULTIPLE_LINES,
        INTERNET_SERVICE,
        ONLINE_SECURITY,
        ONLINE_BACKUP,
        DEVICE_PROTECTION,
        TECH_SUPPORT,
        STREAMING_TV,
        STREAMING_MOVIES,
    ]
    .iter()
    .map(|name| col(*name))
    .collect::<Result<Vec<usize>>>()?;

    let rows = records.rows().iter().map(|row| {
        let cat = |k: usize| row[passthrough[k]].clone();
        ServiceDimRow {
            customer_id: id_of(&row[id]),
            phone_service: yes_no_flag(&row[phone]),
            multiple_lines: cat(0),
            internet_service: cat(1),
            online_security: cat(2),
            online_backup: cat(3),
            device_protection: cat(4),
            tech_support: cat(5),
            streaming_tv: cat(6),
            streaming_movies: cat(7),
        }
    });
    let dim = RecordSet::from_rows(rows);
    info!(rows = dim.len(), "Built dim_service");
    Ok(dim)
}

pub fn contract_dimension(records: &RecordSet) -> Result<RecordSet> {
    let ctx = "dim_contract";
    let id = records.require_column(CUSTOMER_ID, ctx)?;
    let contract = records.require_column(CONTRACT, ctx)?;
    let paperless = records.require_column(PAPERLESS_BILLING, ctx)?;
    let payment = records.require_column(PAYMENT_METHOD, ctx)?;

    let rows = records.rows().iter().map(|row| ContractDimRow {
        customer_id: id_of(&row[id]),
        contract_type: row[contract].clone(),
        paperless_billing: yes_no_flag(&row[paperless]),
        payment_method: row[payment].clone(),
    });
    let dim = RecordSet::from_rows(rows);
    info!(rows = dim.len(), "Built dim_contract");
    Ok(dim)
}

pub fn churn_facts(records: &RecordSet, tag: SourceTag) -> Result<RecordSet> {
    let ctx = "fact_churn";
    let id = records.require_column(CUSTOMER_ID, ctx)?;
    let tenure = records.require_column(TENURE, ctx)?;
    let monthly = records.require_column(MONTHLY_CHARGES, ctx)?;
    let total = records.require_column(TOTAL_CHARGES, ctx)?;
    let churn = records.require_column(CHURN, ctx)?;
    let feedback = records.column_index(CUSTOMER_FEEDBACK);

    let facts: Vec<FactChurnRow> = records
        .rows()
        .iter()
        .map(|row| FactChurnRow {
            customer_id: id_of(&row[id]),
            tenure_months: row[tenure].as_i64().unwrap_or(0),
            monthly_charges: row[monthly].as_f64(),
            total_charges: row[total].as_f64(),
            has_churned: yes_no_flag(&row[churn]),
            customer_feedback: feedback
                .and_then(|i| row[i].render())
                .unwrap_or_default(),
            data_source: tag,
        })
        .collect();

    let churn_known: Vec<bool> = facts.iter().filter_map(|f| f.has_churned).collect();
    let monthly_known: Vec<f64> = facts.iter().filter_map(|f| f.monthly_charges).collect();
    info!(
        source = %tag,
        rows = facts.len(),
        churn_rate_pct = mean(churn_known.iter().map(|&c| if c { 100.0 } else { 0.0 })),
        avg_monthly_charges = mean(monthly_known.iter().copied()),
        avg_tenure = mean(facts.iter().map(|f| f.tenure_months as f64)),
        "Built fact_churn"
    );

    Ok(RecordSet::from_rows(facts))
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 {
        0.0
    } else {
        sum / n as f64
    }
}

/// All four projections of one branch.
#[derive(Debug, Clone)]
pub struct StarSchema {
    pub customers: RecordSet,
    pub services: RecordSet,
    pub contracts: RecordSet,
    pub facts: RecordSet,
}

pub fn model(records: &RecordSet, tag: SourceTag) -> Result<StarSchema> {
    Ok(StarSchema {
        customers: customer_dimension(records, tag)?,
        services: service_dimension(records)?,
        contracts: contract_dimension(records)?,
        facts: churn_facts(records, tag)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::REQUIRED_COLUMNS;
    use crate::transform::clean::clean;

    fn cleaned(rows: &[(&str, &str, &str)]) -> RecordSet {
        // (customerID, Partner, Churn)
        let mut rs = RecordSet::new(
            REQUIRED_COLUMNS
                .iter()
                .map(|c| Column::new(*c, ColumnType::Any))
                .collect(),
        );
        for (id, partner, churn) in rows {
            let row = REQUIRED_COLUMNS
                .iter()
                .map(|c| match *c {
                    CUSTOMER_ID => Value::Str(id.to_string()),
                    PARTNER => Value::Str(partner.to_string()),
                    CHURN => Value::Str(churn.to_string()),
                    INTERNET_SERVICE => Value::Str("Fiber optic".into()),
                    ONLINE_SECURITY => Value::Str("No internet service".into()),
                    SENIOR_CITIZEN => Value::Int(1),
                    TENURE => Value::Int(4),
                    MONTHLY_CHARGES | TOTAL_CHARGES => Value::Float(10.0),
                    _ => Value::Str("No".into()),
                })
                .collect();
            rs.push_row(row).unwrap();
        }
        clean(&rs, SourceTag::Csv).unwrap()
    }

    #[test]
    fn projections_keep_row_count() {
        let rs = cleaned(&[("A", "Yes", "No"), ("B", "No", "Yes"), ("C", "whatever", "No")]);
        let star = model(&rs, SourceTag::Csv).unwrap();
        assert_eq!(star.customers.len(), 3);
        assert_eq!(star.services.len(), 3);
        assert_eq!(star.contracts.len(), 3);
        assert_eq!(star.facts.len(), 3);
    }

    #[test]
    fn yes_no_outside_domain_maps_to_null() {
        let rs = cleaned(&[("A", "Yes", "No"), ("C", "whatever", "No")]);
        let dim = customer_dimension(&rs, SourceTag::Json).unwrap();
        let partner = dim.column_index("has_partner").unwrap();
        assert_eq!(dim.rows()[0][partner], Value::Bool(true));
        assert_eq!(dim.rows()[1][partner], Value::Null);
        let source = dim.column_index("data_source").unwrap();
        assert_eq!(dim.rows()[0][source], Value::Str("json".into()));
        let senior = dim.column_index("is_senior_citizen").unwrap();
        assert_eq!(dim.rows()[0][senior], Value::Bool(true));
    }

    #[test]
    fn service_categories_pass_through_verbatim() {
        let rs = cleaned(&[("A", "Yes", "No")]);
        let dim = service_dimension(&rs).unwrap();
        let security = dim.column_index("online_security").unwrap();
        assert_eq!(dim.rows()[0][security], Value::Str("No internet service".into()));
    }

    #[test]
    fn absent_feedback_reads_as_empty() {
        let rs = cleaned(&[("A", "Yes", "Yes")]);
        let facts = churn_facts(&rs, SourceTag::Csv).unwrap();
        let feedback = facts.column_index("customer_feedback").unwrap();
        let churned = facts.column_index("has_churned").unwrap();
        assert_eq!(facts.rows()[0][feedback], Value::Str(String::new()));
        assert_eq!(facts.rows()[0][churned], Value::Bool(true));
    }

    #[test]
    fn missing_column_is_schema_error() {
        let rs = cleaned(&[("A", "Yes", "No")]).project(&[CUSTOMER_ID, GENDER]);
        assert!(contract_dimension(&rs).is_err());
    }
}
