//! Derived analytical columns appended to a cleaned record set.

use tracing::info;

use crate::constants::*;
use crate::error::Result;
use crate::types::{Column, ColumnType, RecordSet, Value};

pub const TENURE_GROUPS: [&str; 5] = [
    "0-12 months",
    "13-24 months",
    "25-48 months",
    "49-60 months",
    "61+ months",
];

pub const MONTHLY_CHARGES_GROUPS: [&str; 5] = ["0-30$", "31-50$", "51-70$", "71-90$", "91+$"];

/// Values counted as an active service by `total_services`.
const ACTIVE_SERVICE: [&str; 3] = ["Yes", "DSL", "Fiber optic"];

/// Bucket label for a tenure in months. Zero falls in the first bucket and
/// anything past five years in the last.
pub fn tenure_group(months: f64) -> Option<&'static str> {
    if !months.is_finite() || months < 0.0 {
        return None;
    }
    let label = match months {
        m if m <= 12.0 => TENURE_GROUPS[0],
        m if m <= 24.0 => TENURE_GROUPS[1],
        m if m <= 48.0 => TENURE_GROUPS[2],
        m if m <= 60.0 => TENURE_GROUPS[3],
        _ => TENURE_GROUPS[4],
    };
    Some(label)
}

pub fn monthly_charges_group(charges: f64) -> Option<&'static str> {
    if !charges.is_finite() || charges < 0.0 {
        return None;
    }
    let label = match charges {
        c if c <= 30.0 => MONTHLY_CHARGES_GROUPS[0],
        c if c <= 50.0 => MONTHLY_CHARGES_GROUPS[1],
        c if c <= 70.0 => MONTHLY_CHARGES_GROUPS[2],
        c if c <= 90.0 => MONTHLY_CHARGES_GROUPS[3],
        _ => MONTHLY_CHARGES_GROUPS[4],
    };
    Some(label)
}

pub fn contract_risk_score(contract: &Value) -> i64 {
    match contract.as_str() {
        Some("Month-to-month") => 3,
        Some("One year") => 2,
        Some("Two year") => 1,
        _ => 2,
    }
}

/// Median of the non-null values, averaging the middle pair for even counts.
pub fn median(values: impl Iterator<Item = f64>) -> Option<f64> {
    let mut sorted: Vec<f64> = values.filter(|v| v.is_finite()).collect();
    if sorted.is_empty() {
        return None;
    }
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    Some(if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    })
}

/// Append the derived feature columns. Row count and order are preserved and
/// no existing column changes.
pub fn enrich(records: &RecordSet) -> Result<RecordSet> {
    let ctx = FEATURE_ENGINEERING;
    let tenure = records.require_column(TENURE, ctx)?;
    let monthly = records.require_column(MONTHLY_CHARGES, ctx)?;
    let total = records.require_column(TOTAL_CHARGES, ctx)?;
    let contract = records.require_column(CONTRACT, ctx)?;

    // Optional service columns; absent ones read as "No".
    let service_cols: Vec<usize> = SERVICE_COLUMNS
        .iter()
        .filter_map(|name| records.column_index(name))
        .collect();
    let is_yes = |row: &[Value], name: &str| records.value(row, name).as_str() == Some("Yes");

    let median_charges = median(records.column_values(monthly).filter_map(Value::as_f64));

    let n = records.len();
    let mut tenure_groups = Vec::with_capacity(n);
    let mut charge_groups = Vec::with_capacity(n);
    let mut services = Vec::with_capacity(n);
    let mut streaming = Vec::with_capacity(n);
    let mut security = Vec::with_capacity(n);
    let mut high_value = Vec::with_capacity(n);
    let mut avg_spend = Vec::with_capacity(n);
    let mut risk = Vec::with_capacity(n);

    for row in records.rows() {
        let months = row[tenure].as_f64();
        let monthly_charges = row[monthly].as_f64();

        tenure_groups.push(Value::from_opt_str(months.and_then(tenure_group)));
        charge_groups.push(Value::from_opt_str(
            monthly_charges.and_then(monthly_charges_group),
        ));

        let active = service_cols
            .iter()
            .filter(|&&i| {
                row[i]
                    .render()
                    .is_some_and(|v| ACTIVE_SERVICE.contains(&v.as_str()))
            })
            .count();
        services.push(Value::Int(active as i64));

        streaming.push(Value::Bool(
            is_yes(row, STREAMING_TV) || is_yes(row, STREAMING_MOVIES),
        ));
        security.push(Value::Bool(
            is_yes(row, ONLINE_SECURITY)
                || is_yes(row, ONLINE_BACKUP)
                || is_yes(row, DEVICE_PROTECTION),
        ));

        let above_median = match (monthly_charges, median_charges) {
            (Some(m), Some(med)) => m > med,
            _ => false,
        };
        high_value.push(Value::Bool(above_median));

        let spend = match months {
            Some(t) if t > 0.0 => row[total].as_f64().map(|total| total / t),
            _ => monthly_charges,
        };
        avg_spend.push(Value::from_opt_f64(spend));

        risk.push(Value::Int(contract_risk_score(&row[contract])));
    }

    let enriched = records.with_columns(vec![
        (Column::new(TENURE_GROUP, ColumnType::Str), tenure_groups),
        (Column::new(MONTHLY_CHARGES_GROUP, ColumnType::Str), charge_groups),
        (Column::new(TOTAL_SERVICES, ColumnType::Int), services),
        (Column::new(HAS_STREAMING, ColumnType::Bool), streaming),
        (Column::new(HAS_SECURITY, ColumnType::Bool), security),
        (Column::new(IS_HIGH_VALUE, ColumnType::Bool), high_value),
        (Column::new(AVG_MONTHLY_SPEND, ColumnType::Float), avg_spend),
        (Column::new(CONTRACT_RISK_SCORE, ColumnType::Int), risk),
    ])?;

    info!(
        rows = enriched.len(),
        columns = enriched.columns().len(),
        median_monthly_charges = median_charges.unwrap_or_default(),
        "Engineered features"
    );
    Ok(enriched)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base(rows: &[(i64, Option<f64>, Option<f64>, &str)]) -> RecordSet {
        let mut rs = RecordSet::new(vec![
            Column::new(CUSTOMER_ID, ColumnType::Str),
            Column::new(TENURE, ColumnType::Int),
            Column::new(MONTHLY_CHARGES, ColumnType::Float),
            Column::new(TOTAL_CHARGES, ColumnType::Float),
            Column::new(CONTRACT, ColumnType::Str),
            Column::new(INTERNET_SERVICE, ColumnType::Str),
            Column::new(STREAMING_TV, ColumnType::Str),
        ]);
        for (i, (tenure, monthly, total, contract)) in rows.iter().enumerate() {
            rs.push_row(vec![
                Value::Str(format!("C{i}")),
                Value::Int(*tenure),
                Value::from_opt_f64(*monthly),
                Value::from_opt_f64(*total),
                Value::Str(contract.to_string()),
                Value::Str(if i % 2 == 0 { "DSL" } else { "No" }.into()),
                Value::Str(if i % 2 == 0 { "Yes" } else { "No" }.into()),
            ])
            .unwrap();
        }
        rs
    }

    fn col<'a>(rs: &'a RecordSet, name: &str) -> Vec<&'a Value> {
        rs.column_values(rs.column_index(name).unwrap()).collect()
    }

    #[test]
    fn every_tenure_lands_in_exactly_one_bucket() {
        for months in 0..=400 {
            let label = tenure_group(months as f64).unwrap();
            assert_eq!(TENURE_GROUPS.iter().filter(|l| **l == label).count(), 1);
        }
        assert_eq!(tenure_group(0.0), Some("0-12 months"));
        assert_eq!(tenure_group(12.0), Some("0-12 months"));
        assert_eq!(tenure_group(13.0), Some("13-24 months"));
        assert_eq!(tenure_group(60.0), Some("49-60 months"));
        assert_eq!(tenure_group(150.0), Some("61+ months"));
    }

    #[test]
    fn charge_buckets() {
        assert_eq!(monthly_charges_group(0.0), Some("0-30$"));
        assert_eq!(monthly_charges_group(30.0), Some("0-30$"));
        assert_eq!(monthly_charges_group(30.01), Some("31-50$"));
        assert_eq!(monthly_charges_group(118.75), Some("91+$"));
        assert_eq!(monthly_charges_group(-1.0), None);
    }

    #[test]
    fn enrich_preserves_rows_and_existing_columns() {
        let rs = base(&[
            (0, Some(20.0), Some(20.0), "Month-to-month"),
            (10, Some(80.0), Some(800.0), "Two year"),
            (30, Some(50.0), None, "Something else"),
        ]);
        let out = enrich(&rs).unwrap();
        assert_eq!(out.len(), rs.len());
        assert_eq!(out.columns().len(), rs.columns().len() + 8);
        for (before, after) in rs.rows().iter().zip(out.rows()) {
            assert_eq!(&after[..before.len()], &before[..]);
        }
    }

    #[test]
    fn derived_values() {
        let rs = base(&[
            (0, Some(20.0), Some(20.0), "Month-to-month"),
            (10, Some(80.0), Some(800.0), "Two year"),
            (30, Some(50.0), None, "Something else"),
        ]);
        let out = enrich(&rs).unwrap();

        assert_eq!(
            col(&out, CONTRACT_RISK_SCORE),
            vec![&Value::Int(3), &Value::Int(1), &Value::Int(2)]
        );
        // Median of 20, 80, 50 is 50.
        assert_eq!(
            col(&out, IS_HIGH_VALUE),
            vec![&Value::Bool(false), &Value::Bool(true), &Value::Bool(false)]
        );
        assert_eq!(
            col(&out, AVG_MONTHLY_SPEND),
            vec![&Value::Float(20.0), &Value::Float(80.0), &Value::Null]
        );
        // DSL plus StreamingTV=Yes on even rows.
        assert_eq!(
            col(&out, TOTAL_SERVICES),
            vec![&Value::Int(2), &Value::Int(0), &Value::Int(2)]
        );
        assert_eq!(
            col(&out, HAS_STREAMING),
            vec![&Value::Bool(true), &Value::Bool(false), &Value::Bool(true)]
        );
        // No security columns at all.
        assert!(col(&out, HAS_SECURITY).iter().all(|v| **v == Value::Bool(false)));
    }

    #[test]
    fn enrich_is_deterministic() {
        let rs = base(&[(5, Some(99.0), Some(495.0), "One year"), (70, None, None, "Two year")]);
        assert_eq!(enrich(&rs).unwrap(), enrich(&rs).unwrap());
    }

    #[test]
    fn missing_contract_is_schema_error() {
        let rs = base(&[(1, Some(1.0), Some(1.0), "One year")]).project(&[TENURE, MONTHLY_CHARGES, TOTAL_CHARGES]);
        assert!(enrich(&rs).is_err());
    }

    #[test]
    fn median_of_even_count() {
        assert_eq!(median([1.0, 4.0, 2.0, 3.0].into_iter()), Some(2.5));
        assert_eq!(median(std::iter::empty()), None);
    }
}
