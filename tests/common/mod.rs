#![allow(dead_code)]

use anyhow::Result;
use serde_json::json;
use std::sync::Arc;

use telco_churn_elt::app::{BlobStore, BucketTier};
use telco_churn_elt::constants::{RAW_CSV_OBJECT, RAW_JSON_OBJECT};
use telco_churn_elt::infra::{InMemoryBlobStore, SqliteWarehouse};
use telco_churn_elt::source::REQUIRED_COLUMNS;

/// CSV export with a duplicate customer, a `$`-repeated amount, a blank
/// TotalCharges and mixed-case Yes/No values.
pub fn csv_payload() -> Vec<u8> {
    let rows = [
        "C1,Female,0,Yes,No,1,No,No phone service,DSL,No,Yes,No,No,No,No,Month-to-month,Yes,Electronic check,29.85,29.85,No,p1,Great value",
        "C2,Male,0,no,No,34,Yes,No,DSL,Yes,No,Yes,No,No,No,One year,No,Mailed check,$56.95$56.95,1889.5,No,p2,",
        "C3,Male,0,No,No,2,Yes,No,DSL,Yes,Yes,No,No,No,No,Month-to-month,Yes,Mailed check,53.85,108.15,YES,p3,Too expensive",
        "C4,female,1,No,No,0,Yes,No,Fiber optic,No,No,No,No,Yes,Yes,Two year,Yes,Bank transfer (automatic),42.30, ,No,p4,Fine",
        "C1,Female,0,Yes,No,1,No,No phone service,DSL,No,Yes,No,No,No,No,Month-to-month,Yes,Electronic check,29.85,29.85,No,p1,Great value",
    ];
    let mut text = REQUIRED_COLUMNS.join(",");
    text.push_str(",PromptInput,CustomerFeedback\n");
    for row in rows {
        text.push_str(row);
        text.push('\n');
    }
    text.into_bytes()
}

fn api_record(id: &str, tenure: i64, monthly: f64, total: serde_json::Value, churn: serde_json::Value) -> serde_json::Value {
    json!({
        "customerID": id,
        "gender": "male",
        "SeniorCitizen": true,
        "Partner": true,
        "Dependents": "No",
        "tenure": tenure,
        "PhoneService": "Yes",
        "MultipleLines": "Yes",
        "InternetService": "Fiber optic",
        "OnlineSecurity": "No",
        "OnlineBackup": "No",
        "DeviceProtection": "Yes",
        "TechSupport": "No",
        "StreamingTV": "Yes",
        "StreamingMovies": "No",
        "Contract": "Month-to-month",
        "PaperlessBilling": "yes",
        "PaymentMethod": "Electronic check",
        "MonthlyCharges": monthly,
        "TotalCharges": total,
        "Churn": churn,
        "CustomerFeedback": "ok",
        "metadata": { "source": "synthetic_api", "timestamp": "2024-01-01T00:00:00Z" },
    })
}

pub fn json_payload() -> Vec<u8> {
    json_document(vec![
        api_record("J1", 5, 70.7, json!(353.5), json!("Yes")),
        api_record("J2", 60, 99.65, json!(""), json!(false)),
        api_record("J3", 24, 35.0, json!(840.0), json!("no")),
    ])
}

/// A feed whose records lack `tenure`.
pub fn json_payload_without_tenure() -> Vec<u8> {
    let mut record = api_record("J1", 5, 70.7, json!(353.5), json!("Yes"));
    if let Some(object) = record.as_object_mut() {
        object.remove("tenure");
    }
    json_document(vec![record])
}

fn json_document(results: Vec<serde_json::Value>) -> Vec<u8> {
    serde_json::to_vec(&json!({ "results": results })).unwrap_or_default()
}

pub async fn seeded_blobs(csv: Vec<u8>, json: Vec<u8>) -> Result<Arc<InMemoryBlobStore>> {
    let blobs = Arc::new(InMemoryBlobStore::new());
    blobs.put(BucketTier::Raw, RAW_CSV_OBJECT, csv).await?;
    blobs.put(BucketTier::Raw, RAW_JSON_OBJECT, json).await?;
    Ok(blobs)
}

pub fn warehouse() -> Result<Arc<SqliteWarehouse>> {
    let warehouse = SqliteWarehouse::open_in_memory()?;
    warehouse.migrate()?;
    Ok(Arc::new(warehouse))
}
