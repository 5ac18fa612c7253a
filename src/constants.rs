//! Column, table, unit and object names shared across the pipeline.

use crate::types::SourceTag;

// Source columns (raw and cleaned record sets)
pub const CUSTOMER_ID: &str = "customerID";
pub const GENDER: &str = "gender";
pub const SENIOR_CITIZEN: &str = "SeniorCitizen";
pub const PARTNER: &str = "Partner";
pub const DEPENDENTS: &str = "Dependents";
pub const TENURE: &str = "tenure";
pub const PHONE_SERVICE: &str = "PhoneService";
pub const MULTIPLE_LINES: &str = "MultipleLines";
pub const INTERNET_SERVICE: &str = "InternetService";
pub const ONLINE_SECURITY: &str = "OnlineSecurity";
pub const ONLINE_BACKUP: &str = "OnlineBackup";
pub const DEVICE_PROTECTION: &str = "DeviceProtection";
pub const TECH_SUPPORT: &str = "TechSupport";
pub const STREAMING_TV: &str = "StreamingTV";
pub const STREAMING_MOVIES: &str = "StreamingMovies";
pub const CONTRACT: &str = "Contract";
pub const PAPERLESS_BILLING: &str = "PaperlessBilling";
pub const PAYMENT_METHOD: &str = "PaymentMethod";
pub const MONTHLY_CHARGES: &str = "MonthlyCharges";
pub const TOTAL_CHARGES: &str = "TotalCharges";
pub const CHURN: &str = "Churn";
pub const PROMPT_INPUT: &str = "PromptInput";
pub const CUSTOMER_FEEDBACK: &str = "CustomerFeedback";
pub const SOURCE: &str = "source";
pub const SOURCE_TIMESTAMP: &str = "source_timestamp";

// Derived feature columns
pub const TENURE_GROUP: &str = "tenure_group";
pub const MONTHLY_CHARGES_GROUP: &str = "monthly_charges_group";
pub const TOTAL_SERVICES: &str = "total_services";
pub const HAS_STREAMING: &str = "has_streaming";
pub const HAS_SECURITY: &str = "has_security";
pub const IS_HIGH_VALUE: &str = "is_high_value";
pub const AVG_MONTHLY_SPEND: &str = "avg_monthly_spend";
pub const CONTRACT_RISK_SCORE: &str = "contract_risk_score";

/// Yes/No columns normalized by the cleaning engine.
pub const YES_NO_COLUMNS: [&str; 5] = [PARTNER, DEPENDENTS, PHONE_SERVICE, PAPERLESS_BILLING, CHURN];

/// Service columns counted by `total_services`.
pub const SERVICE_COLUMNS: [&str; 9] = [
    PHONE_SERVICE,
    MULTIPLE_LINES,
    INTERNET_SERVICE,
    ONLINE_SECURITY,
    ONLINE_BACKUP,
    DEVICE_PROTECTION,
    TECH_SUPPORT,
    STREAMING_TV,
    STREAMING_MOVIES,
];

// Unit names
pub const EXTRACT_CSV: &str = "extract_csv";
pub const EXTRACT_JSON: &str = "extract_json";
pub const CLEAN_CSV: &str = "clean_csv";
pub const CLEAN_JSON: &str = "clean_json";
pub const LOAD_SILVER: &str = "load_silver";
pub const FEATURE_ENGINEERING: &str = "feature_engineering";
pub const LOAD_GOLD: &str = "load_gold";
pub const LOAD_WAREHOUSE: &str = "load_warehouse";

pub fn extract_unit(tag: SourceTag) -> &'static str {
    match tag {
        SourceTag::Csv => EXTRACT_CSV,
        SourceTag::Json => EXTRACT_JSON,
    }
}

pub fn clean_unit(tag: SourceTag) -> &'static str {
    match tag {
        SourceTag::Csv => CLEAN_CSV,
        SourceTag::Json => CLEAN_JSON,
    }
}

// Warehouse tables
pub const STAGING_CSV_TABLE: &str = "staging.telco_churn_raw";
pub const STAGING_JSON_TABLE: &str = "staging.telco_synthetic_raw";
pub const DIM_CUSTOMER_TABLE: &str = "warehouse.dim_customer";
pub const DIM_SERVICE_TABLE: &str = "warehouse.dim_service";
pub const DIM_CONTRACT_TABLE: &str = "warehouse.dim_contract";
pub const FACT_CHURN_TABLE: &str = "warehouse.fact_churn";
pub const CHURN_INSIGHTS_TABLE: &str = "warehouse.churn_insights";
pub const CUSTOMER_FEATURES_TABLE: &str = "warehouse.customer_features";

pub const WAREHOUSE_TABLES: [&str; 8] = [
    STAGING_CSV_TABLE,
    STAGING_JSON_TABLE,
    DIM_CUSTOMER_TABLE,
    DIM_SERVICE_TABLE,
    DIM_CONTRACT_TABLE,
    FACT_CHURN_TABLE,
    CHURN_INSIGHTS_TABLE,
    CUSTOMER_FEATURES_TABLE,
];

pub fn staging_table(tag: SourceTag) -> &'static str {
    match tag {
        SourceTag::Csv => STAGING_CSV_TABLE,
        SourceTag::Json => STAGING_JSON_TABLE,
    }
}

// Default raw objects
pub const RAW_CSV_OBJECT: &str = "csv/telco_churn_with_all_feedback.csv";
pub const RAW_JSON_OBJECT: &str = "json/synthetic_telco_data.json";

/// Cleaned branch output in the staging tier.
pub fn silver_object(tag: SourceTag) -> &'static str {
    match tag {
        SourceTag::Csv => "csv/telco_churn_clean.parquet",
        SourceTag::Json => "json/telco_synthetic_clean.parquet",
    }
}

/// Curated objects written per branch, as `(bundle table, object path)`.
pub fn gold_objects(tag: SourceTag) -> Vec<(String, String)> {
    let src = tag.as_str();
    [
        (GOLD_FEATURES, format!("features/customer_features_{src}.parquet")),
        (GOLD_INSIGHTS, format!("insights/churn_insights_{src}.parquet")),
        (GOLD_DIM_CUSTOMER, format!("dimensions/dim_customer_{src}.parquet")),
        (GOLD_DIM_SERVICE, format!("dimensions/dim_service_{src}.parquet")),
        (GOLD_DIM_CONTRACT, format!("dimensions/dim_contract_{src}.parquet")),
        (GOLD_FACT_CHURN, format!("facts/fact_churn_{src}.parquet")),
    ]
    .into_iter()
    .map(|(table, object)| (branch_key(tag, table), object))
    .collect()
}

// Artifact bundle table names
pub const RAW_TABLE: &str = "raw";
pub const CLEAN_TABLE: &str = "clean";
pub const GOLD_FEATURES: &str = "features";
pub const GOLD_INSIGHTS: &str = "insights";
pub const GOLD_DIM_CUSTOMER: &str = "dim_customer";
pub const GOLD_DIM_SERVICE: &str = "dim_service";
pub const GOLD_DIM_CONTRACT: &str = "dim_contract";
pub const GOLD_FACT_CHURN: &str = "fact_churn";

/// Bundle key of a per-branch table, e.g. `csv/features`.
pub fn branch_key(tag: SourceTag, table: &str) -> String {
    format!("{}/{}", tag.as_str(), table)
}
