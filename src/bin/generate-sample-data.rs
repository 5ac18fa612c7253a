//! Writes a synthetic CSV export and JSON API feed into the raw tier.
//!
//! Output is a pure function of `--seed` and `--rows`, and carries the dirty
//! patterns the cleaning engine is built for.

use anyhow::Result;
use clap::Parser;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde_json::{json, Value as Json};
use std::path::PathBuf;

use telco_churn_elt::app::{BlobStore, BucketTier};
use telco_churn_elt::config::Config;
use telco_churn_elt::infra::FsBlobStore;
use telco_churn_elt::source::REQUIRED_COLUMNS;

#[derive(Parser)]
#[command(name = "generate-sample-data")]
#[command(about = "Write seeded sample source payloads into the raw tier")]
struct Args {
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,
    /// Customers per source before duplicates are added
    #[arg(long, default_value_t = 500)]
    rows: usize,
    #[arg(long, default_value_t = 42)]
    seed: u64,
}

const CONTRACTS: [&str; 3] = ["Month-to-month", "One year", "Two year"];
const INTERNET: [&str; 3] = ["DSL", "Fiber optic", "No"];
const PAYMENT: [&str; 4] = [
    "Electronic check",
    "Mailed check",
    "Bank transfer (automatic)",
    "Credit card (automatic)",
];
const FEEDBACK: [&str; 4] = [
    "Service is reliable but pricey.",
    "Frequent outages in my area.",
    "Support resolved my issue quickly.",
    "Considering switching providers.",
];

#[derive(Debug, Clone)]
struct Customer {
    id: String,
    gender: &'static str,
    senior: bool,
    partner: bool,
    dependents: bool,
    tenure: u32,
    phone: bool,
    multiple_lines: &'static str,
    internet: &'static str,
    addons: [&'static str; 6],
    contract: &'static str,
    paperless: bool,
    payment: &'static str,
    monthly: f64,
    total: Option<f64>,
    churn: bool,
    feedback: &'static str,
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "Yes"
    } else {
        "No"
    }
}

fn customer(rng: &mut StdRng, prefix: &str, n: usize) -> Customer {
    let internet = *INTERNET.choose(rng).unwrap_or(&"No");
    let phone = rng.gen_bool(0.9);
    let mut addons = ["No internet service"; 6];
    if internet != "No" {
        for addon in addons.iter_mut() {
            *addon = yes_no(rng.gen_bool(0.4));
        }
    }
    let contract = *CONTRACTS.choose(rng).unwrap_or(&"Month-to-month");
    let tenure = rng.gen_range(0..=72);
    let monthly = (rng.gen_range(18.0..120.0_f64) * 100.0).round() / 100.0;
    let total = (tenure > 0).then(|| ((monthly * tenure as f64) * 100.0).round() / 100.0);
    let churn_odds = match contract {
        "Month-to-month" => 0.42,
        "One year" => 0.11,
        _ => 0.03,
    };
    Customer {
        id: format!("{prefix}{n:05}"),
        gender: if rng.gen_bool(0.5) { "Female" } else { "Male" },
        senior: rng.gen_bool(0.16),
        partner: rng.gen_bool(0.48),
        dependents: rng.gen_bool(0.3),
        tenure,
        phone,
        multiple_lines: if phone { yes_no(rng.gen_bool(0.45)) } else { "No phone service" },
        internet,
        addons,
        contract,
        paperless: rng.gen_bool(0.6),
        payment: *PAYMENT.choose(rng).unwrap_or(&"Mailed check"),
        monthly,
        total,
        churn: rng.gen_bool(churn_odds),
        feedback: *FEEDBACK.choose(rng).unwrap_or(&""),
    }
}

/// A generated population with a few repeated customers at the end.
fn population(rng: &mut StdRng, prefix: &str, rows: usize) -> Vec<Customer> {
    let mut customers: Vec<Customer> = (0..rows).map(|n| customer(rng, prefix, n)).collect();
    let repeats = (rows / 50).max(usize::from(rows > 0));
    for _ in 0..repeats {
        let pick = customers[rng.gen_range(0..rows)].clone();
        customers.push(pick);
    }
    customers
}

/// Money text as the CSV export writes it; some amounts are repeated with a
/// `$` separator.
fn money_text(rng: &mut StdRng, amount: f64) -> String {
    if rng.gen_bool(0.05) {
        format!("${amount:.2}${amount:.2}${amount:.2}")
    } else {
        format!("{amount:.2}")
    }
}

fn messy_yes_no(rng: &mut StdRng, flag: bool) -> String {
    let label = yes_no(flag);
    match rng.gen_range(0..10) {
        0 => label.to_uppercase(),
        1 => label.to_lowercase(),
        _ => label.to_string(),
    }
}

fn csv_export(rng: &mut StdRng, customers: &[Customer]) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    let mut header: Vec<&str> = REQUIRED_COLUMNS.to_vec();
    header.extend(["PromptInput", "CustomerFeedback"]);
    writer.write_record(&header)?;

    for c in customers {
        let total = match c.total {
            Some(t) if !rng.gen_bool(0.02) => money_text(rng, t),
            _ => " ".to_string(),
        };
        let record = vec![
            c.id.clone(),
            c.gender.to_string(),
            u8::from(c.senior).to_string(),
            messy_yes_no(rng, c.partner),
            messy_yes_no(rng, c.dependents),
            c.tenure.to_string(),
            messy_yes_no(rng, c.phone),
            c.multiple_lines.to_string(),
            c.internet.to_string(),
            c.addons[0].to_string(),
            c.addons[1].to_string(),
            c.addons[2].to_string(),
            c.addons[3].to_string(),
            c.addons[4].to_string(),
            c.addons[5].to_string(),
            c.contract.to_string(),
            messy_yes_no(rng, c.paperless),
            c.payment.to_string(),
            money_text(rng, c.monthly),
            total,
            messy_yes_no(rng, c.churn),
            format!("Describe the experience of customer {}", c.id),
            c.feedback.to_string(),
        ];
        writer.write_record(&record)?;
    }
    writer.flush()?;
    writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("Failed to finish CSV export: {}", e.error()))
}

/// Yes/No as the API sends it: usually text, sometimes a JSON boolean.
fn api_yes_no(rng: &mut StdRng, flag: bool) -> Json {
    if rng.gen_bool(0.2) {
        Json::Bool(flag)
    } else {
        Json::String(messy_yes_no(rng, flag))
    }
}

fn json_feed(rng: &mut StdRng, customers: &[Customer]) -> Result<Vec<u8>> {
    let results: Vec<Json> = customers
        .iter()
        .enumerate()
        .map(|(i, c)| {
            let total = match c.total {
                Some(t) if !rng.gen_bool(0.02) => json!(t),
                _ => json!(""),
            };
            let gender = if rng.gen_bool(0.1) {
                c.gender.to_lowercase()
            } else {
                c.gender.to_string()
            };
            let senior = if rng.gen_bool(0.3) {
                json!(c.senior)
            } else {
                json!(u8::from(c.senior))
            };
            json!({
                "customerID": c.id,
                "gender": gender,
                "SeniorCitizen": senior,
                "Partner": api_yes_no(rng, c.partner),
                "Dependents": api_yes_no(rng, c.dependents),
                "tenure": c.tenure,
                "PhoneService": api_yes_no(rng, c.phone),
                "MultipleLines": c.multiple_lines,
                "InternetService": c.internet,
                "OnlineSecurity": c.addons[0],
                "OnlineBackup": c.addons[1],
                "DeviceProtection": c.addons[2],
                "TechSupport": c.addons[3],
                "StreamingTV": c.addons[4],
                "StreamingMovies": c.addons[5],
                "Contract": c.contract,
                "PaperlessBilling": api_yes_no(rng, c.paperless),
                "PaymentMethod": c.payment,
                "MonthlyCharges": c.monthly,
                "TotalCharges": total,
                "Churn": api_yes_no(rng, c.churn),
                "CustomerFeedback": c.feedback,
                "metadata": {
                    "source": "synthetic_api",
                    "timestamp": format!("2024-01-{:02}T00:00:00Z", i % 28 + 1),
                },
            })
        })
        .collect();
    let count = results.len();
    Ok(serde_json::to_vec_pretty(&json!({ "count": count, "results": results }))?)
}

/// Both payloads for a seed, CSV first.
fn generate(seed: u64, rows: usize) -> Result<(Vec<u8>, Vec<u8>)> {
    let mut rng = StdRng::seed_from_u64(seed);
    let csv_customers = population(&mut rng, "CSV-", rows);
    let json_customers = population(&mut rng, "API-", rows);
    Ok((csv_export(&mut rng, &csv_customers)?, json_feed(&mut rng, &json_customers)?))
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();
    let mut config = if args.config.exists() {
        Config::load(&args.config)?
    } else {
        Config::default()
    };
    config.apply_env_overrides()?;

    let (csv_payload, json_payload) = generate(args.seed, args.rows)?;
    let blobs = FsBlobStore::new(config.storage.clone());
    blobs
        .put(BucketTier::Raw, &config.sources.csv_object, csv_payload)
        .await?;
    blobs
        .put(BucketTier::Raw, &config.sources.json_object, json_payload)
        .await?;

    println!(
        "✅ Wrote {} + {} sample customers (seed {}) to {}",
        args.rows,
        args.rows,
        args.seed,
        config.storage.root.join(config.storage.bucket(BucketTier::Raw)).display()
    );
    Ok(())
}
