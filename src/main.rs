use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

use telco_churn_elt::config::Config;
use telco_churn_elt::infra::{FsBlobStore, SqliteWarehouse};
use telco_churn_elt::logging::init_logging;
use telco_churn_elt::metrics::init_metrics;
use telco_churn_elt::pipeline::{PipelineOrchestrator, RunReport, TaskState};

#[derive(Parser)]
#[command(name = "telco_churn_elt")]
#[command(about = "Batch ELT for telco customer-churn data")]
#[command(version = "0.1.0")]
struct Cli {
    /// TOML configuration file. Defaults apply when it does not exist.
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full churn pipeline once
    Run,
    /// Print the task graph in execution order
    Graph,
    /// Create the warehouse tables and exit
    InitWarehouse,
}

fn load_config(path: &PathBuf) -> Result<Config> {
    let mut config = if path.exists() {
        Config::load(path)?
    } else {
        Config::default()
    };
    config.apply_env_overrides()?;
    Ok(config)
}

fn open_warehouse(config: &Config) -> Result<Arc<SqliteWarehouse>> {
    let warehouse = SqliteWarehouse::open(&config.warehouse).context("Failed to open warehouse")?;
    warehouse.migrate()?;
    Ok(Arc::new(warehouse))
}

fn print_summary(report: &RunReport) {
    println!("\n📊 Pipeline run {}", report.run_id);
    for outcome in &report.outcomes {
        match &outcome.state {
            TaskState::Succeeded => println!(
                "   ✅ {:<20} {:>8} rows  {:>6}ms  {}",
                outcome.unit,
                outcome.rows,
                outcome.duration.as_millis(),
                outcome.message
            ),
            TaskState::Failed(e) => println!("   ❌ {:<20} {}", outcome.unit, e),
            TaskState::Skipped { upstream } => {
                println!("   ⏭️  {:<20} skipped (upstream {} did not succeed)", outcome.unit, upstream)
            }
        }
    }
    println!("   Duration: {}ms", report.duration().num_milliseconds());
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    let _guard = init_logging(&config.logging.dir).context("Failed to initialize logging")?;
    init_metrics(config.metrics.addr.as_deref())?;

    let blobs = Arc::new(FsBlobStore::new(config.storage.clone()));

    match cli.command {
        Commands::Run => {
            println!("🚀 Running churn pipeline...");
            let sink = open_warehouse(&config)?;
            let orchestrator =
                PipelineOrchestrator::from_config(blobs, sink, &config.sources, &config.artifacts)?;
            let report = orchestrator.run().await;
            print_summary(&report);
            if let Err(e) = report.into_result() {
                error!("Pipeline run failed: {}", e);
                return Err(e.into());
            }
            println!("✅ Pipeline completed successfully!");
        }
        Commands::Graph => {
            let sink = Arc::new(SqliteWarehouse::open_in_memory()?);
            let orchestrator =
                PipelineOrchestrator::from_config(blobs, sink, &config.sources, &config.artifacts)?;
            for (unit, deps) in orchestrator.graph().units() {
                if deps.is_empty() {
                    println!("{unit}");
                } else {
                    println!("{unit} <- {}", deps.join(", "));
                }
            }
        }
        Commands::InitWarehouse => {
            open_warehouse(&config)?;
            info!("Warehouse ready at {}", config.warehouse.path);
            println!("✅ Warehouse initialized at {}", config.warehouse.path);
        }
    }
    Ok(())
}
