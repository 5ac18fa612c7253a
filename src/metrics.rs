//! Pipeline metrics, recorded through the `metrics` facade. Without an
//! installed recorder every call is a no-op.

use std::net::SocketAddr;
use std::time::Duration;
use tracing::{info, warn};

use crate::error::{EltError, Result};

/// Install the Prometheus exporter when a listen address is configured.
/// Returns whether an exporter is now listening.
pub fn init_metrics(addr: Option<&str>) -> Result<bool> {
    let Some(addr) = addr else {
        return Ok(false);
    };
    let addr: SocketAddr = addr
        .parse()
        .map_err(|e| EltError::Config(format!("invalid metrics address '{addr}': {e}")))?;
    match metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
    {
        Ok(()) => {
            info!("Prometheus exporter listening on http://{}/metrics", addr);
            Ok(true)
        }
        Err(e) => {
            warn!("Prometheus exporter install failed (possibly already installed): {}", e);
            Ok(false)
        }
    }
}

/// Metrics for unit execution and sink writes.
pub struct PipelineMetrics;

impl PipelineMetrics {
    pub fn record_unit_success(unit: &str, rows: usize, duration: Duration) {
        ::metrics::counter!("elt_unit_runs_total", "unit" => unit.to_string(), "outcome" => "succeeded")
            .increment(1);
        ::metrics::counter!("elt_rows_processed_total", "unit" => unit.to_string())
            .increment(rows as u64);
        ::metrics::histogram!("elt_unit_duration_seconds", "unit" => unit.to_string())
            .record(duration.as_secs_f64());
    }

    pub fn record_unit_failure(unit: &str, duration: Duration) {
        ::metrics::counter!("elt_unit_runs_total", "unit" => unit.to_string(), "outcome" => "failed")
            .increment(1);
        ::metrics::histogram!("elt_unit_duration_seconds", "unit" => unit.to_string())
            .record(duration.as_secs_f64());
    }

    pub fn record_unit_skipped(unit: &str) {
        ::metrics::counter!("elt_unit_runs_total", "unit" => unit.to_string(), "outcome" => "skipped")
            .increment(1);
    }

    pub fn record_duplicates_dropped(source: &str, count: usize) {
        ::metrics::counter!("elt_duplicates_dropped_total", "source" => source.to_string())
            .increment(count as u64);
    }

    pub fn record_rows_written(target: &str, rows: usize) {
        ::metrics::counter!("elt_rows_written_total", "target" => target.to_string())
            .increment(rows as u64);
    }

    pub fn record_run(succeeded: bool, duration: Duration) {
        let outcome = if succeeded { "succeeded" } else { "failed" };
        ::metrics::counter!("elt_runs_total", "outcome" => outcome).increment(1);
        ::metrics::histogram!("elt_run_duration_seconds").record(duration.as_secs_f64());
    }
}
