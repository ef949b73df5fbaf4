//! Metrics for the reconciliation pipeline
//!
//! Thin wrappers over the `metrics` macros, grouped by pipeline phase, using
//! Prometheus naming conventions. Without an installed recorder every call is
//! a no-op, so library users and tests pay nothing.

use std::fmt;
use std::sync::OnceLock;
use tracing::info;

/// Enum representing all metric names used in the system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricName {
    // Normalize metrics
    NormalizeRowsIn,
    NormalizeRowsDropped,

    // Filter metrics
    FilterStageRowsIn,
    FilterStageRowsOut,
    DataQualityIssues,

    // Resolve metrics
    ResolveRowsCollapsed,

    // Reconcile metrics
    ReconcileRowsJoined,
    ReconcileEmptyJoins,

    // Run metrics
    RunsCompleted,
    RunsFailed,
    RunDuration,
}

impl MetricName {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::NormalizeRowsIn => "wage_recon_normalize_rows_in_total",
            MetricName::NormalizeRowsDropped => "wage_recon_normalize_rows_dropped_total",
            MetricName::FilterStageRowsIn => "wage_recon_filter_stage_rows_in_total",
            MetricName::FilterStageRowsOut => "wage_recon_filter_stage_rows_out_total",
            MetricName::DataQualityIssues => "wage_recon_data_quality_issues_total",
            MetricName::ResolveRowsCollapsed => "wage_recon_resolve_rows_collapsed_total",
            MetricName::ReconcileRowsJoined => "wage_recon_reconcile_rows_joined",
            MetricName::ReconcileEmptyJoins => "wage_recon_reconcile_empty_joins_total",
            MetricName::RunsCompleted => "wage_recon_runs_completed_total",
            MetricName::RunsFailed => "wage_recon_runs_failed_total",
            MetricName::RunDuration => "wage_recon_run_duration_seconds",
        }
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

static METRICS_HANDLE: OnceLock<metrics_exporter_prometheus::PrometheusHandle> = OnceLock::new();

/// Install the Prometheus recorder. Safe to call more than once.
pub fn init() -> Result<(), Box<dyn std::error::Error>> {
    if METRICS_HANDLE.get().is_some() {
        return Ok(());
    }
    let handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {}", e))?;
    METRICS_HANDLE.set(handle).ok();
    info!("Metrics system initialized");
    Ok(())
}

/// Prometheus text exposition of everything recorded so far, if initialized.
pub fn render() -> Option<String> {
    METRICS_HANDLE.get().map(|handle| handle.render())
}

// ============================================================================
// Normalize Metrics
// ============================================================================

pub mod normalize {
    use super::MetricName;

    pub fn table_normalized(side: &str, input_rows: usize, dropped: usize) {
        ::metrics::counter!(MetricName::NormalizeRowsIn.as_str(), "side" => side.to_string())
            .increment(input_rows as u64);
        ::metrics::counter!(MetricName::NormalizeRowsDropped.as_str(), "side" => side.to_string())
            .increment(dropped as u64);
    }
}

// ============================================================================
// Filter Metrics
// ============================================================================

pub mod filter {
    use super::MetricName;

    pub fn stage_completed(side: &str, stage: &str, input_rows: usize, output_rows: usize) {
        ::metrics::counter!(
            MetricName::FilterStageRowsIn.as_str(),
            "side" => side.to_string(),
            "stage" => stage.to_string()
        )
        .increment(input_rows as u64);
        ::metrics::counter!(
            MetricName::FilterStageRowsOut.as_str(),
            "side" => side.to_string(),
            "stage" => stage.to_string()
        )
        .increment(output_rows as u64);
    }

    pub fn data_quality_issue(side: &str, kind: &str, count: usize) {
        ::metrics::counter!(
            MetricName::DataQualityIssues.as_str(),
            "side" => side.to_string(),
            "kind" => kind.to_string()
        )
        .increment(count as u64);
    }
}

// ============================================================================
// Resolve Metrics
// ============================================================================

pub mod resolve {
    use super::MetricName;

    pub fn rows_collapsed(side: &str, policy: &str, collapsed: usize) {
        ::metrics::counter!(
            MetricName::ResolveRowsCollapsed.as_str(),
            "side" => side.to_string(),
            "policy" => policy.to_string()
        )
        .increment(collapsed as u64);
    }
}

// ============================================================================
// Reconcile Metrics
// ============================================================================

pub mod reconcile {
    use super::MetricName;

    pub fn rows_joined(count: usize) {
        ::metrics::gauge!(MetricName::ReconcileRowsJoined.as_str()).set(count as f64);
        if count == 0 {
            ::metrics::counter!(MetricName::ReconcileEmptyJoins.as_str()).increment(1);
        }
    }
}

// ============================================================================
// Run Metrics
// ============================================================================

pub mod run {
    use super::MetricName;

    pub fn completed(duration_secs: f64) {
        ::metrics::counter!(MetricName::RunsCompleted.as_str()).increment(1);
        ::metrics::histogram!(MetricName::RunDuration.as_str()).record(duration_secs);
    }

    pub fn failed(stage: &str) {
        ::metrics::counter!(MetricName::RunsFailed.as_str(), "stage" => stage.to_string()).increment(1);
    }
}
