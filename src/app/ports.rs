use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::pipeline::PipelineOutput;

/// Bookkeeping for one completed run, persisted next to its output tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub observation_source: String,
    pub reference_source: String,
    pub observation_fingerprint: String,
    pub reference_fingerprint: String,
    pub observation_rows: usize,
    pub reference_rows: usize,
    pub reconciled_rows: usize,
}

// Output-side port: receives the complete result of a successful run
#[async_trait]
pub trait ReconciliationOutputPort: Send + Sync {
    async fn write_run(&self, run: &RunRecord, output: &PipelineOutput) -> anyhow::Result<()>;
}
