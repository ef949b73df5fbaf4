use anyhow::Result;
use chrono::Utc;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::app::ports::{ReconciliationOutputPort, RunRecord};
use crate::config::PipelineConfig;
use crate::domain::RawTable;
use crate::pipeline::{PipelineOutput, PipelineState, ReconciliationPipeline};

/// A finished run: its bookkeeping record and the pipeline output.
#[derive(Debug, Clone)]
pub struct ReconciliationRun {
    pub record: RunRecord,
    pub output: PipelineOutput,
}

/// Use case for running the reconciliation pipeline and handing the result
/// to an output port
pub struct ReconcileUseCase {
    pipeline: ReconciliationPipeline,
    output: Box<dyn ReconciliationOutputPort>,
}

impl ReconcileUseCase {
    pub fn new(config: PipelineConfig, output: Box<dyn ReconciliationOutputPort>) -> Self {
        Self {
            pipeline: ReconciliationPipeline::new(config),
            output,
        }
    }

    pub fn state(&self) -> &PipelineState {
        self.pipeline.state()
    }

    /// Run the pipeline over both tables. The output port is only called for
    /// a run that reached `Done`.
    #[instrument(skip_all)]
    pub async fn execute(&mut self, observations: &RawTable, references: &RawTable) -> Result<ReconciliationRun> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        info!(%run_id, "Starting reconciliation run");

        let output = self.pipeline.run(observations, references)?;

        let record = RunRecord {
            run_id,
            started_at,
            finished_at: Utc::now(),
            observation_source: observations.name.clone(),
            reference_source: references.name.clone(),
            observation_fingerprint: observations.fingerprint(),
            reference_fingerprint: references.fingerprint(),
            observation_rows: output.observations.len(),
            reference_rows: output.references.len(),
            reconciled_rows: output.reconciled.len(),
        };

        self.output.write_run(&record, &output).await?;
        info!(
            %run_id,
            reconciled_rows = record.reconciled_rows,
            "Reconciliation run persisted"
        );

        Ok(ReconciliationRun { record, output })
    }
}
