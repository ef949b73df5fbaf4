use std::sync::{Arc, Mutex};
use tracing::debug;

use crate::app::ports::{ReconciliationOutputPort, RunRecord};
use crate::pipeline::PipelineOutput;

/// In-memory implementation of ReconciliationOutputPort for dry runs and tests
#[derive(Clone, Default)]
pub struct InMemoryOutputAdapter {
    runs: Arc<Mutex<Vec<(RunRecord, PipelineOutput)>>>,
}

impl InMemoryOutputAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything written so far.
    pub fn runs(&self) -> Vec<(RunRecord, PipelineOutput)> {
        self.runs.lock().map(|runs| runs.clone()).unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl ReconciliationOutputPort for InMemoryOutputAdapter {
    async fn write_run(&self, run: &RunRecord, output: &PipelineOutput) -> anyhow::Result<()> {
        let mut runs = self
            .runs
            .lock()
            .map_err(|_| anyhow::anyhow!("in-memory output lock poisoned"))?;
        runs.push((run.clone(), output.clone()));
        debug!(run_id = %run.run_id, total_runs = runs.len(), "Stored run in memory");
        Ok(())
    }
}
