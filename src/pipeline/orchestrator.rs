use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::time::Instant;
use tracing::{error, info, instrument, warn};

use crate::config::PipelineConfig;
use crate::domain::{CanonicalTable, RawTable, ReconciledRecord, ReferenceWage, WageObservation};
use crate::error::{PipelineError, Result};
use crate::observability::metrics;
use crate::pipeline::diagnostics::{DataQualityKind, Diagnostics, PipelineWarning, StageReport};
use crate::pipeline::processing::filter::{FilterOutcome, RecordFilter, StageSpec};
use crate::pipeline::processing::normalize::SchemaNormalizer;
use crate::pipeline::processing::reconcile::reconcile;
use crate::pipeline::processing::resolve::{resolve_with_report, KeyScope};
use crate::pipeline::processing::wage_unit::annualize_table;

pub const OBSERVATION_SIDE: &str = "observation";
pub const REFERENCE_SIDE: &str = "reference";

/// Where a run is. `Failed` can be entered from any non-terminal state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PipelineState {
    Idle,
    NormalizingObservations,
    FilteringObservations,
    DerivingCodeUniverse,
    NormalizingReferences,
    FilteringReferences,
    Resolving,
    Reconciling,
    Done,
    Failed { stage: String, reason: String },
}

impl PipelineState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineState::Idle => "idle",
            PipelineState::NormalizingObservations => "normalizing_observations",
            PipelineState::FilteringObservations => "filtering_observations",
            PipelineState::DerivingCodeUniverse => "deriving_code_universe",
            PipelineState::NormalizingReferences => "normalizing_references",
            PipelineState::FilteringReferences => "filtering_references",
            PipelineState::Resolving => "resolving",
            PipelineState::Reconciling => "reconciling",
            PipelineState::Done => "done",
            PipelineState::Failed { .. } => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineState::Done | PipelineState::Failed { .. })
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineState::Failed { stage, reason } => write!(f, "failed at {}: {}", stage, reason),
            other => f.write_str(other.as_str()),
        }
    }
}

/// The three output tables of a successful run plus its diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineOutput {
    pub observations: Vec<WageObservation>,
    pub references: Vec<ReferenceWage>,
    pub reconciled: Vec<ReconciledRecord>,
    pub diagnostics: Diagnostics,
}

/// Sequences normalization, filtering, code-universe derivation, duplicate
/// resolution and the join for one pair of input tables.
pub struct ReconciliationPipeline {
    config: PipelineConfig,
    state: PipelineState,
    history: Vec<PipelineState>,
}

impl ReconciliationPipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            state: PipelineState::Idle,
            history: vec![PipelineState::Idle],
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn state(&self) -> &PipelineState {
        &self.state
    }

    /// Every state entered so far, in order.
    pub fn history(&self) -> &[PipelineState] {
        &self.history
    }

    /// Run the whole pipeline. Inputs are only read. A pipeline can be run
    /// again; each run starts from `Idle`.
    #[instrument(skip_all, fields(observations = %observations.name, references = %references.name))]
    pub fn run(&mut self, observations: &RawTable, references: &RawTable) -> Result<PipelineOutput> {
        self.state = PipelineState::Idle;
        self.history = vec![PipelineState::Idle];
        let started = Instant::now();

        match self.execute(observations, references) {
            Ok(output) => {
                self.transition(PipelineState::Done);
                metrics::run::completed(started.elapsed().as_secs_f64());
                info!(
                    observations = output.observations.len(),
                    references = output.references.len(),
                    reconciled = output.reconciled.len(),
                    "Reconciliation pipeline complete"
                );
                Ok(output)
            }
            Err(e) => {
                let stage = self.state.as_str().to_string();
                metrics::run::failed(&stage);
                error!(stage = %stage, error = %e, "Reconciliation pipeline failed");
                self.transition(PipelineState::Failed {
                    stage,
                    reason: e.to_string(),
                });
                Err(e)
            }
        }
    }

    fn transition(&mut self, next: PipelineState) {
        info!(from = %self.state.as_str(), to = %next.as_str(), "pipeline state transition");
        self.state = next.clone();
        self.history.push(next);
    }

    fn execute(&mut self, observations: &RawTable, references: &RawTable) -> Result<PipelineOutput> {
        let mut diagnostics = Diagnostics::default();

        self.transition(PipelineState::NormalizingObservations);
        let obs_normalizer = SchemaNormalizer::with_renames(&self.config.observation.renames);
        let obs_table = normalize_side(&obs_normalizer, observations, OBSERVATION_SIDE, &mut diagnostics)?;

        self.transition(PipelineState::FilteringObservations);
        let obs_outcome = self.filter_side(
            &obs_table,
            self.observation_filter(),
            &self.config.observation.wage_column,
            self.config.observation.wage_unit_column.as_deref(),
            &mut diagnostics,
        )?;
        let employer_idx = obs_table.column_index(&self.config.observation.employer_column);
        let filtered_observations: Vec<WageObservation> = obs_outcome
            .rows
            .into_iter()
            .filter_map(|c| c.into_observation(employer_idx))
            .collect();

        self.transition(PipelineState::DerivingCodeUniverse);
        let codes: BTreeSet<String> = filtered_observations
            .iter()
            .map(|o| o.occupation_code.clone())
            .collect();
        if codes.is_empty() {
            return Err(PipelineError::EmptyCodeUniverse);
        }
        info!(codes = codes.len(), "Derived occupation code universe");

        self.transition(PipelineState::NormalizingReferences);
        let ref_normalizer = SchemaNormalizer::with_renames(&self.config.reference.renames);
        let ref_table = normalize_side(&ref_normalizer, references, REFERENCE_SIDE, &mut diagnostics)?;

        self.transition(PipelineState::FilteringReferences);
        let ref_outcome = self.filter_side(
            &ref_table,
            self.reference_filter(codes),
            &self.config.reference.wage_column,
            None,
            &mut diagnostics,
        )?;
        let filtered_references: Vec<ReferenceWage> = ref_outcome
            .rows
            .into_iter()
            .filter_map(|c| c.into_reference())
            .collect();

        self.transition(PipelineState::Resolving);
        let obs_config = &self.config.observation;
        let (observations_out, report) = resolve_with_report(
            OBSERVATION_SIDE,
            &filtered_observations,
            obs_config.key_scope,
            obs_config.dedup_policy,
        );
        record_resolution(&report, &obs_config.dedup_policy.to_string(), &mut diagnostics);

        let references_out = match self.config.reference.dedup_policy {
            Some(policy) => {
                let (resolved, report) =
                    resolve_with_report(REFERENCE_SIDE, &filtered_references, KeyScope::Occupation, policy);
                record_resolution(&report, &policy.to_string(), &mut diagnostics);
                resolved
            }
            None => filtered_references,
        };

        self.transition(PipelineState::Reconciling);
        let reconciled = reconcile(&observations_out, &references_out);
        metrics::reconcile::rows_joined(reconciled.len());
        if reconciled.is_empty() {
            let warning = PipelineWarning::EmptyJoinResult {
                observation_rows: observations_out.len(),
                reference_rows: references_out.len(),
            };
            warn!("{}", warning);
            diagnostics.warnings.push(warning);
        }

        Ok(PipelineOutput {
            observations: observations_out,
            references: references_out,
            reconciled,
            diagnostics,
        })
    }

    fn observation_filter(&self) -> RecordFilter {
        let obs = &self.config.observation;
        let filter = RecordFilter::new(OBSERVATION_SIDE)
            .stage(StageSpec::Status {
                column: obs.status_column.clone(),
                accepted: obs.accepted_statuses.clone(),
            })
            .stage(StageSpec::EntityMatch {
                column: obs.employer_column.clone(),
                targets: obs.target_employers.clone(),
            })
            .stage(StageSpec::DateWindow {
                column: obs.date_column.clone(),
                start: obs.date_window.start,
                end: obs.date_window.end,
            })
            .stage(StageSpec::WagePresent);
        if obs.outlier_filter {
            filter.stage(self.wage_range_stage())
        } else {
            filter
        }
    }

    fn reference_filter(&self, codes: BTreeSet<String>) -> RecordFilter {
        let filter = RecordFilter::new(REFERENCE_SIDE)
            .stage(StageSpec::WagePresent)
            .stage(StageSpec::CodeUniverse(codes));
        if self.config.reference.outlier_filter {
            filter.stage(self.wage_range_stage())
        } else {
            filter
        }
    }

    fn wage_range_stage(&self) -> StageSpec {
        StageSpec::WageRange {
            min: self.config.wage_range.min,
            max: self.config.wage_range.max,
        }
    }

    fn filter_side(
        &self,
        table: &CanonicalTable,
        filter: RecordFilter,
        wage_column: &str,
        unit_column: Option<&str>,
        diagnostics: &mut Diagnostics,
    ) -> Result<FilterOutcome> {
        let (candidates, unit_quality) = annualize_table(table, wage_column, unit_column, filter.side())?;
        let outcome = filter.apply(table, candidates)?;

        for report in &outcome.reports {
            metrics::filter::stage_completed(&report.side, &report.stage, report.input_rows, report.output_rows);
        }
        for (side, kind, count) in unit_quality.iter().chain(outcome.data_quality.iter()) {
            metrics::filter::data_quality_issue(side, kind.as_str(), count);
        }

        diagnostics.stages.extend(outcome.reports.iter().cloned());
        diagnostics.data_quality.merge(&unit_quality);
        diagnostics.data_quality.merge(&outcome.data_quality);
        Ok(outcome)
    }
}

fn normalize_side(
    normalizer: &SchemaNormalizer,
    raw: &RawTable,
    side: &str,
    diagnostics: &mut Diagnostics,
) -> Result<CanonicalTable> {
    let table = normalizer.normalize(raw)?;
    metrics::normalize::table_normalized(side, raw.len(), table.dropped_missing_code);
    diagnostics
        .data_quality
        .add(side, DataQualityKind::MissingOccupationCode, table.dropped_missing_code);
    diagnostics
        .stages
        .push(StageReport::new(side, "normalize", raw.len(), table.len()));
    info!(
        side,
        rows = table.len(),
        dropped_missing_code = table.dropped_missing_code,
        "Rows after removing null job codes: {}",
        table.len()
    );
    Ok(table)
}

fn record_resolution(report: &StageReport, policy: &str, diagnostics: &mut Diagnostics) {
    metrics::resolve::rows_collapsed(&report.side, policy, report.removed());
    info!(
        side = %report.side,
        policy,
        input_rows = report.input_rows,
        output_rows = report.output_rows,
        "Rows after retaining one row per key: {}",
        report.output_rows
    );
    diagnostics.stages.push(report.clone());
}
