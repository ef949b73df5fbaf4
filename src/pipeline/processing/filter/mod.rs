use chrono::NaiveDate;
use std::collections::BTreeSet;
use tracing::info;

use crate::domain::{CanonicalTable, WageCandidate};
use crate::error::SchemaError;
use crate::pipeline::diagnostics::{DataQualityCounts, DataQualityKind, StageReport};

mod predicates;

pub use predicates::{
    CodeUniversePredicate, DateWindowPredicate, EntityMatchPredicate, StatusPredicate,
    WagePresentPredicate, WageRangePredicate,
};

/// Outcome of evaluating one row against one stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Keep,
    Drop,
    /// Excluded because a field could not be parsed; counted in diagnostics.
    DropDataQuality(DataQualityKind),
}

/// A single named filter stage, bound to concrete column positions.
pub trait RecordPredicate: Send + Sync {
    fn name(&self) -> &str;
    fn evaluate(&self, candidate: &WageCandidate) -> Verdict;
}

/// Unbound description of a stage. Binding resolves column names against a
/// table, so a missing column surfaces before any row is touched.
#[derive(Debug, Clone, PartialEq)]
pub enum StageSpec {
    Status { column: String, accepted: Vec<String> },
    EntityMatch { column: String, targets: Vec<String> },
    DateWindow { column: String, start: NaiveDate, end: NaiveDate },
    WagePresent,
    WageRange { min: f64, max: f64 },
    CodeUniverse(BTreeSet<String>),
}

impl StageSpec {
    pub fn bind(&self, table: &CanonicalTable) -> Result<Box<dyn RecordPredicate>, SchemaError> {
        let predicate: Box<dyn RecordPredicate> = match self {
            StageSpec::Status { column, accepted } => Box::new(StatusPredicate {
                column: table.require_column(column)?,
                accepted: accepted.iter().map(|s| s.trim().to_uppercase()).collect(),
            }),
            StageSpec::EntityMatch { column, targets } => {
                let targets: Vec<String> = targets
                    .iter()
                    .map(|t| t.trim().to_lowercase())
                    .filter(|t| !t.is_empty())
                    .collect();
                // No targets: pass-through, the column need not exist
                let column = if targets.is_empty() {
                    None
                } else {
                    Some(table.require_column(column)?)
                };
                Box::new(EntityMatchPredicate { column, targets })
            }
            StageSpec::DateWindow { column, start, end } => Box::new(DateWindowPredicate {
                column: table.require_column(column)?,
                start: *start,
                end: *end,
            }),
            StageSpec::WagePresent => Box::new(WagePresentPredicate),
            StageSpec::WageRange { min, max } => Box::new(WageRangePredicate {
                min: *min,
                max: *max,
            }),
            StageSpec::CodeUniverse(codes) => Box::new(CodeUniversePredicate {
                codes: codes.clone(),
            }),
        };
        Ok(predicate)
    }
}

#[derive(Debug, Clone, Default)]
pub struct FilterOutcome {
    pub rows: Vec<WageCandidate>,
    pub reports: Vec<StageReport>,
    pub data_quality: DataQualityCounts,
}

/// Ordered chain of stages for one side of the pipeline.
#[derive(Debug, Clone)]
pub struct RecordFilter {
    side: String,
    stages: Vec<StageSpec>,
}

impl RecordFilter {
    pub fn new(side: impl Into<String>) -> Self {
        Self {
            side: side.into(),
            stages: Vec::new(),
        }
    }

    pub fn stage(mut self, stage: StageSpec) -> Self {
        self.stages.push(stage);
        self
    }

    pub fn side(&self) -> &str {
        &self.side
    }

    pub fn stages(&self) -> &[StageSpec] {
        &self.stages
    }

    /// Run every stage in order. Row-level failures only exclude rows; the
    /// only error is a stage that references a column the table lacks.
    pub fn apply(
        &self,
        table: &CanonicalTable,
        candidates: Vec<WageCandidate>,
    ) -> Result<FilterOutcome, SchemaError> {
        let bound = self
            .stages
            .iter()
            .map(|s| s.bind(table))
            .collect::<Result<Vec<_>, _>>()?;

        let mut rows = candidates;
        let mut reports = Vec::with_capacity(bound.len());
        let mut data_quality = DataQualityCounts::default();

        for predicate in &bound {
            let input_rows = rows.len();
            rows.retain(|candidate| match predicate.evaluate(candidate) {
                Verdict::Keep => true,
                Verdict::Drop => false,
                Verdict::DropDataQuality(kind) => {
                    data_quality.add(&self.side, kind, 1);
                    false
                }
            });
            let report = StageReport::new(&self.side, predicate.name(), input_rows, rows.len());
            info!(
                side = %self.side,
                stage = %report.stage,
                input_rows = report.input_rows,
                output_rows = report.output_rows,
                "Rows after {} filter: {}",
                report.stage,
                report.output_rows
            );
            reports.push(report);
        }

        Ok(FilterOutcome {
            rows,
            reports,
            data_quality,
        })
    }
}
