use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Row-count effect of one named stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageReport {
    /// Which dataset the stage ran on (`observation` / `reference`).
    pub side: String,
    pub stage: String,
    pub input_rows: usize,
    pub output_rows: usize,
}

impl StageReport {
    pub fn new(side: &str, stage: &str, input_rows: usize, output_rows: usize) -> Self {
        Self {
            side: side.to_string(),
            stage: stage.to_string(),
            input_rows,
            output_rows,
        }
    }

    pub fn removed(&self) -> usize {
        self.input_rows.saturating_sub(self.output_rows)
    }
}

/// Row-level problems that exclude a row without failing the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataQualityKind {
    MissingOccupationCode,
    UnparseableDate,
    NonNumericWage,
    UnrecognizedWageUnit,
}

impl DataQualityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataQualityKind::MissingOccupationCode => "missing_occupation_code",
            DataQualityKind::UnparseableDate => "unparseable_date",
            DataQualityKind::NonNumericWage => "non_numeric_wage",
            DataQualityKind::UnrecognizedWageUnit => "unrecognized_wage_unit",
        }
    }
}

impl fmt::Display for DataQualityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Counts per (side, kind).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataQualityCounts {
    counts: BTreeMap<String, BTreeMap<DataQualityKind, usize>>,
}

impl DataQualityCounts {
    pub fn add(&mut self, side: &str, kind: DataQualityKind, n: usize) {
        if n == 0 {
            return;
        }
        *self
            .counts
            .entry(side.to_string())
            .or_default()
            .entry(kind)
            .or_default() += n;
    }

    pub fn get(&self, side: &str, kind: DataQualityKind) -> usize {
        self.counts
            .get(side)
            .and_then(|by_kind| by_kind.get(&kind))
            .copied()
            .unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.counts.values().flat_map(|m| m.values()).sum()
    }

    pub fn merge(&mut self, other: &DataQualityCounts) {
        for (side, by_kind) in &other.counts {
            for (kind, n) in by_kind {
                self.add(side, *kind, *n);
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, DataQualityKind, usize)> {
        self.counts.iter().flat_map(|(side, by_kind)| {
            by_kind.iter().map(move |(kind, n)| (side.as_str(), *kind, *n))
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PipelineWarning {
    /// The join matched nothing. The (empty) result is still handed to persistence.
    EmptyJoinResult {
        observation_rows: usize,
        reference_rows: usize,
    },
}

impl fmt::Display for PipelineWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineWarning::EmptyJoinResult {
                observation_rows,
                reference_rows,
            } => write!(
                f,
                "join produced no rows ({} observations, {} references)",
                observation_rows, reference_rows
            ),
        }
    }
}

/// Everything a run reports about itself besides its output tables.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Diagnostics {
    pub stages: Vec<StageReport>,
    pub data_quality: DataQualityCounts,
    pub warnings: Vec<PipelineWarning>,
}

impl Diagnostics {
    pub fn stage(&self, side: &str, stage: &str) -> Option<&StageReport> {
        self.stages.iter().find(|s| s.side == side && s.stage == stage)
    }
}
