use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tracing::debug;

use crate::domain::{ReferenceWage, WageObservation};
use crate::pipeline::diagnostics::StageReport;

/// How duplicates sharing an occupation key collapse into one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DedupPolicy {
    /// Highest wage wins; ties go to the earliest input row.
    #[default]
    Max,
    /// Arithmetic mean of the group; other fields from the first member.
    Mean,
}

impl fmt::Display for DedupPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DedupPolicy::Max => f.write_str("max"),
            DedupPolicy::Mean => f.write_str("mean"),
        }
    }
}

/// Which fields make up the grouping key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyScope {
    #[default]
    Occupation,
    EmployerOccupation,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OccupationKey {
    pub employer_name: Option<String>,
    pub occupation_code: String,
}

/// A record the resolver can group and re-wage.
pub trait WageRecord: Clone {
    fn occupation_code(&self) -> &str;

    fn employer_name(&self) -> Option<&str> {
        None
    }

    fn wage(&self) -> f64;

    fn with_wage(self, wage: f64) -> Self;

    fn key(&self, scope: KeyScope) -> OccupationKey {
        let employer_name = match scope {
            KeyScope::Occupation => None,
            KeyScope::EmployerOccupation => self.employer_name().map(str::to_string),
        };
        OccupationKey {
            employer_name,
            occupation_code: self.occupation_code().to_string(),
        }
    }
}

impl WageRecord for WageObservation {
    fn occupation_code(&self) -> &str {
        &self.occupation_code
    }

    fn employer_name(&self) -> Option<&str> {
        self.employer_name.as_deref()
    }

    fn wage(&self) -> f64 {
        self.annual_wage
    }

    fn with_wage(mut self, wage: f64) -> Self {
        self.annual_wage = wage;
        self
    }
}

impl WageRecord for ReferenceWage {
    fn occupation_code(&self) -> &str {
        &self.occupation_code
    }

    fn wage(&self) -> f64 {
        self.avg_local_wage
    }

    fn with_wage(mut self, wage: f64) -> Self {
        self.avg_local_wage = wage;
        self
    }
}

/// Collapse `records` to exactly one record per key under `policy`.
///
/// Max output is ordered by wage descending (the stable sort order); mean
/// output follows first appearance of each key.
pub fn resolve<T: WageRecord>(records: &[T], scope: KeyScope, policy: DedupPolicy) -> Vec<T> {
    let resolved = match policy {
        DedupPolicy::Max => resolve_max(records, scope),
        DedupPolicy::Mean => resolve_mean(records, scope),
    };
    debug!(
        %policy,
        input_rows = records.len(),
        output_rows = resolved.len(),
        "resolved duplicates"
    );
    resolved
}

/// `resolve` plus the stage report the orchestrator records for it.
pub fn resolve_with_report<T: WageRecord>(
    side: &str,
    records: &[T],
    scope: KeyScope,
    policy: DedupPolicy,
) -> (Vec<T>, StageReport) {
    let resolved = resolve(records, scope, policy);
    let report = StageReport::new(side, "dedup", records.len(), resolved.len());
    (resolved, report)
}

fn resolve_max<T: WageRecord>(records: &[T], scope: KeyScope) -> Vec<T> {
    let mut order: Vec<usize> = (0..records.len()).collect();
    // sort_by is stable: equal wages keep input order
    order.sort_by(|&a, &b| records[b].wage().total_cmp(&records[a].wage()));

    let mut seen = std::collections::HashSet::with_capacity(records.len());
    order
        .into_iter()
        .filter(|&i| seen.insert(records[i].key(scope)))
        .map(|i| records[i].clone())
        .collect()
}

fn resolve_mean<T: WageRecord>(records: &[T], scope: KeyScope) -> Vec<T> {
    let mut groups: Vec<(usize, f64, usize)> = Vec::new();
    let mut index: HashMap<OccupationKey, usize> = HashMap::with_capacity(records.len());

    for (i, record) in records.iter().enumerate() {
        let slot = *index.entry(record.key(scope)).or_insert_with(|| {
            groups.push((i, 0.0, 0));
            groups.len() - 1
        });
        let group = &mut groups[slot];
        group.1 += record.wage();
        group.2 += 1;
    }

    groups
        .into_iter()
        .map(|(first, sum, count)| records[first].clone().with_wage(sum / count as f64))
        .collect()
}
