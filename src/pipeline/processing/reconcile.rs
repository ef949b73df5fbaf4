use std::collections::HashMap;
use tracing::debug;

use crate::domain::{ReconciledRecord, ReferenceWage, WageObservation};

/// `observed - reference`, or `None` when either side is not a finite number.
pub fn wage_diff(observed: f64, reference: f64) -> Option<f64> {
    let diff = observed - reference;
    diff.is_finite().then_some(diff)
}

/// Inner join on `occupation_code`.
///
/// Rows without a partner on the other side are dropped. Uniqueness is not
/// checked: duplicate codes on both sides produce every pairing, so callers
/// wanting a 1:1 join resolve duplicates first. Output follows observation
/// order, then reference order within a code.
pub fn reconcile(
    observations: &[WageObservation],
    references: &[ReferenceWage],
) -> Vec<ReconciledRecord> {
    let mut by_code: HashMap<&str, Vec<&ReferenceWage>> = HashMap::with_capacity(references.len());
    for reference in references {
        by_code
            .entry(reference.occupation_code.as_str())
            .or_default()
            .push(reference);
    }

    let mut joined = Vec::with_capacity(observations.len());
    for observation in observations {
        let Some(matches) = by_code.get(observation.occupation_code.as_str()) else {
            continue;
        };
        for reference in matches {
            joined.push(ReconciledRecord {
                occupation_code: observation.occupation_code.clone(),
                employer_name: observation.employer_name.clone(),
                occupation_title: observation.occupation_title.clone(),
                reference_title: reference.occupation_title.clone(),
                annual_wage: observation.annual_wage,
                avg_local_wage: reference.avg_local_wage,
                wage_diff: wage_diff(observation.annual_wage, reference.avg_local_wage),
            });
        }
    }

    debug!(
        observation_rows = observations.len(),
        reference_rows = references.len(),
        joined_rows = joined.len(),
        "reconciled datasets"
    );
    joined
}
