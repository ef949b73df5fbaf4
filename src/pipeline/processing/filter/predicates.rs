use chrono::NaiveDate;
use std::collections::BTreeSet;

use super::{RecordPredicate, Verdict};
use crate::domain::WageCandidate;
use crate::pipeline::diagnostics::DataQualityKind;

/// Keeps rows whose status, trimmed and upper-cased, is one of `accepted`.
/// Null statuses never match.
pub struct StatusPredicate {
    pub column: usize,
    pub accepted: Vec<String>,
}

impl RecordPredicate for StatusPredicate {
    fn name(&self) -> &str {
        "status"
    }

    fn evaluate(&self, candidate: &WageCandidate) -> Verdict {
        match candidate.record.value(self.column).as_trimmed_text() {
            Some(status) if self.accepted.contains(&status.to_uppercase()) => Verdict::Keep,
            _ => Verdict::Drop,
        }
    }
}

/// Case-insensitive substring match of the employer against any target.
/// With no targets every row passes.
pub struct EntityMatchPredicate {
    pub column: Option<usize>,
    /// Already lower-cased.
    pub targets: Vec<String>,
}

impl RecordPredicate for EntityMatchPredicate {
    fn name(&self) -> &str {
        "entity_match"
    }

    fn evaluate(&self, candidate: &WageCandidate) -> Verdict {
        let Some(column) = self.column else {
            return Verdict::Keep;
        };
        if self.targets.is_empty() {
            return Verdict::Keep;
        }
        let Some(employer) = candidate.record.value(column).as_text() else {
            return Verdict::Drop;
        };
        let employer = employer.to_lowercase();
        if self.targets.iter().any(|t| employer.contains(t.as_str())) {
            Verdict::Keep
        } else {
            Verdict::Drop
        }
    }
}

/// Inclusive date window. Missing or unparseable dates are excluded.
pub struct DateWindowPredicate {
    pub column: usize,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl RecordPredicate for DateWindowPredicate {
    fn name(&self) -> &str {
        "date_window"
    }

    fn evaluate(&self, candidate: &WageCandidate) -> Verdict {
        match candidate.record.value(self.column).as_date() {
            Some(date) if date >= self.start && date <= self.end => Verdict::Keep,
            Some(_) => Verdict::Drop,
            None => Verdict::DropDataQuality(DataQualityKind::UnparseableDate),
        }
    }
}

/// Rows whose wage could not be coerced to a number.
pub struct WagePresentPredicate;

impl RecordPredicate for WagePresentPredicate {
    fn name(&self) -> &str {
        "wage_present"
    }

    fn evaluate(&self, candidate: &WageCandidate) -> Verdict {
        match candidate.annual_wage {
            Some(_) => Verdict::Keep,
            None => Verdict::DropDataQuality(DataQualityKind::NonNumericWage),
        }
    }
}

/// Outlier filter: inclusive on both ends, values outside are dropped, not clamped.
pub struct WageRangePredicate {
    pub min: f64,
    pub max: f64,
}

impl RecordPredicate for WageRangePredicate {
    fn name(&self) -> &str {
        "wage_range"
    }

    fn evaluate(&self, candidate: &WageCandidate) -> Verdict {
        match candidate.annual_wage {
            Some(wage) if wage >= self.min && wage <= self.max => Verdict::Keep,
            _ => Verdict::Drop,
        }
    }
}

/// Keeps only codes that occur in the filtered observation set.
pub struct CodeUniversePredicate {
    pub codes: BTreeSet<String>,
}

impl RecordPredicate for CodeUniversePredicate {
    fn name(&self) -> &str {
        "code_universe"
    }

    fn evaluate(&self, candidate: &WageCandidate) -> Verdict {
        if self.codes.contains(&candidate.record.occupation_code) {
            Verdict::Keep
        } else {
            Verdict::Drop
        }
    }
}
