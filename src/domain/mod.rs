use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::SchemaError;

mod cell;

pub use cell::Cell;
use cell::NULL_CELL;

/// A table exactly as the source collaborator handed it over: header names in
/// source casing and rows of cells in header order.
#[derive(Debug, Clone, PartialEq)]
pub struct RawTable {
    pub name: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl RawTable {
    pub fn new(name: impl Into<String>, headers: Vec<String>, rows: Vec<Vec<Cell>>) -> Self {
        Self {
            name: name.into(),
            headers,
            rows,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Short rows read as `Null` past their end.
    pub fn cell(&self, row: usize, column: usize) -> &Cell {
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .unwrap_or(&NULL_CELL)
    }

    /// SHA-256 over headers and cells, hex encoded. Two runs over the same
    /// snapshot record the same fingerprint.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for header in &self.headers {
            hasher.update(header.as_bytes());
            hasher.update([0x1f]);
        }
        hasher.update([0x1e]);
        for row in &self.rows {
            for cell in row {
                match cell {
                    Cell::Null => hasher.update([0x00]),
                    Cell::Text(s) => {
                        hasher.update([0x01]);
                        hasher.update(s.as_bytes());
                    }
                    Cell::Number(n) => {
                        hasher.update([0x02]);
                        hasher.update(n.to_le_bytes());
                    }
                    Cell::Date(d) => {
                        hasher.update([0x03]);
                        hasher.update(d.format("%Y-%m-%d").to_string().as_bytes());
                    }
                }
                hasher.update([0x1f]);
            }
            hasher.update([0x1e]);
        }
        hex::encode(hasher.finalize())
    }
}

/// A row after schema normalization. `values` is aligned with the owning
/// table's `columns`; the code column already holds the canonical code.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalRecord {
    pub occupation_code: String,
    pub occupation_title: Option<String>,
    pub values: Vec<Cell>,
}

impl CanonicalRecord {
    pub fn value(&self, column: usize) -> &Cell {
        self.values.get(column).unwrap_or(&NULL_CELL)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalTable {
    pub name: String,
    pub columns: Vec<String>,
    pub records: Vec<CanonicalRecord>,
    /// Rows removed because their occupation code was missing or blank.
    pub dropped_missing_code: usize,
}

impl CanonicalTable {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    pub fn require_column(&self, column: &str) -> Result<usize, SchemaError> {
        self.column_index(column)
            .ok_or_else(|| SchemaError::MissingColumn {
                column: column.to_string(),
                table: self.name.clone(),
            })
    }

    /// Back to raw form, e.g. to feed a canonical table through the normalizer again.
    pub fn to_raw(&self) -> RawTable {
        RawTable::new(
            self.name.clone(),
            self.columns.clone(),
            self.records.iter().map(|r| r.values.clone()).collect(),
        )
    }
}

/// A canonical row with its annualized wage, if one could be computed.
/// This is what the record filter operates on.
#[derive(Debug, Clone, PartialEq)]
pub struct WageCandidate {
    pub record: CanonicalRecord,
    pub annual_wage: Option<f64>,
}

/// An observation-side row that survived filtering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WageObservation {
    pub occupation_code: String,
    pub occupation_title: Option<String>,
    pub employer_name: Option<String>,
    pub annual_wage: f64,
}

/// A reference-side (survey) row that survived filtering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceWage {
    pub occupation_code: String,
    pub occupation_title: Option<String>,
    pub avg_local_wage: f64,
}

/// One joined row: an observed wage next to the local benchmark for the same code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciledRecord {
    pub occupation_code: String,
    pub employer_name: Option<String>,
    pub occupation_title: Option<String>,
    pub reference_title: Option<String>,
    pub annual_wage: f64,
    pub avg_local_wage: f64,
    pub wage_diff: Option<f64>,
}

impl WageCandidate {
    /// Project into an observation. `None` when no wage could be computed.
    pub fn into_observation(self, employer_column: Option<usize>) -> Option<WageObservation> {
        let annual_wage = self.annual_wage?;
        let employer_name = employer_column.and_then(|i| self.record.value(i).as_trimmed_text());
        Some(WageObservation {
            occupation_code: self.record.occupation_code,
            occupation_title: self.record.occupation_title,
            employer_name,
            annual_wage,
        })
    }

    pub fn into_reference(self) -> Option<ReferenceWage> {
        let avg_local_wage = self.annual_wage?;
        Some(ReferenceWage {
            occupation_code: self.record.occupation_code,
            occupation_title: self.record.occupation_title,
            avg_local_wage,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> RawTable {
        RawTable::new(
            "obs",
            vec!["SOC_CODE".to_string(), "WAGE".to_string()],
            vec![
                vec![Cell::from("15-1132.00"), Cell::Number(100000.0)],
                vec![Cell::from("29-1021")],
            ],
        )
    }

    #[test]
    fn short_rows_read_as_null() {
        let t = table();
        assert!(t.cell(1, 1).is_null());
        assert!(t.cell(7, 0).is_null());
    }

    #[test]
    fn fingerprint_is_stable_and_content_sensitive() {
        let a = table();
        let b = table();
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.fingerprint().len(), 64);

        let mut c = table();
        c.rows[0][1] = Cell::Number(100001.0);
        assert_ne!(a.fingerprint(), c.fingerprint());
    }

    #[test]
    fn candidate_without_wage_does_not_project() {
        let candidate = WageCandidate {
            record: CanonicalRecord {
                occupation_code: "15-1132".to_string(),
                occupation_title: None,
                values: vec![],
            },
            annual_wage: None,
        };
        assert!(candidate.clone().into_observation(None).is_none());
        assert!(candidate.into_reference().is_none());
    }
}
