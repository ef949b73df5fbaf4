use std::collections::{BTreeMap, HashMap};
use tracing::debug;

use crate::domain::{CanonicalRecord, CanonicalTable, Cell, RawTable};
use crate::error::SchemaError;

/// Canonical name of the designated occupation code column.
pub const OCCUPATION_CODE: &str = "occupation_code";
/// Canonical name of the designated occupation title column.
pub const OCCUPATION_TITLE: &str = "occupation_title";

/// Lowercase, spaces to underscores.
pub fn canonical_column_name(name: &str) -> String {
    name.trim().to_lowercase().replace(' ', "_")
}

/// Keep everything before the first `.`, trimmed. Blank codes are missing.
///
/// `"15-1132.00"` becomes `"15-1132"`; `"  29-1021.01 "` becomes `"29-1021"`.
pub fn canonicalize_code(cell: &Cell) -> Option<String> {
    let text = cell.as_text()?;
    let prefix = text.split('.').next().unwrap_or_default().trim();
    if prefix.is_empty() {
        None
    } else {
        Some(prefix.to_string())
    }
}

/// Produces canonical tables from raw ones. Renames are keyed by the
/// canonical form of the source column and applied after canonicalization.
#[derive(Debug, Clone, Default)]
pub struct SchemaNormalizer {
    renames: BTreeMap<String, String>,
}

impl SchemaNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_renames<I, K, V>(renames: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let renames = renames
            .into_iter()
            .map(|(from, to)| {
                (
                    canonical_column_name(from.as_ref()),
                    canonical_column_name(to.as_ref()),
                )
            })
            .collect();
        Self { renames }
    }

    fn target_name(&self, header: &str) -> String {
        let canonical = canonical_column_name(header);
        self.renames.get(&canonical).cloned().unwrap_or(canonical)
    }

    /// Canonical column list for `headers`, rejecting two inputs that land on
    /// the same name.
    pub fn canonical_columns(&self, headers: &[String]) -> Result<Vec<String>, SchemaError> {
        let mut seen: HashMap<String, &str> = HashMap::with_capacity(headers.len());
        let mut columns = Vec::with_capacity(headers.len());
        for header in headers {
            let name = self.target_name(header);
            if let Some(first) = seen.insert(name.clone(), header.as_str()) {
                return Err(SchemaError::ColumnCollision {
                    column: name,
                    first: first.to_string(),
                    second: header.clone(),
                });
            }
            columns.push(name);
        }
        Ok(columns)
    }

    /// Build a new canonical table. The input is left untouched.
    pub fn normalize(&self, raw: &RawTable) -> Result<CanonicalTable, SchemaError> {
        let columns = self.canonical_columns(&raw.headers)?;
        let code_idx = columns
            .iter()
            .position(|c| c == OCCUPATION_CODE)
            .ok_or_else(|| SchemaError::MissingColumn {
                column: OCCUPATION_CODE.to_string(),
                table: raw.name.clone(),
            })?;
        let title_idx = columns.iter().position(|c| c == OCCUPATION_TITLE);

        let mut records = Vec::with_capacity(raw.len());
        let mut dropped_missing_code = 0;

        for row in 0..raw.len() {
            let Some(code) = canonicalize_code(raw.cell(row, code_idx)) else {
                dropped_missing_code += 1;
                continue;
            };
            let mut values: Vec<Cell> = (0..columns.len()).map(|c| raw.cell(row, c).clone()).collect();
            values[code_idx] = Cell::Text(code.clone());
            let occupation_title = title_idx.and_then(|i| values[i].as_trimmed_text());
            records.push(CanonicalRecord {
                occupation_code: code,
                occupation_title,
                values,
            });
        }

        debug!(
            table = %raw.name,
            input_rows = raw.len(),
            output_rows = records.len(),
            dropped_missing_code,
            "normalized table"
        );

        Ok(CanonicalTable {
            name: raw.name.clone(),
            columns,
            records,
            dropped_missing_code,
        })
    }
}
