use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::{CanonicalTable, WageCandidate};
use crate::error::SchemaError;
use crate::pipeline::diagnostics::{DataQualityCounts, DataQualityKind};

pub const HOURS_PER_YEAR: f64 = 2080.0;
pub const WEEKS_PER_YEAR: f64 = 52.0;
pub const MONTHS_PER_YEAR: f64 = 12.0;

/// Pay period a wage amount is quoted in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WageUnit {
    Hour,
    Week,
    Month,
    Year,
}

impl WageUnit {
    /// Case-insensitive, whitespace-tolerant. Unknown units are `None`.
    pub fn parse(unit: &str) -> Option<Self> {
        match unit.trim().to_lowercase().as_str() {
            "hour" => Some(WageUnit::Hour),
            "week" => Some(WageUnit::Week),
            "month" => Some(WageUnit::Month),
            "year" => Some(WageUnit::Year),
            _ => None,
        }
    }

    pub fn periods_per_year(self) -> f64 {
        match self {
            WageUnit::Hour => HOURS_PER_YEAR,
            WageUnit::Week => WEEKS_PER_YEAR,
            WageUnit::Month => MONTHS_PER_YEAR,
            WageUnit::Year => 1.0,
        }
    }
}

impl fmt::Display for WageUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WageUnit::Hour => "hour",
            WageUnit::Week => "week",
            WageUnit::Month => "month",
            WageUnit::Year => "year",
        };
        f.write_str(name)
    }
}

/// Annualize `amount` quoted per `unit`. Missing or unrecognized units leave
/// the amount unchanged; this never fails.
pub fn annualize(amount: f64, unit: Option<&str>) -> f64 {
    match unit.and_then(WageUnit::parse) {
        Some(unit) => amount * unit.periods_per_year(),
        None => amount,
    }
}

/// Pair every record of `table` with its annualized wage. Non-numeric amounts
/// yield `None` (the filter excludes them); unknown units are counted and the
/// amount is taken as already annual.
pub fn annualize_table(
    table: &CanonicalTable,
    amount_column: &str,
    unit_column: Option<&str>,
    side: &str,
) -> Result<(Vec<WageCandidate>, DataQualityCounts), SchemaError> {
    let amount_idx = table.require_column(amount_column)?;
    let unit_idx = unit_column.map(|c| table.require_column(c)).transpose()?;

    let mut data_quality = DataQualityCounts::default();
    let candidates = table
        .records
        .iter()
        .map(|record| {
            let unit = unit_idx.and_then(|i| record.value(i).as_trimmed_text());
            if let Some(unit) = unit.as_deref() {
                if WageUnit::parse(unit).is_none() {
                    data_quality.add(side, DataQualityKind::UnrecognizedWageUnit, 1);
                }
            }
            let annual_wage = record
                .value(amount_idx)
                .as_f64()
                .map(|amount| annualize(amount, unit.as_deref()));
            WageCandidate {
                record: record.clone(),
                annual_wage,
            }
        })
        .collect();

    Ok((candidates, data_quality))
}
