use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::error::{PipelineError, Result};
use crate::pipeline::processing::normalize::{OCCUPATION_CODE, OCCUPATION_TITLE};
use crate::pipeline::processing::resolve::{DedupPolicy, KeyScope};

/// Environment variable naming the default config file.
pub const CONFIG_ENV: &str = "WAGE_RECON_CONFIG";
/// Environment variable naming the default SQLite database.
pub const DB_ENV: &str = "WAGE_RECON_DB";

/// Configuration for a complete reconciliation run. Every field has a default,
/// so a config file only needs to name what differs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PipelineConfig {
    pub observation: ObservationConfig,
    pub reference: ReferenceConfig,
    pub wage_range: WageRange,
    pub output: OutputConfig,
}

/// Disclosure-side settings. Column names are canonical (post-normalization).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservationConfig {
    pub status_column: String,
    pub accepted_statuses: Vec<String>,
    pub employer_column: String,
    /// Case-insensitive substrings; empty disables the employer stage.
    pub target_employers: Vec<String>,
    pub date_column: String,
    pub date_window: DateWindow,
    pub wage_column: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wage_unit_column: Option<String>,
    pub dedup_policy: DedupPolicy,
    pub key_scope: KeyScope,
    pub outlier_filter: bool,
    /// Canonical source column -> canonical target column.
    pub renames: BTreeMap<String, String>,
}

impl Default for ObservationConfig {
    fn default() -> Self {
        Self {
            status_column: "case_status".to_string(),
            accepted_statuses: vec!["CERTIFIED".to_string()],
            employer_column: "employer_name".to_string(),
            target_employers: vec!["Microsoft".to_string()],
            date_column: "received_date".to_string(),
            date_window: DateWindow::default(),
            wage_column: "wage_rate_of_pay_from".to_string(),
            wage_unit_column: Some("wage_unit_of_pay".to_string()),
            dedup_policy: DedupPolicy::Max,
            key_scope: KeyScope::Occupation,
            outlier_filter: true,
            renames: BTreeMap::from([
                ("soc_code".to_string(), OCCUPATION_CODE.to_string()),
                ("soc_title".to_string(), OCCUPATION_TITLE.to_string()),
            ]),
        }
    }
}

/// Survey-side settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReferenceConfig {
    pub wage_column: String,
    /// `None` leaves reference rows as they are; the survey is expected to
    /// carry one row per code already.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dedup_policy: Option<DedupPolicy>,
    pub outlier_filter: bool,
    pub renames: BTreeMap<String, String>,
}

impl Default for ReferenceConfig {
    fn default() -> Self {
        Self {
            wage_column: "avg_local_wage".to_string(),
            dedup_policy: None,
            outlier_filter: true,
            renames: BTreeMap::from([
                (
                    "washington_statewide_occupational_title".to_string(),
                    OCCUPATION_TITLE.to_string(),
                ),
                ("soc_code".to_string(), OCCUPATION_CODE.to_string()),
                ("annual_mean_wage".to_string(), "avg_local_wage".to_string()),
            ]),
        }
    }
}

/// Inclusive date window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl Default for DateWindow {
    fn default() -> Self {
        // FY2023 Q3 disclosure file, calendar Q2 receipts
        Self {
            start: NaiveDate::from_ymd_opt(2023, 4, 1).unwrap_or_default(),
            end: NaiveDate::from_ymd_opt(2023, 6, 30).unwrap_or_default(),
        }
    }
}

/// Plausible annual wage band, inclusive on both ends.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WageRange {
    pub min: f64,
    pub max: f64,
}

impl Default for WageRange {
    fn default() -> Self {
        Self {
            min: 20_000.0,
            max: 300_000.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub observation_table: String,
    pub reference_table: String,
    pub combined_table: String,
    pub runs_table: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            observation_table: "h1b_microsoft_roles".to_string(),
            reference_table: "oews_microsoft_roles".to_string(),
            combined_table: "h1b_oews_combined".to_string(),
            runs_table: "pipeline_runs".to_string(),
        }
    }
}

impl PipelineConfig {
    /// Load and validate a TOML config file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            PipelineError::Config(format!("Failed to read config file '{}': {}", path.display(), e))
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: PipelineConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// The variant that segments by employer and averages duplicates instead
    /// of keeping the top wage. No employer target, so every certified filing counts.
    pub fn employer_scoped_means() -> Self {
        let mut config = Self::default();
        config.observation.target_employers.clear();
        config.observation.key_scope = KeyScope::EmployerOccupation;
        config.observation.dedup_policy = DedupPolicy::Mean;
        config.reference.dedup_policy = Some(DedupPolicy::Mean);
        config
    }

    pub fn validate(&self) -> Result<()> {
        let window = &self.observation.date_window;
        if window.start > window.end {
            return Err(PipelineError::Config(format!(
                "date window starts after it ends ({} > {})",
                window.start, window.end
            )));
        }

        let range = &self.wage_range;
        if !(range.min.is_finite() && range.max.is_finite()) || range.min < 0.0 || range.min > range.max {
            return Err(PipelineError::Config(format!(
                "invalid wage range [{}, {}]",
                range.min, range.max
            )));
        }

        if self.observation.accepted_statuses.iter().all(|s| s.trim().is_empty()) {
            return Err(PipelineError::Config(
                "at least one accepted status is required".to_string(),
            ));
        }

        let tables = [
            &self.output.observation_table,
            &self.output.reference_table,
            &self.output.combined_table,
            &self.output.runs_table,
        ];
        for table in tables {
            let valid = !table.is_empty()
                && table.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
            if !valid {
                return Err(PipelineError::Config(format!(
                    "output table name '{}' must be non-empty and contain only [A-Za-z0-9_]",
                    table
                )));
            }
        }
        let mut unique: Vec<&String> = tables.to_vec();
        unique.sort();
        unique.dedup();
        if unique.len() != tables.len() {
            return Err(PipelineError::Config(
                "output table names must be distinct".to_string(),
            ));
        }

        Ok(())
    }
}
