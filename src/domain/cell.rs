use chrono::{Duration, NaiveDate, NaiveDateTime};
use std::borrow::Cow;
use std::fmt;

/// A single value from a source table.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Text(String),
    Number(f64),
    Date(NaiveDate),
}

pub(crate) static NULL_CELL: Cell = Cell::Null;

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%Y/%m/%d", "%m-%d-%Y"];
const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%m/%d/%Y %H:%M"];

// Spreadsheet serial days count from 1899-12-30. Anything outside this band is
// not a plausible date and is treated as unparseable.
const SERIAL_DATE_RANGE: std::ops::RangeInclusive<f64> = 1.0..=2_958_465.0;

impl Cell {
    /// Interpret a raw text field: blank text becomes `Null`.
    pub fn from_raw(value: &str) -> Self {
        if value.trim().is_empty() {
            Cell::Null
        } else {
            Cell::Text(value.to_string())
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }

    /// Render the cell as text. `Null` has no text form.
    pub fn as_text(&self) -> Option<Cow<'_, str>> {
        match self {
            Cell::Null => None,
            Cell::Text(s) => Some(Cow::Borrowed(s.as_str())),
            Cell::Number(n) => Some(Cow::Owned(n.to_string())),
            Cell::Date(d) => Some(Cow::Owned(d.format("%Y-%m-%d").to_string())),
        }
    }

    /// Trimmed, non-empty text, or `None`.
    pub fn as_trimmed_text(&self) -> Option<String> {
        self.as_text()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }

    /// Numeric coercion. Text may carry `$` and `,` separators; anything else
    /// (including survey suppression markers such as `*` or `#`) is non-numeric.
    pub fn as_f64(&self) -> Option<f64> {
        let value = match self {
            Cell::Number(n) => *n,
            Cell::Text(s) => {
                let cleaned: String = s
                    .trim()
                    .chars()
                    .filter(|c| *c != '$' && *c != ',')
                    .collect();
                cleaned.parse::<f64>().ok()?
            }
            Cell::Null | Cell::Date(_) => return None,
        };
        value.is_finite().then_some(value)
    }

    /// Date coercion. Unparseable values yield `None`, never an error.
    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Cell::Date(d) => Some(*d),
            Cell::Number(n) => serial_to_date(*n),
            Cell::Text(s) => parse_date(s.trim()),
            Cell::Null => None,
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_text() {
            Some(text) => f.write_str(&text),
            None => Ok(()),
        }
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::Text(value.to_string())
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        Cell::Number(value)
    }
}

impl From<NaiveDate> for Cell {
    fn from(value: NaiveDate) -> Self {
        Cell::Date(value)
    }
}

impl<T: Into<Cell>> From<Option<T>> for Cell {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Cell::Null)
    }
}

fn parse_date(text: &str) -> Option<NaiveDate> {
    if text.is_empty() {
        return None;
    }
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(text, format) {
            return Some(date);
        }
    }
    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, format) {
            return Some(dt.date());
        }
    }
    // CSV exports of spreadsheets sometimes keep the serial number as text
    text.parse::<f64>().ok().and_then(serial_to_date)
}

fn serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !SERIAL_DATE_RANGE.contains(&serial) {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    epoch.checked_add_signed(Duration::days(serial.trunc() as i64))
}
