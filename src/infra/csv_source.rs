use std::io::Read;
use std::path::Path;
use tracing::info;

use crate::domain::{Cell, RawTable};
use crate::error::Result;

/// Read a CSV file with a header row into a `RawTable` named after the file.
pub fn load_csv<P: AsRef<Path>>(path: P) -> Result<RawTable> {
    let path = path.as_ref();
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)?;
    let table = read_table(reader, name)?;
    info!(
        path = %path.display(),
        rows = table.len(),
        columns = table.headers.len(),
        "Loaded CSV table"
    );
    Ok(table)
}

/// Same as [`load_csv`] for any reader, e.g. an in-memory buffer.
pub fn load_csv_from_reader<R: Read>(source: R, name: &str) -> Result<RawTable> {
    let reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(source);
    read_table(reader, name.to_string())
}

fn read_table<R: Read>(mut reader: csv::Reader<R>, name: String) -> Result<RawTable> {
    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(Cell::from_raw).collect());
    }
    Ok(RawTable::new(name, headers, rows))
}
