use thiserror::Error;

/// Structural problems with an input table. Always fatal for a run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("columns '{first}' and '{second}' both normalize to '{column}'")]
    ColumnCollision {
        column: String,
        first: String,
        second: String,
    },

    #[error("required column '{column}' is missing from the {table} table")]
    MissingColumn { column: String, table: String },
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("no occupation codes survived the observation filters; the join would be vacuous")]
    EmptyCodeUniverse,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("TOML serialization failed: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
