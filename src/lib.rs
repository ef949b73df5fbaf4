pub mod config;
pub mod domain;
pub mod error;
pub mod observability;
pub mod pipeline;

// Layered boundaries for application and infrastructure
pub mod app;
pub mod infra;

pub use config::PipelineConfig;
pub use error::{PipelineError, Result, SchemaError};
pub use pipeline::{PipelineOutput, PipelineState, ReconciliationPipeline};
