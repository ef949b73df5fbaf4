// Reconciliation pipeline: processing stages, diagnostics, and the orchestrator

pub mod diagnostics;
pub mod orchestrator;
pub mod processing;

pub use diagnostics::{DataQualityKind, Diagnostics, PipelineWarning, StageReport};
pub use orchestrator::{PipelineOutput, PipelineState, ReconciliationPipeline};
