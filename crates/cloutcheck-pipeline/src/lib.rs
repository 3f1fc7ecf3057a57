//! Stage pipeline: runs a batch of posts through media acquisition,
//! per-modality analysis and cleanup, and persists the resulting reports.

pub mod error;
pub mod outcome;
pub mod persist;
pub mod runner;
pub mod stage;

pub use error::PipelineError;
pub use outcome::{BatchFatal, BatchOutcome, PostStatus};
pub use persist::{AnalysisArtifact, ReportStore};
pub use runner::{Pipeline, PipelineSettings};
pub use stage::{PostProgress, PostStage, PostState};
