//! Fusion of per-post modality scores into a reputation report, and
//! brand-fit evaluation of that report against a brand policy.

pub mod aggregate;
pub mod brand_fit;
pub mod config;
pub mod reputation;
pub mod stats;

#[cfg(test)]
mod fixtures;

pub use aggregate::{
    AttemptSummary, AudioBreakdown, EngagementSummary, ImageBreakdown, ModalityBreakdown,
    TextBreakdown,
};
pub use brand_fit::{evaluate_fit, FitDetails, FitRating, FitReport, RiskFactor};
pub use config::{
    load_scoring_config, FitPenalties, ReputationWeights, ScoringConfig, SeverePenalties,
};
pub use reputation::{compute_reputation, Rating, ReputationReport, Score};

#[derive(Debug, thiserror::Error)]
pub enum ScoringError {
    #[error("failed to read scoring config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse scoring config {path}: {reason}")]
    Parse { path: String, reason: String },

    #[error("invalid scoring config: {0}")]
    Validation(String),
}
