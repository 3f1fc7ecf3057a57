//! Shared domain types and configuration for the CloutCheck workspace.
//!
//! Everything downstream crates exchange lives here: ingested [`Post`]s, the
//! per-modality score types that make up a [`ScoreRecord`], brand policies,
//! and the environment-driven [`AppConfig`].

pub mod app_config;
pub mod config;
pub mod ingest;
pub mod policy;
pub mod posts;
pub mod scores;

use thiserror::Error;

pub use app_config::{AppConfig, Environment, RetentionPolicy};
pub use config::{load_app_config, load_app_config_from_env};
pub use ingest::{load_posts, normalize_posts, Ingested, SkippedEntry};
pub use policy::{load_policies, load_policy, AvoidContent, BrandPolicy};
pub use posts::{slugify, Engagement, MediaKind, MediaRef, Post, PostKind};
pub use scores::{
    AudioScore, FailureReason, FrameAggregate, ImageScore, ImageSource, MediaTally, Modality,
    ModalityFailure, ModalityScore, ScoreRecord, ScoreRecordBuilder, SentimentLabel, TextScore,
    TextSource,
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required env var: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for env var {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("failed to read brand policy {path}: {source}")]
    PolicyFileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse brand policy {path}: {reason}")]
    PolicyFileParse { path: String, reason: String },

    #[error("validation error: {0}")]
    Validation(String),
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("failed to read posts file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse posts file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("expected a JSON array of posts in {path}")]
    NotAnArray { path: String },
}
