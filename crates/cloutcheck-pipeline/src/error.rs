use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("illegal stage transition for post {post_id}: {from} -> {to}")]
    IllegalTransition {
        post_id: String,
        from: String,
        to: String,
    },

    #[error("no stored analysis for {subject} at {path}")]
    ArtifactNotFound { subject: String, path: String },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode analysis artifact: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("failed to parse analysis artifact {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

impl PipelineError {
    pub(crate) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            source,
        }
    }
}
