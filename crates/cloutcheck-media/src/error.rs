use cloutcheck_core::FailureReason;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("rate limited fetching {url} (retry after {retry_after_secs}s)")]
    RateLimited { url: String, retry_after_secs: u64 },

    #[error("media not found: {url}")]
    NotFound { url: String },

    #[error("unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    #[error("no media could be fetched for post {post_id} ({failed} asset(s) failed): {reason}")]
    Acquisition {
        post_id: String,
        failed: usize,
        reason: String,
    },

    #[error(
        "disk budget exhausted: {requested_bytes} bytes requested against a {ceiling_bytes} byte ceiling"
    )]
    ResourceExhausted {
        requested_bytes: u64,
        ceiling_bytes: u64,
        /// The request alone exceeds the ceiling and can never be satisfied.
        oversize: bool,
    },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode {path}: {reason}")]
    Decode { path: String, reason: String },

    #[error("disk budget arbiter is closed")]
    ArbiterClosed,
}

impl MediaError {
    pub(crate) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            source,
        }
    }

    /// Reason code recorded on the post when this error costs it a modality.
    #[must_use]
    pub fn failure_reason(&self) -> FailureReason {
        match self {
            MediaError::ResourceExhausted { .. } | MediaError::ArbiterClosed => {
                FailureReason::ResourceExhausted
            }
            MediaError::Decode { .. } => FailureReason::Decode,
            MediaError::Http(_)
            | MediaError::RateLimited { .. }
            | MediaError::NotFound { .. }
            | MediaError::UnexpectedStatus { .. }
            | MediaError::Acquisition { .. }
            | MediaError::Io { .. } => FailureReason::Acquisition,
        }
    }
}
