use std::time::Duration;

use cloutcheck_core::FailureReason;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("classifier returned status {status} from {endpoint}")]
    UnexpectedStatus { status: u16, endpoint: String },

    #[error("model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("malformed response from {endpoint}: {reason}")]
    MalformedResponse { endpoint: String, reason: String },

    #[error("malformed input: {0}")]
    MalformedInput(String),

    #[error("timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl AdapterError {
    #[must_use]
    pub fn failure_reason(&self) -> FailureReason {
        match self {
            AdapterError::Http(e) if e.is_timeout() => FailureReason::Timeout,
            AdapterError::Http(e) if e.is_connect() => FailureReason::ModelUnavailable,
            AdapterError::Http(_) | AdapterError::MalformedResponse { .. } => {
                FailureReason::Upstream
            }
            AdapterError::UnexpectedStatus { status, .. } => match status {
                502..=504 => FailureReason::ModelUnavailable,
                400 | 413 | 415 | 422 => FailureReason::MalformedInput,
                _ => FailureReason::Upstream,
            },
            AdapterError::ModelUnavailable(_) => FailureReason::ModelUnavailable,
            AdapterError::MalformedInput(_) => FailureReason::MalformedInput,
            AdapterError::Timeout(_) => FailureReason::Timeout,
            AdapterError::Io { .. } => FailureReason::Acquisition,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_map_to_reasons() {
        let status = |status| AdapterError::UnexpectedStatus {
            status,
            endpoint: "/v1/text".to_string(),
        };
        assert_eq!(status(503).failure_reason(), FailureReason::ModelUnavailable);
        assert_eq!(status(422).failure_reason(), FailureReason::MalformedInput);
        assert_eq!(status(500).failure_reason(), FailureReason::Upstream);
    }

    #[test]
    fn timeout_maps_to_timeout() {
        assert_eq!(
            AdapterError::Timeout(Duration::from_secs(3)).failure_reason(),
            FailureReason::Timeout
        );
    }
}
