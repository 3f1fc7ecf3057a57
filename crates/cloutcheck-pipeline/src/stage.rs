//! Per-post stage machine.
//!
//! ```text
//! Pending ─┬─> MediaAcquired ─> Analyzing ─> Scored ─> Cleaned
//!          └──────────────────> Analyzing
//! any non-terminal stage ─> Failed { stage, reason }
//! ```
//!
//! `Failed` and `Cleaned` are terminal.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostStage {
    Pending,
    MediaAcquired,
    Analyzing,
    Scored,
    Cleaned,
}

impl PostStage {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::MediaAcquired => "media_acquired",
            Self::Analyzing => "analyzing",
            Self::Scored => "scored",
            Self::Cleaned => "cleaned",
        }
    }

    fn can_advance_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::MediaAcquired | Self::Analyzing)
                | (Self::MediaAcquired, Self::Analyzing)
                | (Self::Analyzing, Self::Scored)
                | (Self::Scored, Self::Cleaned)
        )
    }
}

impl fmt::Display for PostStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PostState {
    Active { stage: PostStage },
    Failed { stage: PostStage, reason: String },
}

impl fmt::Display for PostState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active { stage } => write!(f, "{stage}"),
            Self::Failed { stage, reason } => write!(f, "failed at {stage}: {reason}"),
        }
    }
}

/// Tracks one post through the pipeline, rejecting out-of-order transitions.
#[derive(Debug, Clone)]
pub struct PostProgress {
    post_id: String,
    state: PostState,
}

impl PostProgress {
    #[must_use]
    pub fn new(post_id: impl Into<String>) -> Self {
        Self {
            post_id: post_id.into(),
            state: PostState::Active {
                stage: PostStage::Pending,
            },
        }
    }

    #[must_use]
    pub fn state(&self) -> &PostState {
        &self.state
    }

    #[must_use]
    pub fn into_state(self) -> PostState {
        self.state
    }

    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self.state, PostState::Failed { .. })
    }

    /// Move to `next`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::IllegalTransition`] when `next` does not follow
    /// the current stage or the post has already failed.
    pub fn advance(&mut self, next: PostStage) -> Result<(), PipelineError> {
        match self.state {
            PostState::Active { stage } if stage.can_advance_to(next) => {
                self.state = PostState::Active { stage: next };
                Ok(())
            }
            _ => Err(PipelineError::IllegalTransition {
                post_id: self.post_id.clone(),
                from: self.state.to_string(),
                to: next.to_string(),
            }),
        }
    }

    /// Enter the absorbing failed state, recording the stage it failed in.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::IllegalTransition`] if the post already failed
    /// or was cleaned.
    pub fn fail(&mut self, reason: impl Into<String>) -> Result<(), PipelineError> {
        match self.state {
            PostState::Active { stage } if stage != PostStage::Cleaned => {
                self.state = PostState::Failed {
                    stage,
                    reason: reason.into(),
                };
                Ok(())
            }
            _ => Err(PipelineError::IllegalTransition {
                post_id: self.post_id.clone(),
                from: self.state.to_string(),
                to: "failed".to_string(),
            }),
        }
    }
}
