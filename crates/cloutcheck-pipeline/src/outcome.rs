use cloutcheck_core::{Modality, ScoreRecord};
use cloutcheck_media::MediaHandle;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::stage::PostState;

/// A condition that stops the batch from starting further posts.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BatchFatal {
    #[error("{modality} collaborator unavailable: {reason}")]
    AdapterUnavailable { modality: Modality, reason: String },

    #[error("disk budget cannot be satisfied: {requested_bytes} bytes requested, {ceiling_bytes} byte ceiling")]
    DiskBudget {
        requested_bytes: u64,
        ceiling_bytes: u64,
    },
}

/// Final state of one post that was started.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostStatus {
    pub post_id: String,
    pub state: PostState,
}

/// Everything a batch run produced, in input order.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    /// One record per started post, including posts that ended failed.
    pub records: Vec<ScoreRecord>,
    pub statuses: Vec<PostStatus>,
    /// Posts never started because of `fatal`.
    pub skipped: Vec<String>,
    pub fatal: Option<BatchFatal>,
    /// Handles the caller must clean up under the `none` retention policy.
    pub retained: Vec<MediaHandle>,
}

impl BatchOutcome {
    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.statuses
            .iter()
            .filter(|s| matches!(s.state, PostState::Failed { .. }))
            .count()
    }
}
