use std::collections::BTreeMap;
use std::fmt;

use cloutcheck_core::ScoreRecord;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::aggregate::{
    aggregate, AttemptSummary, EngagementSummary, FormulaInputs, ModalityBreakdown,
};
use crate::config::{ReputationWeights, ScoringConfig, SeverePenalties};
use crate::stats::round_to;

const INSUFFICIENT_DATA: &str = "insufficient_data";

/// Final reputation score: a number in `[0, 100]` or the insufficient-data
/// sentinel when no post could be scored.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(into = "ScoreRepr", try_from = "ScoreRepr")]
pub enum Score {
    Value(f64),
    InsufficientData,
}

impl Score {
    #[must_use]
    pub fn value(self) -> Option<f64> {
        match self {
            Self::Value(v) => Some(v),
            Self::InsufficientData => None,
        }
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(v) => write!(f, "{v:.2}"),
            Self::InsufficientData => f.write_str(INSUFFICIENT_DATA),
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum ScoreRepr {
    Number(f64),
    Sentinel(String),
}

impl From<Score> for ScoreRepr {
    fn from(score: Score) -> Self {
        match score {
            Score::Value(v) => Self::Number(v),
            Score::InsufficientData => Self::Sentinel(INSUFFICIENT_DATA.to_string()),
        }
    }
}

impl TryFrom<ScoreRepr> for Score {
    type Error = String;

    fn try_from(repr: ScoreRepr) -> Result<Self, Self::Error> {
        match repr {
            ScoreRepr::Number(v) => Ok(Self::Value(v)),
            ScoreRepr::Sentinel(s) if s == INSUFFICIENT_DATA => Ok(Self::InsufficientData),
            ScoreRepr::Sentinel(s) => Err(format!("unknown score sentinel: {s}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Rating {
    Excellent,
    Good,
    Fair,
    Poor,
    #[serde(rename = "Very Poor")]
    VeryPoor,
    #[serde(rename = "Insufficient Data")]
    InsufficientData,
}

impl Rating {
    #[must_use]
    pub fn for_score(score: Score) -> Self {
        match score {
            Score::InsufficientData => Self::InsufficientData,
            Score::Value(v) if v >= 90.0 => Self::Excellent,
            Score::Value(v) if v >= 75.0 => Self::Good,
            Score::Value(v) if v >= 60.0 => Self::Fair,
            Score::Value(v) if v >= 40.0 => Self::Poor,
            Score::Value(_) => Self::VeryPoor,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Excellent => "Excellent",
            Self::Good => "Good",
            Self::Fair => "Fair",
            Self::Poor => "Poor",
            Self::VeryPoor => "Very Poor",
            Self::InsufficientData => "Insufficient Data",
        }
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReputationReport {
    pub posts_analyzed: usize,
    pub posts_scored: usize,
    pub images_analyzed: usize,
    pub videos_analyzed: usize,
    pub score: Score,
    pub rating: Rating,
    pub per_modality_breakdown: ModalityBreakdown,
    pub engagement: EngagementSummary,
    pub attempts: AttemptSummary,
    pub topics: BTreeMap<String, usize>,
}

/// Fuse a batch of records into one report.
///
/// The result depends only on the multiset of records: reordering them
/// yields an identical report.
#[must_use]
pub fn compute_reputation(records: &[ScoreRecord], config: &ScoringConfig) -> ReputationReport {
    let agg = aggregate(records);

    // Audio without a scored transcript adds no formula term.
    let score = if agg.attempts.posts_scored == 0
        || (agg.inputs.text.is_none() && agg.inputs.avg_nsfw.is_none())
    {
        Score::InsufficientData
    } else {
        Score::Value(raw_score(
            &agg.inputs,
            &config.reputation,
            &config.severe_penalties,
        ))
    };
    let rating = Rating::for_score(score);

    debug!(
        posts = records.len(),
        posts_scored = agg.attempts.posts_scored,
        %score,
        %rating,
        "computed reputation"
    );

    ReputationReport {
        posts_analyzed: records.len(),
        posts_scored: agg.attempts.posts_scored,
        images_analyzed: agg.attempts.images_analyzed,
        videos_analyzed: agg.attempts.videos_analyzed,
        score,
        rating,
        per_modality_breakdown: agg.breakdown,
        engagement: agg.engagement,
        attempts: agg.attempts,
        topics: agg.topics,
    }
}

fn raw_score(inputs: &FormulaInputs, w: &ReputationWeights, severe: &SeverePenalties) -> f64 {
    let mut score = 100.0;
    if let Some(text) = &inputs.text {
        score -= w.toxicity * text.avg_toxicity;
        score -= w.spam * text.avg_spam;
        score += w.positive_sentiment * text.avg_sentiment.max(0.0);

        if severe.enabled {
            for (max, penalty) in [
                (text.max_identity_attack, severe.identity_attack),
                (text.max_insult, severe.insult),
                (text.max_severe_toxicity, severe.severe_toxicity),
            ] {
                if max > severe.trigger {
                    score -= penalty;
                }
            }
        }
    }
    if let Some(avg_nsfw) = inputs.avg_nsfw {
        score -= w.nsfw * avg_nsfw;
    }
    round_to(score.clamp(0.0, 100.0), 2)
}

#[cfg(test)]
#[path = "reputation_test.rs"]
mod tests;
