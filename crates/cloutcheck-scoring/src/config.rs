use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::ScoringError;

/// Deductions and bonuses of the reputation formula.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReputationWeights {
    pub toxicity: f64,
    pub spam: f64,
    pub nsfw: f64,
    /// Multiplies `max(0, avg_sentiment)`.
    pub positive_sentiment: f64,
}

impl Default for ReputationWeights {
    fn default() -> Self {
        Self {
            toxicity: 30.0,
            spam: 20.0,
            nsfw: 30.0,
            positive_sentiment: 10.0,
        }
    }
}

/// Fixed deductions applied when the worst post crosses `trigger`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeverePenalties {
    pub enabled: bool,
    pub trigger: f64,
    pub identity_attack: f64,
    pub insult: f64,
    pub severe_toxicity: f64,
}

impl Default for SeverePenalties {
    fn default() -> Self {
        Self {
            enabled: false,
            trigger: 0.1,
            identity_attack: 20.0,
            insult: 10.0,
            severe_toxicity: 30.0,
        }
    }
}

/// Per-category deductions and bonuses of the brand-fit evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FitPenalties {
    pub toxicity: f64,
    pub identity_attack: f64,
    pub insult: f64,
    pub severe_toxicity: f64,
    pub spam: f64,
    pub nsfw: f64,
    pub nsfw_images: f64,
    pub excluded_topics: f64,
    pub positive_sentiment_bonus: f64,
    pub sentiment_bonus_threshold: f64,
    pub values_bonus: f64,
}

impl Default for FitPenalties {
    fn default() -> Self {
        Self {
            toxicity: 30.0,
            identity_attack: 40.0,
            insult: 20.0,
            severe_toxicity: 50.0,
            spam: 20.0,
            nsfw: 40.0,
            nsfw_images: 20.0,
            excluded_topics: 30.0,
            positive_sentiment_bonus: 5.0,
            sentiment_bonus_threshold: 0.5,
            values_bonus: 5.0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub reputation: ReputationWeights,
    pub severe_penalties: SeverePenalties,
    pub fit: FitPenalties,
}

impl ScoringConfig {
    fn validate(&self) -> Result<(), ScoringError> {
        let w = &self.reputation;
        let s = &self.severe_penalties;
        let f = &self.fit;
        let named = [
            ("reputation.toxicity", w.toxicity),
            ("reputation.spam", w.spam),
            ("reputation.nsfw", w.nsfw),
            ("reputation.positive_sentiment", w.positive_sentiment),
            ("severe_penalties.identity_attack", s.identity_attack),
            ("severe_penalties.insult", s.insult),
            ("severe_penalties.severe_toxicity", s.severe_toxicity),
            ("fit.toxicity", f.toxicity),
            ("fit.identity_attack", f.identity_attack),
            ("fit.insult", f.insult),
            ("fit.severe_toxicity", f.severe_toxicity),
            ("fit.spam", f.spam),
            ("fit.nsfw", f.nsfw),
            ("fit.nsfw_images", f.nsfw_images),
            ("fit.excluded_topics", f.excluded_topics),
            ("fit.positive_sentiment_bonus", f.positive_sentiment_bonus),
            ("fit.values_bonus", f.values_bonus),
        ];
        for (name, value) in named {
            if !value.is_finite() || value < 0.0 {
                return Err(ScoringError::Validation(format!(
                    "{name} must be a non-negative number, got {value}"
                )));
            }
        }
        for (name, value) in [
            ("severe_penalties.trigger", s.trigger),
            ("fit.sentiment_bonus_threshold", f.sentiment_bonus_threshold),
        ] {
            if !(-1.0..=1.0).contains(&value) {
                return Err(ScoringError::Validation(format!(
                    "{name} must be within [-1, 1], got {value}"
                )));
            }
        }
        Ok(())
    }
}

/// Load a scoring config from YAML. Missing keys keep their defaults.
///
/// # Errors
///
/// Returns `ScoringError` if the file cannot be read, parsed, or holds
/// negative or non-finite weights.
pub fn load_scoring_config(path: &Path) -> Result<ScoringConfig, ScoringError> {
    let content = std::fs::read_to_string(path).map_err(|source| ScoringError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let config: ScoringConfig =
        serde_yaml::from_str(&content).map_err(|e| ScoringError::Parse {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
    config.validate()?;
    Ok(config)
}
