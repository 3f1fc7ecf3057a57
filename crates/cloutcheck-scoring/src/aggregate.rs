//! Batch aggregation of [`ScoreRecord`]s into per-modality statistics.
//!
//! Every modality sample in every record is pooled: a carousel contributes one
//! image sample per analyzed image, a video contributes one frame aggregate,
//! and a transcript contributes a text sample alongside the caption. A
//! modality with no samples has no breakdown at all.
//!
//! Breakdown values keep full precision; thresholds are checked against them
//! and rounding is left to whoever displays them.

use std::collections::BTreeMap;

use cloutcheck_core::{
    AudioScore, FailureReason, ImageScore, ImageSource, Modality, ModalityScore, ScoreRecord,
    SentimentLabel, TextScore, TextSource,
};
use serde::{Deserialize, Serialize};

use crate::stats::{mean, round_to, summarize, MetricSummary};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextBreakdown {
    pub samples: usize,
    pub caption_samples: usize,
    pub transcript_samples: usize,
    pub avg_toxicity: f64,
    pub max_toxicity: f64,
    pub avg_severe_toxicity: f64,
    pub max_severe_toxicity: f64,
    pub avg_identity_attack: f64,
    pub max_identity_attack: f64,
    pub avg_insult: f64,
    pub max_insult: f64,
    pub avg_obscene: f64,
    pub avg_threat: f64,
    pub avg_spam: f64,
    pub max_spam: f64,
    pub spam_flagged: usize,
    pub avg_sentiment: f64,
    pub positive: usize,
    pub neutral: usize,
    pub negative: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageBreakdown {
    pub samples: usize,
    pub photo_samples: usize,
    pub video_samples: usize,
    pub avg_nsfw: f64,
    pub max_nsfw: f64,
    /// Photos and videos whose score crossed the NSFW threshold.
    pub nsfw_images: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioBreakdown {
    pub samples: usize,
    pub transcribed: usize,
    pub total_words: usize,
    pub languages: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModalityBreakdown {
    pub text: Option<TextBreakdown>,
    pub image: Option<ImageBreakdown>,
    pub audio: Option<AudioBreakdown>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngagementSummary {
    pub total_likes: u64,
    pub total_comments: u64,
    pub avg_likes: f64,
    pub avg_comments: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttemptSummary {
    pub posts_attempted: usize,
    pub posts_scored: usize,
    pub images_attempted: usize,
    pub images_analyzed: usize,
    pub videos_attempted: usize,
    pub videos_analyzed: usize,
    pub failures_by_reason: BTreeMap<FailureReason, usize>,
    pub failures_by_modality: BTreeMap<Modality, usize>,
}

/// Unrounded means that feed the formulas, alongside the rounded breakdown.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct FormulaInputs {
    pub text: Option<TextInputs>,
    pub avg_nsfw: Option<f64>,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct TextInputs {
    pub avg_toxicity: f64,
    pub avg_spam: f64,
    pub avg_sentiment: f64,
    pub max_identity_attack: f64,
    pub max_insult: f64,
    pub max_severe_toxicity: f64,
}

pub(crate) struct Aggregate {
    pub breakdown: ModalityBreakdown,
    pub inputs: FormulaInputs,
    pub engagement: EngagementSummary,
    pub attempts: AttemptSummary,
    pub topics: BTreeMap<String, usize>,
}

pub(crate) fn aggregate(records: &[ScoreRecord]) -> Aggregate {
    let mut texts: Vec<&TextScore> = Vec::new();
    let mut images: Vec<&ImageScore> = Vec::new();
    let mut audio: Vec<&AudioScore> = Vec::new();

    for record in records {
        for score in record.scores() {
            if let Some(text) = score.text_score() {
                texts.push(text);
            }
            match score {
                ModalityScore::Image(i) => images.push(i),
                ModalityScore::Audio(a) => audio.push(a),
                ModalityScore::Text(_) => {}
            }
        }
    }

    let (text_breakdown, text_inputs) = text_stats(&texts);
    let (image_breakdown, avg_nsfw) = image_stats(&images);

    Aggregate {
        breakdown: ModalityBreakdown {
            text: text_breakdown,
            image: image_breakdown,
            audio: audio_stats(&audio),
        },
        inputs: FormulaInputs {
            text: text_inputs,
            avg_nsfw,
        },
        engagement: engagement(records),
        attempts: attempts(records),
        topics: topics(records),
    }
}

fn collect<'a, T>(items: &[&'a T], f: impl Fn(&'a T) -> f64) -> Option<MetricSummary> {
    summarize(items.iter().map(|i| f(*i)).collect())
}

fn text_stats(texts: &[&TextScore]) -> (Option<TextBreakdown>, Option<TextInputs>) {
    let Some(toxicity) = collect(texts, |t| t.toxicity) else {
        return (None, None);
    };
    // Non-empty from here on, so every summary exists.
    let severe = collect(texts, |t| t.severe_toxicity).unwrap_or(toxicity);
    let identity = collect(texts, |t| t.identity_attack).unwrap_or(toxicity);
    let insult = collect(texts, |t| t.insult).unwrap_or(toxicity);
    let spam = collect(texts, |t| t.spam_score).unwrap_or(toxicity);
    let sentiment = mean(texts.iter().map(|t| t.sentiment_score).collect());
    let count_label = |label| texts.iter().filter(|t| t.sentiment == label).count();

    let breakdown = TextBreakdown {
        samples: texts.len(),
        caption_samples: texts.iter().filter(|t| t.source == TextSource::Caption).count(),
        transcript_samples: texts
            .iter()
            .filter(|t| t.source == TextSource::Transcript)
            .count(),
        avg_toxicity: toxicity.mean,
        max_toxicity: toxicity.max,
        avg_severe_toxicity: severe.mean,
        max_severe_toxicity: severe.max,
        avg_identity_attack: identity.mean,
        max_identity_attack: identity.max,
        avg_insult: insult.mean,
        max_insult: insult.max,
        avg_obscene: mean(texts.iter().map(|t| t.obscene).collect()),
        avg_threat: mean(texts.iter().map(|t| t.threat).collect()),
        avg_spam: spam.mean,
        max_spam: spam.max,
        spam_flagged: texts.iter().filter(|t| t.spam_score > 0.5).count(),
        avg_sentiment: sentiment,
        positive: count_label(SentimentLabel::Positive),
        neutral: count_label(SentimentLabel::Neutral),
        negative: count_label(SentimentLabel::Negative),
    };

    let inputs = TextInputs {
        avg_toxicity: toxicity.mean,
        avg_spam: spam.mean,
        avg_sentiment: sentiment,
        max_identity_attack: identity.max,
        max_insult: insult.max,
        max_severe_toxicity: severe.max,
    };

    (Some(breakdown), Some(inputs))
}

fn image_stats(images: &[&ImageScore]) -> (Option<ImageBreakdown>, Option<f64>) {
    let Some(nsfw) = collect(images, |i| i.nsfw_score) else {
        return (None, None);
    };
    let photos = images
        .iter()
        .filter(|i| matches!(i.source, ImageSource::Photo))
        .count();
    let breakdown = ImageBreakdown {
        samples: images.len(),
        photo_samples: photos,
        video_samples: images.len() - photos,
        avg_nsfw: nsfw.mean,
        max_nsfw: nsfw.max,
        nsfw_images: images.iter().filter(|i| i.is_nsfw).count() as u64,
    };
    (Some(breakdown), Some(nsfw.mean))
}

fn audio_stats(audio: &[&AudioScore]) -> Option<AudioBreakdown> {
    if audio.is_empty() {
        return None;
    }
    let mut languages = BTreeMap::new();
    for a in audio {
        if let Some(lang) = &a.language {
            *languages.entry(lang.clone()).or_insert(0) += 1;
        }
    }
    Some(AudioBreakdown {
        samples: audio.len(),
        transcribed: audio.iter().filter(|a| a.word_count > 0).count(),
        total_words: audio.iter().map(|a| a.word_count).sum(),
        languages,
    })
}

#[allow(clippy::cast_precision_loss)]
fn engagement(records: &[ScoreRecord]) -> EngagementSummary {
    let total_likes: u64 = records.iter().map(|r| r.engagement().likes).sum();
    let total_comments: u64 = records.iter().map(|r| r.engagement().comments).sum();
    let n = records.len();
    let avg = |total: u64| {
        if n == 0 {
            0.0
        } else {
            round_to(total as f64 / n as f64, 2)
        }
    };
    EngagementSummary {
        total_likes,
        total_comments,
        avg_likes: avg(total_likes),
        avg_comments: avg(total_comments),
    }
}

fn attempts(records: &[ScoreRecord]) -> AttemptSummary {
    let mut summary = AttemptSummary {
        posts_attempted: records.len(),
        posts_scored: records.iter().filter(|r| r.is_scored()).count(),
        ..AttemptSummary::default()
    };
    for record in records {
        let media = record.media();
        summary.images_attempted += media.images_attempted;
        summary.images_analyzed += media.images_analyzed;
        summary.videos_attempted += media.videos_attempted;
        summary.videos_analyzed += media.videos_analyzed;
        for failure in record.failures() {
            *summary.failures_by_reason.entry(failure.reason).or_insert(0) += 1;
            *summary
                .failures_by_modality
                .entry(failure.modality)
                .or_insert(0) += 1;
        }
    }
    summary
}

fn topics(records: &[ScoreRecord]) -> BTreeMap<String, usize> {
    let mut histogram = BTreeMap::new();
    for record in records {
        for topic in record.topics() {
            *histogram.entry(topic.clone()).or_insert(0) += 1;
        }
    }
    histogram
}
