//! Per-modality score types and the immutable per-post [`ScoreRecord`].

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::posts::{Engagement, MediaKind, Post, PostKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Modality {
    Text,
    Image,
    Audio,
}

impl std::fmt::Display for Modality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Modality::Text => write!(f, "text"),
            Modality::Image => write!(f, "image"),
            Modality::Audio => write!(f, "audio"),
        }
    }
}

/// Reason code attached to a modality that produced no score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    Acquisition,
    ResourceExhausted,
    Decode,
    Timeout,
    ModelUnavailable,
    MalformedInput,
    Upstream,
}

impl FailureReason {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            FailureReason::Acquisition => "acquisition",
            FailureReason::ResourceExhausted => "resource_exhausted",
            FailureReason::Decode => "decode",
            FailureReason::Timeout => "timeout",
            FailureReason::ModelUnavailable => "model_unavailable",
            FailureReason::MalformedInput => "malformed_input",
            FailureReason::Upstream => "upstream",
        }
    }
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModalityFailure {
    pub modality: Modality,
    pub reason: FailureReason,
    pub detail: String,
}

impl ModalityFailure {
    pub fn new(modality: Modality, reason: FailureReason, detail: impl Into<String>) -> Self {
        Self {
            modality,
            reason,
            detail: detail.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SentimentLabel {
    Positive,
    Neutral,
    Negative,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextSource {
    Caption,
    Transcript,
}

/// Classifier output for one piece of text. Ratios are in `[0, 1]`,
/// `sentiment_score` in `[-1, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextScore {
    pub toxicity: f64,
    pub severe_toxicity: f64,
    pub identity_attack: f64,
    pub insult: f64,
    pub obscene: f64,
    pub threat: f64,
    pub spam_score: f64,
    #[serde(default)]
    pub spam_patterns: Vec<String>,
    pub sentiment: SentimentLabel,
    pub sentiment_score: f64,
    pub source: TextSource,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameAggregate {
    pub frame_count: usize,
    pub frames_failed: usize,
    pub avg: f64,
    pub max: f64,
    pub min: f64,
    pub nsfw_frames: usize,
    pub nsfw_ratio: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ImageSource {
    Photo,
    VideoFrames(FrameAggregate),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageScore {
    pub nsfw_score: f64,
    pub safe_score: f64,
    pub is_nsfw: bool,
    pub source: ImageSource,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioScore {
    pub language: Option<String>,
    pub word_count: usize,
    pub segment_count: usize,
    /// Present when the transcript was non-empty and the text classifier succeeded.
    pub transcript_score: Option<TextScore>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "modality", content = "score", rename_all = "snake_case")]
pub enum ModalityScore {
    Text(TextScore),
    Image(ImageScore),
    Audio(AudioScore),
}

impl ModalityScore {
    #[must_use]
    pub fn modality(&self) -> Modality {
        match self {
            ModalityScore::Text(_) => Modality::Text,
            ModalityScore::Image(_) => Modality::Image,
            ModalityScore::Audio(_) => Modality::Audio,
        }
    }

    /// Named numeric values of this score.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn metrics(&self) -> Vec<(&'static str, f64)> {
        match self {
            ModalityScore::Text(t) => text_metrics(t),
            ModalityScore::Image(i) => vec![
                ("nsfw_score", i.nsfw_score),
                ("safe_score", i.safe_score),
                ("is_nsfw", if i.is_nsfw { 1.0 } else { 0.0 }),
            ],
            ModalityScore::Audio(a) => {
                let mut m = vec![
                    ("word_count", a.word_count as f64),
                    ("segment_count", a.segment_count as f64),
                ];
                if let Some(t) = &a.transcript_score {
                    m.extend(text_metrics(t));
                }
                m
            }
        }
    }

    /// Text scores carried by this sample, including a transcript's.
    #[must_use]
    pub fn text_score(&self) -> Option<&TextScore> {
        match self {
            ModalityScore::Text(t) => Some(t),
            ModalityScore::Audio(a) => a.transcript_score.as_ref(),
            ModalityScore::Image(_) => None,
        }
    }
}

fn text_metrics(t: &TextScore) -> Vec<(&'static str, f64)> {
    vec![
        ("toxicity", t.toxicity),
        ("severe_toxicity", t.severe_toxicity),
        ("identity_attack", t.identity_attack),
        ("insult", t.insult),
        ("obscene", t.obscene),
        ("threat", t.threat),
        ("spam_score", t.spam_score),
        ("sentiment_score", t.sentiment_score),
    ]
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaTally {
    pub images_attempted: usize,
    pub images_analyzed: usize,
    pub videos_attempted: usize,
    pub videos_analyzed: usize,
}

/// The analysis outcome of one attempted post. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreRecord {
    post_id: String,
    kind: PostKind,
    engagement: Engagement,
    topics: BTreeSet<String>,
    scores: Vec<ModalityScore>,
    failures: Vec<ModalityFailure>,
    media: MediaTally,
}

impl ScoreRecord {
    #[must_use]
    pub fn post_id(&self) -> &str {
        &self.post_id
    }

    #[must_use]
    pub fn kind(&self) -> PostKind {
        self.kind
    }

    #[must_use]
    pub fn engagement(&self) -> Engagement {
        self.engagement
    }

    #[must_use]
    pub fn topics(&self) -> &BTreeSet<String> {
        &self.topics
    }

    #[must_use]
    pub fn scores(&self) -> &[ModalityScore] {
        &self.scores
    }

    #[must_use]
    pub fn failures(&self) -> &[ModalityFailure] {
        &self.failures
    }

    #[must_use]
    pub fn media(&self) -> MediaTally {
        self.media
    }

    /// True when at least one modality produced a score.
    #[must_use]
    pub fn is_scored(&self) -> bool {
        !self.scores.is_empty()
    }
}

#[derive(Debug)]
pub struct ScoreRecordBuilder {
    record: ScoreRecord,
}

impl ScoreRecordBuilder {
    #[must_use]
    pub fn new(post: &Post) -> Self {
        Self {
            record: ScoreRecord {
                post_id: post.id.clone(),
                kind: post.kind,
                engagement: post.engagement,
                topics: post.topics(),
                scores: Vec::new(),
                failures: Vec::new(),
                media: MediaTally {
                    images_attempted: post.media_count(MediaKind::Image),
                    videos_attempted: post.media_count(MediaKind::Video),
                    ..MediaTally::default()
                },
            },
        }
    }

    /// Add a score. Photo image scores count toward `images_analyzed`.
    pub fn push_score(&mut self, score: ModalityScore) -> &mut Self {
        if let ModalityScore::Image(ImageScore {
            source: ImageSource::Photo,
            ..
        }) = &score
        {
            self.record.media.images_analyzed += 1;
        }
        self.record.scores.push(score);
        self
    }

    pub fn push_failure(&mut self, failure: ModalityFailure) -> &mut Self {
        self.record.failures.push(failure);
        self
    }

    /// Count a video for which frames or audio produced at least one score.
    pub fn mark_video_analyzed(&mut self) -> &mut Self {
        self.record.media.videos_analyzed += 1;
        self
    }

    #[must_use]
    pub fn finish(self) -> ScoreRecord {
        self.record
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_post() -> Post {
        Post {
            id: "p1".to_string(),
            kind: PostKind::Carousel,
            media: vec![
                crate::MediaRef {
                    url: "https://cdn/a.jpg".to_string(),
                    kind: MediaKind::Image,
                },
                crate::MediaRef {
                    url: "https://cdn/b.jpg".to_string(),
                    kind: MediaKind::Image,
                },
                crate::MediaRef {
                    url: "https://cdn/c.mp4".to_string(),
                    kind: MediaKind::Video,
                },
            ],
            caption: "#Fitness life".to_string(),
            comments: vec![],
            engagement: Engagement {
                likes: 10,
                comments: 2,
            },
            posted_at: None,
        }
    }

    fn photo(nsfw: f64) -> ModalityScore {
        ModalityScore::Image(ImageScore {
            nsfw_score: nsfw,
            safe_score: 1.0 - nsfw,
            is_nsfw: nsfw > 0.7,
            source: ImageSource::Photo,
        })
    }

    #[test]
    fn builder_tallies_media() {
        let mut b = ScoreRecordBuilder::new(&sample_post());
        b.push_score(photo(0.1))
            .push_failure(ModalityFailure::new(
                Modality::Image,
                FailureReason::Timeout,
                "second image timed out",
            ))
            .mark_video_analyzed();
        let record = b.finish();

        assert_eq!(record.post_id(), "p1");
        assert_eq!(record.topics().iter().next().map(String::as_str), Some("fitness"));
        assert_eq!(
            record.media(),
            MediaTally {
                images_attempted: 2,
                images_analyzed: 1,
                videos_attempted: 1,
                videos_analyzed: 1,
            }
        );
        assert!(record.is_scored());
        assert_eq!(record.failures()[0].reason.as_str(), "timeout");
    }

    #[test]
    fn empty_record_is_not_scored() {
        let record = ScoreRecordBuilder::new(&sample_post()).finish();
        assert!(!record.is_scored());
        assert_eq!(record.media().images_analyzed, 0);
    }

    #[test]
    fn audio_metrics_include_transcript_text() {
        let text = TextScore {
            toxicity: 0.2,
            severe_toxicity: 0.0,
            identity_attack: 0.0,
            insult: 0.1,
            obscene: 0.0,
            threat: 0.0,
            spam_score: 0.0,
            spam_patterns: vec![],
            sentiment: SentimentLabel::Neutral,
            sentiment_score: 0.0,
            source: TextSource::Transcript,
        };
        let audio = ModalityScore::Audio(AudioScore {
            language: Some("en".to_string()),
            word_count: 12,
            segment_count: 3,
            transcript_score: Some(text),
        });
        let metrics = audio.metrics();
        assert!(metrics.contains(&("word_count", 12.0)));
        assert!(metrics.contains(&("toxicity", 0.2)));
        assert!(audio.text_score().is_some());
        assert_eq!(audio.modality(), Modality::Audio);
    }

    #[test]
    fn modality_score_serializes_with_tag() {
        let json = serde_json::to_value(photo(0.9)).unwrap();
        assert_eq!(json["modality"], "image");
        assert_eq!(json["score"]["source"]["kind"], "photo");
    }
}
