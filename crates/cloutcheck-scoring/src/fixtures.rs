//! Record builders shared by the scoring unit tests.

use cloutcheck_core::{
    AudioScore, Engagement, ImageScore, ImageSource, MediaKind, MediaRef, Modality,
    ModalityFailure, FailureReason, ModalityScore, Post, PostKind, ScoreRecord,
    ScoreRecordBuilder, SentimentLabel, TextScore, TextSource,
};

pub(crate) fn post(id: &str, caption: &str, images: usize) -> Post {
    Post {
        id: id.to_string(),
        kind: if images > 1 {
            PostKind::Carousel
        } else {
            PostKind::Image
        },
        media: (0..images)
            .map(|i| MediaRef {
                url: format!("https://cdn.example/{id}/{i}.jpg"),
                kind: MediaKind::Image,
            })
            .collect(),
        caption: caption.to_string(),
        comments: Vec::new(),
        engagement: Engagement {
            likes: 100,
            comments: 10,
        },
        posted_at: None,
    }
}

pub(crate) fn text(toxicity: f64, spam: f64, sentiment: f64) -> TextScore {
    TextScore {
        toxicity,
        severe_toxicity: 0.0,
        identity_attack: 0.0,
        insult: 0.0,
        obscene: 0.0,
        threat: 0.0,
        spam_score: spam,
        spam_patterns: Vec::new(),
        sentiment: if sentiment > 0.0 {
            SentimentLabel::Positive
        } else if sentiment < 0.0 {
            SentimentLabel::Negative
        } else {
            SentimentLabel::Neutral
        },
        sentiment_score: sentiment,
        source: TextSource::Caption,
    }
}

pub(crate) fn photo(nsfw: f64) -> ImageScore {
    ImageScore {
        nsfw_score: nsfw,
        safe_score: 1.0 - nsfw,
        is_nsfw: nsfw > 0.7,
        source: ImageSource::Photo,
    }
}

pub(crate) fn audio(words: usize, transcript: Option<TextScore>) -> AudioScore {
    AudioScore {
        language: Some("en".to_string()),
        word_count: words,
        segment_count: 1,
        transcript_score: transcript,
    }
}

/// A record for `post` carrying the given scores.
pub(crate) fn record(post: &Post, scores: Vec<ModalityScore>) -> ScoreRecord {
    let mut builder = ScoreRecordBuilder::new(post);
    for score in scores {
        builder.push_score(score);
    }
    builder.finish()
}

/// A record whose every modality failed.
pub(crate) fn failed_record(post: &Post) -> ScoreRecord {
    let mut builder = ScoreRecordBuilder::new(post);
    builder.push_failure(ModalityFailure::new(
        Modality::Text,
        FailureReason::ModelUnavailable,
        "text model down",
    ));
    builder.finish()
}
