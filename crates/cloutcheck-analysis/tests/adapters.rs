//! Failure isolation in `ModalityAdapters`, driven by in-process fakes.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use cloutcheck_analysis::{
    AdapterError, AdapterSettings, ImageClassifier, ImageVerdict, ModalityAdapters,
    SpeechTranscriber, TextClassifier, TextVerdict, Transcript,
};
use cloutcheck_core::{FailureReason, ImageSource, Modality, SentimentLabel, TextSource};

#[derive(Default)]
struct FakeText {
    fail: bool,
    calls: AtomicUsize,
}

impl TextClassifier for FakeText {
    async fn analyze_text(&self, text: &str) -> Result<TextVerdict, AdapterError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(AdapterError::ModelUnavailable("text model down".to_string()));
        }
        Ok(TextVerdict {
            toxicity: if text.contains("idiot") { 0.8 } else { 0.05 },
            insult: 0.02,
            sentiment_label: "POSITIVE".to_string(),
            sentiment_confidence: 0.9,
            ..TextVerdict::default()
        })
    }
}

/// Scores each image by its first byte (`byte / 100`); byte 255 fails.
struct FakeImage {
    delay: Duration,
}

impl ImageClassifier for FakeImage {
    async fn analyze_image(&self, image: &[u8]) -> Result<ImageVerdict, AdapterError> {
        tokio::time::sleep(self.delay).await;
        match image.first() {
            Some(255) | None => Err(AdapterError::MalformedInput("unreadable image".to_string())),
            Some(b) => Ok(ImageVerdict {
                nsfw: f64::from(*b) / 100.0,
                safe: None,
            }),
        }
    }

    async fn ready(&self) -> Result<(), AdapterError> {
        Err(AdapterError::ModelUnavailable("warming up".to_string()))
    }
}

struct FakeSpeech {
    text: &'static str,
}

impl SpeechTranscriber for FakeSpeech {
    async fn transcribe_audio(&self, _audio: &[u8]) -> Result<Transcript, AdapterError> {
        Ok(Transcript {
            text: self.text.to_string(),
            language: Some("en".to_string()),
            segment_count: 1,
        })
    }
}

fn adapters(
    text: FakeText,
    delay: Duration,
    speech: &'static str,
) -> ModalityAdapters<FakeText, FakeImage, FakeSpeech> {
    ModalityAdapters::new(
        text,
        FakeImage { delay },
        FakeSpeech { text: speech },
        AdapterSettings {
            call_timeout: Duration::from_millis(200),
            nsfw_threshold: 0.7,
        },
    )
}

fn write_frames(dir: &std::path::Path, first_bytes: &[u8]) -> Vec<PathBuf> {
    first_bytes
        .iter()
        .enumerate()
        .map(|(i, b)| {
            let path = dir.join(format!("frame_{i:04}.jpg"));
            std::fs::write(&path, [*b, 0, 0]).unwrap();
            path
        })
        .collect()
}

#[tokio::test]
async fn text_scores_are_normalized() {
    let a = adapters(FakeText::default(), Duration::ZERO, "");
    let score = a
        .analyze_text("  what an idiot  ", TextSource::Caption)
        .await
        .unwrap();
    assert!((score.toxicity - 0.8).abs() < 1e-9);
    assert_eq!(score.sentiment, SentimentLabel::Positive);
    assert!((score.sentiment_score - 0.9).abs() < 1e-9);
    assert_eq!(score.source, TextSource::Caption);
}

#[tokio::test]
async fn empty_text_is_malformed_input_without_calling_model() {
    let text = FakeText::default();
    let a = adapters(text, Duration::ZERO, "");
    let failure = a.analyze_text("   ", TextSource::Caption).await.unwrap_err();
    assert_eq!(failure.reason, FailureReason::MalformedInput);
}

#[tokio::test]
async fn slow_image_model_times_out() {
    let a = adapters(FakeText::default(), Duration::from_secs(5), "");
    let failure = a.analyze_image(&[10]).await.unwrap_err();
    assert_eq!(failure.modality, Modality::Image);
    assert_eq!(failure.reason, FailureReason::Timeout);
}

#[tokio::test]
async fn frames_aggregate_and_tolerate_partial_failure() {
    let dir = tempfile::tempdir().unwrap();
    let frames = write_frames(dir.path(), &[10, 90, 255, 50]);
    let a = adapters(FakeText::default(), Duration::ZERO, "");

    let score = a.analyze_frames(&frames).await.unwrap();
    let ImageSource::VideoFrames(agg) = &score.source else {
        panic!("expected frame aggregate, got {:?}", score.source);
    };
    assert_eq!(agg.frame_count, 3);
    assert_eq!(agg.frames_failed, 1);
    assert!((agg.max - 0.9).abs() < 1e-9);
    assert!((agg.min - 0.1).abs() < 1e-9);
    assert_eq!(agg.nsfw_frames, 1);
    assert!((score.nsfw_score - 0.5).abs() < 1e-9);
    assert!(score.is_nsfw, "worst frame is above threshold");
}

#[tokio::test]
async fn frames_fail_when_every_frame_fails() {
    let dir = tempfile::tempdir().unwrap();
    let frames = write_frames(dir.path(), &[255, 255]);
    let a = adapters(FakeText::default(), Duration::ZERO, "");

    let failure = a.analyze_frames(&frames).await.unwrap_err();
    assert_eq!(failure.reason, FailureReason::MalformedInput);
    assert!(failure.detail.starts_with("all 2 frames failed"));
}

#[tokio::test]
async fn missing_frame_file_is_acquisition_failure() {
    let a = adapters(FakeText::default(), Duration::ZERO, "");
    let failure = a
        .analyze_image_file(std::path::Path::new("/nonexistent/frame.jpg"))
        .await
        .unwrap_err();
    assert_eq!(failure.reason, FailureReason::Acquisition);
}

#[tokio::test]
async fn audio_transcript_is_scored_as_text() {
    let a = adapters(FakeText::default(), Duration::ZERO, "you idiot, subscribe now");
    let analysis = a.analyze_audio(b"RIFF").await.unwrap();
    assert_eq!(analysis.score.word_count, 4);
    let text = analysis.score.transcript_score.expect("transcript scored");
    assert_eq!(text.source, TextSource::Transcript);
    assert!((text.toxicity - 0.8).abs() < 1e-9);
    assert!(analysis.text_failure.is_none());
}

#[tokio::test]
async fn empty_transcript_yields_audio_score_without_text() {
    let text = FakeText::default();
    let a = adapters(text, Duration::ZERO, "   ");
    let analysis = a.analyze_audio(b"RIFF").await.unwrap();
    assert_eq!(analysis.score.word_count, 0);
    assert!(analysis.score.transcript_score.is_none());
    assert!(analysis.text_failure.is_none());
}

#[tokio::test]
async fn failed_transcript_text_is_reported_separately() {
    let text = FakeText {
        fail: true,
        ..FakeText::default()
    };
    let a = adapters(text, Duration::ZERO, "hello world");
    let analysis = a.analyze_audio(b"RIFF").await.unwrap();
    assert!(analysis.score.transcript_score.is_none());
    let failure = analysis.text_failure.expect("text failure recorded");
    assert_eq!(failure.reason, FailureReason::ModelUnavailable);
}

#[tokio::test]
async fn preflight_names_the_unready_modality() {
    let a = adapters(FakeText::default(), Duration::ZERO, "");
    let failure = a.preflight().await.unwrap_err();
    assert_eq!(failure.modality, Modality::Image);
}
