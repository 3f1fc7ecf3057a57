//! Failure-isolating wrappers around the classifier collaborators.
//!
//! Every call gets its own timeout. Errors and timeouts come back as
//! [`ModalityFailure`] values tagged with a reason code; nothing escapes as a
//! panic or a crate error.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use cloutcheck_core::{
    AudioScore, FailureReason, FrameAggregate, ImageScore, ImageSource, Modality, ModalityFailure,
    SentimentLabel, TextScore, TextSource,
};
use futures::stream::{self, StreamExt};

use crate::classifier::{ImageClassifier, SpeechTranscriber, TextClassifier, TextVerdict};
use crate::error::AdapterError;
use crate::spam::detect_spam_patterns;

/// Frames classified concurrently per video.
const FRAME_CONCURRENCY: usize = 4;

#[derive(Debug, Clone, Copy)]
pub struct AdapterSettings {
    /// Budget for each individual classifier call.
    pub call_timeout: Duration,
    /// Images and frames scoring above this are NSFW.
    pub nsfw_threshold: f64,
}

impl Default for AdapterSettings {
    fn default() -> Self {
        Self {
            call_timeout: Duration::from_secs(120),
            nsfw_threshold: 0.7,
        }
    }
}

/// A collaborator that failed its readiness check.
#[derive(Debug)]
pub struct PreflightFailure {
    pub modality: Modality,
    pub error: AdapterError,
}

/// Result of the audio track: the transcript score, plus the failure of the
/// nested text analysis if the transcript could not be scored.
#[derive(Debug, Clone)]
pub struct AudioAnalysis {
    pub score: AudioScore,
    pub text_failure: Option<ModalityFailure>,
}

pub struct ModalityAdapters<T, I, S> {
    text: T,
    image: I,
    speech: S,
    settings: AdapterSettings,
}

impl<T, I, S> ModalityAdapters<T, I, S>
where
    T: TextClassifier,
    I: ImageClassifier,
    S: SpeechTranscriber,
{
    pub fn new(text: T, image: I, speech: S, settings: AdapterSettings) -> Self {
        Self {
            text,
            image,
            speech,
            settings,
        }
    }

    #[must_use]
    pub fn settings(&self) -> AdapterSettings {
        self.settings
    }

    /// Check every collaborator once. Returns the first that is not ready.
    ///
    /// # Errors
    ///
    /// Returns [`PreflightFailure`] naming the modality whose check failed or timed out.
    pub async fn preflight(&self) -> Result<(), PreflightFailure> {
        let fail = |modality: Modality| move |error: AdapterError| PreflightFailure { modality, error };
        self.timed(TextClassifier::ready(&self.text))
            .await
            .map_err(fail(Modality::Text))?;
        self.timed(ImageClassifier::ready(&self.image))
            .await
            .map_err(fail(Modality::Image))?;
        self.timed(SpeechTranscriber::ready(&self.speech))
            .await
            .map_err(fail(Modality::Audio))?;
        Ok(())
    }

    /// Classify one text.
    ///
    /// # Errors
    ///
    /// Returns a [`ModalityFailure`] for empty input, classifier errors,
    /// timeouts, or non-finite scores.
    pub async fn analyze_text(
        &self,
        text: &str,
        source: TextSource,
    ) -> Result<TextScore, ModalityFailure> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ModalityFailure::new(
                Modality::Text,
                FailureReason::MalformedInput,
                "empty text",
            ));
        }

        let verdict = self
            .timed(self.text.analyze_text(text))
            .await
            .map_err(|e| failure(Modality::Text, &e))?;
        build_text_score(&verdict, text, source)
            .map_err(|detail| ModalityFailure::new(Modality::Text, FailureReason::Upstream, detail))
    }

    /// Classify one image.
    ///
    /// # Errors
    ///
    /// Returns a [`ModalityFailure`] for classifier errors, timeouts, or
    /// non-finite scores.
    pub async fn analyze_image(&self, image: &[u8]) -> Result<ImageScore, ModalityFailure> {
        let (nsfw, safe) = self.classify_nsfw(image).await?;
        Ok(ImageScore {
            nsfw_score: nsfw,
            safe_score: safe,
            is_nsfw: nsfw > self.settings.nsfw_threshold,
            source: ImageSource::Photo,
        })
    }

    /// Read an image from disk and classify it.
    ///
    /// # Errors
    ///
    /// See [`Self::analyze_image`]; an unreadable file is an acquisition failure.
    pub async fn analyze_image_file(&self, path: &Path) -> Result<ImageScore, ModalityFailure> {
        let bytes = read_file(path).await.map_err(|e| failure(Modality::Image, &e))?;
        self.analyze_image(&bytes).await
    }

    /// Classify sampled video frames and aggregate them into one score.
    ///
    /// Individual frame failures are tolerated; the aggregate covers the
    /// frames that succeeded. The video is NSFW when its worst frame is.
    ///
    /// # Errors
    ///
    /// Returns a [`ModalityFailure`] when there are no frames or every frame failed.
    pub async fn analyze_frames(&self, frames: &[PathBuf]) -> Result<ImageScore, ModalityFailure> {
        if frames.is_empty() {
            return Err(ModalityFailure::new(
                Modality::Image,
                FailureReason::Decode,
                "no frames to analyze",
            ));
        }

        let results: Vec<Result<f64, ModalityFailure>> = stream::iter(frames)
            .map(|frame| async move {
                let bytes = read_file(frame)
                    .await
                    .map_err(|e| failure(Modality::Image, &e))?;
                self.classify_nsfw(&bytes).await.map(|(nsfw, _)| nsfw)
            })
            .buffered(FRAME_CONCURRENCY)
            .collect()
            .await;

        let mut scores = Vec::with_capacity(results.len());
        let mut first_failure = None;
        for result in results {
            match result {
                Ok(score) => scores.push(score),
                Err(f) => {
                    tracing::debug!(reason = %f.reason, detail = %f.detail, "frame analysis failed");
                    first_failure.get_or_insert(f);
                }
            }
        }

        if scores.is_empty() {
            let mut f = first_failure.unwrap_or_else(|| {
                ModalityFailure::new(Modality::Image, FailureReason::Upstream, "no frame scored")
            });
            f.detail = format!("all {} frames failed: {}", frames.len(), f.detail);
            return Err(f);
        }

        let failed = frames.len() - scores.len();
        let aggregate = aggregate_frames(&scores, failed, self.settings.nsfw_threshold);
        Ok(ImageScore {
            nsfw_score: aggregate.avg,
            safe_score: 1.0 - aggregate.avg,
            is_nsfw: aggregate.max > self.settings.nsfw_threshold,
            source: ImageSource::VideoFrames(aggregate),
        })
    }

    /// Transcribe audio and feed a non-empty transcript back through
    /// [`Self::analyze_text`].
    ///
    /// # Errors
    ///
    /// Returns a [`ModalityFailure`] when transcription fails or times out.
    /// A failed transcript text analysis is reported in
    /// [`AudioAnalysis::text_failure`] instead.
    pub async fn analyze_audio(&self, audio: &[u8]) -> Result<AudioAnalysis, ModalityFailure> {
        let transcript = self
            .timed(self.speech.transcribe_audio(audio))
            .await
            .map_err(|e| failure(Modality::Audio, &e))?;

        let text = transcript.text.trim();
        let word_count = text.split_whitespace().count();
        let (transcript_score, text_failure) = if text.is_empty() {
            (None, None)
        } else {
            match self.analyze_text(text, TextSource::Transcript).await {
                Ok(score) => (Some(score), None),
                Err(f) => (None, Some(f)),
            }
        };

        Ok(AudioAnalysis {
            score: AudioScore {
                language: transcript.language,
                word_count,
                segment_count: transcript.segment_count,
                transcript_score,
            },
            text_failure,
        })
    }

    /// Read an audio file from disk and analyze it.
    ///
    /// # Errors
    ///
    /// See [`Self::analyze_audio`].
    pub async fn analyze_audio_file(&self, path: &Path) -> Result<AudioAnalysis, ModalityFailure> {
        let bytes = read_file(path).await.map_err(|e| failure(Modality::Audio, &e))?;
        self.analyze_audio(&bytes).await
    }

    async fn classify_nsfw(&self, image: &[u8]) -> Result<(f64, f64), ModalityFailure> {
        let verdict = self
            .timed(self.image.analyze_image(image))
            .await
            .map_err(|e| failure(Modality::Image, &e))?;
        let invalid = |what: &str, v: f64| {
            ModalityFailure::new(
                Modality::Image,
                FailureReason::Upstream,
                format!("non-finite {what} score {v}"),
            )
        };
        let nsfw = unit(verdict.nsfw).ok_or_else(|| invalid("nsfw", verdict.nsfw))?;
        let safe = match verdict.safe {
            Some(s) => unit(s).ok_or_else(|| invalid("safe", s))?,
            None => 1.0 - nsfw,
        };
        Ok((nsfw, safe))
    }

    async fn timed<R>(
        &self,
        fut: impl Future<Output = Result<R, AdapterError>>,
    ) -> Result<R, AdapterError> {
        tokio::time::timeout(self.settings.call_timeout, fut)
            .await
            .map_err(|_| AdapterError::Timeout(self.settings.call_timeout))?
    }
}

fn failure(modality: Modality, error: &AdapterError) -> ModalityFailure {
    ModalityFailure::new(modality, error.failure_reason(), error.to_string())
}

async fn read_file(path: &Path) -> Result<Vec<u8>, AdapterError> {
    tokio::fs::read(path).await.map_err(|source| AdapterError::Io {
        path: path.display().to_string(),
        source,
    })
}

/// Clamp into `[0, 1]`; `None` for NaN or infinities.
fn unit(v: f64) -> Option<f64> {
    v.is_finite().then(|| v.clamp(0.0, 1.0))
}

/// Map a sentiment label and its confidence onto `[-1, 1]`.
pub(crate) fn sentiment_from_label(label: &str, confidence: f64) -> (SentimentLabel, f64) {
    let label = label.to_lowercase();
    let confidence = confidence.clamp(0.0, 1.0);
    if label.contains("negative") {
        (SentimentLabel::Negative, -confidence)
    } else if label.contains("positive") {
        (SentimentLabel::Positive, confidence)
    } else {
        (SentimentLabel::Neutral, 0.0)
    }
}

fn build_text_score(
    verdict: &TextVerdict,
    text: &str,
    source: TextSource,
) -> Result<TextScore, String> {
    let check = |name: &str, v: f64| unit(v).ok_or_else(|| format!("non-finite {name} score {v}"));

    if !verdict.sentiment_confidence.is_finite() {
        return Err(format!(
            "non-finite sentiment confidence {}",
            verdict.sentiment_confidence
        ));
    }
    let (sentiment, sentiment_score) =
        sentiment_from_label(&verdict.sentiment_label, verdict.sentiment_confidence);

    let spam = detect_spam_patterns(text);
    let spam_score = match verdict.spam_score {
        Some(s) => check("spam", s)?,
        None => spam.score,
    };

    Ok(TextScore {
        toxicity: check("toxicity", verdict.toxicity)?,
        severe_toxicity: check("severe_toxicity", verdict.severe_toxicity)?,
        identity_attack: check("identity_attack", verdict.identity_attack)?,
        insult: check("insult", verdict.insult)?,
        obscene: check("obscene", verdict.obscene)?,
        threat: check("threat", verdict.threat)?,
        spam_score,
        spam_patterns: spam.patterns,
        sentiment,
        sentiment_score,
        source,
    })
}

#[allow(clippy::cast_precision_loss)]
fn aggregate_frames(scores: &[f64], failed: usize, threshold: f64) -> FrameAggregate {
    let mut sorted = scores.to_vec();
    sorted.sort_by(f64::total_cmp);
    let sum: f64 = sorted.iter().sum();
    let nsfw_frames = sorted.iter().filter(|s| **s > threshold).count();
    FrameAggregate {
        frame_count: sorted.len(),
        frames_failed: failed,
        avg: sum / sorted.len() as f64,
        max: sorted.last().copied().unwrap_or(0.0),
        min: sorted.first().copied().unwrap_or(0.0),
        nsfw_frames,
        nsfw_ratio: nsfw_frames as f64 / sorted.len() as f64,
    }
}
