//! Collaborator interfaces for the external models.
//!
//! Implementations return raw verdicts; clamping, thresholding and failure
//! isolation happen in [`crate::adapters::ModalityAdapters`].

use std::future::Future;

use crate::error::AdapterError;

/// Toxicity sub-scores and sentiment for one text.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextVerdict {
    pub toxicity: f64,
    pub severe_toxicity: f64,
    pub identity_attack: f64,
    pub insult: f64,
    pub obscene: f64,
    pub threat: f64,
    /// Raw label, e.g. `POSITIVE`, `negative`, `LABEL_1`.
    pub sentiment_label: String,
    pub sentiment_confidence: f64,
    /// Set when the model scores spam itself.
    pub spam_score: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImageVerdict {
    pub nsfw: f64,
    pub safe: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Transcript {
    pub text: String,
    pub language: Option<String>,
    pub segment_count: usize,
}

pub trait TextClassifier: Send + Sync {
    fn analyze_text(
        &self,
        text: &str,
    ) -> impl Future<Output = Result<TextVerdict, AdapterError>> + Send;

    /// Health check run once before a batch starts.
    fn ready(&self) -> impl Future<Output = Result<(), AdapterError>> + Send {
        async { Ok(()) }
    }
}

pub trait ImageClassifier: Send + Sync {
    fn analyze_image(
        &self,
        image: &[u8],
    ) -> impl Future<Output = Result<ImageVerdict, AdapterError>> + Send;

    fn ready(&self) -> impl Future<Output = Result<(), AdapterError>> + Send {
        async { Ok(()) }
    }
}

pub trait SpeechTranscriber: Send + Sync {
    fn transcribe_audio(
        &self,
        audio: &[u8],
    ) -> impl Future<Output = Result<Transcript, AdapterError>> + Send;

    fn ready(&self) -> impl Future<Output = Result<(), AdapterError>> + Send {
        async { Ok(()) }
    }
}
