//! Modality adapters: classifier collaborator traits, an HTTP implementation
//! of them, spam-pattern detection, and the failure-isolating
//! [`ModalityAdapters`] the pipeline calls.

pub mod adapters;
pub mod classifier;
pub mod error;
pub mod http;
pub mod spam;

pub use adapters::{AdapterSettings, AudioAnalysis, ModalityAdapters, PreflightFailure};
pub use classifier::{
    ImageClassifier, ImageVerdict, SpeechTranscriber, TextClassifier, TextVerdict, Transcript,
};
pub use error::AdapterError;
pub use http::HttpClassifierClient;
pub use spam::{detect_spam_patterns, SpamReport};
