//! JSON-over-HTTP client for model-serving endpoints.
//!
//! | Call | Request | Response |
//! |------|---------|----------|
//! | `POST {text}/v1/text` | `{"text": "..."}` | `{"toxicity": <labels>, "sentiment": <labels>, "spam_score"?: f64}` |
//! | `POST {image}/v1/image` | raw image bytes | `<labels>` or `{"labels": <labels>}` |
//! | `POST {speech}/v1/transcribe` | raw WAV bytes | `{"text": "...", "language"?: "en", "segments"?: [...]}` |
//! | `GET {base}/health` | | any 2xx |
//!
//! `<labels>` may be a single `{"label", "score"}` object, a list of them, a
//! list of lists (batched pipelines), or a plain `{label: score}` map. Label
//! names are case- and separator-insensitive (`Identity Attack` and
//! `identity_attack` are the same label).

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::classifier::{
    ImageClassifier, ImageVerdict, SpeechTranscriber, TextClassifier, TextVerdict, Transcript,
};
use crate::error::AdapterError;

const NSFW_LABELS: &[&str] = &["nsfw", "porn", "hentai", "sexy", "explicit", "unsafe"];
const SAFE_LABELS: &[&str] = &["normal", "safe", "sfw", "neutral", "drawings"];

#[derive(Debug, Deserialize)]
struct LabelScore {
    label: String,
    score: f64,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum LabelSet {
    Nested(Vec<Vec<LabelScore>>),
    List(Vec<LabelScore>),
    Single(LabelScore),
    Map(HashMap<String, f64>),
}

impl LabelSet {
    /// Flatten into `normalized label -> score`, keeping the highest score on duplicates.
    fn into_map(self) -> HashMap<String, f64> {
        let pairs: Vec<(String, f64)> = match self {
            LabelSet::Nested(outer) => outer
                .into_iter()
                .next()
                .unwrap_or_default()
                .into_iter()
                .map(|l| (l.label, l.score))
                .collect(),
            LabelSet::List(list) => list.into_iter().map(|l| (l.label, l.score)).collect(),
            LabelSet::Single(l) => vec![(l.label, l.score)],
            LabelSet::Map(map) => map.into_iter().collect(),
        };

        let mut out: HashMap<String, f64> = HashMap::new();
        for (label, score) in pairs {
            let entry = out.entry(normalize_label(&label)).or_insert(score);
            if score > *entry {
                *entry = score;
            }
        }
        out
    }
}

fn normalize_label(label: &str) -> String {
    label
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| if c == ' ' || c == '-' { '_' } else { c })
        .collect()
}

fn max_of(map: &HashMap<String, f64>, labels: &[&str]) -> Option<f64> {
    labels
        .iter()
        .filter_map(|l| map.get(*l).copied())
        .fold(None, |acc, v| Some(acc.map_or(v, |a: f64| a.max(v))))
}

#[derive(Serialize)]
struct TextRequest<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct TextResponse {
    toxicity: LabelSet,
    sentiment: LabelSet,
    #[serde(default)]
    spam_score: Option<f64>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ImageResponse {
    Wrapped { labels: LabelSet },
    Bare(LabelSet),
}

#[derive(Deserialize)]
struct TranscribeResponse {
    #[serde(default)]
    text: String,
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    segments: Vec<serde_json::Value>,
}

/// Client for the text, image and speech model servers. Cloning shares the
/// underlying connection pool.
#[derive(Clone)]
pub struct HttpClassifierClient {
    client: reqwest::Client,
    text_base: String,
    image_base: String,
    speech_base: String,
    api_key: Option<String>,
}

impl HttpClassifierClient {
    /// # Errors
    ///
    /// Returns [`AdapterError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(
        text_base: &str,
        image_base: &str,
        speech_base: &str,
        api_key: Option<String>,
        timeout_secs: u64,
    ) -> Result<Self, AdapterError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            text_base: text_base.trim_end_matches('/').to_string(),
            image_base: image_base.trim_end_matches('/').to_string(),
            speech_base: speech_base.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    async fn send<T: serde::de::DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        endpoint: &str,
    ) -> Result<T, AdapterError> {
        let response = self.authorize(request).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AdapterError::UnexpectedStatus {
                status: status.as_u16(),
                endpoint: endpoint.to_string(),
            });
        }
        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| AdapterError::MalformedResponse {
            endpoint: endpoint.to_string(),
            reason: e.to_string(),
        })
    }

    async fn health(&self, base: &str) -> Result<(), AdapterError> {
        let url = format!("{base}/health");
        let response = self
            .authorize(self.client.get(&url))
            .send()
            .await
            .map_err(|e| AdapterError::ModelUnavailable(format!("{url}: {e}")))?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(AdapterError::ModelUnavailable(format!(
                "{url} returned status {}",
                response.status()
            )))
        }
    }

    async fn post_bytes<T: serde::de::DeserializeOwned>(
        &self,
        url: String,
        bytes: &[u8],
        content_type: &'static str,
    ) -> Result<T, AdapterError> {
        let request = self
            .client
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes.to_vec());
        self.send(request, &url).await
    }
}

impl TextClassifier for HttpClassifierClient {
    async fn analyze_text(&self, text: &str) -> Result<TextVerdict, AdapterError> {
        let url = format!("{}/v1/text", self.text_base);
        let response: TextResponse = self
            .send(self.client.post(&url).json(&TextRequest { text }), &url)
            .await?;
        text_verdict(response, &url)
    }

    async fn ready(&self) -> Result<(), AdapterError> {
        self.health(&self.text_base).await
    }
}

impl ImageClassifier for HttpClassifierClient {
    async fn analyze_image(&self, image: &[u8]) -> Result<ImageVerdict, AdapterError> {
        let url = format!("{}/v1/image", self.image_base);
        let response: ImageResponse = self
            .post_bytes(url.clone(), image, "application/octet-stream")
            .await?;
        image_verdict(response, &url)
    }

    async fn ready(&self) -> Result<(), AdapterError> {
        self.health(&self.image_base).await
    }
}

impl SpeechTranscriber for HttpClassifierClient {
    async fn transcribe_audio(&self, audio: &[u8]) -> Result<Transcript, AdapterError> {
        let url = format!("{}/v1/transcribe", self.speech_base);
        let response: TranscribeResponse = self.post_bytes(url, audio, "audio/wav").await?;
        Ok(Transcript {
            text: response.text.trim().to_string(),
            language: response
                .language
                .filter(|l| !l.is_empty() && l != "unknown"),
            segment_count: response.segments.len(),
        })
    }

    async fn ready(&self) -> Result<(), AdapterError> {
        self.health(&self.speech_base).await
    }
}

fn text_verdict(response: TextResponse, endpoint: &str) -> Result<TextVerdict, AdapterError> {
    let toxicity = response.toxicity.into_map();
    if toxicity.is_empty() {
        return Err(AdapterError::MalformedResponse {
            endpoint: endpoint.to_string(),
            reason: "no toxicity labels".to_string(),
        });
    }
    let get = |label: &str| toxicity.get(label).copied().unwrap_or(0.0);

    let (sentiment_label, sentiment_confidence) = response
        .sentiment
        .into_map()
        .into_iter()
        .max_by(|a, b| a.1.total_cmp(&b.1).then_with(|| b.0.cmp(&a.0)))
        .unwrap_or_else(|| ("neutral".to_string(), 0.0));

    Ok(TextVerdict {
        toxicity: max_of(&toxicity, &["toxicity", "toxic"]).unwrap_or(0.0),
        severe_toxicity: get("severe_toxicity"),
        identity_attack: get("identity_attack"),
        insult: get("insult"),
        obscene: get("obscene"),
        threat: get("threat"),
        sentiment_label,
        sentiment_confidence,
        spam_score: response.spam_score,
    })
}

fn image_verdict(response: ImageResponse, endpoint: &str) -> Result<ImageVerdict, AdapterError> {
    let labels = match response {
        ImageResponse::Wrapped { labels } | ImageResponse::Bare(labels) => labels.into_map(),
    };
    let nsfw = max_of(&labels, NSFW_LABELS).ok_or_else(|| AdapterError::MalformedResponse {
        endpoint: endpoint.to_string(),
        reason: format!(
            "no NSFW label among {:?}",
            labels.keys().collect::<Vec<_>>()
        ),
    })?;
    Ok(ImageVerdict {
        nsfw,
        safe: max_of(&labels, SAFE_LABELS),
    })
}
