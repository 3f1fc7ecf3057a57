use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

/// When downloaded media is deleted relative to a post's analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetentionPolicy {
    /// Delete right after the post's own analysis finishes.
    Immediate,
    /// Keep everything until the batch completes, bounded by the disk ceiling.
    EndOfBatch,
    /// Never delete automatically; the caller owns cleanup.
    None,
}

impl RetentionPolicy {
    /// Parse a policy name. `end` is accepted as a short form of `end_of_batch`.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "immediate" => Some(Self::Immediate),
            "end" | "end_of_batch" => Some(Self::EndOfBatch),
            "none" => Some(Self::None),
            _ => None,
        }
    }
}

impl std::fmt::Display for RetentionPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RetentionPolicy::Immediate => write!(f, "immediate"),
            RetentionPolicy::EndOfBatch => write!(f, "end_of_batch"),
            RetentionPolicy::None => write!(f, "none"),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub env: Environment,
    pub log_level: String,
    pub media_dir: PathBuf,
    pub results_dir: PathBuf,
    pub brands_dir: PathBuf,
    pub scoring_config_path: Option<PathBuf>,
    pub retention_policy: RetentionPolicy,
    pub disk_ceiling_mb: u64,
    pub budget_wait_secs: u64,
    pub max_concurrent_posts: usize,
    pub modality_timeout_secs: u64,
    pub video_max_frames: usize,
    pub video_fps_sample: u32,
    pub nsfw_threshold: f64,
    pub text_classifier_url: String,
    pub image_classifier_url: String,
    pub transcriber_url: String,
    pub classifier_api_key: Option<String>,
    pub fetch_timeout_secs: u64,
    pub fetch_user_agent: String,
    pub fetch_max_retries: u32,
    pub fetch_retry_backoff_base_ms: u64,
    pub ffmpeg_path: String,
}

impl AppConfig {
    /// Disk ceiling in bytes.
    #[must_use]
    pub fn disk_ceiling_bytes(&self) -> u64 {
        self.disk_ceiling_mb.saturating_mul(1024 * 1024)
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("log_level", &self.log_level)
            .field("media_dir", &self.media_dir)
            .field("results_dir", &self.results_dir)
            .field("brands_dir", &self.brands_dir)
            .field("scoring_config_path", &self.scoring_config_path)
            .field("retention_policy", &self.retention_policy)
            .field("disk_ceiling_mb", &self.disk_ceiling_mb)
            .field("budget_wait_secs", &self.budget_wait_secs)
            .field("max_concurrent_posts", &self.max_concurrent_posts)
            .field("modality_timeout_secs", &self.modality_timeout_secs)
            .field("video_max_frames", &self.video_max_frames)
            .field("video_fps_sample", &self.video_fps_sample)
            .field("nsfw_threshold", &self.nsfw_threshold)
            .field("text_classifier_url", &self.text_classifier_url)
            .field("image_classifier_url", &self.image_classifier_url)
            .field("transcriber_url", &self.transcriber_url)
            .field(
                "classifier_api_key",
                &self.classifier_api_key.as_ref().map(|_| "[redacted]"),
            )
            .field("fetch_timeout_secs", &self.fetch_timeout_secs)
            .field("fetch_user_agent", &self.fetch_user_agent)
            .field("fetch_max_retries", &self.fetch_max_retries)
            .field(
                "fetch_retry_backoff_base_ms",
                &self.fetch_retry_backoff_base_ms,
            )
            .field("ffmpeg_path", &self.ffmpeg_path)
            .finish()
    }
}
