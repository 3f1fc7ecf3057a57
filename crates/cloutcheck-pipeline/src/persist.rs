//! Persisted analysis artifacts, one JSON file per subject.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use cloutcheck_core::{slugify, SkippedEntry};
use cloutcheck_scoring::{FitReport, ReputationReport};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::PipelineError;
use crate::outcome::{BatchFatal, PostStatus};

/// Everything a run learned about one subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisArtifact {
    pub subject: String,
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub source_file: Option<String>,
    pub reputation: ReputationReport,
    #[serde(default)]
    pub brand_fit: Vec<FitReport>,
    #[serde(default)]
    pub posts: Vec<PostStatus>,
    /// Posts not started because the batch halted.
    #[serde(default)]
    pub skipped_posts: Vec<String>,
    /// Export entries that never became posts.
    #[serde(default)]
    pub skipped_entries: Vec<SkippedEntry>,
    pub batch_fatal: Option<BatchFatal>,
}

impl AnalysisArtifact {
    #[must_use]
    pub fn new(subject: impl Into<String>, reputation: ReputationReport) -> Self {
        Self {
            subject: subject.into(),
            run_id: Uuid::new_v4(),
            generated_at: Utc::now(),
            source_file: None,
            reputation,
            brand_fit: Vec::new(),
            posts: Vec::new(),
            skipped_posts: Vec::new(),
            skipped_entries: Vec::new(),
            batch_fatal: None,
        }
    }
}

/// Reads and writes artifacts under one results directory.
#[derive(Debug, Clone)]
pub struct ReportStore {
    dir: PathBuf,
}

impl ReportStore {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// `{dir}/{subject-slug}_analysis.json`
    #[must_use]
    pub fn path_for(&self, subject: &str) -> PathBuf {
        self.dir.join(format!("{}_analysis.json", slugify(subject)))
    }

    /// Write `artifact`, replacing any previous one for the same subject.
    ///
    /// The file is written next to its destination and renamed into place,
    /// so readers never observe a partial artifact.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] if encoding or any filesystem step fails.
    pub async fn save(&self, artifact: &AnalysisArtifact) -> Result<PathBuf, PipelineError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| PipelineError::io(&self.dir, e))?;

        let path = self.path_for(&artifact.subject);
        let tmp = path.with_extension(format!("json.{}.tmp", artifact.run_id.simple()));
        let body = serde_json::to_vec_pretty(artifact).map_err(PipelineError::Encode)?;

        if let Err(e) = tokio::fs::write(&tmp, &body).await {
            return Err(PipelineError::io(&tmp, e));
        }
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(PipelineError::io(&path, e));
        }
        tracing::info!(subject = %artifact.subject, path = %path.display(), "analysis saved");
        Ok(path)
    }

    /// Load the stored artifact for `subject`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::ArtifactNotFound`] when nothing is stored, or
    /// an I/O or decode error for an unreadable file.
    pub async fn load(&self, subject: &str) -> Result<AnalysisArtifact, PipelineError> {
        let path = self.path_for(subject);
        let body = match tokio::fs::read(&path).await {
            Ok(body) => body,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(PipelineError::ArtifactNotFound {
                    subject: subject.to_string(),
                    path: path.display().to_string(),
                });
            }
            Err(e) => return Err(PipelineError::io(&path, e)),
        };
        decode(&path, &body)
    }
}

fn decode(path: &Path, body: &[u8]) -> Result<AnalysisArtifact, PipelineError> {
    serde_json::from_slice(body).map_err(|source| PipelineError::Decode {
        path: path.display().to_string(),
        source,
    })
}
