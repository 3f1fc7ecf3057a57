//! `analyze`: ingest an export, run the batch, score it and store the artifact.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use cloutcheck_analysis::{AdapterSettings, HttpClassifierClient, ModalityAdapters};
use cloutcheck_core::{load_posts, AppConfig, MediaKind, Post, RetentionPolicy};
use cloutcheck_media::{FfmpegDecoder, HttpMediaFetcher, MediaStore, MediaStoreConfig};
use cloutcheck_pipeline::{AnalysisArtifact, Pipeline, PipelineSettings, ReportStore};
use cloutcheck_scoring::{compute_reputation, load_scoring_config, ScoringConfig};

use crate::brand_fit::evaluate_all;
use crate::report::print_summary;

#[derive(Debug)]
pub(crate) struct AnalyzeOptions {
    pub posts: PathBuf,
    pub subject: Option<String>,
    pub retention: Option<RetentionPolicy>,
    pub concurrency: Option<usize>,
    pub skip_brand_fit: bool,
    pub dry_run: bool,
}

/// Scoring weights from the configured YAML file, or the built-in defaults.
pub(crate) fn scoring_config(config: &AppConfig) -> anyhow::Result<ScoringConfig> {
    match &config.scoring_config_path {
        Some(path) => Ok(load_scoring_config(path)?),
        None => Ok(ScoringConfig::default()),
    }
}

pub(crate) fn subject_for(options: &AnalyzeOptions) -> anyhow::Result<String> {
    if let Some(subject) = &options.subject {
        return Ok(subject.clone());
    }
    options
        .posts
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .filter(|s| !s.is_empty())
        .with_context(|| {
            format!(
                "cannot derive a subject from {}; pass --subject",
                options.posts.display()
            )
        })
}

pub(crate) async fn run_analyze(config: &AppConfig, options: AnalyzeOptions) -> anyhow::Result<()> {
    let subject = subject_for(&options)?;
    let policy = options.retention.unwrap_or(config.retention_policy);
    let concurrency = options.concurrency.unwrap_or(config.max_concurrent_posts);
    let scoring = scoring_config(config)?;

    let ingested = load_posts(&options.posts)?;
    for skipped in &ingested.skipped {
        tracing::warn!(index = skipped.index, reason = %skipped.reason, "skipped export entry");
    }
    tracing::info!(
        subject = %subject,
        posts = ingested.posts.len(),
        skipped = ingested.skipped.len(),
        "export loaded"
    );

    if options.dry_run {
        print_plan(&subject, &ingested.posts, policy, concurrency);
        return Ok(());
    }

    let fetcher = HttpMediaFetcher::new(
        config.fetch_timeout_secs,
        &config.fetch_user_agent,
        config.fetch_max_retries,
        config.fetch_retry_backoff_base_ms,
    )?;
    let store = MediaStore::new(
        fetcher,
        MediaStoreConfig {
            root: config.media_dir.clone(),
            policy,
            ceiling_bytes: config.disk_ceiling_bytes(),
            budget_wait: Duration::from_secs(config.budget_wait_secs),
        },
    );
    let client = HttpClassifierClient::new(
        &config.text_classifier_url,
        &config.image_classifier_url,
        &config.transcriber_url,
        config.classifier_api_key.clone(),
        config.modality_timeout_secs,
    )?;
    let adapters = ModalityAdapters::new(
        client.clone(),
        client.clone(),
        client,
        AdapterSettings {
            call_timeout: Duration::from_secs(config.modality_timeout_secs),
            nsfw_threshold: config.nsfw_threshold,
        },
    );
    let pipeline = Pipeline::new(
        store,
        FfmpegDecoder::new(config.ffmpeg_path.clone(), config.video_fps_sample),
        adapters,
        PipelineSettings {
            max_concurrent_posts: concurrency,
            video_max_frames: config.video_max_frames,
        },
    );

    let outcome = pipeline.run_batch(&ingested.posts).await;
    tracing::info!(
        started = outcome.statuses.len(),
        failed = outcome.failed_count(),
        not_started = outcome.skipped.len(),
        peak_resident_bytes = pipeline.store().peak_resident_bytes(),
        "batch finished"
    );
    for handle in &outcome.retained {
        tracing::info!(post = %handle.post_id(), dir = %handle.dir().display(), "media retained");
    }

    let reputation = compute_reputation(&outcome.records, &scoring);
    let mut artifact = AnalysisArtifact::new(subject, reputation);
    artifact.source_file = Some(options.posts.display().to_string());
    artifact.posts = outcome.statuses;
    artifact.skipped_posts = outcome.skipped;
    artifact.skipped_entries = ingested.skipped;
    artifact.batch_fatal.clone_from(&outcome.fatal);

    if options.skip_brand_fit {
        tracing::info!("brand fit skipped");
    } else {
        artifact.brand_fit = evaluate_all(config, &artifact.reputation, &scoring)?;
    }

    let path = ReportStore::new(&config.results_dir).save(&artifact).await?;
    print_summary(&artifact);
    println!("saved: {}", path.display());

    if let Some(fatal) = outcome.fatal {
        anyhow::bail!("batch halted early: {fatal}");
    }
    Ok(())
}

fn print_plan(subject: &str, posts: &[Post], policy: RetentionPolicy, concurrency: usize) {
    let count = |kind: MediaKind| posts.iter().map(|p| p.media_count(kind)).sum::<usize>();
    println!("subject:      {subject}");
    println!("posts:        {}", posts.len());
    println!("with media:   {}", posts.iter().filter(|p| p.has_media()).count());
    println!("images:       {}", count(MediaKind::Image));
    println!("videos:       {}", count(MediaKind::Video));
    println!("retention:    {policy}");
    println!("concurrency:  {concurrency}");
    println!("dry run: nothing downloaded or analyzed");
}
