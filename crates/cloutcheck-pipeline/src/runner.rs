//! Batch runner: drives every post through acquisition, analysis and cleanup.

use std::sync::atomic::{AtomicBool, Ordering};

use cloutcheck_analysis::{ImageClassifier, ModalityAdapters, SpeechTranscriber, TextClassifier};
use cloutcheck_core::{
    FailureReason, MediaKind, Modality, ModalityFailure, ModalityScore, Post, ScoreRecord,
    ScoreRecordBuilder, TextScore, TextSource,
};
use cloutcheck_media::{DecodedVideo, MediaError, MediaFetcher, MediaHandle, MediaStore, VideoDecoder};
use futures::future::join_all;
use futures::stream::{self, StreamExt};
use tracing::{debug, error, info, warn};

use crate::outcome::{BatchFatal, BatchOutcome, PostStatus};
use crate::stage::{PostProgress, PostStage, PostState};

#[derive(Debug, Clone, Copy)]
pub struct PipelineSettings {
    pub max_concurrent_posts: usize,
    pub video_max_frames: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            max_concurrent_posts: 1,
            video_max_frames: 16,
        }
    }
}

/// Scores and failures produced from a post's downloaded media.
#[derive(Default)]
struct MediaAnalysis {
    scores: Vec<ModalityScore>,
    failures: Vec<ModalityFailure>,
    videos_analyzed: usize,
}

struct PostRun {
    status: PostStatus,
    record: ScoreRecord,
    retained: Option<MediaHandle>,
    fatal: Option<BatchFatal>,
}

enum Slot {
    Ran(Box<PostRun>),
    Skipped(String),
}

pub struct Pipeline<F, D, T, I, S> {
    store: MediaStore<F>,
    decoder: D,
    adapters: ModalityAdapters<T, I, S>,
    settings: PipelineSettings,
}

impl<F, D, T, I, S> Pipeline<F, D, T, I, S>
where
    F: MediaFetcher,
    D: VideoDecoder,
    T: TextClassifier,
    I: ImageClassifier,
    S: SpeechTranscriber,
{
    pub fn new(
        store: MediaStore<F>,
        decoder: D,
        adapters: ModalityAdapters<T, I, S>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            store,
            decoder,
            adapters,
            settings,
        }
    }

    #[must_use]
    pub fn store(&self) -> &MediaStore<F> {
        &self.store
    }

    /// Run every post and return their records in input order.
    ///
    /// A single post's failure never aborts the batch. A batch-fatal
    /// condition stops posts that have not started yet; posts already in
    /// flight finish and release their media normally.
    pub async fn run_batch(&self, posts: &[Post]) -> BatchOutcome {
        if let Err(failure) = self.adapters.preflight().await {
            let fatal = BatchFatal::AdapterUnavailable {
                modality: failure.modality,
                reason: failure.error.to_string(),
            };
            error!(error = %fatal, posts = posts.len(), "preflight failed, batch not started");
            return BatchOutcome {
                skipped: posts.iter().map(|p| p.id.clone()).collect(),
                fatal: Some(fatal),
                ..BatchOutcome::default()
            };
        }

        let concurrency = self.settings.max_concurrent_posts.max(1);
        info!(
            posts = posts.len(),
            concurrency,
            policy = %self.store.policy(),
            "starting batch"
        );

        let cancelled = AtomicBool::new(false);
        let slots: Vec<Slot> = stream::iter(posts)
            .map(|post| {
                let cancelled = &cancelled;
                async move {
                    if cancelled.load(Ordering::SeqCst) {
                        return Slot::Skipped(post.id.clone());
                    }
                    let run = self.process_post(post).await;
                    if run.fatal.is_some() {
                        cancelled.store(true, Ordering::SeqCst);
                    }
                    Slot::Ran(Box::new(run))
                }
            })
            .buffered(concurrency)
            .collect()
            .await;

        // Full barrier reached: every started post is scored or failed.
        self.store.flush_deferred().await;

        let mut outcome = BatchOutcome::default();
        for slot in slots {
            match slot {
                Slot::Skipped(id) => outcome.skipped.push(id),
                Slot::Ran(run) => {
                    let PostRun {
                        status,
                        record,
                        retained,
                        fatal,
                    } = *run;
                    if outcome.fatal.is_none() {
                        outcome.fatal = fatal;
                    }
                    outcome.records.push(record);
                    outcome.statuses.push(status);
                    outcome.retained.extend(retained);
                }
            }
        }

        if let Some(fatal) = &outcome.fatal {
            error!(
                error = %fatal,
                skipped = outcome.skipped.len(),
                "batch halted"
            );
        }
        info!(
            started = outcome.records.len(),
            failed = outcome.failed_count(),
            skipped = outcome.skipped.len(),
            peak_resident_bytes = self.store.peak_resident_bytes(),
            "batch finished"
        );
        outcome
    }

    async fn process_post(&self, post: &Post) -> PostRun {
        let mut progress = PostProgress::new(&post.id);
        let mut builder = ScoreRecordBuilder::new(post);
        let mut fatal = None;

        let mut handle = if post.has_media() {
            match self.store.acquire(post).await {
                Ok(handle) => {
                    for failed in handle.failed() {
                        for &modality in modalities_of(failed.source.kind) {
                            builder.push_failure(ModalityFailure::new(
                                modality,
                                FailureReason::Acquisition,
                                failed.reason.clone(),
                            ));
                        }
                    }
                    step(&mut progress, PostStage::MediaAcquired);
                    Some(handle)
                }
                Err(e) => {
                    warn!(post = %post.id, error = %e, "media acquisition failed, continuing text-only");
                    if let MediaError::ResourceExhausted {
                        requested_bytes,
                        ceiling_bytes,
                        oversize: false,
                    } = &e
                    {
                        fatal = Some(BatchFatal::DiskBudget {
                            requested_bytes: *requested_bytes,
                            ceiling_bytes: *ceiling_bytes,
                        });
                    }
                    for modality in media_modalities(post) {
                        builder.push_failure(ModalityFailure::new(
                            modality,
                            e.failure_reason(),
                            e.to_string(),
                        ));
                    }
                    None
                }
            }
        } else {
            None
        };

        step(&mut progress, PostStage::Analyzing);

        let text = post.analysis_text();
        let (caption, media) = tokio::join!(
            self.analyze_caption(&text),
            self.analyze_media(handle.as_mut()),
        );

        match caption {
            Some(Ok(score)) => {
                builder.push_score(ModalityScore::Text(score));
            }
            Some(Err(failure)) => {
                builder.push_failure(failure);
            }
            None => {}
        }
        for score in media.scores {
            builder.push_score(score);
        }
        for failure in media.failures {
            builder.push_failure(failure);
        }
        for _ in 0..media.videos_analyzed {
            builder.mark_video_analyzed();
        }
        let record = builder.finish();

        if record.is_scored() {
            step(&mut progress, PostStage::Scored);
        } else {
            let reason = record.failures().first().map_or_else(
                || "post has no analyzable content".to_string(),
                |f| format!("no modality succeeded ({}: {})", f.reason, f.detail),
            );
            if let Err(e) = progress.fail(reason) {
                warn!(error = %e, "stage bookkeeping rejected failure");
            }
        }

        // Cleanup runs whether or not analysis succeeded.
        let retained = match handle {
            Some(handle) => self.store.finish(handle).await,
            None => None,
        };
        if !progress.is_failed() {
            step(&mut progress, PostStage::Cleaned);
        }

        let state = progress.into_state();
        match &state {
            PostState::Failed { reason, .. } => {
                warn!(post = %post.id, reason = %reason, "post failed");
            }
            PostState::Active { .. } => {
                debug!(
                    post = %post.id,
                    scores = record.scores().len(),
                    failures = record.failures().len(),
                    "post scored"
                );
            }
        }

        PostRun {
            status: PostStatus {
                post_id: post.id.clone(),
                state,
            },
            record,
            retained,
            fatal,
        }
    }

    async fn analyze_caption(
        &self,
        text: &str,
    ) -> Option<Result<TextScore, ModalityFailure>> {
        if text.is_empty() {
            return None;
        }
        Some(self.adapters.analyze_text(text, TextSource::Caption).await)
    }

    async fn analyze_media(&self, handle: Option<&mut MediaHandle>) -> MediaAnalysis {
        let Some(handle) = handle else {
            return MediaAnalysis::default();
        };

        let decoded = self.decode_videos(handle).await;
        let handle = &*handle;
        let images = join_all(
            handle
                .assets_of(MediaKind::Image)
                .map(|asset| self.adapters.analyze_image_file(&asset.path)),
        );
        let videos = join_all(
            decoded
                .into_iter()
                .map(|video| self.analyze_video(handle.post_id(), video)),
        );
        let (images, videos) = tokio::join!(images, videos);

        let mut analysis = MediaAnalysis::default();
        for result in images {
            match result {
                Ok(score) => analysis.scores.push(ModalityScore::Image(score)),
                Err(failure) => analysis.failures.push(failure),
            }
        }
        for video in videos {
            if !video.scores.is_empty() {
                analysis.videos_analyzed += 1;
            }
            analysis.scores.extend(video.scores);
            analysis.failures.extend(video.failures);
        }
        analysis
    }

    /// Decode every video of the handle into its directory and charge the
    /// derived frames and audio to the disk budget.
    async fn decode_videos(&self, handle: &mut MediaHandle) -> Vec<Result<DecodedVideo, MediaError>> {
        let max_frames = self.settings.video_max_frames;
        let decoded = join_all(
            handle
                .assets_of(MediaKind::Video)
                .map(|asset| self.decoder.decode(&asset.path, handle.dir(), max_frames)),
        )
        .await;

        let mut charged = Vec::with_capacity(decoded.len());
        for result in decoded {
            charged.push(match result {
                Ok(video) => self.store.charge(handle, &video.files()).await.map(|_| video),
                Err(e) => Err(e),
            });
        }
        charged
    }

    /// Analyze one decoded video's frames and audio track.
    async fn analyze_video(
        &self,
        post_id: &str,
        decoded: Result<DecodedVideo, MediaError>,
    ) -> MediaAnalysis {
        let mut analysis = MediaAnalysis::default();
        let decoded = match decoded {
            Ok(decoded) => decoded,
            Err(e) => {
                warn!(post = %post_id, error = %e, "video unavailable for analysis");
                for modality in [Modality::Image, Modality::Audio] {
                    analysis.failures.push(ModalityFailure::new(
                        modality,
                        e.failure_reason(),
                        e.to_string(),
                    ));
                }
                return analysis;
            }
        };

        let frames = self.adapters.analyze_frames(&decoded.frames);
        let audio = async {
            match &decoded.audio {
                Some(path) => Some(self.adapters.analyze_audio_file(path).await),
                None => None,
            }
        };
        let (frames, audio) = tokio::join!(frames, audio);

        match frames {
            Ok(score) => analysis.scores.push(ModalityScore::Image(score)),
            Err(failure) => analysis.failures.push(failure),
        }
        match audio {
            Some(Ok(audio)) => {
                analysis.scores.push(ModalityScore::Audio(audio.score));
                analysis.failures.extend(audio.text_failure);
            }
            Some(Err(failure)) => analysis.failures.push(failure),
            None => debug!(post = %post_id, "video has no audio track"),
        }
        analysis
    }
}

/// Advance `progress`, logging instead of panicking on a bookkeeping bug.
fn step(progress: &mut PostProgress, next: PostStage) {
    if let Err(e) = progress.advance(next) {
        warn!(error = %e, "stage bookkeeping rejected transition");
    }
}

/// Modalities a single media item feeds.
fn modalities_of(kind: MediaKind) -> &'static [Modality] {
    match kind {
        MediaKind::Image => &[Modality::Image],
        MediaKind::Video => &[Modality::Image, Modality::Audio],
    }
}

/// Modalities a post's media would have produced: images for every post with
/// media, audio as well when any of it is video.
fn media_modalities(post: &Post) -> Vec<Modality> {
    let mut modalities = vec![Modality::Image];
    if post.media_count(MediaKind::Video) > 0 {
        modalities.push(Modality::Audio);
    }
    modalities
}
