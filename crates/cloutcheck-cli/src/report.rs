use cloutcheck_core::AppConfig;
use cloutcheck_pipeline::{AnalysisArtifact, PostState, ReportStore};
use cloutcheck_scoring::FitReport;

pub(crate) async fn run_report(config: &AppConfig, subject: &str) -> anyhow::Result<()> {
    let artifact = ReportStore::new(&config.results_dir).load(subject).await?;
    print_summary(&artifact);
    Ok(())
}

pub(crate) fn print_summary(artifact: &AnalysisArtifact) {
    let rep = &artifact.reputation;
    println!("subject:     {}", artifact.subject);
    println!("run:         {} ({})", artifact.run_id, artifact.generated_at.to_rfc3339());
    if let Some(source) = &artifact.source_file {
        println!("source:      {source}");
    }
    println!("score:       {} ({})", rep.score, rep.rating);
    println!(
        "posts:       {} analyzed, {} scored, {} failed",
        rep.posts_analyzed,
        rep.posts_scored,
        failed_posts(artifact)
    );
    println!(
        "media:       {} images, {} videos",
        rep.images_analyzed, rep.videos_analyzed
    );

    let b = &rep.per_modality_breakdown;
    if let Some(text) = &b.text {
        println!(
            "text:        toxicity avg {:.3} max {:.3}, spam avg {:.3}, sentiment {:.3} ({} samples)",
            text.avg_toxicity, text.max_toxicity, text.avg_spam, text.avg_sentiment, text.samples
        );
    }
    if let Some(image) = &b.image {
        println!(
            "image:       nsfw avg {:.3} max {:.3}, {} flagged ({} samples)",
            image.avg_nsfw, image.max_nsfw, image.nsfw_images, image.samples
        );
    }
    if let Some(audio) = &b.audio {
        println!(
            "audio:       {} transcribed, {} words ({} samples)",
            audio.transcribed, audio.total_words, audio.samples
        );
    }

    for (reason, count) in &rep.attempts.failures_by_reason {
        println!("failure:     {reason} x{count}");
    }
    if !artifact.skipped_entries.is_empty() {
        println!("skipped:     {} export entries", artifact.skipped_entries.len());
    }
    if !artifact.skipped_posts.is_empty() {
        println!("not started: {} posts", artifact.skipped_posts.len());
    }
    if let Some(fatal) = &artifact.batch_fatal {
        println!("halted:      {fatal}");
    }
    for fit in &artifact.brand_fit {
        print_fit(fit);
    }
}

pub(crate) fn print_fit(fit: &FitReport) {
    println!("brand:       {} {:.1} ({})", fit.brand_name, fit.fit_score, fit.rating);
    for risk in &fit.risk_factors {
        println!("  risk:      {}", risk.message);
    }
    for reason in &fit.reasons {
        println!("  reason:    {reason}");
    }
    if !fit.details.unchecked.is_empty() {
        println!("  unchecked: {}", fit.details.unchecked.join(", "));
    }
}

fn failed_posts(artifact: &AnalysisArtifact) -> usize {
    artifact
        .posts
        .iter()
        .filter(|p| matches!(p.state, PostState::Failed { .. }))
        .count()
}
