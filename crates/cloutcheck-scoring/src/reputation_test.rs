use cloutcheck_core::{FailureReason, ModalityScore, TextSource};

use super::*;
use crate::fixtures::{audio, failed_record, photo, post, record, text};

fn default_report(records: &[ScoreRecord]) -> ReputationReport {
    compute_reputation(records, &ScoringConfig::default())
}

#[test]
fn bonus_above_ceiling_clamps_to_excellent() {
    // 100 - 3 - 1 - 0.6 + 8 = 103.4
    let p = post("p1", "sunny day #travel", 1);
    let records = vec![record(
        &p,
        vec![
            ModalityScore::Text(text(0.1, 0.05, 0.8)),
            ModalityScore::Image(photo(0.02)),
        ],
    )];

    let report = default_report(&records);
    assert_eq!(report.score, Score::Value(100.0));
    assert_eq!(report.rating, Rating::Excellent);
    assert_eq!(report.posts_analyzed, 1);
    assert_eq!(report.images_analyzed, 1);
}

#[test]
fn score_stays_within_bounds() {
    let p = post("p1", "", 1);
    let worst = vec![record(
        &p,
        vec![
            ModalityScore::Text(text(1.0, 1.0, -1.0)),
            ModalityScore::Image(photo(1.0)),
        ],
    )];
    let report = default_report(&worst);
    // 100 - 30 - 20 - 30 = 20
    assert_eq!(report.score, Score::Value(20.0));
    assert_eq!(report.rating, Rating::VeryPoor);

    let mut cfg = ScoringConfig::default();
    cfg.reputation.toxicity = 500.0;
    let floored = compute_reputation(&worst, &cfg);
    assert_eq!(floored.score, Score::Value(0.0));
}

#[test]
fn absent_modality_contributes_no_term() {
    // Text only: the nsfw term is skipped rather than counted as zero samples.
    let p = post("p1", "", 0);
    let records = vec![record(&p, vec![ModalityScore::Text(text(0.5, 0.0, 0.0))])];
    let report = default_report(&records);
    assert_eq!(report.score, Score::Value(85.0));
    assert!(report.per_modality_breakdown.image.is_none());
    assert!(report.per_modality_breakdown.audio.is_none());

    // Image only.
    let q = post("q1", "", 1);
    let records = vec![record(&q, vec![ModalityScore::Image(photo(0.5))])];
    let report = default_report(&records);
    assert_eq!(report.score, Score::Value(85.0));
    assert!(report.per_modality_breakdown.text.is_none());
}

#[test]
fn denominators_count_only_posts_with_the_modality() {
    let a = post("a", "", 1);
    let b = post("b", "", 0);
    let records = vec![
        record(&a, vec![ModalityScore::Image(photo(0.6))]),
        record(&b, vec![ModalityScore::Text(text(0.0, 0.0, 0.0))]),
    ];
    let report = default_report(&records);
    let image = report.per_modality_breakdown.image.as_ref().unwrap();
    assert_eq!(image.samples, 1);
    assert!((image.avg_nsfw - 0.6).abs() < 1e-9);
    // 100 - 30 * 0.6
    assert_eq!(report.score, Score::Value(82.0));
}

#[test]
fn transcript_text_pools_with_captions() {
    let p = post("v1", "", 0);
    let mut transcript = text(0.4, 0.0, 0.0);
    transcript.source = TextSource::Transcript;
    let records = vec![record(
        &p,
        vec![
            ModalityScore::Text(text(0.0, 0.0, 0.0)),
            ModalityScore::Audio(audio(12, Some(transcript))),
        ],
    )];
    let report = default_report(&records);
    let text = report.per_modality_breakdown.text.as_ref().unwrap();
    assert_eq!(text.samples, 2);
    assert_eq!(text.caption_samples, 1);
    assert_eq!(text.transcript_samples, 1);
    assert!((text.avg_toxicity - 0.2).abs() < 1e-9);
    let audio = report.per_modality_breakdown.audio.as_ref().unwrap();
    assert_eq!(audio.total_words, 12);
    assert_eq!(audio.languages.get("en"), Some(&1));
}

#[test]
fn permuting_records_yields_identical_report() {
    let records: Vec<ScoreRecord> = (0..7)
        .map(|i| {
            let p = post(&format!("p{i}"), &format!("post {i} #tag{}", i % 3), 1);
            let f = f64::from(i);
            record(
                &p,
                vec![
                    ModalityScore::Text(text(0.013 * f, 0.071 * f, 0.1 * f - 0.3)),
                    ModalityScore::Image(photo(0.11 * f)),
                ],
            )
        })
        .collect();

    let forward = default_report(&records);
    let mut reversed = records.clone();
    reversed.reverse();
    let mut rotated = records.clone();
    rotated.rotate_left(3);

    assert_eq!(forward, default_report(&reversed));
    assert_eq!(forward, default_report(&rotated));
}

#[test]
fn no_scorable_posts_is_insufficient_data() {
    let p = post("p1", "", 1);
    let report = default_report(&[failed_record(&p)]);
    assert_eq!(report.score, Score::InsufficientData);
    assert_eq!(report.rating, Rating::InsufficientData);
    assert_eq!(report.posts_analyzed, 1);
    assert_eq!(report.posts_scored, 0);
    assert_eq!(
        report.attempts.failures_by_reason.get(&FailureReason::ModelUnavailable),
        Some(&1)
    );

    let empty = default_report(&[]);
    assert_eq!(empty.score, Score::InsufficientData);
}

#[test]
fn audio_without_transcript_is_insufficient_data() {
    let p = post("p1", "", 0);
    let report = default_report(&[record(&p, vec![ModalityScore::Audio(audio(0, None))])]);
    assert_eq!(report.posts_scored, 1);
    assert_eq!(report.score, Score::InsufficientData);
    assert_eq!(report.rating, Rating::InsufficientData);
}

#[test]
fn failed_post_still_counts_as_analyzed() {
    let ok = post("ok", "", 0);
    let bad = post("bad", "", 2);
    let records = vec![
        record(&ok, vec![ModalityScore::Text(text(0.0, 0.0, 0.0))]),
        failed_record(&bad),
    ];
    let report = default_report(&records);
    assert_eq!(report.posts_analyzed, 2);
    assert_eq!(report.posts_scored, 1);
    assert_eq!(report.attempts.images_attempted, 2);
    assert_eq!(report.attempts.images_analyzed, 0);
}

#[test]
fn severe_penalties_apply_only_when_enabled() {
    let p = post("p1", "", 0);
    let mut t = text(0.0, 0.0, 0.0);
    t.identity_attack = 0.4;
    t.insult = 0.05;
    let records = vec![record(&p, vec![ModalityScore::Text(t)])];

    assert_eq!(default_report(&records).score, Score::Value(100.0));

    let mut cfg = ScoringConfig::default();
    cfg.severe_penalties.enabled = true;
    let report = compute_reputation(&records, &cfg);
    assert_eq!(report.score, Score::Value(80.0));
    assert_eq!(report.rating, Rating::Good);
}

#[test]
fn rating_bands() {
    let cases = [
        (100.0, Rating::Excellent),
        (90.0, Rating::Excellent),
        (89.99, Rating::Good),
        (75.0, Rating::Good),
        (60.0, Rating::Fair),
        (59.99, Rating::Poor),
        (40.0, Rating::Poor),
        (39.99, Rating::VeryPoor),
        (0.0, Rating::VeryPoor),
    ];
    for (value, expected) in cases {
        assert_eq!(Rating::for_score(Score::Value(value)), expected, "{value}");
    }
}

#[test]
fn score_serializes_as_number_or_sentinel() {
    assert_eq!(
        serde_json::to_value(Score::Value(87.5)).unwrap(),
        serde_json::json!(87.5)
    );
    assert_eq!(
        serde_json::to_value(Score::InsufficientData).unwrap(),
        serde_json::json!("insufficient_data")
    );
    assert_eq!(
        serde_json::to_value(Rating::VeryPoor).unwrap(),
        serde_json::json!("Very Poor")
    );
    let back: Score = serde_json::from_str("\"insufficient_data\"").unwrap();
    assert_eq!(back, Score::InsufficientData);
    assert!(serde_json::from_str::<Score>("\"lots\"").is_err());
}

#[test]
fn topics_and_engagement_are_summarized() {
    let a = post("a", "#Travel #food", 0);
    let b = post("b", "#travel", 0);
    let records = vec![
        record(&a, vec![ModalityScore::Text(text(0.0, 0.0, 0.0))]),
        record(&b, vec![ModalityScore::Text(text(0.0, 0.0, 0.0))]),
    ];
    let report = default_report(&records);
    assert_eq!(report.topics.get("travel"), Some(&2));
    assert_eq!(report.topics.get("food"), Some(&1));
    assert_eq!(report.engagement.total_likes, 200);
    assert!((report.engagement.avg_comments - 10.0).abs() < 1e-9);
}
