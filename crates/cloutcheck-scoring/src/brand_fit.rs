//! Brand-fit evaluation of a [`ReputationReport`] against a [`BrandPolicy`].
//!
//! Each violated safety category yields exactly one risk factor and deducts
//! its configured penalty once. Categories whose metric is absent from the
//! report (for example NSFW on a text-only batch) are skipped, not failed.

use std::fmt;

use cloutcheck_core::BrandPolicy;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::FitPenalties;
use crate::reputation::ReputationReport;
use crate::stats::round_to;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FitRating {
    #[serde(rename = "Perfect Match")]
    PerfectMatch,
    #[serde(rename = "Good Fit")]
    GoodFit,
    #[serde(rename = "Moderate Risk")]
    ModerateRisk,
    #[serde(rename = "High Risk")]
    HighRisk,
    #[serde(rename = "Unsafe / Do Not Partner")]
    Unsafe,
}

impl FitRating {
    #[must_use]
    pub fn for_score(score: f64) -> Self {
        if score >= 90.0 {
            Self::PerfectMatch
        } else if score >= 75.0 {
            Self::GoodFit
        } else if score >= 60.0 {
            Self::ModerateRisk
        } else if score >= 40.0 {
            Self::HighRisk
        } else {
            Self::Unsafe
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PerfectMatch => "Perfect Match",
            Self::GoodFit => "Good Fit",
            Self::ModerateRisk => "Moderate Risk",
            Self::HighRisk => "High Risk",
            Self::Unsafe => "Unsafe / Do Not Partner",
        }
    }
}

impl fmt::Display for FitRating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskFactor {
    /// Policy key that was violated, e.g. `max_toxicity`.
    pub metric: String,
    pub observed: f64,
    pub threshold: f64,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FitDetails {
    pub safety_penalty: f64,
    pub topic_penalty: f64,
    pub values_bonus: f64,
    pub excluded_topics_found: Vec<String>,
    pub value_matches: Vec<String>,
    /// Categories skipped because the report carries no samples for them.
    pub unchecked: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitReport {
    pub brand_name: String,
    pub fit_score: f64,
    pub rating: FitRating,
    pub risk_factors: Vec<RiskFactor>,
    pub reasons: Vec<String>,
    pub details: FitDetails,
}

struct Check<'a> {
    metric: &'static str,
    observed: Option<f64>,
    threshold: Option<f64>,
    penalty: f64,
    message: &'a dyn Fn(f64, f64) -> String,
}

/// Evaluate how well the reported content fits `policy`.
#[must_use]
#[allow(clippy::cast_precision_loss, clippy::too_many_lines)]
pub fn evaluate_fit(
    report: &ReputationReport,
    policy: &BrandPolicy,
    penalties: &FitPenalties,
) -> FitReport {
    let text = report.per_modality_breakdown.text.as_ref();
    let image = report.per_modality_breakdown.image.as_ref();
    let limits = &policy.avoid_content;

    let checks = [
        Check {
            metric: "max_toxicity",
            observed: text.map(|t| t.avg_toxicity),
            threshold: limits.max_toxicity,
            penalty: penalties.toxicity,
            message: &|o: f64, t: f64| format!("High average toxicity ({o:.2} > {t})"),
        },
        Check {
            metric: "max_identity_attack",
            observed: text.map(|t| t.max_identity_attack),
            threshold: limits.max_identity_attack,
            penalty: penalties.identity_attack,
            message: &|o: f64, t: f64| format!("Identity attack detected ({o:.2} > {t})"),
        },
        Check {
            metric: "max_insult",
            observed: text.map(|t| t.max_insult),
            threshold: limits.max_insult,
            penalty: penalties.insult,
            message: &|o: f64, t: f64| format!("Insulting content detected ({o:.2} > {t})"),
        },
        Check {
            metric: "max_severe_toxicity",
            observed: text.map(|t| t.max_severe_toxicity),
            threshold: limits.max_severe_toxicity,
            penalty: penalties.severe_toxicity,
            message: &|o: f64, t: f64| format!("Severe toxicity detected ({o:.2} > {t})"),
        },
        Check {
            metric: "max_spam",
            observed: text.map(|t| t.avg_spam),
            threshold: limits.max_spam,
            penalty: penalties.spam,
            message: &|o: f64, t: f64| format!("High average spam score ({o:.2} > {t})"),
        },
        Check {
            metric: "max_nsfw",
            observed: image.map(|i| i.avg_nsfw),
            threshold: limits.max_nsfw,
            penalty: penalties.nsfw,
            message: &|o: f64, t: f64| format!("NSFW content detected ({o:.2} > {t})"),
        },
        Check {
            metric: "max_nsfw_images",
            observed: image.map(|i| i.nsfw_images as f64),
            threshold: limits.max_nsfw_images.map(|n| n as f64),
            penalty: penalties.nsfw_images,
            message: &|o: f64, _: f64| format!("Found {o} NSFW images"),
        },
    ];

    let mut details = FitDetails::default();
    let mut risk_factors = Vec::new();
    let mut reasons = Vec::new();

    for check in checks {
        let Some(threshold) = check.threshold else {
            continue;
        };
        let Some(observed) = check.observed else {
            details.unchecked.push(check.metric.to_string());
            continue;
        };
        if observed > threshold {
            details.safety_penalty += check.penalty;
            risk_factors.push(RiskFactor {
                metric: check.metric.to_string(),
                observed,
                threshold,
                message: (check.message)(observed, threshold),
            });
        }
    }
    if details.safety_penalty > 0.0 {
        reasons.push(format!(
            "Safety violations detected (-{:.1})",
            details.safety_penalty
        ));
    }

    details.excluded_topics_found = policy
        .excluded_topics
        .iter()
        .map(|t| normalize_tag(t))
        .filter(|t| report.topics.contains_key(t))
        .collect();
    if !details.excluded_topics_found.is_empty() {
        details.topic_penalty = penalties.excluded_topics;
        let found = details.excluded_topics_found.join(", ");
        risk_factors.push(RiskFactor {
            metric: "excluded_topics".to_string(),
            observed: details.excluded_topics_found.len() as f64,
            threshold: 0.0,
            message: format!("Excluded topics found: {found}"),
        });
        reasons.push(format!(
            "Excluded topics found (-{:.1})",
            details.topic_penalty
        ));
    }

    if text.is_some_and(|t| t.avg_sentiment > penalties.sentiment_bonus_threshold) {
        details.values_bonus += penalties.positive_sentiment_bonus;
        details.value_matches.push("Positive sentiment".to_string());
    }
    let aligned: Vec<String> = policy
        .brand_values
        .iter()
        .map(|v| normalize_tag(v))
        .filter(|v| report.topics.contains_key(v))
        .collect();
    if !aligned.is_empty() {
        details.values_bonus += penalties.values_bonus;
        details
            .value_matches
            .push(format!("Brand values in topics: {}", aligned.join(", ")));
    }
    if details.values_bonus > 0.0 {
        reasons.push(format!(
            "Values alignment bonus (+{:.1})",
            details.values_bonus
        ));
    }

    let raw = 100.0 - details.safety_penalty - details.topic_penalty + details.values_bonus;
    let fit_score = round_to(raw.clamp(0.0, 100.0), 1);
    let rating = FitRating::for_score(fit_score);

    info!(
        brand = %policy.brand_name,
        fit_score,
        %rating,
        risks = risk_factors.len(),
        "evaluated brand fit"
    );

    FitReport {
        brand_name: policy.brand_name.clone(),
        fit_score,
        rating,
        risk_factors,
        reasons,
        details,
    }
}

/// Topics are stored as lowercase hashtags without the `#`.
fn normalize_tag(tag: &str) -> String {
    tag.trim().trim_start_matches('#').to_lowercase()
}

#[cfg(test)]
mod tests {
    use cloutcheck_core::{AvoidContent, ModalityScore};

    use super::*;
    use crate::fixtures::{photo, post, record, text};
    use crate::{compute_reputation, ScoringConfig};

    fn policy(avoid: AvoidContent) -> BrandPolicy {
        BrandPolicy {
            brand_name: "Acme Outdoors".to_string(),
            target_categories: vec!["outdoors".to_string()],
            brand_values: vec!["#Sustainability".to_string()],
            avoid_content: avoid,
            excluded_topics: vec!["gambling".to_string()],
        }
    }

    fn report_for(caption: &str, scores: Vec<ModalityScore>) -> ReputationReport {
        let p = post("p1", caption, 1);
        compute_reputation(&[record(&p, scores)], &ScoringConfig::default())
    }

    #[test]
    fn toxicity_over_limit_is_a_risk_factor() {
        let report = report_for("", vec![ModalityScore::Text(text(0.22, 0.0, 0.0))]);
        let fit = evaluate_fit(
            &report,
            &policy(AvoidContent {
                max_toxicity: Some(0.15),
                ..AvoidContent::default()
            }),
            &FitPenalties::default(),
        );

        assert_eq!(fit.risk_factors.len(), 1);
        assert_eq!(fit.risk_factors[0].message, "High average toxicity (0.22 > 0.15)");
        assert_eq!(fit.risk_factors[0].metric, "max_toxicity");
        assert_eq!(fit.fit_score, 70.0);
        assert_eq!(fit.rating, FitRating::ModerateRisk);
        assert_eq!(fit.reasons, vec!["Safety violations detected (-30.0)"]);
    }

    #[test]
    fn threshold_is_checked_before_any_rounding() {
        let report = report_for("", vec![ModalityScore::Text(text(0.1504, 0.0, 0.0))]);
        let fit = evaluate_fit(
            &report,
            &policy(AvoidContent {
                max_toxicity: Some(0.15),
                ..AvoidContent::default()
            }),
            &FitPenalties::default(),
        );

        assert_eq!(fit.risk_factors.len(), 1);
        assert!((fit.risk_factors[0].observed - 0.1504).abs() < 1e-12);
    }

    #[test]
    fn clean_content_is_perfect_match() {
        let report = report_for(
            "",
            vec![
                ModalityScore::Text(text(0.01, 0.0, 0.2)),
                ModalityScore::Image(photo(0.01)),
            ],
        );
        let fit = evaluate_fit(
            &report,
            &policy(AvoidContent {
                max_toxicity: Some(0.15),
                max_nsfw: Some(0.2),
                max_nsfw_images: Some(0),
                ..AvoidContent::default()
            }),
            &FitPenalties::default(),
        );
        assert!(fit.risk_factors.is_empty());
        assert_eq!(fit.fit_score, 100.0);
        assert_eq!(fit.rating, FitRating::PerfectMatch);
    }

    #[test]
    fn each_category_deducts_once() {
        let p = post("p1", "", 3);
        let records = vec![record(
            &p,
            vec![
                ModalityScore::Image(photo(0.9)),
                ModalityScore::Image(photo(0.95)),
                ModalityScore::Image(photo(0.8)),
            ],
        )];
        let report = compute_reputation(&records, &ScoringConfig::default());
        let fit = evaluate_fit(
            &report,
            &policy(AvoidContent {
                max_nsfw: Some(0.5),
                max_nsfw_images: Some(0),
                ..AvoidContent::default()
            }),
            &FitPenalties::default(),
        );

        assert_eq!(fit.risk_factors.len(), 2);
        assert_eq!(fit.risk_factors[1].message, "Found 3 NSFW images");
        // 100 - 40 - 20
        assert_eq!(fit.fit_score, 40.0);
        assert_eq!(fit.rating, FitRating::HighRisk);
    }

    #[test]
    fn absent_modality_is_not_checked() {
        let report = report_for("", vec![ModalityScore::Text(text(0.0, 0.0, 0.0))]);
        let fit = evaluate_fit(
            &report,
            &policy(AvoidContent {
                max_nsfw: Some(0.1),
                ..AvoidContent::default()
            }),
            &FitPenalties::default(),
        );
        assert!(fit.risk_factors.is_empty());
        assert_eq!(fit.details.unchecked, vec!["max_nsfw"]);
        assert_eq!(fit.fit_score, 100.0);
    }

    #[test]
    fn excluded_topics_and_value_bonuses() {
        let report = report_for(
            "big win tonight #Gambling #sustainability",
            vec![ModalityScore::Text(text(0.0, 0.0, 0.9))],
        );
        let fit = evaluate_fit(&report, &policy(AvoidContent::default()), &FitPenalties::default());

        assert_eq!(fit.details.excluded_topics_found, vec!["gambling"]);
        assert_eq!(fit.risk_factors.len(), 1);
        assert_eq!(fit.details.values_bonus, 10.0);
        // 100 - 30 + 5 + 5
        assert_eq!(fit.fit_score, 80.0);
        assert_eq!(fit.rating, FitRating::GoodFit);
    }

    #[test]
    fn many_violations_floor_at_zero() {
        let mut t = text(0.9, 0.9, -0.5);
        t.identity_attack = 0.9;
        t.insult = 0.9;
        t.severe_toxicity = 0.9;
        let report = report_for("#gambling", vec![ModalityScore::Text(t)]);
        let fit = evaluate_fit(
            &report,
            &policy(AvoidContent {
                max_toxicity: Some(0.1),
                max_identity_attack: Some(0.1),
                max_insult: Some(0.1),
                max_severe_toxicity: Some(0.1),
                max_spam: Some(0.1),
                ..AvoidContent::default()
            }),
            &FitPenalties::default(),
        );
        assert_eq!(fit.risk_factors.len(), 6);
        assert_eq!(fit.fit_score, 0.0);
        assert_eq!(fit.rating, FitRating::Unsafe);
        assert_eq!(
            serde_json::to_value(fit.rating).unwrap(),
            serde_json::json!("Unsafe / Do Not Partner")
        );
    }
}
