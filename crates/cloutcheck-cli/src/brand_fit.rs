use cloutcheck_core::{load_policies, AppConfig};
use cloutcheck_pipeline::ReportStore;
use cloutcheck_scoring::{evaluate_fit, FitReport, ReputationReport, ScoringConfig};

use crate::analyze::scoring_config;
use crate::report::print_fit;

/// Evaluate `report` against every policy in the configured brands directory.
///
/// A missing brands directory is not an error: the run simply has no
/// brand-fit section.
pub(crate) fn evaluate_all(
    config: &AppConfig,
    report: &ReputationReport,
    scoring: &ScoringConfig,
) -> anyhow::Result<Vec<FitReport>> {
    if !config.brands_dir.is_dir() {
        tracing::warn!(
            dir = %config.brands_dir.display(),
            "brands directory not found; skipping brand fit"
        );
        return Ok(Vec::new());
    }
    let policies = load_policies(&config.brands_dir)?;
    if policies.is_empty() {
        tracing::warn!(dir = %config.brands_dir.display(), "no brand policies found");
    }
    Ok(policies
        .iter()
        .map(|policy| evaluate_fit(report, policy, &scoring.fit))
        .collect())
}

pub(crate) async fn run_brand_fit(config: &AppConfig, subject: &str) -> anyhow::Result<()> {
    let store = ReportStore::new(&config.results_dir);
    let mut artifact = store.load(subject).await?;
    let scoring = scoring_config(config)?;

    artifact.brand_fit = evaluate_all(config, &artifact.reputation, &scoring)?;
    let path = store.save(&artifact).await?;

    if artifact.brand_fit.is_empty() {
        println!("no brand policies evaluated");
    }
    for fit in &artifact.brand_fit {
        print_fit(fit);
    }
    println!("saved: {}", path.display());
    Ok(())
}
