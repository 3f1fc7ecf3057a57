use std::path::PathBuf;

use clap::{Parser, Subcommand};
use cloutcheck_core::RetentionPolicy;
use tracing_subscriber::EnvFilter;

mod analyze;
mod brand_fit;
mod report;

#[derive(Debug, Parser)]
#[command(name = "cloutcheck")]
#[command(about = "Multimodal reputation and brand-fit analysis for social media posts")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Analyze a scraper export and store the report
    Analyze {
        /// Path to the scraper's JSON export
        #[arg(long)]
        posts: PathBuf,
        /// Name the report is stored under (defaults to the export's file stem)
        #[arg(long)]
        subject: Option<String>,
        /// Media retention policy: immediate, end_of_batch (or end), none
        #[arg(long, value_parser = parse_retention)]
        retention: Option<RetentionPolicy>,
        /// Posts processed concurrently
        #[arg(long, value_parser = clap::value_parser!(u16).range(1..))]
        concurrency: Option<u16>,
        /// Skip brand-fit evaluation
        #[arg(long)]
        skip_brand_fit: bool,
        /// Load and summarize the export without downloading or analyzing anything
        #[arg(long)]
        dry_run: bool,
    },
    /// Re-run brand fit for a stored report against every policy in the brands directory
    BrandFit {
        #[arg(long)]
        subject: String,
    },
    /// Print a stored report
    Report {
        #[arg(long)]
        subject: String,
    },
}

fn parse_retention(raw: &str) -> Result<RetentionPolicy, String> {
    RetentionPolicy::parse(raw)
        .ok_or_else(|| format!("unknown retention policy '{raw}' (expected immediate, end_of_batch, none)"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = cloutcheck_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();
    tracing::debug!(?config, "configuration loaded");

    match cli.command {
        Commands::Analyze {
            posts,
            subject,
            retention,
            concurrency,
            skip_brand_fit,
            dry_run,
        } => {
            let options = analyze::AnalyzeOptions {
                posts,
                subject,
                retention,
                concurrency: concurrency.map(usize::from),
                skip_brand_fit,
                dry_run,
            };
            analyze::run_analyze(&config, options).await
        }
        Commands::BrandFit { subject } => brand_fit::run_brand_fit(&config, &subject).await,
        Commands::Report { subject } => report::run_report(&config, &subject).await,
    }
}
