use anyhow::{bail, Context, Result};
use clap::Parser;
use serde::Serialize;
use tracing::warn;

use spades_icp::avatar::AvatarDisplay;
use spades_icp::cache_commands;
use spades_icp::cli::{CacheCommands, Cli, Commands, DatasetCommands, OutputFormat};
use spades_icp::config::AppConfig;
use spades_icp::logger::{init_logging, print_analysis_summary, VerbosityLevel};
use spades_icp::result_cache::ResultCache;
use spades_icp::{AnalysisPipeline, AnalysisResult, RunOutcome};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(VerbosityLevel::from_verbose_count(cli.verbose));

    // Handle --init first (before any other processing)
    if cli.init {
        let path = AppConfig::create_default_config(&cli.config)
            .context("Failed to create configuration file")?;
        println!("✅ Created default configuration file at: {}", path.display());
        println!("   Edit this file to customize settings, then run spades-icp again.");
        return Ok(());
    }

    let config = AppConfig::load_or_default(&cli.config)
        .with_context(|| format!("Configuration error in {}", cli.config.display()))?;

    let Some(command) = cli.command else {
        bail!("No command given. Usage: spades-icp analyze <URL>  (see --help)");
    };

    match command {
        Commands::Analyze { url, hard_reset, format } => {
            run_analysis(&config, &url, hard_reset, format).await
        }
        Commands::Cache { action } => {
            let cache = ResultCache::from_config(&config.cache);
            match action {
                CacheCommands::List => cache_commands::list_cached_domains(&cache).await,
                CacheCommands::Show { domain, format } => {
                    cache_commands::show_cache_entry(&cache, &domain, format).await
                }
                CacheCommands::Clear { domain, all } => {
                    if all {
                        cache_commands::clear_all_cache(&cache).await
                    } else if let Some(d) = domain {
                        cache_commands::clear_domain_cache(&cache, &d).await
                    } else {
                        bail!(
                            "Either specify a domain or use --all.\n\
                             Usage: spades-icp cache clear <domain>\n       \
                             spades-icp cache clear --all"
                        );
                    }
                }
            }
        }
        Commands::Dataset { action: DatasetCommands::Refresh } => refresh_dataset(&config).await,
    }
}

async fn run_analysis(config: &AppConfig, url: &str, hard_reset: bool, format: OutputFormat) -> Result<()> {
    let pipeline = AnalysisPipeline::from_config(config)?;
    if !pipeline.classification_enabled() {
        warn!(
            "{} is not set; the persona is picked without classification",
            config.classifier.api_key_env
        );
    }

    let outcome = pipeline
        .start(url, hard_reset)
        .await
        .context("Unable to analyze this domain. Please check the URL and try again")?;

    let (result, source) = match outcome {
        RunOutcome::Cached(result) => (result, "cached"),
        RunOutcome::Fresh(result) => (result, "fresh"),
        RunOutcome::Superseded => bail!("Analysis of {} was superseded by a newer run", url),
    };
    let avatar = pipeline.resolve_avatar(&result).await;
    print_result(&result, &avatar, source, format)
}

#[derive(Serialize)]
struct AnalysisReport<'a> {
    #[serde(flatten)]
    result: &'a AnalysisResult,
    avatar: &'a AvatarDisplay,
}

fn print_result(result: &AnalysisResult, avatar: &AvatarDisplay, source: &str, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let report = AnalysisReport { result, avatar };
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        OutputFormat::Text => print_analysis_summary(result, avatar, source),
    }
    Ok(())
}

async fn refresh_dataset(config: &AppConfig) -> Result<()> {
    let pipeline = AnalysisPipeline::from_config(config)?;
    let rows = pipeline.dataset().load(true).await;
    if rows.is_empty() {
        bail!("Dataset refresh returned no rows from {}", config.sources.dataset_url);
    }

    println!("Loaded {} persona rows:", rows.len());
    for row in rows.iter() {
        println!("  {:<10} {:<30} {}", row.id, row.job_title, row.industry);
    }
    Ok(())
}
