use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use leadlink_adapters::load_listings_file;
use leadlink_core::{EstimatingEnricher, Listing};
use leadlink_engine::{ClusterStrategy, DedupConfig, LinkagePipeline, Matcher, PipelineConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "leadlink")]
#[command(about = "Cross-platform business listing linkage")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Link every enabled platform's fixture bundle and write a report set.
    Run {
        /// Fill platform extension fields with ratio estimates.
        #[arg(long)]
        estimate_extensions: bool,
    },
    /// Deduplicate a JSON array of listings and print the outcome.
    Dedup {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        strategy: Option<ClusterStrategy>,
        #[arg(long)]
        parallel: bool,
        #[arg(long)]
        auto_resolve: bool,
    },
    /// Score one pair of listings.
    Match {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        a: String,
        #[arg(long)]
        b: String,
    },
    /// Merge the listed ids into one unified business.
    Merge {
        #[arg(long)]
        input: PathBuf,
        #[arg(long, value_delimiter = ',', required = true)]
        ids: Vec<String>,
    },
    /// Print the platform registry in effect.
    Platforms,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("leadlink=info".parse()?))
        .init();

    let cli = Cli::parse();
    let config = PipelineConfig::from_env()?;

    match cli.command.unwrap_or(Commands::Run {
        estimate_extensions: false,
    }) {
        Commands::Run { estimate_extensions } => {
            let mut pipeline = LinkagePipeline::new(config);
            if estimate_extensions {
                pipeline = pipeline.with_enricher(Arc::new(EstimatingEnricher));
            }
            let summary = pipeline.run_once().await?;
            println!(
                "linkage complete: run_id={} listings={} unified={} matched={} conflicts={} review={} reports={}",
                summary.run_id,
                summary.listings,
                summary.unified,
                summary.matched,
                summary.conflicts,
                summary.review_items,
                summary.reports_dir
            );
        }
        Commands::Dedup {
            input,
            strategy,
            parallel,
            auto_resolve,
        } => {
            let listings = load_listings_file(&input)?;
            let dedup = DedupConfig {
                strategy: strategy.unwrap_or(config.dedup.strategy),
                parallel_scoring: parallel || config.dedup.parallel_scoring,
                auto_resolve_conflicts: auto_resolve || config.dedup.auto_resolve_conflicts,
            };
            let pipeline = LinkagePipeline::new(PipelineConfig { dedup, ..config });
            let registry = pipeline.load_registry().await?;
            let outcome = pipeline.engine(registry).deduplicate(&listings);
            info!(input = %input.display(), unique = outcome.stats.unique, "deduplicated listings file");
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        Commands::Match { input, a, b } => {
            let listings = load_listings_file(&input)?;
            let left = find_listing(&listings, &a)?;
            let right = find_listing(&listings, &b)?;
            let result = Matcher::default().score(left, right);
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Commands::Merge { input, ids } => {
            let listings = load_listings_file(&input)?;
            let cluster = ids
                .iter()
                .map(|id| find_listing(&listings, id).cloned())
                .collect::<Result<Vec<_>>>()?;
            let pipeline = LinkagePipeline::new(config);
            let registry = pipeline.load_registry().await?;
            let unified = pipeline
                .engine(registry)
                .merger()
                .merge_listings(&cluster)
                .context("merging selected listings")?;
            println!("{}", serde_json::to_string_pretty(&unified)?);
        }
        Commands::Platforms => {
            let registry = LinkagePipeline::new(config).load_registry().await?;
            for platform in &registry.platforms {
                println!(
                    "{:<14} {:<24} reliability={:.2} tier={:?} social={} enabled={}",
                    platform.platform_id,
                    platform.display_name,
                    platform.reliability,
                    platform.tier,
                    platform.social,
                    platform.enabled
                );
            }
        }
    }

    Ok(())
}

fn find_listing<'a>(listings: &'a [Listing], id: &str) -> Result<&'a Listing> {
    match listings.iter().find(|l| l.id == id) {
        Some(listing) => Ok(listing),
        None => bail!("no listing with id {id}"),
    }
}
