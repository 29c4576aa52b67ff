// src/bin/resolve_locations.rs
use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use std::path::PathBuf;
use std::time::Instant;
use uuid::Uuid;

use landplot_lib::matching::db::fetch_reference_table;
use landplot_lib::matching::manager::{run_location_resolution, write_json_report, ResolveRequest};
use landplot_lib::matching::resolver::LocationResolver;
use landplot_lib::matching::settlement::{MatchStrategy, SettlementMatcher};
use landplot_lib::nspd::NspdClient;
use landplot_lib::utils::db_connect::connect;
use landplot_lib::utils::env::load_env;
use landplot_lib::utils::plot_filter::PlotFilterConfig;
use landplot_lib::utils::progress_bars::progress_config::ProgressConfig;

#[derive(Parser)]
#[command(author, version, about = "Re-resolve district/location of parcels through the cadastral registry", long_about = None)]
struct ResolveArgs {
    /// Current `location` value to re-resolve (repeatable); falls back to RESOLVE_LOCATIONS
    #[arg(long = "location")]
    locations: Vec<String>,

    /// Max parcels to process (1..=200)
    #[arg(long)]
    limit: Option<i64>,

    /// Delay between registry calls, ms (0..=3000)
    #[arg(long)]
    delay_ms: Option<u64>,

    /// Settlement tie-break: first | prefer_exact (overrides SETTLEMENT_MATCH_STRATEGY)
    #[arg(long)]
    strategy: Option<MatchStrategy>,

    /// Fall back to the cadastral prefix when the address names no district
    #[arg(long)]
    prefix_fallback: bool,

    /// Write the JSON report here
    #[arg(long)]
    report: Option<PathBuf>,

    /// Dry run mode (don't update database)
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    load_env();
    let args = ResolveArgs::parse();
    let start = Instant::now();

    let locations = if args.locations.is_empty() {
        PlotFilterConfig::from_env().locations
    } else {
        args.locations
    };
    let request = ResolveRequest::new(locations, args.limit, args.delay_ms, args.dry_run)?;

    let pool = connect().await.context("Failed to connect to database")?;
    let client = NspdClient::from_env().context("Failed to build NSPD client")?;
    let table = fetch_reference_table(&pool)
        .await
        .context("Failed to load settlement reference table")?;

    let strategy = args.strategy.unwrap_or_else(MatchStrategy::from_env);
    let mut resolver = LocationResolver::from_env(SettlementMatcher::new(table, strategy));
    if args.prefix_fallback {
        resolver = resolver.with_prefix_fallback(true);
    }
    info!(
        "Strategy: {:?}, prefix fallback: {}",
        resolver.matcher().strategy(),
        resolver.prefix_fallback()
    );

    let progress_config = ProgressConfig::from_env();
    let multi_progress = progress_config.create_multi_progress();
    let run_id = Uuid::new_v4().to_string();

    let report = run_location_resolution(&pool, &client, &resolver, &request, &run_id, multi_progress.as_ref()).await?;
    if let Some(path) = &args.report {
        write_json_report(path, &report)?;
    }

    let stats = report.stats();
    info!("=== Resolution Summary ===");
    info!("Locations: {:?}", report.requested_locations);
    info!("Processed: {}", stats.processed);
    info!("Updated: {}{}", stats.updated, if request.dry_run { " (dry run, nothing written)" } else { "" });
    info!("Unchanged: {}", stats.unchanged);
    info!("Failed: {}", stats.failed);
    info!("Total time: {:.2?}", start.elapsed());
    Ok(())
}
