// src/bin/sync_geometry.rs
use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use std::time::Instant;
use uuid::Uuid;

use landplot_lib::matching::manager::{run_geometry_sync, GeometrySyncRequest};
use landplot_lib::nspd::NspdClient;
use landplot_lib::utils::db_connect::{connect, get_pool_status};
use landplot_lib::utils::env::load_env;
use landplot_lib::utils::plot_filter::PlotFilterConfig;
use landplot_lib::utils::progress_bars::progress_config::ProgressConfig;

#[derive(Parser)]
#[command(author, version, about = "Fetch geometry and centroids for parcels that have none stored", long_about = None)]
struct SyncArgs {
    /// Max parcels to process
    #[arg(long)]
    limit: Option<i64>,

    /// Delay between registry calls, ms (default NSPD_REQUEST_DELAY_MS or 1500)
    #[arg(long)]
    delay_ms: Option<u64>,

    /// Only active listings
    #[arg(long)]
    active_only: bool,

    /// Restrict to these `location` values (repeatable)
    #[arg(long = "location")]
    locations: Vec<String>,

    /// Dry run mode (don't update database)
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    load_env();
    let args = SyncArgs::parse();
    let start = Instant::now();

    let mut filter = PlotFilterConfig::from_env();
    if !args.locations.is_empty() {
        filter = filter.with_locations(args.locations);
    }
    filter.active_only |= args.active_only;

    let pool = connect().await.context("Failed to connect to database")?;
    let client = NspdClient::from_env().context("Failed to build NSPD client")?;
    let delay_ms = args
        .delay_ms
        .or_else(|| std::env::var("NSPD_REQUEST_DELAY_MS").ok().and_then(|v| v.parse().ok()));

    let request = GeometrySyncRequest {
        filter,
        limit: args.limit,
        delay_ms,
        dry_run: args.dry_run,
    };
    let multi_progress = ProgressConfig::from_env().create_multi_progress();
    let run_id = Uuid::new_v4().to_string();

    let stats = run_geometry_sync(&pool, &client, &request, &run_id, multi_progress.as_ref()).await?;

    info!("=== Geometry Sync Summary ===");
    info!("Processed: {}", stats.processed);
    info!("Synced: {} ({} with contour)", stats.synced, stats.with_contour);
    info!("Failed: {}", stats.failed);
    info!("Total time: {:.2?}", start.elapsed());
    let (size, available, in_use) = get_pool_status(&pool);
    info!("Final DB Connection Pool Status: Total: {}, Available: {}, In Use: {}", size, available, in_use);
    Ok(())
}
