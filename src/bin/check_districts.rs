// src/bin/check_districts.rs
use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use std::path::PathBuf;
use std::time::Instant;
use uuid::Uuid;

use landplot_lib::matching::manager::{run_district_check, write_json_report, DistrictCheckRequest};
use landplot_lib::utils::db_connect::connect;
use landplot_lib::utils::env::load_env;
use landplot_lib::utils::plot_filter::PlotFilterConfig;
use landplot_lib::utils::progress_bars::progress_config::ProgressConfig;

#[derive(Parser)]
#[command(author, version, about = "Compare parcel districts with their cadastral prefix district", long_about = None)]
struct CheckArgs {
    /// Rewrite mismatched districts to the prefix district
    #[arg(long)]
    fix: bool,

    /// With --fix, log the rewrites without writing them
    #[arg(long)]
    dry_run: bool,

    /// Only active listings (also PLOTS_ACTIVE_ONLY)
    #[arg(long)]
    active_only: bool,

    /// Write the check report as JSON here
    #[arg(long)]
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    load_env();
    let args = CheckArgs::parse();
    let start = Instant::now();

    let mut filter = PlotFilterConfig::from_env();
    filter.active_only |= args.active_only;

    let pool = connect().await.context("Failed to connect to database")?;
    let multi_progress = ProgressConfig::from_env().create_multi_progress();
    let run_id = Uuid::new_v4().to_string();

    let request = DistrictCheckRequest {
        filter,
        fix: args.fix,
        dry_run: args.dry_run,
    };
    let (report, stats) = run_district_check(&pool, &request, &run_id, multi_progress.as_ref()).await?;
    if let Some(path) = &args.output {
        write_json_report(path, &report)?;
    }

    info!("=== District Check Summary ===");
    info!("Parcels loaded: {}", report.total_plots);
    info!("Checked by prefix: {}", stats.checked);
    info!("Mismatches: {} ({:.1}% agree)", stats.mismatches, report.match_rate());
    if args.fix {
        info!(
            "Fixed: {}{}, failed: {}",
            stats.fixed,
            if args.dry_run { " (dry run)" } else { "" },
            stats.failed
        );
    }
    info!("Total time: {:.2?}", start.elapsed());
    Ok(())
}
