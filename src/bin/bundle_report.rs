// src/bin/bundle_report.rs
use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use std::path::PathBuf;

use landplot_lib::matching::manager::{run_bundle_report, write_json_report};
use landplot_lib::utils::db_connect::connect;
use landplot_lib::utils::env::load_env;

#[derive(Parser)]
#[command(author, version, about = "Report orphaned parcels and inconsistent bundles (read-only)", long_about = None)]
struct ReportArgs {
    /// Write the report as JSON here
    #[arg(long)]
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    load_env();
    let args = ReportArgs::parse();

    let pool = connect().await.context("Failed to connect to database")?;
    let report = run_bundle_report(&pool).await?;
    if let Some(path) = &args.output {
        write_json_report(path, &report)?;
    }

    info!("=== Bundle Report ===");
    info!("Bundles: {}", report.total_bundles);
    info!("Orphan primaries: {}", report.orphan_primaries.len());
    info!("Orphan secondaries: {}", report.orphan_secondaries.len());
    info!("Bundles with issues: {}", report.problem_bundles.len());
    Ok(())
}
