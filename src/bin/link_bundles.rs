// src/bin/link_bundles.rs
use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use std::path::PathBuf;
use std::time::Instant;
use uuid::Uuid;

use landplot_lib::matching::manager::{run_bundle_linking, write_json_report};
use landplot_lib::utils::db_connect::connect;
use landplot_lib::utils::env::load_env;
use landplot_lib::utils::progress_bars::progress_config::ProgressConfig;

#[derive(Parser)]
#[command(author, version, about = "Link parcels sold as one lot through bundle_id", long_about = None)]
struct LinkArgs {
    /// JSON Lines file of {"main": ..., "plots": [...]} lots
    #[arg(long)]
    mapping: Option<PathBuf>,

    /// Write the planned links as JSON here
    #[arg(long)]
    plan_output: Option<PathBuf>,

    /// Dry run mode (don't update database)
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    load_env();
    let args = LinkArgs::parse();
    let start = Instant::now();

    let pool = connect().await.context("Failed to connect to database")?;
    let multi_progress = ProgressConfig::from_env().create_multi_progress();
    let run_id = Uuid::new_v4().to_string();

    let (plan, stats) = run_bundle_linking(
        &pool,
        args.mapping.as_deref(),
        args.dry_run,
        &run_id,
        multi_progress.as_ref(),
    )
    .await?;
    if let Some(path) = &args.plan_output {
        write_json_report(path, &plan)?;
    }

    info!("=== Bundle Linking Summary ===");
    info!("Parcels scanned: {}", stats.plots_scanned);
    info!(
        "Links planned: {} (mapping {}, additional cadastrals {}, proximity {}, anchors {})",
        stats.planned(),
        stats.from_mapping_file,
        stats.from_additional_cadastrals,
        stats.from_proximity,
        stats.primaries_anchored
    );
    info!("Already linked: {}", stats.already_linked);
    info!("Not found in DB: {}", stats.missing_in_db);
    info!("No parent: {}", stats.no_parent);
    info!("Ambiguous: {}", plan.ambiguous.len());
    info!("Conflicts: {}", stats.conflicts);
    info!("Written: {}{}", stats.written, if args.dry_run { " (dry run)" } else { "" });
    info!("Write failures: {}", stats.write_failed);
    info!("Total time: {:.2?}", start.elapsed());
    Ok(())
}
