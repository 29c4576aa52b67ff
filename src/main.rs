use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use landplot_lib::matching::db::fetch_reference_table;
use landplot_lib::matching::manager::{
    run_bundle_linking, run_bundle_report, run_district_check, run_geometry_sync, run_location_resolution,
    write_json_report, DistrictCheckRequest, GeometrySyncRequest, ResolveRequest,
};
use landplot_lib::matching::resolver::LocationResolver;
use landplot_lib::matching::settlement::{MatchStrategy, SettlementMatcher};
use landplot_lib::models::stats_models::{JobType, PipelineStats};
use landplot_lib::nspd::NspdClient;
use landplot_lib::utils::db_connect::{connect, get_pool_status, PgPool};
use landplot_lib::utils::env::load_env;
use landplot_lib::utils::get_memory_usage;
use landplot_lib::utils::plot_filter::PlotFilterConfig;
use landplot_lib::utils::progress_bars::logging::{
    log_pipeline_completion, log_pipeline_job_failed, log_pipeline_phase, log_pipeline_start,
};
use landplot_lib::utils::progress_bars::progress_config::ProgressConfig;
use log::info;
use std::path::PathBuf;
use std::time::Instant;
use uuid::Uuid;

#[derive(Parser)]
#[command(author, version, about = "Resolve parcel locations, check districts, link bundles and report bundle health", long_about = None)]
struct PipelineArgs {
    /// Current `location` values to re-resolve; falls back to RESOLVE_LOCATIONS.
    /// Resolution is skipped when none are given.
    #[arg(long = "location")]
    locations: Vec<String>,

    /// Max parcels to resolve (1..=200)
    #[arg(long)]
    limit: Option<i64>,

    /// Delay between registry calls during resolution, ms (0..=3000)
    #[arg(long)]
    delay_ms: Option<u64>,

    /// Also fetch geometry for parcels that have none
    #[arg(long)]
    sync_geometry: bool,

    /// Compare stored districts with the cadastral prefix district
    #[arg(long)]
    check_districts: bool,

    /// Rewrite districts that disagree with the prefix (implies --check-districts)
    #[arg(long)]
    fix_districts: bool,

    /// JSON Lines bundle mapping file
    #[arg(long)]
    mapping: Option<PathBuf>,

    /// Write the bundle diagnostics report here
    #[arg(long)]
    report: Option<PathBuf>,

    /// Plan and log everything, write nothing
    #[arg(long)]
    dry_run: bool,
}

fn update_main_pb(pb: &Option<ProgressBar>, msg: &str, config: &ProgressConfig, pool: &PgPool) {
    if let Some(pb) = pb {
        if config.should_show_db_connection_stats() {
            let (size, available, _) = get_pool_status(pool);
            pb.set_message(format!("{} (DB: {}/{} used/total)", msg, size - available, size));
        } else {
            pb.set_message(msg.to_string());
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    load_env();
    let args = PipelineArgs::parse();
    info!("Starting land-plot location and bundle pipeline");

    let progress_config = ProgressConfig::from_env();
    info!(
        "Progress tracking: enabled={}, detailed={}",
        progress_config.enabled, progress_config.detailed
    );
    let multi_progress = progress_config.create_multi_progress();

    let locations = if args.locations.is_empty() {
        PlotFilterConfig::from_env().locations
    } else {
        args.locations.clone()
    };

    let mut jobs = Vec::new();
    if !locations.is_empty() {
        jobs.push(JobType::Resolve);
    }
    if args.sync_geometry {
        jobs.push(JobType::Geometry);
    }
    if args.check_districts || args.fix_districts {
        jobs.push(JobType::District);
    }
    jobs.push(JobType::Bundle);

    let main_pb = multi_progress.as_ref().map(|mp| {
        let pb = mp.add(ProgressBar::new(jobs.len() as u64 + 1));
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("█▉▊▋▌▍▎▏  "),
        );
        pb.set_message("Initializing pipeline...");
        pb
    });

    let pool = connect().await.context("Failed to connect to database")?;
    info!("Successfully connected to the database");

    let run_id = Uuid::new_v4().to_string();
    let mut stats = PipelineStats::new(run_id.clone(), Utc::now().naive_utc());
    log_pipeline_start(&run_id, &jobs, args.dry_run);
    let pipeline_start = Instant::now();

    let needs_registry = jobs.contains(&JobType::Resolve) || jobs.contains(&JobType::Geometry);
    let client = if needs_registry {
        Some(NspdClient::from_env().context("Failed to build NSPD client")?)
    } else {
        None
    };

    // Phase 1: location resolution
    if let (true, Some(client)) = (jobs.contains(&JobType::Resolve), client.as_ref()) {
        update_main_pb(&main_pb, "Phase 1: location resolution", &progress_config, &pool);
        log_pipeline_phase("Location resolution", Some(&format!("{:?}", locations)));
        let phase_start = Instant::now();

        let request = ResolveRequest::new(locations.clone(), args.limit, args.delay_ms, args.dry_run)?;
        let table = fetch_reference_table(&pool)
            .await
            .context("Failed to load settlement reference table")?;
        let resolver = LocationResolver::from_env(SettlementMatcher::new(table, MatchStrategy::from_env()));

        match run_location_resolution(&pool, client, &resolver, &request, &run_id, multi_progress.as_ref()).await {
            Ok(report) => stats.resolve = Some(report.stats()),
            Err(e) => log_pipeline_job_failed(JobType::Resolve, phase_start.elapsed(), &format!("{:#}", e)),
        }
        stats.record_phase_time(JobType::Resolve, phase_start.elapsed());
        if let Some(pb) = &main_pb {
            pb.inc(1);
        }
    }

    // Phase 2: geometry sync
    if let (true, Some(client)) = (jobs.contains(&JobType::Geometry), client.as_ref()) {
        update_main_pb(&main_pb, "Phase 2: geometry sync", &progress_config, &pool);
        log_pipeline_phase("Geometry sync", None);
        let phase_start = Instant::now();

        let request = GeometrySyncRequest {
            filter: PlotFilterConfig::from_env(),
            limit: args.limit,
            delay_ms: None,
            dry_run: args.dry_run,
        };
        match run_geometry_sync(&pool, client, &request, &run_id, multi_progress.as_ref()).await {
            Ok(geometry) => stats.geometry = Some(geometry),
            Err(e) => log_pipeline_job_failed(JobType::Geometry, phase_start.elapsed(), &format!("{:#}", e)),
        }
        stats.record_phase_time(JobType::Geometry, phase_start.elapsed());
        if let Some(pb) = &main_pb {
            pb.inc(1);
        }
    }

    // Phase 3: district drift check
    if jobs.contains(&JobType::District) {
        update_main_pb(&main_pb, "Phase 3: district check", &progress_config, &pool);
        log_pipeline_phase("District check", None);
        let phase_start = Instant::now();

        let request = DistrictCheckRequest {
            filter: PlotFilterConfig::from_env(),
            fix: args.fix_districts,
            dry_run: args.dry_run,
        };
        match run_district_check(&pool, &request, &run_id, multi_progress.as_ref()).await {
            Ok((_, districts)) => stats.districts = Some(districts),
            Err(e) => log_pipeline_job_failed(JobType::District, phase_start.elapsed(), &format!("{:#}", e)),
        }
        stats.record_phase_time(JobType::District, phase_start.elapsed());
        if let Some(pb) = &main_pb {
            pb.inc(1);
        }
    }

    // Phase 4: bundle linking
    update_main_pb(&main_pb, "Phase 4: bundle linking", &progress_config, &pool);
    log_pipeline_phase("Bundle linking", args.mapping.as_ref().map(|p| p.display().to_string()).as_deref());
    let phase_start = Instant::now();
    match run_bundle_linking(
        &pool,
        args.mapping.as_deref(),
        args.dry_run,
        &run_id,
        multi_progress.as_ref(),
    )
    .await
    {
        Ok((_, linking)) => stats.linking = Some(linking),
        Err(e) => log_pipeline_job_failed(JobType::Bundle, phase_start.elapsed(), &format!("{:#}", e)),
    }
    stats.record_phase_time(JobType::Bundle, phase_start.elapsed());
    if let Some(pb) = &main_pb {
        pb.inc(1);
    }

    // Phase 5: diagnostics, always read-only
    update_main_pb(&main_pb, "Phase 5: bundle diagnostics", &progress_config, &pool);
    log_pipeline_phase("Bundle diagnostics", None);
    let report = run_bundle_report(&pool).await?;
    if let Some(path) = &args.report {
        write_json_report(path, &report)?;
    }
    if let Some(pb) = &main_pb {
        pb.inc(1);
        pb.finish_with_message("Pipeline complete");
    }

    stats.total_processing_time = pipeline_start.elapsed().as_secs_f64();
    log_pipeline_completion(&stats);

    if progress_config.should_show_memory() {
        let final_memory_mb = get_memory_usage().await;
        info!("Final memory usage: {} MB", final_memory_mb);
    }

    let (pool_size, available_connections, in_use_connections) = get_pool_status(&pool);
    info!(
        "Final DB Connection Pool Status: Total: {}, Available: {}, In Use: {}",
        pool_size, available_connections, in_use_connections
    );

    info!("Pipeline completed successfully!");
    Ok(())
}
