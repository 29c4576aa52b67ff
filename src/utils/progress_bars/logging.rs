// src/utils/progress_bars/logging.rs - Tagged logging helpers for the batch jobs
use log::{debug, error, info, warn};
use std::time::Instant;

use crate::models::stats_models::{
    DistrictCheckStats, GeometrySyncStats, JobType, LinkRunStats, PipelineStats, ResolveRunStats,
};

fn job_tag(job: JobType) -> (&'static str, &'static str) {
    match job {
        JobType::Resolve => ("RESOLVE", "📍"),
        JobType::Bundle => ("BUNDLE", "📦"),
        JobType::Geometry => ("GEOMETRY", "🗺️"),
        JobType::District => ("DISTRICT", "🏷️"),
    }
}

#[derive(Clone)]
pub struct ResolutionLogger {
    job_name: &'static str,
    job_emoji: &'static str,
    start_time: Instant,
}

impl ResolutionLogger {
    pub fn new(job: JobType) -> Self {
        let (job_name, job_emoji) = job_tag(job);
        Self {
            job_name,
            job_emoji,
            start_time: Instant::now(),
        }
    }

    pub fn log_start(&self, run_id: &str, dry_run: bool) {
        info!(
            "[{}] {} 🚀 Starting {} job (run ID: {}){}",
            self.job_name,
            self.job_emoji,
            self.job_name.to_lowercase(),
            run_id,
            if dry_run { " in DRY-RUN mode, no writes" } else { "" }
        );
    }

    pub fn log_phase(&self, phase: &str, details: Option<&str>) {
        let elapsed = self.start_time.elapsed();
        match details {
            Some(details) => info!(
                "[{}] {} 🔄 Phase: {} - {} [+{:.1}s]",
                self.job_name,
                self.job_emoji,
                phase,
                details,
                elapsed.as_secs_f32()
            ),
            None => info!(
                "[{}] {} 🔄 Phase: {} [+{:.1}s]",
                self.job_name,
                self.job_emoji,
                phase,
                elapsed.as_secs_f32()
            ),
        }
    }

    pub fn log_data_loaded(&self, count: usize, data_type: &str) {
        info!(
            "[{}] {} 📊 Found {} {} records from database",
            self.job_name, self.job_emoji, count, data_type
        );
    }

    /// One line per parcel: `before → after` or the error.
    pub fn log_item(&self, cadastral: &str, outcome: &str) {
        info!(
            "[{}] {} {} {}",
            self.job_name, self.job_emoji, cadastral, outcome
        );
    }

    pub fn log_progress_update(&self, current: usize, total: usize, additional_info: Option<&str>) {
        // Every 10% plus the final item
        let should_log = current == total || (total >= 10 && current % (total / 10) == 0);

        if should_log && current > 0 {
            let percent = (current as f64 / total as f64) * 100.0;
            let msg = match additional_info {
                Some(extra) => format!("Progress: {}/{} ({:.1}%) - {}", current, total, percent, extra),
                None => format!("Progress: {}/{} ({:.1}%)", current, total, percent),
            };
            info!("[{}] {} 📊 {}", self.job_name, self.job_emoji, msg);
        }
    }

    pub fn log_data_quality_issue(&self, issue_type: &str, count: usize) {
        if count > 0 {
            warn!(
                "[{}] {} ⚠️  Data quality: {} instances of {}",
                self.job_name, self.job_emoji, count, issue_type
            );
        }
    }

    pub fn log_resolve_completion(&self, stats: &ResolveRunStats) {
        info!(
            "[{}] {} 🎉 COMPLETED in {:.2?}: {} processed, {} updated, {} unchanged, {} failed",
            self.job_name,
            self.job_emoji,
            self.start_time.elapsed(),
            stats.processed,
            stats.updated,
            stats.unchanged,
            stats.failed
        );
    }

    pub fn log_geometry_completion(&self, stats: &GeometrySyncStats) {
        info!(
            "[{}] {} 🎉 COMPLETED in {:.2?}: {} processed, {} synced ({} with contour), {} failed",
            self.job_name,
            self.job_emoji,
            self.start_time.elapsed(),
            stats.processed,
            stats.synced,
            stats.with_contour,
            stats.failed
        );
    }

    pub fn log_link_completion(&self, stats: &LinkRunStats) {
        info!(
            "[{}] {} 🎉 COMPLETED in {:.2?}: {} links planned, {} written",
            self.job_name,
            self.job_emoji,
            self.start_time.elapsed(),
            stats.planned(),
            stats.written
        );
        info!(
            "[{}] {} 📊 Sources: {} mapping file, {} additional cadastrals, {} proximity, {} primaries anchored",
            self.job_name,
            self.job_emoji,
            stats.from_mapping_file,
            stats.from_additional_cadastrals,
            stats.from_proximity,
            stats.primaries_anchored
        );
        if stats.already_linked > 0 {
            info!(
                "[{}] {} ⏭️  {} parcels already linked",
                self.job_name, self.job_emoji, stats.already_linked
            );
        }
        self.log_data_quality_issue("cadastral numbers NOT FOUND in DB", stats.missing_in_db);
        self.log_data_quality_issue("secondary parcels with NO PARENT", stats.no_parent);
        self.log_data_quality_issue("conflicting link sources", stats.conflicts);
        self.log_data_quality_issue("failed link writes", stats.write_failed);
    }

    pub fn log_district_completion(&self, stats: &DistrictCheckStats) {
        info!(
            "[{}] {} 🎉 COMPLETED in {:.2?}: {} checked, {} mismatched, {} fixed, {} failed",
            self.job_name,
            self.job_emoji,
            self.start_time.elapsed(),
            stats.checked,
            stats.mismatches,
            stats.fixed,
            stats.failed
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!("[{}] {} ⚠️  {}", self.job_name, self.job_emoji, message);
    }

    pub fn log_error(&self, message: &str) {
        error!("[{}] {} ❌ {}", self.job_name, self.job_emoji, message);
    }

    pub fn log_debug(&self, message: &str) {
        debug!("[{}] {} {}", self.job_name, self.job_emoji, message);
    }

    pub fn get_elapsed(&self) -> std::time::Duration {
        self.start_time.elapsed()
    }
}

// Pipeline-level logging functions
pub fn log_pipeline_start(run_id: &str, jobs: &[JobType], dry_run: bool) {
    info!("🚀 ===== LAND PLOT PIPELINE STARTING =====");
    info!("📅 Pipeline Run ID: {}", run_id);
    info!("⚙️  Configuration:");
    let tags: Vec<String> = jobs
        .iter()
        .map(|job| {
            let (name, emoji) = job_tag(*job);
            format!("{} {}", name, emoji)
        })
        .collect();
    info!("   • Jobs: {}", tags.join(", "));
    info!("   • Writes: {}", if dry_run { "disabled (dry run)" } else { "enabled" });
    info!("==========================================");
}

pub fn log_pipeline_phase(phase: &str, details: Option<&str>) {
    match details {
        Some(details) => info!("🔄 Pipeline Phase: {} - {}", phase, details),
        None => info!("🔄 Pipeline Phase: {}", phase),
    }
}

pub fn log_pipeline_job_failed(job: JobType, duration: std::time::Duration, error: &str) {
    let (name, emoji) = job_tag(job);
    error!(
        "❌ [{}] {} {} job failed after {:.2?}: {}",
        name,
        emoji,
        name.to_lowercase(),
        duration,
        error
    );
}

pub fn log_pipeline_completion(stats: &PipelineStats) {
    info!("🎉 ===== LAND PLOT PIPELINE COMPLETED =====");
    info!("📅 Pipeline Run ID: {}", stats.run_id);
    info!("⏱️  Total Duration: {:.2}s", stats.total_processing_time);
    info!("");
    if let Some(resolve) = &stats.resolve {
        info!(
            "  📍 RESOLVE: {} processed, {} updated, {} failed ({:.2}s)",
            resolve.processed, resolve.updated, resolve.failed, stats.resolve_time
        );
    }
    if let Some(geometry) = &stats.geometry {
        info!(
            "  🗺️ GEOMETRY: {} processed, {} synced, {} failed ({:.2}s)",
            geometry.processed, geometry.synced, geometry.failed, stats.geometry_time
        );
    }
    if let Some(districts) = &stats.districts {
        info!(
            "  🏷️ DISTRICT: {} checked, {} mismatched, {} fixed ({:.2}s)",
            districts.checked, districts.mismatches, districts.fixed, stats.district_time
        );
    }
    if let Some(linking) = &stats.linking {
        info!(
            "  📦 BUNDLE: {} links planned, {} written, {} without parent ({:.2}s)",
            linking.planned(),
            linking.written,
            linking.no_parent,
            stats.linking_time
        );
    }
    info!("==========================================");
}
