// src/models/stats_models.rs
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Job kinds that share the tagged logger and the pipeline summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobType {
    Resolve,
    Bundle,
    Geometry,
    District,
}

impl JobType {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobType::Resolve => "resolve",
            JobType::Bundle => "bundle",
            JobType::Geometry => "geometry",
            JobType::District => "district",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResolveRunStats {
    pub processed: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeometrySyncStats {
    pub processed: usize,
    pub synced: usize,
    pub failed: usize,
    pub with_contour: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LinkRunStats {
    pub plots_scanned: usize,
    pub from_mapping_file: usize,
    pub from_additional_cadastrals: usize,
    pub from_proximity: usize,
    pub primaries_anchored: usize,
    pub already_linked: usize,
    pub missing_in_db: usize,
    pub no_parent: usize,
    pub conflicts: usize,
    pub written: usize,
    pub write_failed: usize,
}

impl LinkRunStats {
    pub fn planned(&self) -> usize {
        self.from_mapping_file
            + self.from_additional_cadastrals
            + self.from_proximity
            + self.primaries_anchored
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DistrictCheckStats {
    pub checked: usize,
    pub mismatches: usize,
    pub fixed: usize,
    pub failed: usize,
}

/// Aggregate of one `landplot_pipeline` run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineStats {
    pub run_id: String,
    pub run_timestamp: NaiveDateTime,
    pub resolve: Option<ResolveRunStats>,
    pub linking: Option<LinkRunStats>,
    pub geometry: Option<GeometrySyncStats>,
    pub districts: Option<DistrictCheckStats>,
    pub resolve_time: f64,
    pub linking_time: f64,
    pub geometry_time: f64,
    pub district_time: f64,
    pub total_processing_time: f64,
}

impl PipelineStats {
    pub fn new(run_id: String, run_timestamp: NaiveDateTime) -> Self {
        Self {
            run_id,
            run_timestamp,
            resolve: None,
            linking: None,
            geometry: None,
            districts: None,
            resolve_time: 0.0,
            linking_time: 0.0,
            geometry_time: 0.0,
            district_time: 0.0,
            total_processing_time: 0.0,
        }
    }

    pub fn record_phase_time(&mut self, job: JobType, elapsed: Duration) {
        let secs = elapsed.as_secs_f64();
        match job {
            JobType::Resolve => self.resolve_time = secs,
            JobType::Bundle => self.linking_time = secs,
            JobType::Geometry => self.geometry_time = secs,
            JobType::District => self.district_time = secs,
        }
    }
}
