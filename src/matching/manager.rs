// src/matching/manager.rs - Sequential batch jobs over the parcel table
use anyhow::{bail, Context, Result};
use indicatif::{MultiProgress, ProgressBar};
use log::{debug, info, warn};
use serde::Serialize;
use std::fs;
use std::path::Path;
use uuid::Uuid;

use crate::error::ResolveError;
use crate::matching::bundle::{
    analyze_bundles, load_mapping_file, plan_links, BundleIssue, BundleMapping, BundleReport, LinkPlan,
};
use crate::matching::cadastral::{district_for_cadastral, normalize_district_name};
use crate::matching::db;
use crate::matching::district_check::{find_district_mismatches, DistrictCheckReport};
use crate::matching::resolver::{LocationResolver, ResolutionDebug};
use crate::models::core::{LandPlot, LocationFields};
use crate::models::stats_models::{
    DistrictCheckStats, GeometrySyncStats, JobType, LinkRunStats, ResolveRunStats,
};
use crate::nspd::client::detect_land_status;
use crate::nspd::geometry::is_contour;
use crate::nspd::schemas::CadastralObject;
use crate::nspd::NspdClient;
use crate::utils::constants::{
    GEOMETRY_SYNC_DELAY_MS, RESOLVE_DEFAULT_DELAY_MS, RESOLVE_DEFAULT_LIMIT, RESOLVE_MAX_DELAY_MS,
    RESOLVE_MAX_LIMIT,
};
use crate::utils::db_connect::{is_connection_error, PgPool};
use crate::utils::plot_filter::PlotFilterConfig;
use crate::utils::progress_bars::logging::ResolutionLogger;
use crate::utils::progress_bars::progress_config::job_progress_bar;

// ---------------------------------------------------------------------------
// Location resolution
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolveRequest {
    pub locations: Vec<String>,
    pub limit: i64,
    pub delay_ms: u64,
    pub dry_run: bool,
}

impl ResolveRequest {
    /// `limit` is clamped to 1..=200 and `delay_ms` to 0..=3000.
    pub fn new(locations: Vec<String>, limit: Option<i64>, delay_ms: Option<u64>, dry_run: bool) -> Result<Self> {
        let locations: Vec<String> = locations
            .into_iter()
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .collect();
        if locations.is_empty() {
            bail!("At least one location to re-resolve is required");
        }
        Ok(Self {
            locations,
            limit: limit.unwrap_or(RESOLVE_DEFAULT_LIMIT).clamp(1, RESOLVE_MAX_LIMIT),
            delay_ms: delay_ms.unwrap_or(RESOLVE_DEFAULT_DELAY_MS).min(RESOLVE_MAX_DELAY_MS),
            dry_run,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ResolveItemReport {
    pub id: Uuid,
    pub cadastral_number: Option<String>,
    pub before: LocationFields,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub after: Option<LocationFields>,
    /// Fields changed; written unless the run is a dry run.
    pub updated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nspd_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug: Option<ResolutionDebug>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResolveReport {
    pub requested_locations: Vec<String>,
    pub limit: i64,
    pub dry_run: bool,
    pub processed: usize,
    pub updated: usize,
    pub results: Vec<ResolveItemReport>,
}

impl ResolveReport {
    pub fn stats(&self) -> ResolveRunStats {
        let failed = self.results.iter().filter(|r| r.error.is_some()).count();
        ResolveRunStats {
            processed: self.processed,
            updated: self.updated,
            unchanged: self.processed - self.updated - failed,
            failed,
        }
    }
}

fn merged(before: &LocationFields, patch: &LocationFields) -> LocationFields {
    LocationFields {
        district: patch.district.clone().or_else(|| before.district.clone()),
        location: patch.location.clone().or_else(|| before.location.clone()),
    }
}

/// Outcome of a single-row write. Connection loss is returned as the
/// outer error and ends the job; any other failure is the row's error text.
pub fn settle_row_write(result: Result<bool>) -> Result<std::result::Result<bool, String>> {
    match result {
        Ok(changed) => Ok(Ok(changed)),
        Err(e) if is_connection_error(&e) => Err(e),
        Err(e) => Ok(Err(format!("{:#}", e))),
    }
}

fn inc(pb: &Option<ProgressBar>, msg: &str) {
    if let Some(pb) = pb {
        pb.set_message(msg.to_string());
        pb.inc(1);
    }
}

/// Re-resolves `district` / `location` of parcels currently in
/// `request.locations`, one registry call at a time.
pub async fn run_location_resolution(
    pool: &PgPool,
    client: &NspdClient,
    resolver: &LocationResolver,
    request: &ResolveRequest,
    run_id: &str,
    multi_progress: Option<&MultiProgress>,
) -> Result<ResolveReport> {
    let logger = ResolutionLogger::new(JobType::Resolve);
    logger.log_start(run_id, request.dry_run);

    let filter = PlotFilterConfig::default().with_locations(request.locations.clone());
    filter.log_config();
    let plots = db::fetch_plots_with_cadastral(pool, &filter, Some(request.limit))
        .await
        .context("Failed to load parcels to resolve")?;
    logger.log_data_loaded(plots.len(), "parcels");

    let mut report = ResolveReport {
        requested_locations: request.locations.clone(),
        limit: request.limit,
        dry_run: request.dry_run,
        processed: 0,
        updated: 0,
        results: Vec::with_capacity(plots.len()),
    };

    let pb = job_progress_bar(multi_progress, plots.len() as u64, "📍 resolve");
    logger.log_phase("Resolving locations", Some(&format!("{} parcels", plots.len())));

    for (i, plot) in plots.iter().enumerate() {
        if i > 0 {
            client.pause(Some(request.delay_ms)).await;
        }
        report.processed += 1;

        let before = LocationFields {
            district: plot.district.clone(),
            location: plot.location.clone(),
        };
        let mut item = ResolveItemReport {
            id: plot.id,
            cadastral_number: plot.cadastral_number.clone(),
            before: before.clone(),
            after: None,
            updated: false,
            error: None,
            nspd_address: None,
            debug: None,
        };

        let Some(cadastral) = plot.cadastral() else {
            item.error = Some("Parcel has no cadastral number".to_string());
            report.results.push(item);
            continue;
        };

        match resolver.resolve(client, cadastral).await {
            Ok(resolution) => {
                let patch = resolution.location_patch(&before);
                item.nspd_address = Some(resolution.nspd_address.clone());
                if patch.is_empty() {
                    debug!("{}: already up to date", cadastral);
                    item.after = Some(before.clone());
                } else {
                    let written = if request.dry_run {
                        Ok(true)
                    } else {
                        db::update_plot_location(pool, plot.id, &patch).await
                    };
                    match settle_row_write(written)? {
                        Ok(_) => {
                            item.updated = true;
                            item.after = Some(merged(&before, &patch));
                            report.updated += 1;
                            logger.log_item(
                                cadastral,
                                &format!(
                                    "{:?} / {:?} → {:?} / {:?}",
                                    before.district, before.location, resolution.district, resolution.location
                                ),
                            );
                        }
                        Err(text) => {
                            logger.log_item(cadastral, &format!("❌ {}", text));
                            item.error = Some(text);
                        }
                    }
                }
                item.debug = Some(resolution.debug);
            }
            Err(e) => {
                logger.log_item(cadastral, &format!("❌ {}", e));
                item.error = Some(e.to_string());
            }
        }

        inc(&pb, cadastral);
        if (i + 1) % 25 == 0 {
            logger.log_progress_update(i + 1, plots.len(), Some(&format!("{} updated", report.updated)));
        }
        report.results.push(item);
    }

    if let Some(pb) = &pb {
        pb.finish_with_message(format!("{} updated", report.updated));
    }
    logger.log_resolve_completion(&report.stats());
    Ok(report)
}

// ---------------------------------------------------------------------------
// Geometry sync
// ---------------------------------------------------------------------------

pub fn sync_error_text(err: &ResolveError) -> String {
    match err {
        ResolveError::NotFound | ResolveError::GeometryMissing => "geometry not found".to_string(),
        other => other.to_string(),
    }
}

/// What to store for a parcel whose registry object was fetched.
pub fn geometry_write_for(plot: &LandPlot, object: &CadastralObject) -> db::GeometryWrite {
    let district = if plot.district.as_deref().map_or(true, |d| d.trim().is_empty()) {
        plot.cadastral()
            .and_then(district_for_cadastral)
            .map(normalize_district_name)
    } else {
        None
    };

    db::GeometryWrite {
        geometry: Some(object.geometry.clone()),
        centroid: object.centroid,
        has_contour: is_contour(&object.geometry),
        land_status: detect_land_status(object.land_category.as_deref(), object.permitted_use.as_deref())
            .map(str::to_string),
        district,
        sync_error: if object.centroid.is_none() {
            Some("centroid not computed".to_string())
        } else {
            None
        },
    }
}

pub struct GeometrySyncRequest {
    pub filter: PlotFilterConfig,
    pub limit: Option<i64>,
    pub delay_ms: Option<u64>,
    pub dry_run: bool,
}

/// Fetches geometry and centroid for parcels that have none stored yet.
pub async fn run_geometry_sync(
    pool: &PgPool,
    client: &NspdClient,
    request: &GeometrySyncRequest,
    run_id: &str,
    multi_progress: Option<&MultiProgress>,
) -> Result<GeometrySyncStats> {
    let logger = ResolutionLogger::new(JobType::Geometry);
    logger.log_start(run_id, request.dry_run);

    let mut filter = request.filter.clone();
    filter.only_missing_geometry = true;
    filter.log_config();
    let plots = db::fetch_plots_with_cadastral(pool, &filter, request.limit)
        .await
        .context("Failed to load parcels without geometry")?;
    logger.log_data_loaded(plots.len(), "parcels without geometry");

    let delay = request.delay_ms.unwrap_or(GEOMETRY_SYNC_DELAY_MS);
    let mut stats = GeometrySyncStats::default();
    let pb = job_progress_bar(multi_progress, plots.len() as u64, "🗺️ geometry");

    for (i, plot) in plots.iter().enumerate() {
        if i > 0 {
            client.pause(Some(delay)).await;
        }
        stats.processed += 1;
        let Some(cadastral) = plot.cadastral() else {
            stats.failed += 1;
            continue;
        };

        let write = match client.fetch_object(cadastral).await {
            Ok(object) => geometry_write_for(plot, &object),
            Err(e) => db::GeometryWrite {
                sync_error: Some(sync_error_text(&e)),
                ..Default::default()
            },
        };

        let stored = if request.dry_run {
            Ok(true)
        } else {
            db::update_plot_geometry(pool, plot.id, &write).await
        };
        match (settle_row_write(stored)?, &write.sync_error) {
            (Err(text), _) => {
                stats.failed += 1;
                logger.log_item(cadastral, &format!("❌ {}", text));
            }
            (Ok(_), Some(text)) => {
                stats.failed += 1;
                logger.log_item(cadastral, &format!("❌ {}", text));
            }
            (Ok(_), None) => {
                stats.synced += 1;
                if write.has_contour {
                    stats.with_contour += 1;
                }
                let geometry_type = write.geometry.as_ref().map_or("?", |g| g.geometry_type.as_str());
                logger.log_item(cadastral, &format!("✅ {}", geometry_type));
            }
        }
        inc(&pb, cadastral);
        if (i + 1) % 25 == 0 {
            logger.log_progress_update(i + 1, plots.len(), Some(&format!("{} synced", stats.synced)));
        }
    }

    if let Some(pb) = &pb {
        pb.finish_with_message(format!("{} synced", stats.synced));
    }
    logger.log_geometry_completion(&stats);
    Ok(stats)
}

// ---------------------------------------------------------------------------
// Bundle linking and diagnostics
// ---------------------------------------------------------------------------

fn load_mappings(path: Option<&Path>, logger: &ResolutionLogger) -> Result<Vec<BundleMapping>> {
    let Some(path) = path else {
        return Ok(Vec::new());
    };
    let file = load_mapping_file(path)?;
    for err in &file.errors {
        logger.log_warning(&err.to_string());
    }
    if !file.errors.is_empty() {
        logger.log_data_quality_issue("unusable mapping lines", file.errors.len());
    }
    logger.log_data_loaded(file.lots.len(), "mapping-file lots");
    Ok(file.lots)
}

pub fn log_link_plan(plan: &LinkPlan, logger: &ResolutionLogger) {
    for cad in &plan.missing_cadastrals {
        logger.log_debug(&format!("{}: NOT FOUND in DB", cad));
    }
    for cad in &plan.no_parent {
        logger.log_debug(&format!("{}: NO PARENT", cad));
    }
    for amb in &plan.ambiguous {
        logger.log_debug(&format!(
            "{}: {} primaries in range, linked to nearest {}",
            amb.cadastral_number, amb.candidates, amb.chosen_primary
        ));
    }
    for cad in &plan.conflicts {
        logger.log_warning(&format!("{}: conflicting explicit links, first kept", cad));
    }
    if !plan.missing_cadastrals.is_empty() {
        logger.log_data_quality_issue("cadastral numbers not in DB", plan.missing_cadastrals.len());
    }
    if !plan.no_parent.is_empty() {
        logger.log_data_quality_issue("secondaries without parent", plan.no_parent.len());
    }
    if !plan.skipped_unparseable.is_empty() {
        logger.log_data_quality_issue("unparseable cadastral numbers", plan.skipped_unparseable.len());
    }
}

/// Plans links from the mapping file (if any), primaries' additional
/// cadastral numbers and cadastral proximity, then writes them.
pub async fn run_bundle_linking(
    pool: &PgPool,
    mapping_path: Option<&Path>,
    dry_run: bool,
    run_id: &str,
    multi_progress: Option<&MultiProgress>,
) -> Result<(LinkPlan, LinkRunStats)> {
    let logger = ResolutionLogger::new(JobType::Bundle);
    logger.log_start(run_id, dry_run);

    let mappings = load_mappings(mapping_path, &logger)?;
    let plots = db::fetch_all_plots(pool)
        .await
        .context("Failed to load parcel table for linking")?;
    logger.log_data_loaded(plots.len(), "parcels");

    logger.log_phase("Planning links", None);
    let plan = plan_links(&plots, &mappings);
    log_link_plan(&plan, &logger);

    let mut stats = plan.stats();
    stats.plots_scanned = plots.len();

    if dry_run {
        for update in &plan.updates {
            logger.log_item(
                update.cadastral_number.as_deref().unwrap_or("<no cadastral>"),
                &format!("would link to {} ({:?})", update.bundle_id, update.source),
            );
        }
    } else if !plan.is_empty() {
        logger.log_phase("Writing links", Some(&format!("{} updates", plan.updates.len())));
        let pb = job_progress_bar(multi_progress, plan.updates.len() as u64, "📦 link");
        for update in &plan.updates {
            match settle_row_write(db::update_plot_bundle(pool, update).await)? {
                Ok(true) => stats.written += 1,
                Ok(false) => warn!("Parcel {} disappeared before its link was written", update.plot_id),
                Err(text) => {
                    stats.write_failed += 1;
                    logger.log_error(&text);
                }
            }
            inc(&pb, update.cadastral_number.as_deref().unwrap_or(""));
        }
        if let Some(pb) = &pb {
            pb.finish_with_message(format!("{} written", stats.written));
        }
    }

    logger.log_link_completion(&stats);
    Ok((plan, stats))
}

pub fn log_bundle_report(report: &BundleReport) {
    let logger = ResolutionLogger::new(JobType::Bundle);
    logger.log_phase(
        "Bundle diagnostics",
        Some(&format!("{} bundles", report.total_bundles)),
    );
    for orphan in report.orphan_primaries.iter().chain(report.orphan_secondaries.iter()) {
        logger.log_debug(&format!(
            "ORPHAN {} [{}]",
            orphan.cadastral_number.as_deref().unwrap_or("<no cadastral>"),
            orphan.title.as_deref().unwrap_or("")
        ));
    }
    for bundle in &report.problem_bundles {
        logger.log_debug(&format!("{}: {:?} {:?}", bundle.bundle_id, bundle.cadastral_numbers, bundle.issues));
    }

    let counts = [
        ("orphan primaries", report.orphan_primaries.len()),
        ("orphan secondaries", report.orphan_secondaries.len()),
        ("bundles without primary", report.issue_count(|i| matches!(i, BundleIssue::NoPrimary))),
        (
            "bundles with several primaries",
            report.issue_count(|i| matches!(i, BundleIssue::MultiplePrimaries { .. })),
        ),
        ("single-parcel bundles", report.issue_count(|i| matches!(i, BundleIssue::SinglePlot))),
        (
            "bundles with mixed ownership",
            report.issue_count(|i| matches!(i, BundleIssue::MixedOwnership { .. })),
        ),
        (
            "bundles missing coordinates",
            report.issue_count(|i| matches!(i, BundleIssue::MissingCoordinates { .. })),
        ),
    ];
    for (label, count) in counts {
        if count > 0 {
            logger.log_data_quality_issue(label, count);
        }
    }
    if report.problem_bundles.is_empty() && report.orphan_primaries.is_empty() && report.orphan_secondaries.is_empty() {
        info!("[BUNDLE] 📦 ✅ All bundles consistent");
    }
}

pub async fn run_bundle_report(pool: &PgPool) -> Result<BundleReport> {
    let plots = db::fetch_all_plots(pool)
        .await
        .context("Failed to load parcel table for diagnostics")?;
    let report = analyze_bundles(&plots);
    log_bundle_report(&report);
    Ok(report)
}

// ---------------------------------------------------------------------------
// District drift check
// ---------------------------------------------------------------------------

pub struct DistrictCheckRequest {
    pub filter: PlotFilterConfig,
    /// Rewrite mismatched districts to the prefix district.
    pub fix: bool,
    pub dry_run: bool,
}

pub fn log_district_report(report: &DistrictCheckReport, logger: &ResolutionLogger) {
    for (prefix, stats) in &report.prefix_stats {
        logger.log_debug(&format!(
            "{} {}: {} total, {} ok, {} wrong",
            prefix, stats.district, stats.total, stats.correct, stats.wrong
        ));
    }
    for (prefix, mismatches) in report.mismatches_by_prefix() {
        logger.log_warning(&format!("{}: {} parcels with a different district", prefix, mismatches.len()));
        for mismatch in mismatches {
            logger.log_debug(&format!(
                "{} [{}]: {} → {}",
                mismatch.cadastral_number,
                mismatch.location.as_deref().unwrap_or("—"),
                mismatch.current_district.as_deref().unwrap_or("<none>"),
                mismatch.expected_district
            ));
        }
    }
    info!(
        "[DISTRICT] 🏷️ {} of {} checked parcels agree with their cadastral prefix ({:.1}%)",
        report.checked - report.total_mismatches,
        report.checked,
        report.match_rate()
    );
}

/// Compares stored districts with the cadastral prefix district and,
/// when `request.fix` is set, rewrites the ones that disagree.
pub async fn run_district_check(
    pool: &PgPool,
    request: &DistrictCheckRequest,
    run_id: &str,
    multi_progress: Option<&MultiProgress>,
) -> Result<(DistrictCheckReport, DistrictCheckStats)> {
    let logger = ResolutionLogger::new(JobType::District);
    logger.log_start(run_id, request.dry_run || !request.fix);

    request.filter.log_config();
    let plots = db::fetch_plots_with_cadastral(pool, &request.filter, None)
        .await
        .context("Failed to load parcels for the district check")?;
    logger.log_data_loaded(plots.len(), "parcels");

    let report = find_district_mismatches(&plots);
    log_district_report(&report, &logger);

    let mut stats = DistrictCheckStats {
        checked: report.checked,
        mismatches: report.total_mismatches,
        ..Default::default()
    };

    if request.fix && !report.mismatches.is_empty() {
        logger.log_phase("Fixing districts", Some(&format!("{} parcels", report.mismatches.len())));
        let pb = job_progress_bar(multi_progress, report.mismatches.len() as u64, "🏷️ district");
        for mismatch in &report.mismatches {
            let outcome = format!(
                "{} → {}",
                mismatch.current_district.as_deref().unwrap_or("<none>"),
                mismatch.expected_district
            );
            if request.dry_run {
                logger.log_item(&mismatch.cadastral_number, &format!("would set {}", outcome));
            } else {
                let written = db::update_plot_district(pool, mismatch.id, mismatch.expected_district).await;
                match settle_row_write(written)? {
                    Ok(_) => {
                        stats.fixed += 1;
                        logger.log_item(&mismatch.cadastral_number, &outcome);
                    }
                    Err(text) => {
                        stats.failed += 1;
                        logger.log_item(&mismatch.cadastral_number, &format!("❌ {}", text));
                    }
                }
            }
            inc(&pb, &mismatch.cadastral_number);
        }
        if let Some(pb) = &pb {
            pb.finish_with_message(format!("{} fixed", stats.fixed));
        }
    }

    logger.log_district_completion(&stats);
    Ok((report, stats))
}

pub fn write_json_report<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let body = serde_json::to_string_pretty(value).context("Failed to serialize report")?;
    fs::write(path, body).with_context(|| format!("Failed to write report to {}", path.display()))?;
    info!("📝 Report written to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nspd::schemas::NspdGeometry;
    use crate::nspd::geometry::LatLon;
    use serde_json::json;

    #[test]
    fn test_resolve_request_clamps() {
        let req = ResolveRequest::new(vec![" Шоссейное ".to_string()], Some(1000), Some(10_000), false).unwrap();
        assert_eq!(req.locations, vec!["Шоссейное"]);
        assert_eq!(req.limit, 200);
        assert_eq!(req.delay_ms, 3000);

        let req = ResolveRequest::new(vec!["Родники".to_string()], Some(0), None, true).unwrap();
        assert_eq!(req.limit, 1);
        assert_eq!(req.delay_ms, 500);

        let req = ResolveRequest::new(vec!["Родники".to_string()], None, None, true).unwrap();
        assert_eq!(req.limit, 200);
    }

    #[test]
    fn test_resolve_request_requires_location() {
        assert!(ResolveRequest::new(vec![], None, None, false).is_err());
        assert!(ResolveRequest::new(vec!["  ".to_string()], None, None, false).is_err());
    }

    #[test]
    fn test_row_write_failure_is_recorded_not_raised() {
        let constraint: Result<bool> = Err(anyhow::anyhow!("violates check constraint \"land_plots_district_check\""))
            .context("Failed to update location of parcel 1");
        let text = settle_row_write(constraint).unwrap().unwrap_err();
        assert!(text.starts_with("Failed to update location of parcel 1"));
        assert!(text.contains("land_plots_district_check"));

        assert_eq!(settle_row_write(Ok(true)).unwrap(), Ok(true));
        assert_eq!(settle_row_write(Ok(false)).unwrap(), Ok(false));
    }

    #[test]
    fn test_lost_connection_ends_the_job() {
        let checkout: Result<bool> = Err(bb8::RunError::<tokio_postgres::Error>::TimedOut)
            .context("Failed to get DB connection for update_plot_location");
        assert!(settle_row_write(checkout).is_err());
    }

    #[test]
    fn test_sync_error_text() {
        assert_eq!(sync_error_text(&ResolveError::NotFound), "geometry not found");
        assert_eq!(sync_error_text(&ResolveError::GeometryMissing), "geometry not found");
        assert_eq!(sync_error_text(&ResolveError::Http { status: 403 }), "API Error: 403");
    }

    fn object(geometry_type: &str, centroid: Option<LatLon>) -> CadastralObject {
        CadastralObject {
            cadastral_number: "39:05:010101:10".to_string(),
            address: None,
            geometry: NspdGeometry {
                geometry_type: geometry_type.to_string(),
                coordinates: json!([]),
            },
            centroid,
            land_category: Some("Земли населенных пунктов".to_string()),
            permitted_use: None,
            area: None,
            area_unit: None,
        }
    }

    #[test]
    fn test_geometry_write_fills_missing_district() {
        let plot = LandPlot::new(Uuid::from_u128(1), "39:05:010101:10");
        let write = geometry_write_for(&plot, &object("Polygon", Some(LatLon { lat: 54.9, lon: 20.4 })));
        assert_eq!(write.district.as_deref(), Some("Зеленоградский район"));
        assert_eq!(write.land_status.as_deref(), Some("ИЖС"));
        assert!(write.has_contour);
        assert_eq!(write.sync_error, None);

        let mut known = plot.clone();
        known.district = Some("Зеленоградский район".to_string());
        assert_eq!(geometry_write_for(&known, &object("Point", None)).district, None);
    }

    #[test]
    fn test_geometry_write_without_centroid() {
        let plot = LandPlot::new(Uuid::from_u128(1), "39:05:010101:10");
        let write = geometry_write_for(&plot, &object("GeometryCollection", None));
        assert!(!write.has_contour);
        assert_eq!(write.sync_error.as_deref(), Some("centroid not computed"));
    }

    #[test]
    fn test_report_stats() {
        let item = |updated: bool, error: Option<&str>| ResolveItemReport {
            id: Uuid::new_v4(),
            cadastral_number: None,
            before: LocationFields::default(),
            after: None,
            updated,
            error: error.map(str::to_string),
            nspd_address: None,
            debug: None,
        };
        let report = ResolveReport {
            requested_locations: vec!["Родники".to_string()],
            limit: 200,
            dry_run: false,
            processed: 3,
            updated: 1,
            results: vec![item(true, None), item(false, None), item(false, Some("No location resolved"))],
        };
        let stats = report.stats();
        assert_eq!((stats.processed, stats.updated, stats.unchanged, stats.failed), (3, 1, 1, 1));

        let body = serde_json::to_value(&report).unwrap();
        assert_eq!(body["results"][2]["error"], "No location resolved");
        assert!(body["results"][0].get("after").is_none());
    }
}
