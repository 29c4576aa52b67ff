// src/matching/bundle.rs
//
// Grouping of parcels sold together as one lot. Linking is planned in
// memory over a snapshot of the parcel table and written afterwards as
// single-row updates, so a plan computed from already-linked data is empty.

use anyhow::{Context, Result};
use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;
use uuid::Uuid;

use crate::error::MappingError;
use crate::matching::cadastral::CadastralNumber;
use crate::models::core::LandPlot;
use crate::models::stats_models::LinkRunStats;
use crate::utils::constants::{
    BUNDLE_ADDITIONAL_MARKER, BUNDLE_MAIN_MARKER, MAX_BUNDLE_CADASTRAL_DISTANCE,
};

static LOT_TITLE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)лот:.*\((главный|дополнительный)\)").expect("static lot title regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BundleRole {
    Main,
    Additional,
}

/// Role announced by a listing title such as "Лот: 3 участка (главный)".
pub fn bundle_role_from_title(title: &str) -> Option<BundleRole> {
    let caps = LOT_TITLE_RE.captures(title)?;
    let marker = caps.get(1)?.as_str().to_lowercase();
    if marker == BUNDLE_MAIN_MARKER {
        Some(BundleRole::Main)
    } else if marker == BUNDLE_ADDITIONAL_MARKER {
        Some(BundleRole::Additional)
    } else {
        None
    }
}

fn title_role(plot: &LandPlot) -> Option<BundleRole> {
    plot.title.as_deref().and_then(bundle_role_from_title)
}

// ---------------------------------------------------------------------------
// Mapping file
// ---------------------------------------------------------------------------

/// One lot of the JSON Lines mapping file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundleMapping {
    pub main: String,
    #[serde(default)]
    pub plots: Vec<MappedPlot>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappedPlot {
    pub cadastral: String,
    #[serde(default)]
    pub is_primary: bool,
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Debug, Default)]
pub struct MappingFile {
    pub lots: Vec<BundleMapping>,
    /// Lines that could not be used; the rest of the file still applies.
    pub errors: Vec<MappingError>,
}

pub fn parse_mapping_jsonl(content: &str) -> MappingFile {
    let mut file = MappingFile::default();
    for (idx, line) in content.lines().enumerate() {
        let line_no = idx + 1;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<BundleMapping>(line) {
            Ok(lot) if lot.main.trim().is_empty() => {
                file.errors.push(MappingError::MissingMain { line: line_no })
            }
            Ok(lot) => file.lots.push(lot),
            Err(source) => file.errors.push(MappingError::InvalidJson {
                line: line_no,
                source,
            }),
        }
    }
    file
}

pub fn load_mapping_file(path: &Path) -> Result<MappingFile> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read bundle mapping file {}", path.display()))?;
    Ok(parse_mapping_jsonl(&content))
}

// ---------------------------------------------------------------------------
// Link planning
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LinkSource {
    MappingFile,
    AdditionalCadastrals,
    Proximity { distance: u64 },
    PrimaryAnchor,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinkUpdate {
    pub plot_id: Uuid,
    pub cadastral_number: Option<String>,
    pub bundle_id: Uuid,
    pub is_bundle_primary: bool,
    pub source: LinkSource,
}

/// A secondary with several primaries in range; the nearest was taken.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AmbiguousLink {
    pub cadastral_number: String,
    pub chosen_primary: String,
    pub candidates: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct LinkPlan {
    pub updates: Vec<LinkUpdate>,
    pub already_linked: usize,
    /// Cadastral numbers named by an explicit source but absent from the table.
    pub missing_cadastrals: Vec<String>,
    /// Secondaries by title with no primary in range.
    pub no_parent: Vec<String>,
    pub ambiguous: Vec<AmbiguousLink>,
    /// Explicit links skipped because an earlier explicit source claimed the parcel.
    pub conflicts: Vec<String>,
    pub skipped_unparseable: Vec<String>,
}

impl LinkPlan {
    pub fn is_empty(&self) -> bool {
        self.updates.is_empty()
    }

    pub fn stats(&self) -> LinkRunStats {
        let mut stats = LinkRunStats {
            already_linked: self.already_linked,
            missing_in_db: self.missing_cadastrals.len(),
            no_parent: self.no_parent.len(),
            conflicts: self.conflicts.len(),
            ..Default::default()
        };
        for update in &self.updates {
            match update.source {
                LinkSource::MappingFile => stats.from_mapping_file += 1,
                LinkSource::AdditionalCadastrals => stats.from_additional_cadastrals += 1,
                LinkSource::Proximity { .. } => stats.from_proximity += 1,
                LinkSource::PrimaryAnchor => stats.primaries_anchored += 1,
            }
        }
        stats
    }

    /// Applies the planned links to an in-memory copy of the table.
    pub fn apply_to(&self, plots: &mut [LandPlot]) {
        let by_id: HashMap<Uuid, &LinkUpdate> =
            self.updates.iter().map(|u| (u.plot_id, u)).collect();
        for plot in plots.iter_mut() {
            if let Some(update) = by_id.get(&plot.id) {
                plot.bundle_id = Some(update.bundle_id);
                plot.is_bundle_primary = update.is_bundle_primary;
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct LinkState {
    bundle_id: Option<Uuid>,
    is_primary: bool,
}

struct Planner<'a> {
    plots: &'a [LandPlot],
    by_cadastral: HashMap<String, usize>,
    state: Vec<LinkState>,
    source: Vec<Option<LinkSource>>,
    /// Bundle each parcel was assigned to by an explicit source.
    explicit_owner: HashMap<Uuid, Uuid>,
    touched: HashSet<usize>,
    plan: LinkPlan,
}

impl<'a> Planner<'a> {
    fn new(plots: &'a [LandPlot]) -> Self {
        let mut by_cadastral = HashMap::new();
        for (idx, plot) in plots.iter().enumerate() {
            if let Some(cad) = plot.cadastral() {
                if by_cadastral.contains_key(cad) {
                    warn!("Duplicate cadastral number {} in parcel table, keeping the first row", cad);
                    continue;
                }
                by_cadastral.insert(cad.to_string(), idx);
            }
        }
        let state = plots
            .iter()
            .map(|p| LinkState {
                bundle_id: p.bundle_id,
                is_primary: p.is_bundle_primary,
            })
            .collect();

        Self {
            plots,
            by_cadastral,
            state,
            source: vec![None; plots.len()],
            explicit_owner: HashMap::new(),
            touched: HashSet::new(),
            plan: LinkPlan::default(),
        }
    }

    fn lookup(&mut self, cadastral: &str) -> Option<usize> {
        let key = cadastral.trim();
        let found = self.by_cadastral.get(key).copied();
        if found.is_none() {
            debug!("{}: NOT FOUND in DB", key);
            self.plan.missing_cadastrals.push(key.to_string());
        }
        found
    }

    fn assign(&mut self, idx: usize, bundle_id: Uuid, is_primary: bool, source: LinkSource) {
        let next = LinkState {
            bundle_id: Some(bundle_id),
            is_primary,
        };
        self.touched.insert(idx);
        if self.state[idx] != next {
            self.state[idx] = next;
            self.source[idx] = Some(source);
        }
    }

    fn claimed_elsewhere(&self, idx: usize, bundle_id: Uuid) -> bool {
        matches!(self.explicit_owner.get(&self.plots[idx].id), Some(owner) if *owner != bundle_id)
    }

    /// Links `siblings` under the parcel at `primary_idx`, anchoring it as
    /// its own bundle's primary.
    fn apply_explicit_lot<'s, I>(&mut self, primary_idx: usize, siblings: I, source: LinkSource)
    where
        I: IntoIterator<Item = &'s str>,
    {
        let plots = self.plots;
        let primary = &plots[primary_idx];
        let bundle_id = primary.id;
        let primary_label = primary.label().to_string();

        if self.claimed_elsewhere(primary_idx, bundle_id) {
            warn!("{}: already linked as a secondary by an earlier source, lot skipped", primary_label);
            self.plan.conflicts.push(primary_label);
            return;
        }
        self.explicit_owner.insert(bundle_id, bundle_id);
        self.assign(primary_idx, bundle_id, true, LinkSource::PrimaryAnchor);

        for cadastral in siblings {
            if cadastral.trim() == primary_label {
                continue;
            }
            let Some(idx) = self.lookup(cadastral) else {
                continue;
            };
            if idx == primary_idx {
                continue;
            }
            if self.claimed_elsewhere(idx, bundle_id) {
                warn!(
                    "{}: claimed by another lot, not linking to {}",
                    cadastral.trim(),
                    primary_label
                );
                self.plan.conflicts.push(cadastral.trim().to_string());
                continue;
            }
            self.explicit_owner.insert(plots[idx].id, bundle_id);
            self.assign(idx, bundle_id, false, source);
        }
    }

    fn apply_mapping_file(&mut self, mappings: &[BundleMapping]) {
        for lot in mappings {
            let Some(primary_idx) = self.lookup(&lot.main) else {
                continue;
            };
            let siblings: Vec<&str> = lot
                .plots
                .iter()
                .filter(|p| !p.is_primary)
                .map(|p| p.cadastral.as_str())
                .collect();
            self.apply_explicit_lot(primary_idx, siblings, LinkSource::MappingFile);
        }
    }

    fn apply_additional_cadastrals(&mut self) {
        let plots = self.plots;
        for (idx, plot) in plots.iter().enumerate() {
            if !self.state[idx].is_primary || plot.additional_cadastral_numbers.is_empty() {
                continue;
            }
            let siblings: Vec<&str> = plot
                .additional_cadastral_numbers
                .iter()
                .map(String::as_str)
                .filter(|c| !c.trim().is_empty())
                .collect();
            self.apply_explicit_lot(idx, siblings, LinkSource::AdditionalCadastrals);
        }
    }

    fn apply_proximity(&mut self) {
        let plots = self.plots;
        let primaries: Vec<(usize, CadastralNumber)> = (0..plots.len())
            .filter(|&i| self.state[i].is_primary)
            .filter_map(|i| {
                let cad = plots[i].cadastral()?;
                CadastralNumber::parse(cad).ok().map(|n| (i, n))
            })
            .collect();

        for (idx, plot) in plots.iter().enumerate() {
            if self.state[idx].bundle_id.is_some()
                || self.state[idx].is_primary
                || title_role(plot) != Some(BundleRole::Additional)
            {
                continue;
            }
            let Some(cad) = plot.cadastral() else {
                continue;
            };
            let number = match CadastralNumber::parse(cad) {
                Ok(n) => n,
                Err(e) => {
                    debug!("Skipping orphan with unparseable cadastral number: {}", e);
                    self.plan.skipped_unparseable.push(cad.to_string());
                    continue;
                }
            };

            let candidates: Vec<(usize, u64)> = primaries
                .iter()
                .filter(|(p_idx, _)| plots[*p_idx].location == plot.location)
                .filter_map(|(p_idx, p_num)| {
                    number
                        .distance_to(p_num)
                        .filter(|d| *d <= MAX_BUNDLE_CADASTRAL_DISTANCE)
                        .map(|d| (*p_idx, d))
                })
                .collect();

            let Some(&(best_idx, distance)) = candidates.iter().min_by_key(|(_, d)| *d) else {
                debug!("{}: NO PARENT", cad);
                self.plan.no_parent.push(cad.to_string());
                continue;
            };

            let best = &plots[best_idx];
            if candidates.len() > 1 {
                self.plan.ambiguous.push(AmbiguousLink {
                    cadastral_number: cad.to_string(),
                    chosen_primary: best.label().to_string(),
                    candidates: candidates.len(),
                });
            }

            let bundle_id = match self.state[best_idx].bundle_id {
                Some(existing) => existing,
                None => {
                    self.assign(best_idx, best.id, true, LinkSource::PrimaryAnchor);
                    best.id
                }
            };
            self.assign(idx, bundle_id, false, LinkSource::Proximity { distance });
        }
    }

    fn finish(mut self) -> LinkPlan {
        let plots = self.plots;
        for (idx, plot) in plots.iter().enumerate() {
            let original = LinkState {
                bundle_id: plot.bundle_id,
                is_primary: plot.is_bundle_primary,
            };
            let current = self.state[idx];
            if current == original {
                if self.touched.contains(&idx) {
                    self.plan.already_linked += 1;
                }
                continue;
            }
            if let (Some(bundle_id), Some(source)) = (current.bundle_id, self.source[idx]) {
                self.plan.updates.push(LinkUpdate {
                    plot_id: plot.id,
                    cadastral_number: plot.cadastral_number.clone(),
                    bundle_id,
                    is_bundle_primary: current.is_primary,
                    source,
                });
            }
        }
        self.plan
    }
}

/// Plans bundle links over a parcel table snapshot. Mapping-file lots go
/// first, then primaries' `additional_cadastral_numbers`, then the
/// cadastral proximity heuristic for titled secondaries still unlinked.
pub fn plan_links(plots: &[LandPlot], mappings: &[BundleMapping]) -> LinkPlan {
    let mut planner = Planner::new(plots);
    planner.apply_mapping_file(mappings);
    planner.apply_additional_cadastrals();
    planner.apply_proximity();
    planner.finish()
}

// ---------------------------------------------------------------------------
// Diagnostics
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrphanPlot {
    pub id: Uuid,
    pub cadastral_number: Option<String>,
    pub title: Option<String>,
    pub location: Option<String>,
}

impl From<&LandPlot> for OrphanPlot {
    fn from(plot: &LandPlot) -> Self {
        Self {
            id: plot.id,
            cadastral_number: plot.cadastral_number.clone(),
            title: plot.title.clone(),
            location: plot.location.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "issue", rename_all = "snake_case")]
pub enum BundleIssue {
    NoPrimary,
    MultiplePrimaries { primaries: Vec<String> },
    SinglePlot,
    MixedOwnership { ownership: Vec<String> },
    MissingCoordinates { cadastral_numbers: Vec<String> },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BundleDiagnostic {
    pub bundle_id: Uuid,
    pub cadastral_numbers: Vec<String>,
    pub issues: Vec<BundleIssue>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BundleReport {
    pub total_bundles: usize,
    pub orphan_primaries: Vec<OrphanPlot>,
    pub orphan_secondaries: Vec<OrphanPlot>,
    pub problem_bundles: Vec<BundleDiagnostic>,
}

impl BundleReport {
    pub fn issue_count(&self, matches: impl Fn(&BundleIssue) -> bool) -> usize {
        self.problem_bundles
            .iter()
            .filter(|b| b.issues.iter().any(&matches))
            .count()
    }
}

/// Reports orphans and bundles breaking the one-primary invariant, with
/// mixed ownership or lacking coordinates. Nothing is corrected.
pub fn analyze_bundles(plots: &[LandPlot]) -> BundleReport {
    let mut report = BundleReport::default();

    let mut order: Vec<Uuid> = Vec::new();
    let mut groups: HashMap<Uuid, Vec<&LandPlot>> = HashMap::new();
    for plot in plots {
        match (plot.bundle_id, title_role(plot)) {
            (Some(bundle_id), _) => {
                groups
                    .entry(bundle_id)
                    .or_insert_with(|| {
                        order.push(bundle_id);
                        Vec::new()
                    })
                    .push(plot);
            }
            (None, Some(BundleRole::Main)) => report.orphan_primaries.push(plot.into()),
            (None, Some(BundleRole::Additional)) => report.orphan_secondaries.push(plot.into()),
            (None, None) => {}
        }
    }
    report.total_bundles = order.len();

    for bundle_id in order {
        let members = &groups[&bundle_id];
        let mut issues = Vec::new();

        let primaries: Vec<String> = members
            .iter()
            .filter(|p| p.is_bundle_primary)
            .map(|p| p.label().to_string())
            .collect();
        match primaries.len() {
            0 => issues.push(BundleIssue::NoPrimary),
            1 => {}
            _ => issues.push(BundleIssue::MultiplePrimaries { primaries }),
        }

        if members.len() == 1 {
            issues.push(BundleIssue::SinglePlot);
        }

        let mut ownership: Vec<String> = members
            .iter()
            .map(|p| p.ownership_type.clone().unwrap_or_else(|| "unknown".to_string()))
            .collect();
        ownership.sort();
        ownership.dedup();
        if ownership.len() > 1 {
            issues.push(BundleIssue::MixedOwnership { ownership });
        }

        let missing: Vec<String> = members
            .iter()
            .filter(|p| !p.has_coordinates || p.center_lat.is_none() || p.center_lon.is_none())
            .map(|p| p.label().to_string())
            .collect();
        if !missing.is_empty() {
            issues.push(BundleIssue::MissingCoordinates {
                cadastral_numbers: missing,
            });
        }

        if !issues.is_empty() {
            report.problem_bundles.push(BundleDiagnostic {
                bundle_id,
                cadastral_numbers: members.iter().map(|p| p.label().to_string()).collect(),
                issues,
            });
        }
    }

    report
}
