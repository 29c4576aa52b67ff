//! Row filtering for the batch jobs over `land_plots`.
//! Restricts work to selected locations, active listings, or parcels
//! whose geometry has not been synced yet.

use log::{debug, info};
use std::env;

#[derive(Debug, Clone, Default)]
pub struct PlotFilterConfig {
    /// Exact `location` values to process; empty means all locations.
    pub locations: Vec<String>,
    pub active_only: bool,
    pub only_missing_geometry: bool,
}

impl PlotFilterConfig {
    /// Create configuration from environment variables
    pub fn from_env() -> Self {
        let locations = env::var("RESOLVE_LOCATIONS")
            .unwrap_or_else(|_| String::new())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let active_only = env::var("PLOTS_ACTIVE_ONLY")
            .unwrap_or_else(|_| "false".to_string())
            .parse::<bool>()
            .unwrap_or(false);

        let config = Self {
            locations,
            active_only,
            only_missing_geometry: false,
        };
        debug!("Plot filter config: {:?}", config);
        config
    }

    pub fn with_locations(mut self, locations: Vec<String>) -> Self {
        self.locations = locations
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        self
    }

    pub fn is_active(&self) -> bool {
        !self.locations.is_empty() || self.active_only || self.only_missing_geometry
    }

    /// Builds the WHERE clause (without the `WHERE` keyword) against table
    /// alias `p`. Location placeholders are numbered from `param_offset + 1`
    /// and the returned strings are their bind values in order.
    pub fn build_where_clause(&self, param_offset: usize) -> Option<(String, Vec<String>)> {
        if !self.is_active() {
            return None;
        }

        let mut conditions = Vec::new();
        if !self.locations.is_empty() {
            let placeholders: Vec<String> = (1..=self.locations.len())
                .map(|i| format!("${}", i + param_offset))
                .collect();
            conditions.push(format!(
                "p.location = ANY(ARRAY[{}]::text[])",
                placeholders.join(", ")
            ));
        }
        if self.active_only {
            conditions.push("p.is_active = true".to_string());
        }
        if self.only_missing_geometry {
            conditions.push("p.coordinates_json IS NULL".to_string());
        }

        Some((conditions.join(" AND "), self.locations.clone()))
    }

    pub fn log_config(&self) {
        if self.is_active() {
            info!("🔍 Plot filtering ENABLED");
            if !self.locations.is_empty() {
                info!("   Locations: {:?}", self.locations);
            }
            if self.active_only {
                info!("   Active listings only");
            }
            if self.only_missing_geometry {
                info!("   Only parcels without synced geometry");
            }
        } else {
            info!("🔍 Plot filtering DISABLED - processing all parcels");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    #[test]
    fn test_config_from_env() {
        env::set_var("RESOLVE_LOCATIONS", "Родники, Малое Исаково,,");
        env::set_var("PLOTS_ACTIVE_ONLY", "true");

        let config = PlotFilterConfig::from_env();
        assert_eq!(config.locations, vec!["Родники", "Малое Исаково"]);
        assert!(config.active_only);
        assert!(!config.only_missing_geometry);

        env::remove_var("RESOLVE_LOCATIONS");
        env::remove_var("PLOTS_ACTIVE_ONLY");
    }

    #[test]
    fn test_disabled_filter_returns_none() {
        assert!(PlotFilterConfig::default().build_where_clause(0).is_none());
    }

    #[test]
    fn test_where_clause_with_offset() {
        let config = PlotFilterConfig::default()
            .with_locations(vec!["Родники".to_string(), " Луговое ".to_string()]);

        let (clause, params) = config.build_where_clause(1).unwrap();
        assert_eq!(clause, "p.location = ANY(ARRAY[$2, $3]::text[])");
        assert_eq!(params, vec!["Родники", "Луговое"]);
    }

    #[test]
    fn test_combined_conditions() {
        let config = PlotFilterConfig {
            locations: vec!["Родники".to_string()],
            active_only: true,
            only_missing_geometry: true,
        };

        let (clause, params) = config.build_where_clause(0).unwrap();
        assert!(clause.starts_with("p.location = ANY(ARRAY[$1]::text[]) AND p.is_active = true AND "));
        assert!(clause.contains("p.coordinates_json IS NULL"));
        assert_eq!(params.len(), 1);
    }

    #[test]
    fn test_flag_only_filter_has_no_params() {
        let config = PlotFilterConfig {
            active_only: true,
            ..Default::default()
        };
        let (clause, params) = config.build_where_clause(0).unwrap();
        assert_eq!(clause, "p.is_active = true");
        assert!(params.is_empty());
    }

    #[test]
    fn test_missing_geometry_means_no_stored_geometry() {
        let config = PlotFilterConfig {
            only_missing_geometry: true,
            ..Default::default()
        };
        let (clause, params) = config.build_where_clause(0).unwrap();
        assert_eq!(clause, "p.coordinates_json IS NULL");
        assert!(params.is_empty());
    }
}
