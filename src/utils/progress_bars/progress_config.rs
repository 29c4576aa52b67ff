// src/utils/progress_bars/progress_config.rs

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::env;

/// Configuration for progress tracking across the batch jobs
#[derive(Debug, Clone)]
pub struct ProgressConfig {
    /// Whether to show progress bars at all
    pub enabled: bool,
    /// Whether to show per-job sub-progress bars
    pub detailed: bool,
    /// Whether to show memory usage in progress messages
    pub show_memory: bool,
    /// Whether to show database connection pool statistics
    pub show_db_connection_stats: bool,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            detailed: true,
            show_memory: true,
            show_db_connection_stats: true,
        }
    }
}

impl ProgressConfig {
    pub fn from_env() -> Self {
        Self {
            enabled: env::var("PROGRESS_ENABLED")
                .unwrap_or_else(|_| "true".to_string())
                .parse()
                .unwrap_or(true),
            detailed: env::var("PROGRESS_DETAILED")
                .unwrap_or_else(|_| "true".to_string())
                .parse()
                .unwrap_or(true),
            show_memory: env::var("PROGRESS_SHOW_MEMORY")
                .unwrap_or_else(|_| "true".to_string())
                .parse()
                .unwrap_or(true),
            show_db_connection_stats: env::var("PROGRESS_SHOW_DB_CONNECTIONS")
                .unwrap_or_else(|_| "true".to_string())
                .parse()
                .unwrap_or(true),
        }
    }

    /// Create a MultiProgress instance if progress is enabled, None otherwise
    pub fn create_multi_progress(&self) -> Option<MultiProgress> {
        if self.enabled {
            Some(MultiProgress::new())
        } else {
            None
        }
    }

    pub fn should_show_detailed(&self) -> bool {
        self.enabled && self.detailed
    }

    pub fn should_show_memory(&self) -> bool {
        self.enabled && self.show_memory
    }

    pub fn should_show_db_connection_stats(&self) -> bool {
        self.enabled && self.show_db_connection_stats
    }
}

/// Adds a per-item bar for a job of `len` parcels to `multi_progress`.
pub fn job_progress_bar(
    multi_progress: Option<&MultiProgress>,
    len: u64,
    prefix: &'static str,
) -> Option<ProgressBar> {
    multi_progress.map(|mp| {
        let pb = mp.add(ProgressBar::new(len));
        pb.set_style(
            ProgressStyle::default_bar()
                .template("  {prefix} [{elapsed_precise}] {bar:30.green/white} {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("█▉▊▋▌▍▎▏  "),
        );
        pb.set_prefix(prefix);
        pb
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    #[test]
    fn test_default_config() {
        let config = ProgressConfig::default();
        assert!(config.enabled);
        assert!(config.detailed);
        assert!(config.show_memory);
        assert!(config.show_db_connection_stats);
    }

    #[test]
    fn test_env_config() {
        env::set_var("PROGRESS_ENABLED", "false");
        env::set_var("PROGRESS_DETAILED", "false");
        env::set_var("PROGRESS_SHOW_MEMORY", "false");
        env::set_var("PROGRESS_SHOW_DB_CONNECTIONS", "false");

        let config = ProgressConfig::from_env();
        assert!(!config.enabled);
        assert!(!config.detailed);
        assert!(!config.show_memory);
        assert!(!config.show_db_connection_stats);

        env::remove_var("PROGRESS_ENABLED");
        env::remove_var("PROGRESS_DETAILED");
        env::remove_var("PROGRESS_SHOW_MEMORY");
        env::remove_var("PROGRESS_SHOW_DB_CONNECTIONS");
    }

    #[test]
    fn test_multi_progress_creation() {
        let mut config = ProgressConfig::default();

        config.enabled = true;
        assert!(config.create_multi_progress().is_some());

        config.enabled = false;
        assert!(config.create_multi_progress().is_none());
        assert!(job_progress_bar(None, 10, "resolve").is_none());
    }

    #[test]
    fn test_should_show_methods() {
        let mut config = ProgressConfig::default();

        assert!(config.should_show_detailed());
        assert!(config.should_show_memory());
        assert!(config.should_show_db_connection_stats());

        config.enabled = false;
        assert!(!config.should_show_detailed());
        assert!(!config.should_show_memory());
        assert!(!config.should_show_db_connection_stats());

        config.enabled = true;
        config.detailed = false;
        config.show_memory = false;
        assert!(!config.should_show_detailed());
        assert!(!config.should_show_memory());
        assert!(config.should_show_db_connection_stats());
    }
}
