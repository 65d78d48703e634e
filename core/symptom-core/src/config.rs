//! Configuration loading.
//!
//! `config.toml` lives next to the database. Every section is optional; a
//! missing file yields the defaults.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::{Result, TrackerError};
use crate::storage::StorageConfig;
use crate::tracker::DEFAULT_DISPLAY_LIMIT;

pub const DEFAULT_RECENT_DAYS: u32 = 30;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TrackerConfig {
    #[serde(default)]
    pub storage: StorageSection,
    #[serde(default)]
    pub history: HistorySection,
    /// Replaces the built-in intervention seed list when present.
    #[serde(default)]
    pub interventions: Option<Vec<InterventionSeed>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StorageSection {
    #[serde(default)]
    pub db_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HistorySection {
    #[serde(default = "default_display_limit")]
    pub display_limit: usize,
    #[serde(default = "default_recent_days")]
    pub recent_days: u32,
}

impl Default for HistorySection {
    fn default() -> Self {
        Self {
            display_limit: DEFAULT_DISPLAY_LIMIT,
            recent_days: DEFAULT_RECENT_DAYS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct InterventionSeed {
    pub name: String,
    pub unit: String,
    pub max: f64,
}

fn default_display_limit() -> usize {
    DEFAULT_DISPLAY_LIMIT
}

fn default_recent_days() -> u32 {
    DEFAULT_RECENT_DAYS
}

impl TrackerConfig {
    /// Database location: the configured override or the storage default.
    pub fn db_path(&self, storage: &StorageConfig) -> PathBuf {
        self.storage
            .db_path
            .clone()
            .unwrap_or_else(|| storage.db_file())
    }
}

/// Loads the config from `path`, or from the storage default when `None`.
pub fn load_config(path: Option<&Path>, storage: &StorageConfig) -> Result<TrackerConfig> {
    let config_path = match path {
        Some(path) => path.to_path_buf(),
        None => storage.config_file(),
    };

    if !config_path.exists() {
        return Ok(TrackerConfig::default());
    }

    let content = fs_err::read_to_string(&config_path).map_err(|source| TrackerError::Io {
        context: format!("reading config {}", config_path.display()),
        source,
    })?;
    toml::from_str::<TrackerConfig>(&content).map_err(|err| TrackerError::ConfigMalformed {
        path: config_path,
        details: err.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_config_defaults_when_file_missing() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let storage = StorageConfig::with_root(temp_dir.path().to_path_buf());
        let config = load_config(None, &storage).expect("load config");

        assert_eq!(config.history.display_limit, DEFAULT_DISPLAY_LIMIT);
        assert_eq!(config.history.recent_days, DEFAULT_RECENT_DAYS);
        assert!(config.interventions.is_none());
        assert_eq!(config.db_path(&storage), storage.db_file());
    }

    #[test]
    fn load_config_parses_all_sections() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let storage = StorageConfig::with_root(temp_dir.path().to_path_buf());
        fs_err::write(
            storage.config_file(),
            r#"
[storage]
db_path = "/data/headaches.db"

[history]
display_limit = 50

[[interventions]]
name = "Ginger tea"
unit = "cups"
max = 4

[[interventions]]
name = "Ibuprofen"
unit = "pills"
max = 3
"#,
        )
        .expect("write config");

        let config = load_config(None, &storage).expect("load config");
        assert_eq!(config.db_path(&storage), PathBuf::from("/data/headaches.db"));
        assert_eq!(config.history.display_limit, 50);
        assert_eq!(config.history.recent_days, DEFAULT_RECENT_DAYS);

        let seeds = config.interventions.expect("seeds");
        assert_eq!(seeds.len(), 2);
        assert_eq!(seeds[0].name, "Ginger tea");
        assert_eq!(seeds[1].max, 3.0);
    }

    #[test]
    fn load_config_reports_malformed_toml() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let path = temp_dir.path().join("broken.toml");
        fs_err::write(&path, "[history\ndisplay_limit = ").expect("write config");
        let storage = StorageConfig::with_root(temp_dir.path().to_path_buf());

        let err = load_config(Some(&path), &storage).expect_err("malformed config");
        assert!(matches!(err, TrackerError::ConfigMalformed { .. }));
    }
}
