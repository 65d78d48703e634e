//! Storage configuration and path management.
//!
//! All on-disk locations (database, config file, logs) are resolved from a
//! single root so tests can point everything at a temp directory.

use std::path::{Path, PathBuf};

use crate::error::{Result, TrackerError};

const ROOT_DIR_NAME: &str = ".symptom-tracker";

/// Central configuration for all symptom-tracker storage paths.
///
/// Production code uses `StorageConfig::from_home()` which points to
/// `~/.symptom-tracker/`. Tests use `StorageConfig::with_root(temp_dir)`.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    root: PathBuf,
}

impl StorageConfig {
    /// Resolves the default root under the user's home directory.
    pub fn from_home() -> Result<Self> {
        let home = dirs::home_dir().ok_or(TrackerError::HomeDirNotFound)?;
        Ok(Self {
            root: home.join(ROOT_DIR_NAME),
        })
    }

    /// Creates a StorageConfig with a custom root directory.
    pub fn with_root(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path to the SQLite session database.
    pub fn db_file(&self) -> PathBuf {
        self.root.join("tracker.db")
    }

    /// Path to config.toml.
    pub fn config_file(&self) -> PathBuf {
        self.root.join("config.toml")
    }

    /// Directory for rolling log files.
    pub fn logs_dir(&self) -> PathBuf {
        self.root.join("logs")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_hang_off_root() {
        let storage = StorageConfig::with_root(PathBuf::from("/tmp/symptoms"));
        assert_eq!(storage.db_file(), PathBuf::from("/tmp/symptoms/tracker.db"));
        assert_eq!(
            storage.config_file(),
            PathBuf::from("/tmp/symptoms/config.toml")
        );
        assert_eq!(storage.logs_dir(), PathBuf::from("/tmp/symptoms/logs"));
    }
}
