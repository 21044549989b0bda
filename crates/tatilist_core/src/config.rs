//! Runtime configuration for hosts embedding the core.
//!
//! Values come from environment variables, falling back to build-mode
//! defaults under the system temp directory.

use crate::logging::default_log_level;
use std::path::PathBuf;

/// Log level override (`trace|debug|info|warn|error`).
pub const ENV_LOG_LEVEL: &str = "TATILIST_LOG_LEVEL";
/// Absolute directory for rolling log files.
pub const ENV_LOG_DIR: &str = "TATILIST_LOG_DIR";
/// Path of the preferences SQLite file.
pub const ENV_PREFS_DB: &str = "TATILIST_PREFS_DB";

const DEFAULT_LOG_DIR_NAME: &str = "tatilist-logs";
const DEFAULT_PREFS_DB_FILE_NAME: &str = "tatilist_prefs.sqlite3";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreConfig {
    pub log_level: String,
    pub log_dir: PathBuf,
    pub prefs_db_path: PathBuf,
}

impl Default for CoreConfig {
    fn default() -> Self {
        let temp_dir = std::env::temp_dir();
        Self {
            log_level: default_log_level().to_string(),
            log_dir: temp_dir.join(DEFAULT_LOG_DIR_NAME),
            prefs_db_path: temp_dir.join(DEFAULT_PREFS_DB_FILE_NAME),
        }
    }
}

impl CoreConfig {
    /// Resolves configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Resolves configuration from an arbitrary variable lookup.
    ///
    /// Blank values are treated as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let read = |name: &str| {
            lookup(name)
                .map(|raw| raw.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let defaults = Self::default();

        Self {
            log_level: read(ENV_LOG_LEVEL).unwrap_or(defaults.log_level),
            log_dir: read(ENV_LOG_DIR)
                .map(PathBuf::from)
                .unwrap_or(defaults.log_dir),
            prefs_db_path: read(ENV_PREFS_DB)
                .map(PathBuf::from)
                .unwrap_or(defaults.prefs_db_path),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{CoreConfig, ENV_LOG_LEVEL, ENV_PREFS_DB};
    use std::path::PathBuf;

    #[test]
    fn lookup_overrides_defaults() {
        let config = CoreConfig::from_lookup(|name| match name {
            ENV_LOG_LEVEL => Some("warn".to_string()),
            ENV_PREFS_DB => Some(" /data/prefs.db ".to_string()),
            _ => None,
        });

        assert_eq!(config.log_level, "warn");
        assert_eq!(config.prefs_db_path, PathBuf::from("/data/prefs.db"));
        assert_eq!(config.log_dir, CoreConfig::default().log_dir);
    }

    #[test]
    fn blank_values_fall_back_to_defaults() {
        let config = CoreConfig::from_lookup(|_| Some("   ".to_string()));
        assert_eq!(config, CoreConfig::default());
    }
}
