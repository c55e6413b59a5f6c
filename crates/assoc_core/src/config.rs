//! Process configuration from environment variables.
//!
//! | Variable            | Default               | Meaning                         |
//! |---------------------|-----------------------|---------------------------------|
//! | `ASSOC_DB_PATH`     | unset -> in-memory    | SQLite database file            |
//! | `ASSOC_LOG_LEVEL`   | by build mode         | `trace|debug|info|warn|error`   |
//! | `ASSOC_LOG_DIR`     | unset -> no file logs | absolute rolling-log directory  |
//! | `ASSOC_FORCE_RESET` | `false`               | drop and recreate entity tables |

use crate::db::{open_db, open_db_in_memory, DbResult, InstallMode};
use crate::logging::{default_log_level, init_logging, normalize_level};
use log::info;
use rusqlite::Connection;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub const ENV_DB_PATH: &str = "ASSOC_DB_PATH";
pub const ENV_LOG_LEVEL: &str = "ASSOC_LOG_LEVEL";
pub const ENV_LOG_DIR: &str = "ASSOC_LOG_DIR";
pub const ENV_FORCE_RESET: &str = "ASSOC_FORCE_RESET";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DbLocation {
    Memory,
    File(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreConfig {
    pub db: DbLocation,
    pub log_level: &'static str,
    pub log_dir: Option<PathBuf>,
    pub install_mode: InstallMode,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            db: DbLocation::Memory,
            log_level: default_log_level(),
            log_dir: None,
            install_mode: InstallMode::Create,
        }
    }
}

impl CoreConfig {
    /// Reads configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads configuration through `lookup`; blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let read = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let mut config = Self::default();

        if let Some(path) = read(ENV_DB_PATH) {
            config.db = DbLocation::File(PathBuf::from(path));
        }

        if let Some(level) = read(ENV_LOG_LEVEL) {
            config.log_level = normalize_level(&level).map_err(|reason| ConfigError::InvalidValue {
                key: ENV_LOG_LEVEL,
                value: level.clone(),
                reason,
            })?;
        }

        if let Some(dir) = read(ENV_LOG_DIR) {
            let path = PathBuf::from(&dir);
            if !path.is_absolute() {
                return Err(ConfigError::InvalidValue {
                    key: ENV_LOG_DIR,
                    value: dir,
                    reason: "must be an absolute path".to_string(),
                });
            }
            config.log_dir = Some(path);
        }

        if let Some(flag) = read(ENV_FORCE_RESET) {
            if parse_flag(&flag).ok_or_else(|| ConfigError::InvalidValue {
                key: ENV_FORCE_RESET,
                value: flag.clone(),
                reason: "expected true|false".to_string(),
            })? {
                config.install_mode = InstallMode::ForceReset;
            }
        }

        Ok(config)
    }

    /// Starts file logging when a log directory is configured.
    pub fn init_logging(&self) -> Result<bool, String> {
        let Some(dir) = self.log_dir.as_ref() else {
            return Ok(false);
        };
        let dir = dir
            .to_str()
            .ok_or_else(|| format!("log_dir is not valid UTF-8: {}", dir.display()))?;
        init_logging(self.log_level, dir)?;
        Ok(true)
    }

    /// Opens the configured database with migrations applied.
    pub fn open_db(&self) -> DbResult<Connection> {
        info!(
            "event=config_open_db module=config status=start location={}",
            match &self.db {
                DbLocation::Memory => "memory".to_string(),
                DbLocation::File(path) => path.display().to_string(),
            }
        );
        match &self.db {
            DbLocation::Memory => open_db_in_memory(),
            DbLocation::File(path) => open_db(path),
        }
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidValue { key, value, reason } => {
                write!(f, "invalid {key} value `{value}`: {reason}")
            }
        }
    }
}

impl Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let values: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        move |key| values.get(key).cloned()
    }

    #[test]
    fn empty_environment_uses_defaults() {
        let config = CoreConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, CoreConfig::default());
        assert_eq!(config.db, DbLocation::Memory);
    }

    #[test]
    fn reads_all_variables() {
        let config = CoreConfig::from_lookup(lookup(&[
            (ENV_DB_PATH, "/tmp/assoc.sqlite3"),
            (ENV_LOG_LEVEL, "WARNING"),
            (ENV_LOG_DIR, "/tmp/assoc-logs"),
            (ENV_FORCE_RESET, "yes"),
        ]))
        .unwrap();
        assert_eq!(
            config.db,
            DbLocation::File(PathBuf::from("/tmp/assoc.sqlite3"))
        );
        assert_eq!(config.log_level, "warn");
        assert_eq!(config.log_dir, Some(PathBuf::from("/tmp/assoc-logs")));
        assert_eq!(config.install_mode, InstallMode::ForceReset);
    }

    #[test]
    fn blank_values_count_as_unset() {
        let config = CoreConfig::from_lookup(lookup(&[(ENV_DB_PATH, "  ")])).unwrap();
        assert_eq!(config.db, DbLocation::Memory);
    }

    #[test]
    fn rejects_invalid_values() {
        let level = CoreConfig::from_lookup(lookup(&[(ENV_LOG_LEVEL, "loud")])).unwrap_err();
        assert!(matches!(level, ConfigError::InvalidValue { key, .. } if key == ENV_LOG_LEVEL));

        let dir = CoreConfig::from_lookup(lookup(&[(ENV_LOG_DIR, "logs")])).unwrap_err();
        assert!(matches!(dir, ConfigError::InvalidValue { key, .. } if key == ENV_LOG_DIR));

        let flag = CoreConfig::from_lookup(lookup(&[(ENV_FORCE_RESET, "maybe")])).unwrap_err();
        assert!(matches!(flag, ConfigError::InvalidValue { key, .. } if key == ENV_FORCE_RESET));
    }

    #[test]
    fn in_memory_config_opens_migrated_database() {
        let conn = CoreConfig::default().open_db().unwrap();
        let version: u32 = conn
            .query_row("PRAGMA user_version;", [], |row| row.get(0))
            .unwrap();
        assert_eq!(version, crate::db::migrations::latest_version());
    }
}
