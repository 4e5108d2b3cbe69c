//! Configuration management for commonroom
//!
//! Settings come from a TOML file or from `COMMONROOM_<SECTION>_<KEY>`
//! environment variables layered over the defaults. Every loader validates
//! before returning.

use crate::logging::LogLevel;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

mod error;

pub use error::ConfigError;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    /// Defaults and limits applied to groups by the rule engine
    #[serde(default)]
    pub groups: GroupDefaults,
}

/// SQLite storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Path of the SQLite database file
    pub database_path: PathBuf,

    /// Maximum pooled connections
    pub pool_size: u32,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Emit JSON records instead of human-readable lines
    pub json_format: bool,

    /// Include the target module in each record
    pub with_target: bool,
}

/// Group defaults and field limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupDefaults {
    /// Capacity given to a group created without an explicit max_size
    pub default_max_size: i64,

    /// Maximum name length, in characters
    pub max_name_length: usize,

    /// Maximum description length, in characters
    pub max_description_length: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("./commonroom.db"),
            pool_size: 8,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
            with_target: true,
        }
    }
}

impl Default for GroupDefaults {
    fn default() -> Self {
        Self {
            default_max_size: 300,
            max_name_length: 250,
            max_description_length: 250,
        }
    }
}

fn parse_env<T>(key: &str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => match raw.parse() {
            Ok(value) => Ok(Some(value)),
            Err(e) => Err(ConfigError::InvalidEnv {
                key: key.to_string(),
                reason: e.to_string(),
                value: raw,
            }),
        },
        Err(_) => Ok(None),
    }
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// Example: `COMMONROOM_GROUPS_DEFAULT_MAX_SIZE=50`
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(path) = parse_env::<PathBuf>("COMMONROOM_STORE_DATABASE_PATH")? {
            config.store.database_path = path;
        }
        if let Some(size) = parse_env("COMMONROOM_STORE_POOL_SIZE")? {
            config.store.pool_size = size;
        }

        if let Some(level) = parse_env("COMMONROOM_LOG_LEVEL")? {
            config.logging.level = level;
        }
        if let Some(json) = parse_env("COMMONROOM_LOG_JSON")? {
            config.logging.json_format = json;
        }

        if let Some(max_size) = parse_env("COMMONROOM_GROUPS_DEFAULT_MAX_SIZE")? {
            config.groups.default_max_size = max_size;
        }
        if let Some(len) = parse_env("COMMONROOM_GROUPS_MAX_NAME_LENGTH")? {
            config.groups.max_name_length = len;
        }
        if let Some(len) = parse_env("COMMONROOM_GROUPS_MAX_DESCRIPTION_LENGTH")? {
            config.groups.max_description_length = len;
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;

        let config: Self = toml::from_str(&contents)
            .map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.store.pool_size == 0 {
            return Err(ConfigError::invalid("store.pool_size", "must be greater than 0"));
        }
        if self.groups.default_max_size < 0 {
            return Err(ConfigError::invalid("groups.default_max_size", "must not be negative"));
        }
        if self.groups.max_name_length == 0 {
            return Err(ConfigError::invalid("groups.max_name_length", "must be greater than 0"));
        }
        if LogLevel::parse(&self.logging.level).is_none() {
            return Err(ConfigError::invalid(
                "logging.level",
                format!("unknown level '{}'", self.logging.level),
            ));
        }

        Ok(())
    }

    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents)
            .map_err(|source| ConfigError::Write { path: path.to_path_buf(), source })?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.groups.default_max_size, 300);
        assert_eq!(config.groups.max_name_length, 250);
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        config.store.pool_size = 0;
        assert!(config.validate().is_err());

        config = Config::default();
        config.groups.default_max_size = -1;
        assert!(config.validate().is_err());

        config = Config::default();
        config.logging.level = "invalid".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "logging.level", .. })
        ));
    }

    #[test]
    fn test_log_level_accepts_what_logging_accepts() {
        for level in ["WARN", "warning", "Debug"] {
            let mut config = Config::default();
            config.logging.level = level.to_string();
            assert!(config.validate().is_ok(), "level {} rejected", level);
            assert!(crate::logging::LogConfig::try_from(&config.logging).is_ok());
        }
    }

    #[test]
    fn test_bad_env_value_names_the_key() {
        env::set_var("COMMONROOM_TEST_BAD_POOL_SIZE", "lots");

        match parse_env::<u32>("COMMONROOM_TEST_BAD_POOL_SIZE") {
            Err(ConfigError::InvalidEnv { key, value, .. }) => {
                assert_eq!(key, "COMMONROOM_TEST_BAD_POOL_SIZE");
                assert_eq!(value, "lots");
            }
            other => panic!("expected env error, got {:?}", other),
        }
        assert!(parse_env::<u32>("COMMONROOM_TEST_UNSET_KEY").unwrap().is_none());
    }

    #[test]
    fn test_missing_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");

        match Config::from_file(&path) {
            Err(ConfigError::Read { path: reported, .. }) => assert_eq!(reported, path),
            other => panic!("expected read error, got {:?}", other),
        }
    }

    #[test]
    fn test_malformed_file_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        std::fs::write(&path, "[store\npool_size = ").unwrap();

        assert!(matches!(Config::from_file(&path), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_toml_parse_with_partial_sections() {
        let toml_str = r#"
            [store]
            database_path = "/var/lib/commonroom/groups.db"
            pool_size = 4

            [groups]
            default_max_size = 25
            max_name_length = 100
            max_description_length = 500
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(
            config.store.database_path,
            PathBuf::from("/var/lib/commonroom/groups.db")
        );
        assert_eq!(config.groups.default_max_size, 25);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("commonroom.toml");

        let mut config = Config::default();
        config.groups.default_max_size = 12;
        config.save_to_file(&path).unwrap();

        let loaded = Config::from_file(&path).unwrap();
        assert_eq!(loaded.groups.default_max_size, 12);
    }
}
