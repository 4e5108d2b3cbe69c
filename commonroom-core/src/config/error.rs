//! Errors raised while loading or saving a commonroom config

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot write config file {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed config file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("cannot serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// A `COMMONROOM_*` variable held a value of the wrong type
    #[error("environment variable {key}={value:?} is invalid: {reason}")]
    InvalidEnv {
        key: String,
        value: String,
        reason: String,
    },

    /// A loaded setting is outside its allowed range
    #[error("invalid setting {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl ConfigError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid { field, reason: reason.into() }
    }
}
