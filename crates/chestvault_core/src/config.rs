//! Loader configuration.
//!
//! # Responsibility
//! - Describe tunables the embedding host may override (TOML).
//! - Validate values before any component is built from them.
//!
//! # Invariants
//! - Every field has a default; an empty document is a valid config.
//! - Unknown keys are rejected instead of silently ignored.

use crate::codec::{DEFAULT_ITEMS_TAG, DEFAULT_PUBLIC_KEY_NAME};
use crate::logging::default_log_level;
use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

const DEFAULT_BACKGROUND_WORKERS: usize = 2;

/// Tunables for the load pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoaderConfig {
    /// Reserved key of the shared container; always case-correct.
    pub public_key_name: String,
    /// Name of the items list tag inside stored records.
    pub items_tag_name: String,
    /// Import adapter ids, highest priority first.
    pub import_priority: Vec<String>,
    /// Worker threads for `ThreadedScheduler`; must be at least one.
    pub background_workers: usize,
    /// Log level passed to `init_logging`.
    pub log_level: String,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            public_key_name: DEFAULT_PUBLIC_KEY_NAME.to_string(),
            items_tag_name: DEFAULT_ITEMS_TAG.to_string(),
            import_priority: Vec::new(),
            background_workers: DEFAULT_BACKGROUND_WORKERS,
            log_level: default_log_level().to_string(),
        }
    }
}

impl LoaderConfig {
    /// Parses and validates a TOML document.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&source)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.public_key_name.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "public_key_name cannot be empty".to_string(),
            ));
        }
        if self.items_tag_name.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "items_tag_name cannot be empty".to_string(),
            ));
        }
        if self.background_workers == 0 {
            return Err(ConfigError::Invalid(
                "background_workers must be at least 1".to_string(),
            ));
        }
        if let Some(blank) = self.import_priority.iter().find(|id| id.trim().is_empty()) {
            return Err(ConfigError::Invalid(format!(
                "import_priority contains a blank adapter id `{blank}`"
            )));
        }
        Ok(())
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse(toml::de::Error),
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read config `{}`: {source}", path.display())
            }
            Self::Parse(err) => write!(f, "invalid config document: {err}"),
            Self::Invalid(message) => write!(f, "invalid config value: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
            Self::Invalid(_) => None,
        }
    }
}
