//! Resolution thresholds
//!
//! Values come from an optional TOML file, then environment overrides.
//! A pass reads one immutable snapshot; callers refresh between passes.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

use crate::{
    DEFAULT_FUZZY_MATCH_THRESHOLD, DEFAULT_SOURCE_CANDIDATE_THRESHOLD,
    DEFAULT_TRUSTED_SOURCE_GROUPS_THRESHOLD, DEFAULT_TRUSTED_SOURCE_OCCURRENCES_THRESHOLD,
    MAX_SIMILARITY,
};

/// Environment variable overriding the fuzzy match threshold
pub const ENV_FUZZY_MATCH_THRESHOLD: &str = "FUZZY_MATCH_THRESHOLD";
/// Environment variable overriding the source candidate threshold
pub const ENV_SOURCE_CANDIDATE_THRESHOLD: &str = "SOURCE_CANDIDATE_THRESHOLD";
/// Environment variable overriding the trusted source occurrences threshold
pub const ENV_TRUSTED_SOURCE_ORIGINS_THRESHOLD: &str = "TRUSTED_SOURCE_ORIGINS_THRESHOLD";
/// Environment variable overriding the trusted source groups threshold
pub const ENV_TRUSTED_SOURCE_GROUPS_THRESHOLD: &str = "TRUSTED_SOURCE_GROUPS_THRESHOLD";

/// Errors from loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {key}: {value:?}")]
    InvalidOverride { key: String, value: String },

    #[error("{field} must be at most {max}, got {value}")]
    OutOfRange { field: &'static str, value: u32, max: u32 },
}

/// Thresholds driving matching and promotion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolutionConfig {
    /// Minimum token-set similarity (0-100) for a suggested match
    pub fuzzy_match_threshold: u8,
    /// Occurrences needed to become a source candidate
    pub source_candidate_threshold: u32,
    /// Occurrences needed before distinct groups are counted
    pub trusted_source_occurrences_threshold: u32,
    /// Distinct reporting groups needed to become trusted
    pub trusted_source_groups_threshold: u32,
}

impl Default for ResolutionConfig {
    fn default() -> Self {
        Self {
            fuzzy_match_threshold: DEFAULT_FUZZY_MATCH_THRESHOLD,
            source_candidate_threshold: DEFAULT_SOURCE_CANDIDATE_THRESHOLD,
            trusted_source_occurrences_threshold: DEFAULT_TRUSTED_SOURCE_OCCURRENCES_THRESHOLD,
            trusted_source_groups_threshold: DEFAULT_TRUSTED_SOURCE_GROUPS_THRESHOLD,
        }
    }
}

impl ResolutionConfig {
    /// Parse from TOML; missing keys keep their defaults
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from an optional file, then apply environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => {
                let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })?;
                Self::from_toml_str(&content)?
            }
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply overrides from a key lookup (the environment, in production)
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENV_FUZZY_MATCH_THRESHOLD) {
            let parsed = parse_override(ENV_FUZZY_MATCH_THRESHOLD, &value)?;
            if parsed > u32::from(MAX_SIMILARITY) {
                return Err(ConfigError::OutOfRange {
                    field: "fuzzy_match_threshold",
                    value: parsed,
                    max: u32::from(MAX_SIMILARITY),
                });
            }
            info!(
                "Overriding fuzzy_match_threshold: {} -> {}",
                self.fuzzy_match_threshold, parsed
            );
            self.fuzzy_match_threshold = parsed as u8;
        }

        let overrides = [
            (
                ENV_SOURCE_CANDIDATE_THRESHOLD,
                "source_candidate_threshold",
                &mut self.source_candidate_threshold,
            ),
            (
                ENV_TRUSTED_SOURCE_ORIGINS_THRESHOLD,
                "trusted_source_occurrences_threshold",
                &mut self.trusted_source_occurrences_threshold,
            ),
            (
                ENV_TRUSTED_SOURCE_GROUPS_THRESHOLD,
                "trusted_source_groups_threshold",
                &mut self.trusted_source_groups_threshold,
            ),
        ];

        for (key, field, slot) in overrides {
            if let Some(value) = lookup(key) {
                let parsed = parse_override(key, &value)?;
                info!("Overriding {}: {} -> {}", field, *slot, parsed);
                *slot = parsed;
            }
        }

        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fuzzy_match_threshold > MAX_SIMILARITY {
            return Err(ConfigError::OutOfRange {
                field: "fuzzy_match_threshold",
                value: u32::from(self.fuzzy_match_threshold),
                max: u32::from(MAX_SIMILARITY),
            });
        }
        Ok(())
    }
}

fn parse_override(key: &str, value: &str) -> Result<u32, ConfigError> {
    value
        .trim()
        .parse::<u32>()
        .map_err(|_| ConfigError::InvalidOverride {
            key: key.to_string(),
            value: value.to_string(),
        })
}

/// Where configuration is read from, so it can be re-read between passes
#[derive(Debug, Clone, Default)]
pub struct ConfigSource {
    path: Option<PathBuf>,
}

impl ConfigSource {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Read a fresh snapshot
    pub fn load(&self) -> Result<ResolutionConfig, ConfigError> {
        ResolutionConfig::load(self.path())
    }
}
