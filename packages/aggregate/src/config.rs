//! Pipeline configuration loaded from TOML.
//!
//! The San Francisco layout is baked into the binary at compile time via
//! [`include_str!`]; `--config` points at a replacement file for other
//! exports.

use std::path::Path;

use crime_olap_incident_models::ColumnLayout;
use serde::Deserialize;

use crate::dates::{DEFAULT_INPUT_FORMAT, DateParser};

/// Embedded default configuration.
pub const DEFAULT_CONFIG_TOML: &str = include_str!("../config/sf_crime.toml");

/// Errors loading a configuration file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("cannot read config {path}: {source}")]
    Io {
        /// Path that failed.
        path: String,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The TOML is malformed or has wrong types.
    #[error("invalid config: {0}")]
    Toml(#[from] toml::de::Error),

    /// A value is out of range.
    #[error("invalid config: {message}")]
    Invalid {
        /// What is wrong.
        message: String,
    },
}

/// Everything the jobs need to know about the input and how to run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Column positions in each incident row.
    pub columns: ColumnLayout,
    /// Date handling.
    pub dates: DateSettings,
    /// Execution settings.
    pub jobs: JobSettings,
}

/// `[dates]` section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DateSettings {
    /// `chrono` format of the date column.
    pub input_format: String,
}

impl Default for DateSettings {
    fn default() -> Self {
        Self {
            input_format: DEFAULT_INPUT_FORMAT.to_string(),
        }
    }
}

/// `[jobs]` section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct JobSettings {
    /// Number of reduce partitions (and `part-NNNNN` files) per job.
    pub reducers: usize,
}

impl Default for JobSettings {
    fn default() -> Self {
        Self { reducers: 1 }
    }
}

impl PipelineConfig {
    /// Date parser for the configured input format.
    #[must_use]
    pub fn date_parser(&self) -> DateParser {
        DateParser::new(self.dates.input_format.clone())
    }

    fn validate(self) -> Result<Self, ConfigError> {
        if self.jobs.reducers == 0 {
            return Err(ConfigError::Invalid {
                message: "jobs.reducers must be at least 1".to_string(),
            });
        }
        if self.dates.input_format.trim().is_empty() {
            return Err(ConfigError::Invalid {
                message: "dates.input_format must not be empty".to_string(),
            });
        }
        Ok(self)
    }
}

/// Parses a configuration from TOML text.
///
/// # Errors
///
/// Returns [`ConfigError`] if the TOML is malformed or a value is out of
/// range.
pub fn parse_config(toml_str: &str) -> Result<PipelineConfig, ConfigError> {
    toml::from_str::<PipelineConfig>(toml_str)?.validate()
}

/// Loads the configuration at `path`, or the embedded default when `None`.
///
/// # Errors
///
/// Returns [`ConfigError`] if the file cannot be read or parsed.
pub fn load_config(path: Option<&Path>) -> Result<PipelineConfig, ConfigError> {
    let Some(path) = path else {
        return parse_config(DEFAULT_CONFIG_TOML);
    };

    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    log::info!("Loaded pipeline config from {}", path.display());
    parse_config(&text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_config_is_san_francisco() {
        let config = load_config(None).unwrap();
        assert_eq!(config.columns, ColumnLayout::SAN_FRANCISCO);
        assert_eq!(config.dates.input_format, "%m/%d/%Y");
        assert_eq!(config.jobs.reducers, 1);
    }

    #[test]
    fn missing_sections_use_defaults() {
        let config = parse_config("[jobs]\nreducers = 4\n").unwrap();
        assert_eq!(config.columns, ColumnLayout::default());
        assert_eq!(config.jobs.reducers, 4);
    }

    #[test]
    fn partial_columns_keep_other_defaults() {
        let config = parse_config("[columns]\ndistrict = 9\n").unwrap();
        assert_eq!(config.columns.district, 9);
        assert_eq!(config.columns.category, 1);
        assert_eq!(config.columns.min_fields(), 10);
    }

    #[test]
    fn zero_reducers_is_invalid() {
        assert!(matches!(
            parse_config("[jobs]\nreducers = 0\n"),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn wrong_type_is_rejected() {
        assert!(matches!(
            parse_config("[columns]\ndate = \"four\"\n"),
            Err(ConfigError::Toml(_))
        ));
    }

    #[test]
    fn reads_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("oakland.toml");
        std::fs::write(&path, "[dates]\ninput_format = \"%Y-%m-%d\"\n").unwrap();
        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.dates.input_format, "%Y-%m-%d");
        assert!(matches!(
            load_config(Some(&dir.path().join("missing.toml"))),
            Err(ConfigError::Io { .. })
        ));
    }
}
