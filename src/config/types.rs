//! Core configuration types and loading.

use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

use super::antispam::{AntispamConfig, MaintenanceConfig};

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Top-level configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Config {
    /// Thresholds, windows, and flood heuristics.
    #[serde(default)]
    pub antispam: AntispamConfig,
    /// Purge cadence and pending-notification lifetime.
    #[serde(default)]
    pub maintenance: MaintenanceConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML text.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::antispam::Category;
    use std::io::Write;

    const SAMPLE: &str = r#"
        [antispam]
        global_enabled = true
        newline_threshold = 25
        collision_sounds = ["4c8c3c77-de8d-bde2-b9b8-32635e0fd4a6"]

        [antispam.global]
        threshold = 50
        window_secs = 5

        [antispam.default]
        threshold = 8

        [antispam.categories.teleport]
        threshold = 2
        window_secs = 30

        [maintenance]
        purge_interval_secs = 120
    "#;

    #[test]
    fn empty_file_uses_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn parses_sample() {
        let config = Config::parse(SAMPLE).unwrap();
        let antispam = &config.antispam;
        assert!(antispam.global_enabled);
        assert_eq!(antispam.global.threshold, 50);
        assert_eq!(antispam.global.window_secs, 5);
        assert_eq!(antispam.default.threshold, 8);
        assert_eq!(antispam.default.window_secs, 1);
        assert_eq!(antispam.newline_threshold, 25);
        assert_eq!(antispam.collision_sounds.len(), 1);

        let teleport = antispam.limits_for(Category::Teleport);
        assert_eq!((teleport.threshold, teleport.window_secs), (2, 30));
        assert_eq!(antispam.limits_for(Category::Chat).threshold, 8);

        assert_eq!(config.maintenance.purge_interval_secs, 120);
        assert_eq!(config.maintenance.pending_ttl_secs, 60);
    }

    #[test]
    fn bad_uuid_is_a_parse_error() {
        let err = Config::parse("[antispam]\ncollision_sounds = [\"nope\"]").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn load_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        let config = Config::load(file.path()).unwrap();
        assert!(config.antispam.global_enabled);
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let err = Config::load("/nonexistent/spamgate.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
