//! Runtime configuration: compiled defaults overridable from environment
//! variables.

use std::path::PathBuf;

pub const DEFAULT_DATABASE: &str = "ipam.db";

/// Usage rate at or above which a subnet is classified High
pub const HIGH_USAGE_THRESHOLD: f64 = 80.0;

/// Usage rate at or above which a subnet is classified MediumHigh
pub const MEDIUM_USAGE_THRESHOLD: f64 = 60.0;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_path: PathBuf,
    pub high_usage_threshold: f64,
    pub medium_usage_threshold: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from(DEFAULT_DATABASE),
            high_usage_threshold: HIGH_USAGE_THRESHOLD,
            medium_usage_threshold: MEDIUM_USAGE_THRESHOLD,
        }
    }
}

impl Config {
    /// Defaults with `WARDEN_DB`, `WARDEN_HIGH_USAGE_THRESHOLD` and
    /// `WARDEN_MEDIUM_USAGE_THRESHOLD` overrides applied. Unparseable
    /// threshold values are ignored.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(path) = std::env::var("WARDEN_DB") {
            if !path.trim().is_empty() {
                config.database_path = PathBuf::from(path);
            }
        }
        if let Ok(raw) = std::env::var("WARDEN_HIGH_USAGE_THRESHOLD") {
            if let Ok(value) = raw.trim().parse::<f64>() {
                config.high_usage_threshold = value;
            }
        }
        if let Ok(raw) = std::env::var("WARDEN_MEDIUM_USAGE_THRESHOLD") {
            if let Ok(value) = raw.trim().parse::<f64>() {
                config.medium_usage_threshold = value;
            }
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.database_path, PathBuf::from("ipam.db"));
        assert_eq!(config.high_usage_threshold, 80.0);
        assert_eq!(config.medium_usage_threshold, 60.0);
    }
}
