//! # App Configuration
//!
//! Optional `trellis.toml` settings merged under CLI flags and environment
//! variables.
//!
//! Precedence, highest first:
//! 1. CLI flags (`--database`)
//! 2. Environment (`TRELLIS_DB`, `TRELLIS_LOG_FORMAT`)
//! 3. Config file (`trellis.toml`, or `TRELLIS_CONFIG` to relocate it)
//! 4. Built-in defaults

use serde::Deserialize;
use std::path::{Path, PathBuf};
use trellis_core::TrellisError;

/// Default database filename in the working directory.
pub const DEFAULT_DATABASE: &str = "trellis.db";

/// Default config filename in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "trellis.toml";

/// Settings accepted in the config file. Unknown keys are rejected so a
/// typo surfaces instead of silently falling back to defaults.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    /// Path to the progression database.
    pub database: Option<PathBuf>,
    /// Log output format: "text" (default) or "json".
    pub log_format: Option<String>,
}

impl FileConfig {
    /// Parse a config file.
    pub fn load(path: &Path) -> Result<Self, TrellisError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| TrellisError::IoError(format!("cannot read {}: {}", path.display(), e)))?;
        Self::parse(&raw)
    }

    /// Parse config file contents.
    pub fn parse(raw: &str) -> Result<Self, TrellisError> {
        toml::from_str(raw).map_err(|e| TrellisError::SerializationError(e.to_string()))
    }

    /// Load the default config file if one exists; a missing file is not an
    /// error, a malformed one is reported and ignored.
    #[must_use]
    pub fn load_default() -> Self {
        let path = std::env::var("TRELLIS_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_FILE));

        if !path.exists() {
            return Self::default();
        }
        match Self::load(&path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("ignoring config file {}: {}", path.display(), e);
                Self::default()
            }
        }
    }
}

/// Resolve the database path from flag, environment and config file.
#[must_use]
pub fn resolve_database(flag: Option<PathBuf>, file: &FileConfig) -> PathBuf {
    if let Some(path) = flag {
        return path;
    }
    if let Ok(path) = std::env::var("TRELLIS_DB") {
        return PathBuf::from(path);
    }
    file.database
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATABASE))
}

/// Resolve the log format from environment and config file.
#[must_use]
pub fn resolve_log_format(file: &FileConfig) -> String {
    if let Ok(format) = std::env::var("TRELLIS_LOG_FORMAT") {
        return format;
    }
    file.log_format
        .clone()
        .unwrap_or_else(|| "text".to_string())
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_parses_to_defaults() {
        let config = FileConfig::parse("").expect("parse");
        assert_eq!(config, FileConfig::default());
    }

    #[test]
    fn full_config_parses() {
        let config = FileConfig::parse(
            r#"
            database = "/var/lib/trellis/prod.db"
            log_format = "json"
            "#,
        )
        .expect("parse");
        assert_eq!(
            config.database,
            Some(PathBuf::from("/var/lib/trellis/prod.db"))
        );
        assert_eq!(config.log_format.as_deref(), Some("json"));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let result = FileConfig::parse("databse = \"oops.db\"");
        assert!(result.is_err());
    }

    #[test]
    fn flag_wins_over_config_file() {
        let file = FileConfig {
            database: Some(PathBuf::from("from-file.db")),
            log_format: None,
        };
        let resolved = resolve_database(Some(PathBuf::from("from-flag.db")), &file);
        assert_eq!(resolved, PathBuf::from("from-flag.db"));
    }

    #[test]
    fn config_file_wins_over_default() {
        let file = FileConfig {
            database: Some(PathBuf::from("from-file.db")),
            log_format: None,
        };
        // No env override in this test run for TRELLIS_DB is assumed by the
        // harness; the fallback chain ends at the built-in default.
        if std::env::var("TRELLIS_DB").is_err() {
            let resolved = resolve_database(None, &file);
            assert_eq!(resolved, PathBuf::from("from-file.db"));
        }
    }
}
