//! Configuration management for Tagscope.
//!
//! This module provides configuration loading, saving, and defaults.
//! Configuration is stored in TOML format in a platform-appropriate location.

use crate::error::{Result, TagScopeError};
use crate::index::DEFAULT_PARALLEL_THRESHOLD;
use crate::parser::ParseOptions;
use crate::scope::Scope;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Main configuration structure for Tagscope.
///
/// ## Example Configuration File (tagscope.toml)
///
/// ```toml
/// [general]
/// db_path = "/home/me/.local/share/tagscope/images.db"
/// max_results = 1000
///
/// [query]
/// implicit_and = true
/// all_keywords = ["all", "*"]
///
/// [scope]
/// case_insensitive = true
/// directories = ["/home/me/Pictures"]
///
/// [performance]
/// parallel_branches = true
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Query syntax
    pub query: QueryConfig,

    /// Default scope and location matching
    pub scope: ScopeConfig,

    /// Performance tuning
    pub performance: PerformanceConfig,
}

/// General configuration options
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Tag database location (None = default location)
    pub db_path: Option<PathBuf>,

    /// Maximum number of results to print (0 = no limit)
    pub max_results: usize,

    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        GeneralConfig {
            db_path: None,
            max_results: 1000,
            log_level: "info".to_string(),
        }
    }
}

/// Query syntax options
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    /// Adjacent terms mean AND; when false they form one multi-word tag
    pub implicit_and: bool,

    /// Words that select every item in scope
    pub all_keywords: Vec<String>,
}

impl Default for QueryConfig {
    fn default() -> Self {
        let options = ParseOptions::default();
        QueryConfig {
            implicit_and: options.implicit_and,
            all_keywords: options.all_keywords,
        }
    }
}

/// Scope configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScopeConfig {
    /// Compare locations ignoring case
    pub case_insensitive: bool,

    /// Directories searched when a query names none
    pub directories: Vec<String>,
}

impl Default for ScopeConfig {
    fn default() -> Self {
        ScopeConfig {
            case_insensitive: true,
            directories: Vec::new(),
        }
    }
}

/// Performance configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceConfig {
    /// Evaluate both sides of OR in parallel
    pub parallel_branches: bool,

    /// Item count above which in-memory scans go parallel
    pub parallel_threshold: usize,
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        PerformanceConfig {
            parallel_branches: false,
            parallel_threshold: DEFAULT_PARALLEL_THRESHOLD,
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// Returns default config if no config file exists.
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path()?;
        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Config::default());
        }

        info!(path = %path.display(), "Loading configuration");
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents).map_err(|e| TagScopeError::ConfigError {
            reason: format!("Failed to parse config: {}", e),
        })?;

        Ok(config)
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<()> {
        let config_path = Self::default_config_path()?;
        self.save_to(&config_path)
    }

    /// Save configuration to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        info!(path = %path.display(), "Saving configuration");
        let contents = toml::to_string_pretty(self).map_err(|e| TagScopeError::ConfigError {
            reason: format!("Failed to serialize config: {}", e),
        })?;

        fs::write(path, contents)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> Result<PathBuf> {
        Ok(project_dirs()?.config_dir().join("tagscope.toml"))
    }

    /// Get the default data directory path.
    pub fn default_data_dir() -> Result<PathBuf> {
        Ok(project_dirs()?.data_dir().to_path_buf())
    }

    /// Get the tag database path (from config or default).
    pub fn db_path(&self) -> Result<PathBuf> {
        if let Some(ref path) = self.general.db_path {
            Ok(path.clone())
        } else {
            Ok(Self::default_data_dir()?.join("images.db"))
        }
    }

    /// Parser settings from the `[query]` section.
    pub fn parse_options(&self) -> ParseOptions {
        ParseOptions {
            implicit_and: self.query.implicit_and,
            all_keywords: self.query.all_keywords.clone(),
        }
    }

    /// Build a scope from `dirs`, falling back to the configured
    /// directories when `dirs` is empty.
    pub fn scope_from(&self, dirs: &[String]) -> Scope {
        let dirs = if dirs.is_empty() {
            self.scope.directories.as_slice()
        } else {
            dirs
        };
        Scope::with_case_sensitivity(dirs, self.scope.case_insensitive)
    }

    /// Validate option values that serde accepts but the engine cannot use.
    pub fn validate(&self) -> Result<()> {
        if let Some(keyword) = self
            .query
            .all_keywords
            .iter()
            .find(|k| k.trim().is_empty() || k.chars().any(char::is_whitespace))
        {
            return Err(TagScopeError::ConfigError {
                reason: format!("invalid all keyword {:?}", keyword),
            });
        }
        Ok(())
    }
}

fn project_dirs() -> Result<ProjectDirs> {
    ProjectDirs::from("", "", "tagscope").ok_or_else(|| TagScopeError::ConfigError {
        reason: "Could not determine config directory".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.query.implicit_and);
        assert!(config.scope.case_insensitive);
        assert_eq!(config.general.max_results, 1000);
        assert_eq!(config.parse_options(), ParseOptions::default());
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nested").join("test.toml");

        let mut config = Config::default();
        config.general.max_results = 50;
        config.general.db_path = Some(temp_dir.path().join("tags.db"));
        config.scope.directories = vec!["/photos".to_string()];
        config.query.implicit_and = false;

        config.save_to(&config_path).unwrap();
        let loaded = Config::load_from(&config_path).unwrap();

        assert_eq!(loaded.general.max_results, 50);
        assert_eq!(loaded.scope.directories, vec!["/photos".to_string()]);
        assert!(!loaded.query.implicit_and);
        assert_eq!(loaded.db_path().unwrap(), temp_dir.path().join("tags.db"));
    }

    #[test]
    fn test_load_nonexistent() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nonexistent.toml");

        let config = Config::load_from(&config_path).unwrap();
        assert_eq!(config.general.max_results, 1000); // Default value
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("partial.toml");
        fs::write(&config_path, "[scope]\ncase_insensitive = false\n").unwrap();

        let config = Config::load_from(&config_path).unwrap();
        assert!(!config.scope.case_insensitive);
        assert!(config.query.implicit_and);
        assert_eq!(config.performance.parallel_threshold, DEFAULT_PARALLEL_THRESHOLD);
    }

    #[test]
    fn test_invalid_toml() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("broken.toml");
        fs::write(&config_path, "[general\nmax_results = ").unwrap();

        let err = Config::load_from(&config_path).unwrap_err();
        assert!(matches!(err, TagScopeError::ConfigError { .. }));
    }

    #[test]
    fn test_scope_from() {
        let mut config = Config::default();
        config.scope.directories = vec!["/Photos".to_string()];

        let scope = config.scope_from(&[]);
        assert_eq!(scope.prefixes().collect::<Vec<_>>(), vec!["/photos/"]);

        let scope = config.scope_from(&["/Archive".to_string()]);
        assert_eq!(scope.prefixes().collect::<Vec<_>>(), vec!["/archive/"]);

        config.scope.case_insensitive = false;
        let scope = config.scope_from(&[]);
        assert_eq!(scope.prefixes().collect::<Vec<_>>(), vec!["/Photos/"]);

        config.scope.directories.clear();
        assert!(config.scope_from(&[]).is_empty());
    }

    #[test]
    fn test_validate() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());

        config.query.all_keywords = vec!["every thing".to_string()];
        assert!(config.validate().is_err());
    }
}
