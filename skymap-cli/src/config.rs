//! Configuration loading and validation for skymap.
//!
//! This module implements the `skymap.yaml` schema and provides utilities
//! for loading, validating, and expanding paths in the configuration.
//!
//! # Configuration File
//!
//! The file is read from the current directory by default, or from the path
//! given with `--config`. Every section is optional; a missing default file
//! means "all defaults".
//!
//! # Environment Variable Overrides
//!
//! - `SKYMAP_REGION`: region reported for listed resources
//! - `SKYMAP_ACCOUNT_NAME`: display name of the Account node
//! - `SKYMAP_MAX_WORKERS`: enumeration worker bound
//! - `SKYMAP_GRAPH_PATH`: where the graph is saved
//! - `SKYMAP_LOG_LEVEL`: default log level

use serde::{Deserialize, Serialize};
use skymap_discovery::{DEFAULT_MAX_WORKERS, StalePolicy};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name of the configuration file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "skymap.yaml";

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Errors that can occur during configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration file was not found at the specified path.
    #[error("Configuration file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse configuration: {0}")]
    ParseError(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Root configuration structure for `skymap.yaml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SkymapConfig {
    #[serde(default)]
    pub account: AccountConfig,

    #[serde(default)]
    pub discovery: DiscoveryConfig,

    #[serde(default)]
    pub graph: GraphConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// The account being projected.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccountConfig {
    /// Expected account id. When set, the credential check must agree.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Display name for the Account node.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    #[serde(default = "default_region")]
    pub region: String,

    /// Upper bound on concurrently listed resource types.
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    /// Services to enumerate; empty means every known service.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub services: Vec<String>,

    /// Glob patterns matched against resource types, e.g. `AWS::IAM::*`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude_resources: Vec<String>,

    /// Captured account snapshot to replay.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<PathBuf>,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            region: default_region(),
            max_workers: default_max_workers(),
            services: Vec::new(),
            exclude_resources: Vec::new(),
            snapshot: None,
        }
    }
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_max_workers() -> usize {
    DEFAULT_MAX_WORKERS
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphConfig {
    #[serde(default = "default_output_path")]
    pub output_path: PathBuf,

    /// Clear the graph before projecting.
    #[serde(default)]
    pub reset: bool,

    #[serde(default)]
    pub stale_policy: StalePolicy,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            output_path: default_output_path(),
            reset: false,
            stale_policy: StalePolicy::default(),
        }
    }
}

fn default_output_path() -> PathBuf {
    PathBuf::from(".skymap/graph.json")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

impl SkymapConfig {
    /// Load `skymap.yaml` from the working directory, or defaults if absent.
    pub fn load_default() -> Result<Self, ConfigError> {
        let path = Path::new(DEFAULT_CONFIG_FILE);
        if path.exists() {
            Self::load_from_path(path)
        } else {
            let mut config = Self::default();
            config.finish()?;
            Ok(config)
        }
    }

    /// Load configuration from a specific path. The file must exist.
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let mut config: SkymapConfig = serde_yaml::from_str(&content)?;
        config.finish()?;
        Ok(config)
    }

    /// Load from `path` when given, else the default location.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load_from_path(path),
            None => Self::load_default(),
        }
    }

    fn finish(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|key| env::var(key).ok());
        self.expand_paths()?;
        self.validate()
    }

    /// Apply `SKYMAP_*` overrides read through `lookup`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(region) = lookup("SKYMAP_REGION") {
            self.discovery.region = region;
        }
        if let Some(name) = lookup("SKYMAP_ACCOUNT_NAME") {
            self.account.name = Some(name);
        }
        if let Some(workers) = lookup("SKYMAP_MAX_WORKERS") {
            match workers.parse() {
                Ok(n) => self.discovery.max_workers = n,
                Err(_) => tracing::warn!(value = %workers, "Ignoring non-numeric SKYMAP_MAX_WORKERS"),
            }
        }
        if let Some(path) = lookup("SKYMAP_GRAPH_PATH") {
            self.graph.output_path = PathBuf::from(path);
        }
        if let Some(level) = lookup("SKYMAP_LOG_LEVEL") {
            self.logging.level = level;
        }
    }

    /// Expand `~` in paths to the home directory.
    fn expand_paths(&mut self) -> Result<(), ConfigError> {
        let needs_home = std::iter::once(&self.graph.output_path)
            .chain(self.discovery.snapshot.as_ref())
            .any(|p| p.starts_with("~"));
        if !needs_home {
            return Ok(());
        }

        let home = dirs::home_dir().ok_or_else(|| {
            ConfigError::ValidationError("Cannot determine home directory".into())
        })?;
        self.graph.output_path = expand_home(&self.graph.output_path, &home);
        if let Some(snapshot) = &self.discovery.snapshot {
            self.discovery.snapshot = Some(expand_home(snapshot, &home));
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.discovery.max_workers == 0 {
            return Err(ConfigError::ValidationError(
                "discovery.max_workers must be at least 1".into(),
            ));
        }

        if self.discovery.region.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "discovery.region must not be empty".into(),
            ));
        }

        if let Some(id) = &self.account.id {
            if id.is_empty() || !id.chars().all(|c| c.is_ascii_digit()) {
                return Err(ConfigError::ValidationError(format!(
                    "Invalid account id '{id}'. Expected digits only"
                )));
            }
        }

        let level = self.logging.level.to_ascii_lowercase();
        if !LOG_LEVELS.contains(&level.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "Invalid log level '{}'. Expected one of: {}",
                self.logging.level,
                LOG_LEVELS.join(", ")
            )));
        }

        Ok(())
    }
}

fn expand_home(path: &Path, home: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => home.join(rest),
        Err(_) => path.to_path_buf(),
    }
}
