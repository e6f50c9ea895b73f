use crate::commands::InitError;
use crate::config::ConfigError;
use skymap_discovery::{DiscoveryError, ProjectionError};
use skymap_graph::GraphError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Init(#[from] InitError),

    #[error("No resource source configured")]
    NoSource,

    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    #[error("Credentials belong to account {actual}, but the configuration expects {expected}")]
    AccountMismatch { expected: String, actual: String },

    #[error("Enumeration interrupted; the graph was left unchanged")]
    Interrupted,

    #[error(transparent)]
    Projection(#[from] ProjectionError),

    #[error("Graph file not found: {path}")]
    GraphNotFound { path: String },

    #[error("Failed to access graph {path}: {source}")]
    Graph {
        path: String,
        #[source]
        source: GraphError,
    },

    #[error("Search text is empty")]
    EmptySearch,

    #[error("Failed to start async runtime: {0}")]
    Runtime(#[source] std::io::Error),
}

impl CliError {
    /// Get a suggestion for how to fix this error
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            CliError::Config(ConfigError::NotFound(_)) => Some(
                "Run 'skymap init' to create a configuration file, or use --config to specify a path",
            ),
            CliError::Config(_) => Some("Check skymap.yaml against the template from 'skymap init'"),
            CliError::Init(_) => None,
            CliError::NoSource => Some(
                "Pass --snapshot <file> or set discovery.snapshot in skymap.yaml",
            ),
            CliError::Discovery(DiscoveryError::Credentials(_)) => Some(
                "Check that the snapshot names an account_id, or refresh your credentials",
            ),
            CliError::Discovery(DiscoveryError::UnknownService(_)) => Some(
                "Service names are lower-case API prefixes such as ec2, rds or elasticache",
            ),
            CliError::Discovery(_) => None,
            CliError::AccountMismatch { .. } => Some(
                "Update account.id in skymap.yaml or switch to credentials for the expected account",
            ),
            CliError::Interrupted => Some("Re-run 'skymap discover' to project a complete enumeration"),
            CliError::Projection(ProjectionError::StorageUnavailable(_)) => Some(
                "Check that the graph output directory is writable. No further writes were attempted.",
            ),
            CliError::Projection(_) => None,
            CliError::GraphNotFound { .. } => {
                Some("Run 'skymap discover' first to build the resource graph.")
            }
            CliError::Graph { .. } => Some(
                "The graph file may be corrupt. Re-run 'skymap discover --reset' to rebuild it.",
            ),
            CliError::EmptySearch => Some("Pass part of a resource type, identifier, service or ARN"),
            CliError::Runtime(_) => None,
        }
    }

    /// Format error with suggestion for CLI output
    pub fn format_for_cli(&self) -> String {
        let mut output = format!("Error: {}", self);

        if let Some(suggestion) = self.suggestion() {
            output.push_str(&format!("\n\nSuggestion: {}", suggestion));
        }

        output
    }
}
