//! Implementation of the `skymap init` command.
//!
//! Writes a `skymap.yaml` with every section present and commented.
//!
//! # Usage
//!
//! ```bash
//! # Create skymap.yaml in the current directory
//! skymap init
//!
//! # Write somewhere else, replacing an existing file
//! skymap init --output config/skymap.yaml --force
//! ```

use std::path::Path;
use thiserror::Error;

use crate::config::DEFAULT_CONFIG_FILE;
use crate::output;

#[derive(Debug, Error)]
pub enum InitError {
    /// Configuration file already exists and --force was not specified.
    #[error("Configuration file already exists: {path}. Use --force to overwrite.")]
    FileExists { path: String },

    #[error("Failed to write configuration file: {0}")]
    WriteError(#[from] std::io::Error),
}

const DEFAULT_CONFIG_TEMPLATE: &str = r#"# skymap.yaml - skymap configuration file

# ===============================================================================
# ACCOUNT
# ===============================================================================

# Expected account id. When set, discovery stops if the credentials belong
# to a different account. Leave unset to use whatever account they report.
# The name labels the Account node (default: Account-<id>).
#
# account:
#   id: "111122223333"
#   name: "production"

# ===============================================================================
# DISCOVERY
# ===============================================================================

discovery:
  # Region reported for listed resources. Global services (iam, route53,
  # wafv2, ...) never carry a region.
  region: "us-east-1"

  # Resource types listed concurrently
  max_workers: 10

  # Services to enumerate. Empty means every known service.
  services: []
  # Example:
  # services:
  #   - ec2
  #   - rds
  #   - elasticache

  # Glob patterns matched against resource types
  exclude_resources: []
  # Example:
  # exclude_resources:
  #   - "AWS::EC2::FlowLog"
  #   - "AWS::IAM::*"

  # Captured account snapshot (YAML or JSON) to replay
  # snapshot: "snapshots/account.yaml"

# ===============================================================================
# GRAPH
# ===============================================================================

graph:
  # Where the resource graph is saved. Supports ~ for the home directory.
  output_path: ".skymap/graph.json"

  # Clear the graph before projecting
  reset: false

  # What happens to resources a run no longer sees:
  #   retain - keep them (default)
  #   sweep  - remove nodes not written by the latest run
  stale_policy: retain

# ===============================================================================
# LOGGING
# ===============================================================================
# SKYMAP_LOG overrides this section with a full filter directive,
# e.g. SKYMAP_LOG=skymap_discovery=debug

logging:
  # trace | debug | info | warn | error
  level: "info"

  # compact | json
  format: compact
"#;

#[derive(Debug, Clone, Default)]
pub struct InitOptions {
    pub output: Option<String>,
    /// Overwrite an existing file.
    pub force: bool,
}

/// Run the `skymap init` command.
pub fn run_init(options: InitOptions) -> Result<(), InitError> {
    let output_path = options
        .output
        .unwrap_or_else(|| DEFAULT_CONFIG_FILE.to_string());
    let path = Path::new(&output_path);

    if path.exists() && !options.force {
        return Err(InitError::FileExists { path: output_path });
    }

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(path, DEFAULT_CONFIG_TEMPLATE)?;
    tracing::debug!(path = %output_path, "Wrote configuration template");

    output::success(&format!("Created configuration file: {}", output_path));
    output::info("");
    output::info("Next steps:");
    output::info(&format!(
        "  1. Edit {} and point discovery.snapshot at a captured account",
        output_path
    ));
    output::info("  2. Run: skymap discover");
    output::info("  3. Run: skymap summary");

    Ok(())
}
