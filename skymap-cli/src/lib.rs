//! skymap CLI library.
//!
//! The command implementations behind the `skymap` binary, exposed as a
//! library so they can be driven from tests.
//!
//! # Modules
//!
//! - [`commands`]: `init`, `discover`, `summary` and `search`
//! - [`config`]: `skymap.yaml` loading, environment overrides and validation
//! - [`errors`]: User-facing errors with suggestions
//! - [`logging`]: Tracing subscriber setup
//! - [`output`] and [`progress`]: Terminal output

pub mod commands;
pub mod config;
pub mod errors;
pub mod logging;
pub mod output;
pub mod progress;

pub use config::{
    AccountConfig, ConfigError, DiscoveryConfig, GraphConfig, LogFormat, LoggingConfig,
    SkymapConfig,
};
pub use errors::CliError;
