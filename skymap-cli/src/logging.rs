//! Tracing subscriber setup.

use crate::config::{LogFormat, LoggingConfig};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Environment variable holding a full filter directive, e.g. `skymap_discovery=debug`.
pub const LOG_ENV: &str = "SKYMAP_LOG";

/// Default filter for the configured level and command-line flags.
///
/// `-v` raises the level to `debug`, `-vv` to `trace`; `--quiet` lowers it
/// to `warn`.
pub fn default_directive(config: &LoggingConfig, verbosity: u8, quiet: bool) -> String {
    let level = match (quiet, verbosity) {
        (true, _) => "warn".to_string(),
        (false, 0) => config.level.to_ascii_lowercase(),
        (false, 1) => "debug".to_string(),
        (false, _) => "trace".to_string(),
    };
    format!("skymap={level},skymap_cli={level},skymap_discovery={level},skymap_graph={level},warn")
}

/// Install the global subscriber. Logs go to stderr so that command output
/// on stdout stays clean.
pub fn init(config: &LoggingConfig, verbosity: u8, quiet: bool) {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| EnvFilter::new(default_directive(config, verbosity, quiet)));

    let registry = tracing_subscriber::registry().with(filter);
    let installed = match config.format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
            .try_init(),
        LogFormat::Compact => registry
            .with(fmt::layer().compact().with_writer(std::io::stderr))
            .try_init(),
    };
    if installed.is_err() {
        tracing::debug!("Tracing subscriber already installed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_directive_follows_flags() {
        let config = LoggingConfig::default();

        assert!(default_directive(&config, 0, false).starts_with("skymap=info,"));
        assert!(default_directive(&config, 1, false).starts_with("skymap=debug,"));
        assert!(default_directive(&config, 3, false).starts_with("skymap=trace,"));
        assert!(default_directive(&config, 2, true).starts_with("skymap=warn,"));
    }

    #[test]
    fn test_directive_uses_configured_level() {
        let config = LoggingConfig {
            level: "WARN".into(),
            format: LogFormat::Json,
        };
        let directive = default_directive(&config, 0, false);
        assert_eq!(directive.matches("=warn").count(), 4);
        assert!(EnvFilter::try_new(&directive).is_ok());
    }
}
