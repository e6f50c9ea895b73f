//! skymap - Project cloud accounts into a resource graph.
//!
//! skymap enumerates the resources of a cloud account, expands the ones that
//! hide sub-resources (routes, attachments, cache nodes, ...), infers how they
//! relate and writes everything into a property graph. Connections that leave
//! the account (peering, transit gateway attachments, shared principals) become
//! account-to-account edges.
//!
//! # Commands
//!
//! - `skymap init` - Initialize a new configuration file
//! - `skymap discover` - Enumerate an account and project it into the graph
//! - `skymap summary` - Report what the saved graph contains
//! - `skymap search` - Find resources by type, identifier, service or ARN
//!
//! # Usage
//!
//! ```bash
//! skymap init
//! skymap discover --snapshot snapshots/prod.yaml
//! skymap summary
//! skymap search aurora
//! ```

use clap::{Parser, Subcommand};
use skymap_cli::commands::{self, DiscoverOptions, InitOptions, SearchOptions, SummaryOptions};
use skymap_cli::{CliError, SkymapConfig, logging, output};
use skymap_discovery::CancellationFlag;
use std::path::Path;

/// skymap - Project cloud accounts into a resource graph
#[derive(Parser)]
#[command(name = "skymap")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Increase verbosity (-v debug, -vv trace)
    #[arg(long, short, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Only print errors
    #[arg(long, short, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new skymap.yaml configuration file
    Init {
        /// Output path for the configuration file
        #[arg(long, short)]
        output: Option<String>,

        /// Overwrite existing configuration file
        #[arg(long, short)]
        force: bool,
    },

    /// Enumerate an account and project it into the resource graph
    Discover {
        /// Path to the configuration file
        #[arg(long, short)]
        config: Option<String>,

        /// Account snapshot to replay (YAML or JSON)
        #[arg(long, short)]
        snapshot: Option<String>,

        /// Only enumerate this service (repeatable)
        #[arg(long = "service")]
        services: Vec<String>,

        /// Resource types listed concurrently
        #[arg(long, short)]
        workers: Option<usize>,

        /// Clear the graph before projecting
        #[arg(long)]
        reset: bool,

        /// Remove resources the run no longer sees
        #[arg(long)]
        sweep: bool,

        /// Override output graph path
        #[arg(long, short)]
        output: Option<String>,
    },

    /// Report node, edge and cross-account counts of the saved graph
    Summary {
        /// Path to the configuration file
        #[arg(long, short)]
        config: Option<String>,

        /// Override input graph path
        #[arg(long, short)]
        input: Option<String>,
    },

    /// Find resources whose type, identifier, service or ARN contains QUERY
    Search {
        /// Text to look for (case-insensitive)
        query: String,

        /// Path to the configuration file
        #[arg(long, short)]
        config: Option<String>,

        /// Override input graph path
        #[arg(long, short)]
        input: Option<String>,

        /// Stop after this many matches
        #[arg(long, short)]
        limit: Option<usize>,
    },
}

fn main() {
    let cli = Cli::parse();
    output::set_quiet(cli.quiet);
    output::set_verbosity(cli.verbose);

    if let Err(e) = run(cli) {
        output::error(&e.format_for_cli());
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Commands::Init { output, force } => {
            logging::init(&SkymapConfig::default().logging, cli.verbose, cli.quiet);
            commands::run_init(InitOptions { output, force })?;
            Ok(())
        }
        Commands::Discover {
            config,
            snapshot,
            services,
            workers,
            reset,
            sweep,
            output,
        } => {
            let config = SkymapConfig::load(config.as_deref().map(Path::new))?;
            logging::init(&config.logging, cli.verbose, cli.quiet);

            let options = DiscoverOptions {
                snapshot,
                services,
                workers,
                reset,
                sweep,
                output,
            };
            let runtime = tokio::runtime::Runtime::new().map_err(CliError::Runtime)?;
            let cancel = CancellationFlag::new();
            runtime.spawn(cancel_on_ctrl_c(cancel.clone()));
            runtime.block_on(commands::run_discover(options, config, cancel))?;
            Ok(())
        }
        Commands::Summary { config, input } => {
            let config = SkymapConfig::load(config.as_deref().map(Path::new))?;
            logging::init(&config.logging, cli.verbose, cli.quiet);
            commands::run_summary(SummaryOptions { input }, &config)?;
            Ok(())
        }
        Commands::Search {
            query,
            config,
            input,
            limit,
        } => {
            let config = SkymapConfig::load(config.as_deref().map(Path::new))?;
            logging::init(&config.logging, cli.verbose, cli.quiet);
            commands::run_search(SearchOptions { query, input, limit }, &config)?;
            Ok(())
        }
    }
}

/// Stop handing out resource types on the first Ctrl-C. Types already being
/// listed finish; the run then ends without touching the graph. A second
/// Ctrl-C exits immediately.
async fn cancel_on_ctrl_c(cancel: CancellationFlag) {
    if tokio::signal::ctrl_c().await.is_err() {
        return;
    }
    tracing::warn!("Interrupt received, stopping enumeration");
    cancel.cancel();

    if tokio::signal::ctrl_c().await.is_ok() {
        output::error("Interrupted again, exiting");
        std::process::exit(130);
    }
}
