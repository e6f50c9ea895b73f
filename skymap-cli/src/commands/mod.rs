//! CLI commands for skymap.
//!
//! - `skymap init` - Write a commented `skymap.yaml`
//! - `skymap discover` - Enumerate an account and project it into the graph
//! - `skymap summary` - Report what a saved graph contains
//! - `skymap search` - Find resources in a saved graph

pub mod discover;
pub mod init;
pub mod search;
pub mod summary;

pub use discover::{DiscoverOptions, run_discover};
pub use init::{InitError, InitOptions, run_init};
pub use search::{SearchOptions, run_search};
pub use summary::{GraphSummary, SummaryOptions, run_summary};
