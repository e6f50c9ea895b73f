//! Implementation of the `skymap discover` command.
//!
//! This command builds or refreshes the resource graph by:
//! 1. Loading configuration and applying command-line overrides
//! 2. Opening the resource source and checking which account it belongs to
//! 3. Enumerating the selected resource types concurrently
//! 4. Projecting the records into the graph (resources, sub-resources,
//!    inferred relationships and cross-account links)
//! 5. Saving the graph to the configured output path
//!
//! An interrupted enumeration is never projected.
//!
//! # Usage
//!
//! ```bash
//! # Replay a captured account into .skymap/graph.json
//! skymap discover --snapshot snapshots/prod.yaml
//!
//! # Only networking and databases, four workers, fresh graph
//! skymap discover --service ec2 --service rds --workers 4 --reset
//!
//! # Remove resources the latest run no longer sees
//! skymap discover --sweep
//! ```

use crate::config::SkymapConfig;
use crate::errors::CliError;
use crate::output;
use crate::progress::EnumerationProgress;
use chrono::Utc;
use skymap_discovery::{
    CancellationFlag, EnumerationResult, Enumerator, GraphProjector, ProjectionOptions,
    ProjectionReport, ResourceLister, ServiceRegistry, SnapshotSource, StalePolicy,
    TypeOutcome,
};
use skymap_graph::MemoryStore;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct DiscoverOptions {
    /// Snapshot to replay instead of `discovery.snapshot`.
    pub snapshot: Option<String>,
    /// Replaces the configured service filter when non-empty.
    pub services: Vec<String>,
    pub workers: Option<usize>,
    pub reset: bool,
    /// Shorthand for `stale_policy: sweep`.
    pub sweep: bool,
    /// Override output graph path.
    pub output: Option<String>,
}

impl DiscoverOptions {
    fn apply(&self, config: &mut SkymapConfig) {
        if let Some(snapshot) = &self.snapshot {
            config.discovery.snapshot = Some(PathBuf::from(snapshot));
        }
        if !self.services.is_empty() {
            config.discovery.services = self.services.clone();
        }
        if let Some(workers) = self.workers {
            config.discovery.max_workers = workers.max(1);
        }
        if self.reset {
            config.graph.reset = true;
        }
        if self.sweep {
            config.graph.stale_policy = StalePolicy::Sweep;
        }
        if let Some(output) = &self.output {
            config.graph.output_path = PathBuf::from(output);
        }
    }
}

/// Run the `skymap discover` command.
///
/// `cancel` is shared with the Ctrl-C handler; once set, no further resource
/// types are listed and the run ends with [`CliError::Interrupted`].
pub async fn run_discover(
    options: DiscoverOptions,
    mut config: SkymapConfig,
    cancel: CancellationFlag,
) -> Result<ProjectionReport, CliError> {
    options.apply(&mut config);

    let snapshot_path = config.discovery.snapshot.clone().ok_or(CliError::NoSource)?;
    output::verbose(&format!("Loading snapshot: {}", snapshot_path.display()));
    let source = Arc::new(
        SnapshotSource::load(&snapshot_path)?.with_default_region(config.discovery.region.clone()),
    );

    let registry = ServiceRegistry::standard();
    let resource_types = registry.resource_types(
        &config.discovery.services,
        &config.discovery.exclude_resources,
    )?;
    let outside: Vec<String> = source
        .resource_types()
        .into_iter()
        .filter(|t| !resource_types.contains(t))
        .collect();
    if !outside.is_empty() {
        tracing::debug!(types = ?outside, "Snapshot types outside the selection are ignored");
    }

    let progress = if output::is_quiet() {
        EnumerationProgress::hidden(resource_types.len() as u64)
    } else {
        EnumerationProgress::new(resource_types.len() as u64)
    };
    let enumerator = Enumerator::new(Arc::clone(&source) as _)
        .with_max_workers(config.discovery.max_workers)
        .with_cancellation(cancel.clone())
        .with_progress(progress.hook());

    let account = enumerator.account().await?;
    if let Some(expected) = &config.account.id {
        if *expected != account {
            return Err(CliError::AccountMismatch {
                expected: expected.clone(),
                actual: account,
            });
        }
    }
    output::info(&format!(
        "Discovering {} resource types in account {} ({})",
        resource_types.len(),
        account,
        source.region()
    ));

    let enumeration = enumerator.run(&account, &resource_types).await;
    let interrupted = enumeration.interrupted || cancel.is_cancelled();
    progress.finish(interrupted);
    if interrupted {
        return Err(CliError::Interrupted);
    }
    print_enumeration(&enumeration);

    let graph_path = config.graph.output_path.clone();
    let mut store = MemoryStore::open(&graph_path).map_err(|source| CliError::Graph {
        path: graph_path.display().to_string(),
        source,
    })?;

    let mut projection = ProjectionOptions::new(account.as_str());
    projection.account_name = config.account.name.clone();
    projection.reset = config.graph.reset;
    projection.stale_policy = config.graph.stale_policy;

    let report = GraphProjector::new(projection)
        .project(&enumeration.records, &mut store, source.as_ref())
        .await?;

    let metadata = &mut store.graph_mut().metadata;
    metadata.run_count += 1;
    metadata.last_run_id = Some(report.run_id.clone());
    metadata.account_id = Some(account.clone());
    metadata.modified_at = Utc::now();

    store.persist(&graph_path).map_err(|source| CliError::Graph {
        path: graph_path.display().to_string(),
        source,
    })?;

    print_report(&report);
    output::success(&format!("Graph saved to {}", graph_path.display()));
    Ok(report)
}

fn print_enumeration(enumeration: &EnumerationResult) {
    let stats = enumeration.stats();
    output::heading("Enumeration");
    output::stat("Resource types listed", stats.listed_types);
    output::stat("Resource types skipped", stats.skipped_types);
    output::stat("Resource types failed", stats.failed_types);
    output::stat("Resources found", stats.resources);

    for failure in enumeration.failures() {
        if let TypeOutcome::Failed(message) = &failure.outcome {
            output::warning(&format!(
                "Failed to list {}: {}",
                failure.resource_type, message
            ));
        }
    }
}

fn print_report(report: &ProjectionReport) {
    output::heading("Projection");
    output::stat("Nodes created", report.nodes_created);
    output::stat("Nodes updated", report.nodes_updated);
    output::stat("Edges created", report.edges_created);
    output::stat("Edges updated", report.edges_updated);
    output::stat("Sub-resources", report.sub_resources);
    output::stat("Inferred relationships", report.inferred_edges);
    output::stat("Cross-account links", report.cross_account_links);
    if report.pruned > 0 {
        output::stat("Stale nodes removed", report.pruned);
    }
    if report.failed_writes > 0 {
        output::warning(&format!("{} graph writes failed", report.failed_writes));
    }
    if !report.failures.is_empty() {
        output::warning(&format!(
            "{} expansion steps failed (run with -v for details)",
            report.failures.len()
        ));
        for failure in &report.failures {
            output::verbose(&format!(
                "  {} {}: {}",
                failure.pattern, failure.parent, failure.error
            ));
        }
    }
    output::stat(
        "Duration",
        format!("{} ms", report.duration().num_milliseconds()),
    );

    output::heading("Cross-account connectivity");
    output::info(report.cross_account.to_string().trim_end());
}
