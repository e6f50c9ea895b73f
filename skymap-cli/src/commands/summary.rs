//! Implementation of the `skymap summary` command.
//!
//! Reads a saved graph and prints what it holds: node counts per label,
//! edge counts per relationship kind and the cross-account connections.

use crate::config::SkymapConfig;
use crate::errors::CliError;
use crate::output;
use serde_json::Value;
use skymap_discovery::CrossAccountSummary;
use skymap_graph::{GraphQuery, MemoryStore, QueryRecord, RelationshipKind, ResourceGraph};
use std::collections::BTreeMap;
use std::path::PathBuf;

#[derive(Debug, Clone, Default)]
pub struct SummaryOptions {
    /// Override input graph path.
    pub input: Option<String>,
}

/// What a saved graph contains.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphSummary {
    pub account_id: Option<String>,
    pub run_count: u32,
    pub nodes: usize,
    pub edges: usize,
    pub nodes_by_label: BTreeMap<String, usize>,
    pub edges_by_kind: BTreeMap<RelationshipKind, usize>,
    pub cross_account: CrossAccountSummary,
}

impl GraphSummary {
    pub fn from_graph(graph: &ResourceGraph) -> Self {
        let mut nodes_by_label = BTreeMap::new();
        for node in graph.nodes() {
            *nodes_by_label
                .entry(node.label.as_str().to_string())
                .or_default() += 1;
        }

        let mut edges_by_kind = BTreeMap::new();
        for kind in RelationshipKind::ALL {
            let count = count_of(&graph.query(&GraphQuery::EdgeCount { kind: Some(*kind) }));
            if count > 0 {
                edges_by_kind.insert(*kind, count);
            }
        }

        let nodes = count_of(&graph.query(&GraphQuery::NodeCount { label: None }));
        let edges = count_of(&graph.query(&GraphQuery::EdgeCount { kind: None }));
        let connections = graph.query(&GraphQuery::CrossAccountConnections);

        Self {
            account_id: graph.metadata.account_id.clone(),
            run_count: graph.metadata.run_count,
            nodes,
            edges,
            nodes_by_label,
            edges_by_kind,
            cross_account: CrossAccountSummary::from_rows(&connections),
        }
    }
}

fn count_of(rows: &[QueryRecord]) -> usize {
    rows.first()
        .and_then(|row| row.get("count"))
        .and_then(Value::as_u64)
        .unwrap_or(0) as usize
}

/// Open the saved graph at `input`, or at the configured output path.
pub(crate) fn open_saved_graph(
    input: Option<String>,
    config: &SkymapConfig,
) -> Result<(MemoryStore, String), CliError> {
    let path = input
        .map(PathBuf::from)
        .unwrap_or_else(|| config.graph.output_path.clone());
    let display = path.display().to_string();

    if !path.exists() {
        return Err(CliError::GraphNotFound { path: display });
    }
    let store = MemoryStore::open(&path).map_err(|source| CliError::Graph {
        path: display.clone(),
        source,
    })?;
    Ok((store, display))
}

/// Run the `skymap summary` command.
pub fn run_summary(
    options: SummaryOptions,
    config: &SkymapConfig,
) -> Result<GraphSummary, CliError> {
    let (store, display) = open_saved_graph(options.input, config)?;
    let summary = GraphSummary::from_graph(store.graph());

    output::heading(&format!("Resource graph: {display}"));
    output::stat(
        "Account",
        summary.account_id.as_deref().unwrap_or("(unknown)"),
    );
    output::stat("Projection runs", summary.run_count);
    output::stat("Nodes", summary.nodes);
    output::stat("Edges", summary.edges);

    output::heading("Nodes by label");
    for (label, count) in &summary.nodes_by_label {
        output::stat(label, count);
    }

    output::heading("Edges by kind");
    for (kind, count) in &summary.edges_by_kind {
        output::stat(kind.as_str(), count);
    }

    output::heading("Cross-account connectivity");
    if summary.cross_account.is_empty() {
        output::info("No cross-account connections");
    } else {
        for ((source, target), count) in &summary.cross_account.by_account_pair {
            output::connection(source, target, format!("{count} connection(s)"));
        }
        for (kind, count) in &summary.cross_account.by_mechanism {
            output::stat(kind.as_str(), count);
        }
    }

    Ok(summary)
}
