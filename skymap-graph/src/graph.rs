//! ResourceGraph - the in-memory property graph container.

use crate::edge::{Edge, RelationshipKind};
use crate::error::GraphError;
use crate::node::{Label, Node, NodeRef, Properties};
use chrono::{DateTime, Utc};
use petgraph::Direction;
use petgraph::graph::{DiGraph, EdgeIndex, NodeIndex};
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Whether an upsert created a new entity or merged into an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Updated,
}

impl UpsertOutcome {
    pub fn is_created(&self) -> bool {
        matches!(self, UpsertOutcome::Created)
    }
}

/// Metadata about the graph itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphMetadata {
    /// skymap version that created this graph
    pub skymap_version: String,

    /// When the graph was created
    pub created_at: DateTime<Utc>,

    /// When the graph was last modified
    pub modified_at: DateTime<Utc>,

    /// Number of projection runs that have updated this graph
    pub run_count: u32,

    /// Identifier of the most recent projection run
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_run_id: Option<String>,

    /// Account the most recent run projected
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,
}

impl Default for GraphMetadata {
    fn default() -> Self {
        Self {
            skymap_version: env!("CARGO_PKG_VERSION").to_string(),
            created_at: Utc::now(),
            modified_at: Utc::now(),
            run_count: 0,
            last_run_id: None,
            account_id: None,
        }
    }
}

/// JSON-serializable representation of the graph.
#[derive(Debug, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub metadata: GraphMetadata,

    pub nodes: Vec<Node>,

    pub edges: Vec<Edge>,
}

/// The in-memory resource graph.
pub struct ResourceGraph {
    /// Underlying directed graph from petgraph
    inner: DiGraph<Node, Edge>,

    /// Index from NodeRef to petgraph NodeIndex for O(1) lookup
    node_index: HashMap<NodeRef, NodeIndex>,

    pub metadata: GraphMetadata,
}

impl Default for ResourceGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceGraph {
    pub fn new() -> Self {
        Self {
            inner: DiGraph::new(),
            node_index: HashMap::new(),
            metadata: GraphMetadata::default(),
        }
    }

    // === Node Operations ===

    /// Add a node to the graph.
    /// Returns error if a node with the same label and key already exists.
    pub fn add_node(&mut self, node: Node) -> Result<NodeIndex, GraphError> {
        let node_ref = node.node_ref();
        if self.node_index.contains_key(&node_ref) {
            return Err(GraphError::DuplicateNode(node_ref.to_string()));
        }

        let idx = self.inner.add_node(node);
        self.node_index.insert(node_ref, idx);
        self.metadata.modified_at = Utc::now();
        Ok(idx)
    }

    /// Add or merge a node (upsert semantics).
    ///
    /// An existing node keeps its creation time and every property the new
    /// node does not mention; properties present on both take the new value.
    pub fn upsert_node(&mut self, node: Node) -> (NodeIndex, UpsertOutcome) {
        let node_ref = node.node_ref();
        let now = Utc::now();
        self.metadata.modified_at = now;

        if let Some(&idx) = self.node_index.get(&node_ref) {
            let existing = &mut self.inner[idx];
            existing.properties.extend(node.properties);
            existing.metadata.updated_at = now;
            (idx, UpsertOutcome::Updated)
        } else {
            let idx = self.inner.add_node(node);
            self.node_index.insert(node_ref, idx);
            (idx, UpsertOutcome::Created)
        }
    }

    pub fn get_node(&self, node_ref: &NodeRef) -> Option<&Node> {
        self.node_index.get(node_ref).map(|&idx| &self.inner[idx])
    }

    pub fn get_node_mut(&mut self, node_ref: &NodeRef) -> Option<&mut Node> {
        self.node_index
            .get(node_ref)
            .copied()
            .map(|idx| &mut self.inner[idx])
    }

    /// Remove a node and all its edges.
    pub fn remove_node(&mut self, node_ref: &NodeRef) -> Option<Node> {
        let idx = self.node_index.remove(node_ref)?;
        let removed = self.inner.remove_node(idx);
        // petgraph moves the last node into the freed slot
        self.reindex();
        self.metadata.modified_at = Utc::now();
        removed
    }

    pub fn contains_node(&self, node_ref: &NodeRef) -> bool {
        self.node_index.contains_key(node_ref)
    }

    pub fn node_count(&self) -> usize {
        self.inner.node_count()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.inner.node_weights()
    }

    pub fn nodes_by_label<'a>(&'a self, label: &'a Label) -> impl Iterator<Item = &'a Node> {
        self.inner
            .node_weights()
            .filter(move |n| &n.label == label)
    }

    // === Edge Operations ===

    /// Add an edge to the graph.
    /// Validates that both endpoints exist and the edge is new.
    pub fn add_edge(&mut self, edge: Edge) -> Result<EdgeIndex, GraphError> {
        let (source_idx, target_idx) = self.endpoints(&edge)?;

        if self.find_edge(source_idx, target_idx, edge.kind).is_some() {
            return Err(GraphError::DuplicateEdge {
                source_node: edge.source.to_string(),
                target_node: edge.target.to_string(),
                kind: edge.kind,
            });
        }

        let idx = self.inner.add_edge(source_idx, target_idx, edge);
        self.metadata.modified_at = Utc::now();
        Ok(idx)
    }

    /// Add or merge an edge keyed by (source, target, kind).
    ///
    /// Merging keeps the discovery time and overwrites properties present in
    /// the new edge. Fails with `NodeNotFound` when an endpoint is missing.
    pub fn upsert_edge(&mut self, edge: Edge) -> Result<UpsertOutcome, GraphError> {
        let (source_idx, target_idx) = self.endpoints(&edge)?;
        let now = Utc::now();
        self.metadata.modified_at = now;

        match self.find_edge(source_idx, target_idx, edge.kind) {
            Some(edge_idx) => {
                let existing = &mut self.inner[edge_idx];
                existing.properties.extend(edge.properties);
                existing.metadata.updated_at = now;
                Ok(UpsertOutcome::Updated)
            }
            None => {
                self.inner.add_edge(source_idx, target_idx, edge);
                Ok(UpsertOutcome::Created)
            }
        }
    }

    fn endpoints(&self, edge: &Edge) -> Result<(NodeIndex, NodeIndex), GraphError> {
        let source_idx = *self
            .node_index
            .get(&edge.source)
            .ok_or_else(|| GraphError::NodeNotFound(edge.source.to_string()))?;
        let target_idx = *self
            .node_index
            .get(&edge.target)
            .ok_or_else(|| GraphError::NodeNotFound(edge.target.to_string()))?;
        Ok((source_idx, target_idx))
    }

    fn find_edge(
        &self,
        source: NodeIndex,
        target: NodeIndex,
        kind: RelationshipKind,
    ) -> Option<EdgeIndex> {
        self.inner
            .edges_connecting(source, target)
            .find(|e| e.weight().kind == kind)
            .map(|e| e.id())
    }

    /// Get the edge with the given endpoints and kind.
    pub fn get_edge(
        &self,
        source: &NodeRef,
        target: &NodeRef,
        kind: RelationshipKind,
    ) -> Option<&Edge> {
        let source_idx = *self.node_index.get(source)?;
        let target_idx = *self.node_index.get(target)?;
        self.find_edge(source_idx, target_idx, kind)
            .map(|idx| &self.inner[idx])
    }

    /// Get all edges from a node.
    pub fn edges_from(&self, node_ref: &NodeRef) -> Vec<&Edge> {
        self.edges_directed(node_ref, Direction::Outgoing)
    }

    /// Get all edges to a node.
    pub fn edges_to(&self, node_ref: &NodeRef) -> Vec<&Edge> {
        self.edges_directed(node_ref, Direction::Incoming)
    }

    pub(crate) fn edges_directed(&self, node_ref: &NodeRef, direction: Direction) -> Vec<&Edge> {
        self.node_index
            .get(node_ref)
            .map(|&idx| {
                self.inner
                    .edges_directed(idx, direction)
                    .map(|e| e.weight())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn edge_count(&self) -> usize {
        self.inner.edge_count()
    }

    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.inner.edge_weights()
    }

    pub fn edges_by_kind(&self, kind: RelationshipKind) -> impl Iterator<Item = &Edge> {
        self.inner.edge_weights().filter(move |e| e.kind == kind)
    }

    // === Bulk Operations ===

    /// Merge properties into an existing node without touching its label or key.
    pub fn merge_properties(
        &mut self,
        node_ref: &NodeRef,
        properties: Properties,
    ) -> Result<(), GraphError> {
        let node = self
            .get_node_mut(node_ref)
            .ok_or_else(|| GraphError::NodeNotFound(node_ref.to_string()))?;
        node.properties.extend(properties);
        node.metadata.updated_at = Utc::now();
        Ok(())
    }

    /// Remove every node and edge not written since `since`.
    ///
    /// Returns the number of nodes removed. Edges attached to removed nodes
    /// go with them.
    pub fn remove_stale(&mut self, since: DateTime<Utc>) -> usize {
        let before = self.inner.node_count();
        self.inner
            .retain_edges(|g, idx| g[idx].metadata.updated_at >= since);
        self.inner
            .retain_nodes(|g, idx| g[idx].metadata.updated_at >= since);
        self.reindex();
        self.metadata.modified_at = Utc::now();
        before - self.inner.node_count()
    }

    /// Remove all nodes and edges. Metadata survives.
    pub fn clear(&mut self) {
        self.inner.clear();
        self.node_index.clear();
        self.metadata.modified_at = Utc::now();
    }

    fn reindex(&mut self) {
        self.node_index = self
            .inner
            .node_indices()
            .map(|idx| (self.inner[idx].node_ref(), idx))
            .collect();
    }

    // === Serialization ===

    fn snapshot(&self) -> GraphSnapshot {
        GraphSnapshot {
            metadata: self.metadata.clone(),
            nodes: self.inner.node_weights().cloned().collect(),
            edges: self.inner.edge_weights().cloned().collect(),
        }
    }

    fn from_snapshot(snapshot: GraphSnapshot) -> Result<Self, GraphError> {
        let mut graph = Self::new();

        // Nodes first so every edge finds its endpoints
        for node in snapshot.nodes {
            graph.add_node(node)?;
        }
        for edge in snapshot.edges {
            graph.add_edge(edge)?;
        }

        graph.metadata = snapshot.metadata;
        Ok(graph)
    }

    /// Serialize the graph to a JSON file.
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<(), GraphError> {
        let file = std::fs::File::create(path.as_ref())?;
        let writer = std::io::BufWriter::new(file);
        serde_json::to_writer_pretty(writer, &self.snapshot())
            .map_err(|e| GraphError::SerializationError(e.to_string()))?;

        Ok(())
    }

    /// Load a graph from a JSON file.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, GraphError> {
        let file = std::fs::File::open(path.as_ref())?;
        let reader = std::io::BufReader::new(file);
        let snapshot: GraphSnapshot = serde_json::from_reader(reader)
            .map_err(|e| GraphError::DeserializationError(e.to_string()))?;

        Self::from_snapshot(snapshot)
    }

    pub fn to_json(&self) -> Result<String, GraphError> {
        serde_json::to_string_pretty(&self.snapshot())
            .map_err(|e| GraphError::SerializationError(e.to_string()))
    }

    pub fn from_json(json: &str) -> Result<Self, GraphError> {
        let snapshot: GraphSnapshot = serde_json::from_str(json)
            .map_err(|e| GraphError::DeserializationError(e.to_string()))?;

        Self::from_snapshot(snapshot)
    }

    /// Get the internal petgraph for advanced operations.
    pub fn inner(&self) -> &DiGraph<Node, Edge> {
        &self.inner
    }

    pub(crate) fn index_of(&self, node_ref: &NodeRef) -> Option<NodeIndex> {
        self.node_index.get(node_ref).copied()
    }
}
