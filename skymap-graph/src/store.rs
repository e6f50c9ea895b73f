//! The storage collaborator seam and its in-memory implementation.

use crate::edge::{Edge, RelationshipKind};
use crate::error::GraphError;
use crate::graph::{ResourceGraph, UpsertOutcome};
use crate::node::{Label, Node, NodeKey, NodeRef, Properties};
use crate::query::{GraphQuery, QueryRecord};
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::path::Path;
use thiserror::Error;

/// Errors reported by a graph store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store can no longer be reached. Fatal for a projection run.
    #[error("Graph store connection lost: {0}")]
    ConnectionLost(String),

    /// An edge endpoint does not exist. The edge is not written.
    #[error("Edge endpoint missing: {0}")]
    MissingEndpoint(String),

    /// The store refused a single write.
    #[error("Graph store rejected write: {0}")]
    Rejected(String),

    #[error(transparent)]
    Graph(#[from] GraphError),
}

impl StoreError {
    /// Whether the error means no further writes can succeed.
    pub fn is_fatal(&self) -> bool {
        matches!(self, StoreError::ConnectionLost(_))
    }
}

/// Uniqueness constraints and indexes declared on a store.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum SchemaEntry {
    /// Property values are unique among nodes of the label.
    Unique { label: Label, property: String },
    /// Property is indexed across all resource labels.
    Index { property: String },
}

/// Properties indexed on resource nodes.
pub const INDEXED_PROPERTIES: &[&str] = &["resource_type", "region", "account_id", "service"];

/// A property graph store with create-or-merge writes.
///
/// Calls are synchronous and made from a single projection task; an
/// implementation does not need to be shareable across threads.
pub trait GraphStore {
    /// Create the node or merge `properties` into it (last write wins).
    fn upsert_node(
        &mut self,
        label: &Label,
        key: &NodeKey,
        properties: Properties,
    ) -> Result<UpsertOutcome, StoreError>;

    /// Create the edge or merge `properties` into it. Edges are unique per
    /// (source, target, kind); both endpoints must already exist.
    fn upsert_edge(
        &mut self,
        source: &NodeRef,
        target: &NodeRef,
        kind: RelationshipKind,
        properties: Properties,
    ) -> Result<UpsertOutcome, StoreError>;

    /// Run a parameterized query.
    fn run_query(&self, query: &GraphQuery) -> Result<Vec<QueryRecord>, StoreError>;

    /// Delete everything. Only used when a reset is explicitly requested.
    fn reset(&mut self) -> Result<(), StoreError>;

    /// Declare uniqueness constraints and indexes. Idempotent.
    fn create_constraints_and_indexes(&mut self) -> Result<(), StoreError>;

    /// Remove nodes (and their edges) not written since `since`.
    fn prune_stale(&mut self, since: DateTime<Utc>) -> Result<usize, StoreError>;
}

/// In-memory [`GraphStore`] backed by [`ResourceGraph`].
#[derive(Default)]
pub struct MemoryStore {
    graph: ResourceGraph,
    schema: BTreeSet<SchemaEntry>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an existing graph, e.g. one loaded from a previous run.
    pub fn from_graph(graph: ResourceGraph) -> Self {
        Self {
            graph,
            schema: BTreeSet::new(),
        }
    }

    /// Load the graph at `path`, or start empty if the file does not exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, GraphError> {
        let path = path.as_ref();
        if path.exists() {
            Ok(Self::from_graph(ResourceGraph::load_from_file(path)?))
        } else {
            Ok(Self::new())
        }
    }

    /// Write the graph to `path`, creating parent directories as needed.
    pub fn persist(&self, path: impl AsRef<Path>) -> Result<(), GraphError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        self.graph.save_to_file(path)
    }

    pub fn graph(&self) -> &ResourceGraph {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut ResourceGraph {
        &mut self.graph
    }

    pub fn into_graph(self) -> ResourceGraph {
        self.graph
    }

    pub fn schema(&self) -> &BTreeSet<SchemaEntry> {
        &self.schema
    }
}

impl GraphStore for MemoryStore {
    fn upsert_node(
        &mut self,
        label: &Label,
        key: &NodeKey,
        properties: Properties,
    ) -> Result<UpsertOutcome, StoreError> {
        let node = Node::new(label.clone(), key.clone()).with_properties(properties);
        let (_, outcome) = self.graph.upsert_node(node);
        Ok(outcome)
    }

    fn upsert_edge(
        &mut self,
        source: &NodeRef,
        target: &NodeRef,
        kind: RelationshipKind,
        properties: Properties,
    ) -> Result<UpsertOutcome, StoreError> {
        let edge = Edge::new(source.clone(), target.clone(), kind).with_properties(properties);
        self.graph.upsert_edge(edge).map_err(|e| match e {
            GraphError::NodeNotFound(node) => StoreError::MissingEndpoint(node),
            other => StoreError::Graph(other),
        })
    }

    fn run_query(&self, query: &GraphQuery) -> Result<Vec<QueryRecord>, StoreError> {
        Ok(self.graph.query(query))
    }

    fn reset(&mut self) -> Result<(), StoreError> {
        self.graph.clear();
        Ok(())
    }

    fn create_constraints_and_indexes(&mut self) -> Result<(), StoreError> {
        self.schema.insert(SchemaEntry::Unique {
            label: Label::account(),
            property: "id".to_string(),
        });
        // Resource keys are structurally unique per label; record the intent
        self.schema.insert(SchemaEntry::Unique {
            label: Label::new("Resource").map_err(GraphError::from)?,
            property: "arn".to_string(),
        });
        for property in INDEXED_PROPERTIES {
            self.schema.insert(SchemaEntry::Index {
                property: property.to_string(),
            });
        }
        Ok(())
    }

    fn prune_stale(&mut self, since: DateTime<Utc>) -> Result<usize, StoreError> {
        Ok(self.graph.remove_stale(since))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::PropertyValue;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    fn key(s: &str) -> NodeKey {
        NodeKey::new(s).unwrap()
    }

    #[test]
    fn test_upsert_node_is_idempotent() {
        let mut store = MemoryStore::new();
        let label = Label::new("AWS_S3_Bucket").unwrap();

        let mut props = Properties::new();
        props.insert("name".into(), PropertyValue::from("logs"));

        let first = store.upsert_node(&label, &key("arn:aws:s3:::logs"), props.clone()).unwrap();
        let second = store.upsert_node(&label, &key("arn:aws:s3:::logs"), props).unwrap();

        assert!(first.is_created());
        assert!(!second.is_created());
        assert_eq!(store.graph().node_count(), 1);
    }

    #[test]
    fn test_upsert_edge_missing_endpoint_is_not_fatal() {
        let mut store = MemoryStore::new();
        let account = NodeRef::new(Label::account(), key("111"));
        store
            .upsert_node(&account.label, &account.key, Properties::new())
            .unwrap();

        let err = store
            .upsert_edge(
                &account,
                &NodeRef::new(Label::account(), key("222")),
                RelationshipKind::ConnectedViaVpcPeering,
                Properties::new(),
            )
            .unwrap_err();

        assert!(matches!(err, StoreError::MissingEndpoint(_)));
        assert!(!err.is_fatal());
        assert!(StoreError::ConnectionLost("socket closed".into()).is_fatal());
    }

    #[test]
    fn test_constraints_are_idempotent() {
        let mut store = MemoryStore::new();
        store.create_constraints_and_indexes().unwrap();
        let first = store.schema().len();
        store.create_constraints_and_indexes().unwrap();

        assert_eq!(store.schema().len(), first);
        assert!(store.schema().contains(&SchemaEntry::Index {
            property: "region".into()
        }));
    }

    #[test]
    fn test_reset_clears_graph() {
        let mut store = MemoryStore::new();
        store
            .upsert_node(&Label::account(), &key("111"), Properties::new())
            .unwrap();
        store.reset().unwrap();

        let rows = store.run_query(&GraphQuery::NodeCount { label: None }).unwrap();
        assert_eq!(rows[0]["count"], serde_json::Value::from(0u64));
    }

    #[test]
    fn test_open_missing_file_starts_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("graph.json");

        let mut store = MemoryStore::open(&path).unwrap();
        assert_eq!(store.graph().node_count(), 0);

        store
            .upsert_node(&Label::account(), &key("111"), Properties::new())
            .unwrap();
        store.persist(&path).unwrap();

        let reopened = MemoryStore::open(&path).unwrap();
        assert_eq!(reopened.graph().node_count(), 1);
    }
}
