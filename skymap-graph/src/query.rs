//! Typed, parameterized queries over the resource graph.
//!
//! Every query is a [`GraphQuery`] value: the statement is the variant and the
//! parameters are its fields. Labels arrive as validated [`Label`] values, so
//! nothing provider-supplied is ever spliced into query text.

use crate::edge::{Edge, RelationshipKind};
use crate::graph::ResourceGraph;
use crate::node::{Label, Node, NodeRef, PropertyValue};
use petgraph::Direction;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// One row of query output.
pub type QueryRecord = BTreeMap<String, Value>;

/// Node properties matched by [`GraphQuery::Search`].
pub const SEARCH_FIELDS: &[&str] = &["resource_type", "identifier", "service", "arn"];

/// Direction for edge traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraversalDirection {
    /// Follow outgoing edges only
    Outgoing,
    /// Follow incoming edges only
    Incoming,
    /// Follow both directions
    Both,
}

/// A query against the graph store.
#[derive(Debug, Clone, PartialEq)]
pub enum GraphQuery {
    /// `{count}` of nodes, optionally restricted to one label.
    NodeCount { label: Option<Label> },

    /// `{count}` of edges, optionally restricted to one kind.
    EdgeCount { kind: Option<RelationshipKind> },

    /// Nodes carrying a label, ordered by key.
    NodesByLabel { label: Label, limit: Option<usize> },

    /// A single node, if present.
    Node { node: NodeRef },

    /// Nodes whose property equals the given value.
    NodesWithProperty {
        label: Option<Label>,
        key: String,
        value: PropertyValue,
    },

    /// Edges of one kind.
    EdgesByKind { kind: RelationshipKind },

    /// Nodes adjacent to a node, optionally filtered by edge kind.
    Neighbors {
        node: NodeRef,
        kinds: Option<Vec<RelationshipKind>>,
        direction: TraversalDirection,
    },

    /// Account-to-account edges with their mechanism.
    CrossAccountConnections,

    /// Nodes whose type, identifier, service or ARN contains `text`,
    /// ignoring case. Ordered by key.
    Search { text: String, limit: Option<usize> },
}

impl ResourceGraph {
    /// Evaluate a query.
    pub fn query(&self, query: &GraphQuery) -> Vec<QueryRecord> {
        match query {
            GraphQuery::NodeCount { label } => {
                let count = match label {
                    Some(label) => self.nodes_by_label(label).count(),
                    None => self.node_count(),
                };
                vec![count_record(count)]
            }
            GraphQuery::EdgeCount { kind } => {
                let count = match kind {
                    Some(kind) => self.edges_by_kind(*kind).count(),
                    None => self.edge_count(),
                };
                vec![count_record(count)]
            }
            GraphQuery::NodesByLabel { label, limit } => {
                let mut nodes: Vec<&Node> = self.nodes_by_label(label).collect();
                nodes.sort_by(|a, b| a.key.as_str().cmp(b.key.as_str()));
                nodes
                    .into_iter()
                    .take(limit.unwrap_or(usize::MAX))
                    .map(node_record)
                    .collect()
            }
            GraphQuery::Node { node } => self.get_node(node).map(node_record).into_iter().collect(),
            GraphQuery::NodesWithProperty { label, key, value } => self
                .nodes()
                .filter(|n| label.as_ref().is_none_or(|l| &n.label == l))
                .filter(|n| n.properties.get(key) == Some(value))
                .map(node_record)
                .collect(),
            GraphQuery::EdgesByKind { kind } => {
                self.edges_by_kind(*kind).map(edge_record).collect()
            }
            GraphQuery::Neighbors {
                node,
                kinds,
                direction,
            } => self
                .traverse_edges(node, kinds.as_deref(), *direction)
                .into_iter()
                .map(node_record)
                .collect(),
            GraphQuery::CrossAccountConnections => {
                let mut rows: Vec<QueryRecord> = self
                    .edges()
                    .filter(|e| e.kind.is_cross_account())
                    .map(|e| {
                        let mut row = edge_record(e);
                        row.insert("source_account".into(), e.source.key.as_str().into());
                        row.insert("target_account".into(), e.target.key.as_str().into());
                        row
                    })
                    .collect();
                rows.sort_by(|a, b| {
                    let key = |r: &QueryRecord| {
                        (
                            r.get("source_account").map(Value::to_string),
                            r.get("target_account").map(Value::to_string),
                            r.get("kind").map(Value::to_string),
                        )
                    };
                    key(a).cmp(&key(b))
                });
                rows
            }
            GraphQuery::Search { text, limit } => {
                let needle = text.to_lowercase();
                let mut nodes: Vec<&Node> = self
                    .nodes()
                    .filter(|n| {
                        SEARCH_FIELDS.iter().any(|field| {
                            n.str_property(field)
                                .is_some_and(|v| v.to_lowercase().contains(&needle))
                        })
                    })
                    .collect();
                nodes.sort_by(|a, b| a.key.as_str().cmp(b.key.as_str()));
                nodes
                    .into_iter()
                    .take(limit.unwrap_or(usize::MAX))
                    .map(node_record)
                    .collect()
            }
        }
    }

    /// Find all nodes connected to a given node via specific edge kinds.
    ///
    /// # Arguments
    /// * `node_ref` - Starting node
    /// * `kinds` - Edge kinds to follow (None = all kinds)
    /// * `direction` - Outgoing, Incoming, or Both
    pub fn traverse_edges(
        &self,
        node_ref: &NodeRef,
        kinds: Option<&[RelationshipKind]>,
        direction: TraversalDirection,
    ) -> Vec<&Node> {
        if self.index_of(node_ref).is_none() {
            return vec![];
        }

        let directions: &[Direction] = match direction {
            TraversalDirection::Outgoing => &[Direction::Outgoing],
            TraversalDirection::Incoming => &[Direction::Incoming],
            TraversalDirection::Both => &[Direction::Outgoing, Direction::Incoming],
        };

        let mut result: Vec<&Node> = Vec::new();
        for &dir in directions {
            for edge in self.edges_directed(node_ref, dir) {
                if kinds.is_some_and(|k| !k.contains(&edge.kind)) {
                    continue;
                }
                let other = match dir {
                    Direction::Outgoing => &edge.target,
                    Direction::Incoming => &edge.source,
                };
                if let Some(node) = self.get_node(other) {
                    if !result.iter().any(|n| n.node_ref() == node.node_ref()) {
                        result.push(node);
                    }
                }
            }
        }
        result
    }
}

fn count_record(count: usize) -> QueryRecord {
    let mut row = QueryRecord::new();
    row.insert("count".into(), Value::from(count as u64));
    row
}

fn properties_json(props: &crate::node::Properties) -> Value {
    Value::Object(
        props
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect(),
    )
}

fn node_record(node: &Node) -> QueryRecord {
    let mut row = QueryRecord::new();
    row.insert("label".into(), node.label.as_str().into());
    row.insert("key".into(), node.key.as_str().into());
    row.insert("properties".into(), properties_json(&node.properties));
    row
}

fn edge_record(edge: &Edge) -> QueryRecord {
    let mut row = QueryRecord::new();
    row.insert("source".into(), edge.source.key.as_str().into());
    row.insert("source_label".into(), edge.source.label.as_str().into());
    row.insert("target".into(), edge.target.key.as_str().into());
    row.insert("target_label".into(), edge.target.label.as_str().into());
    row.insert("kind".into(), edge.kind.as_str().into());
    row.insert("properties".into(), properties_json(&edge.properties));
    row
}
