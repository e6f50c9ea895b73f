//! # skymap-graph
//!
//! Property graph data structures for skymap.
//!
//! This crate provides the storage side of the resource-graph projection:
//!
//! - **Labels and keys**: validated [`Label`] identifiers and [`NodeKey`] upsert keys
//! - **Relationship kinds**: ownership, inferred, containment and cross-account edges
//! - **ResourceGraph**: petgraph-backed container with create-or-merge semantics
//! - **GraphStore**: the storage seam, with [`MemoryStore`] as its in-memory implementation
//! - **Queries**: typed, parameterized [`GraphQuery`] values
//! - **Serialization**: JSON persistence for graphs
//!
//! ## Example
//!
//! ```rust
//! use skymap_graph::{GraphQuery, GraphStore, Label, MemoryStore, NodeKey, NodeRef, Properties, RelationshipKind};
//!
//! let mut store = MemoryStore::new();
//!
//! let account = NodeRef::new(Label::account(), NodeKey::new("111122223333").unwrap());
//! let vpc = NodeRef::new(
//!     Label::for_resource_type("AWS::EC2::VPC").unwrap(),
//!     NodeKey::new("arn:aws:ec2:us-east-1:111122223333:vpc/vpc-1").unwrap(),
//! );
//!
//! store.upsert_node(&account.label, &account.key, Properties::new()).unwrap();
//! store.upsert_node(&vpc.label, &vpc.key, Properties::new()).unwrap();
//! store.upsert_edge(&account, &vpc, RelationshipKind::Owns, Properties::new()).unwrap();
//!
//! // Writing the same edge again merges instead of duplicating
//! store.upsert_edge(&account, &vpc, RelationshipKind::Owns, Properties::new()).unwrap();
//!
//! let rows = store.run_query(&GraphQuery::EdgeCount { kind: None }).unwrap();
//! assert_eq!(rows[0]["count"], 1);
//! ```

pub mod edge;
pub mod error;
pub mod graph;
pub mod node;
pub mod query;
pub mod store;

pub use edge::{Edge, EdgeMetadata, RelationshipKind, UnknownRelationshipKind};
pub use error::GraphError;
pub use graph::{GraphMetadata, GraphSnapshot, ResourceGraph, UpsertOutcome};
pub use node::{
    GLOBAL_REGION, Label, LabelError, Node, NodeKey, NodeKeyError, NodeMetadata, NodeRef,
    Properties, PropertyValue,
};
pub use query::{GraphQuery, QueryRecord, SEARCH_FIELDS, TraversalDirection};
pub use store::{GraphStore, INDEXED_PROPERTIES, MemoryStore, SchemaEntry, StoreError};

#[cfg(test)]
mod integration_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn resource(resource_type: &str, key: &str) -> NodeRef {
        NodeRef::new(
            Label::for_resource_type(resource_type).unwrap(),
            NodeKey::new(key).unwrap(),
        )
    }

    #[test]
    fn test_store_round_trip_through_json() {
        let mut store = MemoryStore::new();
        let account = NodeRef::new(Label::account(), NodeKey::new("111").unwrap());
        let table = resource("AWS::DynamoDB::Table", "arn:aws:dynamodb:us-east-1:111:table/orders");

        let mut props = Properties::new();
        props.insert("region".into(), PropertyValue::from("us-east-1"));
        props.insert("ItemCount".into(), PropertyValue::Integer(42));

        store.upsert_node(&account.label, &account.key, Properties::new()).unwrap();
        store.upsert_node(&table.label, &table.key, props).unwrap();
        store
            .upsert_edge(&account, &table, RelationshipKind::Owns, Properties::new())
            .unwrap();

        let json = store.graph().to_json().unwrap();
        let restored = ResourceGraph::from_json(&json).unwrap();

        assert_eq!(restored.node_count(), 2);
        assert_eq!(restored.edge_count(), 1);
        let node = restored.get_node(&table).unwrap();
        assert_eq!(node.property("ItemCount"), Some(&PropertyValue::Integer(42)));
    }

    #[test]
    fn test_labels_partition_nodes() {
        let mut store = MemoryStore::new();
        for (ty, key) in [
            ("AWS::EC2::VPC", "vpc-a"),
            ("AWS::EC2::VPC", "vpc-b"),
            ("AWS::EC2::Subnet", "subnet-a"),
        ] {
            let node = resource(ty, key);
            store.upsert_node(&node.label, &node.key, Properties::new()).unwrap();
        }

        let rows = store
            .run_query(&GraphQuery::NodeCount {
                label: Some(Label::new("AWS_EC2_VPC").unwrap()),
            })
            .unwrap();
        assert_eq!(rows[0]["count"], 2);
    }
}
