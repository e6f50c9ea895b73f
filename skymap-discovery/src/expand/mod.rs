//! Sub-resource expansion.
//!
//! Some resource kinds hold nested children that are meaningful on their own
//! but are not listable as top-level resources: routes inside route tables,
//! members inside database clusters, stages inside APIs. Each
//! [`ExpansionPattern`] re-fetches one parent through the [`DetailFetcher`]
//! and synthesizes a node plus a containment edge per child.
//!
//! Patterns are independent. A failed fetch is logged and recorded as an
//! [`ExpansionFailure`]; it never stops other parents or other patterns.

mod api_gateway;
mod broker;
mod cache;
mod database;
mod route_table;
mod transit_gateway;

pub use api_gateway::ApiGatewayPattern;
pub use broker::BrokerPattern;
pub use cache::CachePattern;
pub use database::DatabasePattern;
pub use route_table::RouteTablePattern;
pub use transit_gateway::TransitGatewayPattern;

use crate::error::{FetchError, RecordError};
use crate::fetch::DetailFetcher;
use crate::record::ResourceRecord;
use async_trait::async_trait;
use serde_json::{Map, Value};
use skymap_graph::{Label, NodeKey, NodeRef, Properties, RelationshipKind};
use std::collections::HashMap;
use thiserror::Error;

/// Why one expansion step failed.
#[derive(Debug, Error)]
pub enum ExpansionError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Record(#[from] RecordError),
}

/// A node synthesized for a nested child.
#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticSubResource {
    /// Same shape as a listed resource; `global_ref` is always synthesized
    pub record: ResourceRecord,
    pub label: Label,
}

impl SyntheticSubResource {
    pub fn node_ref(&self) -> Result<NodeRef, RecordError> {
        Ok(NodeRef::new(
            self.label.clone(),
            NodeKey::new(self.record.global_ref.clone())?,
        ))
    }
}

/// An edge produced by expansion.
#[derive(Debug, Clone, PartialEq)]
pub struct SubResourceEdge {
    pub source: NodeRef,
    pub target: NodeRef,
    pub kind: RelationshipKind,
    pub properties: Properties,
}

/// A recorded, non-fatal expansion failure.
#[derive(Debug, Clone)]
pub struct ExpansionFailure {
    pub pattern: &'static str,
    /// Identifier of the parent being expanded, or `account` for account-wide steps
    pub parent: String,
    pub error: String,
}

/// Nodes and edges synthesized by one or more patterns.
#[derive(Debug, Default)]
pub struct Expansion {
    pub sub_resources: Vec<SyntheticSubResource>,
    pub edges: Vec<SubResourceEdge>,
    pub failures: Vec<ExpansionFailure>,
}

impl Expansion {
    pub fn is_empty(&self) -> bool {
        self.sub_resources.is_empty() && self.edges.is_empty()
    }

    pub fn merge(&mut self, other: Expansion) {
        self.sub_resources.extend(other.sub_resources);
        self.edges.extend(other.edges);
        self.failures.extend(other.failures);
    }

    /// Add a child with no containing parent, e.g. an account-wide snapshot.
    pub(crate) fn add(&mut self, child: SyntheticSubResource) -> Result<NodeRef, RecordError> {
        let child_ref = child.node_ref()?;
        self.sub_resources.push(child);
        Ok(child_ref)
    }

    /// Add a child and its containment edge from `parent`.
    pub(crate) fn contain(
        &mut self,
        parent: &NodeRef,
        child: SyntheticSubResource,
        kind: RelationshipKind,
    ) -> Result<NodeRef, RecordError> {
        let child_ref = self.add(child)?;
        self.link(parent.clone(), child_ref.clone(), kind, Properties::new());
        Ok(child_ref)
    }

    pub(crate) fn link(
        &mut self,
        source: NodeRef,
        target: NodeRef,
        kind: RelationshipKind,
        properties: Properties,
    ) {
        self.edges.push(SubResourceEdge {
            source,
            target,
            kind,
            properties,
        });
    }

    /// Record an isolated failure and keep going.
    pub(crate) fn fail(&mut self, pattern: &'static str, parent: &str, error: ExpansionError) {
        tracing::warn!(pattern, parent, error = %error, "Sub-resource expansion step failed");
        self.failures.push(ExpansionFailure {
            pattern,
            parent: parent.to_string(),
            error: error.to_string(),
        });
    }
}

/// Exact (type, id) lookup over the full record set.
pub struct TypeIdIndex<'a> {
    map: HashMap<(&'a str, &'a str), &'a ResourceRecord>,
}

impl<'a> TypeIdIndex<'a> {
    pub fn build(records: &'a [ResourceRecord]) -> Self {
        let map = records
            .iter()
            .filter(|r| r.is_valid())
            .map(|r| ((r.resource_type.as_str(), r.id.as_str()), r))
            .collect();
        Self { map }
    }

    pub fn get(&self, resource_type: &str, id: &str) -> Option<&'a ResourceRecord> {
        self.map.get(&(resource_type, id)).copied()
    }
}

/// What a pattern needs besides its parent.
pub struct ExpansionContext<'a> {
    pub account_id: &'a str,
    pub fetcher: &'a dyn DetailFetcher,
    pub index: &'a TypeIdIndex<'a>,
}

impl ExpansionContext<'_> {
    /// Node reference of a listed resource, found by exact (type, id) match.
    pub fn resolve(&self, resource_type: &str, id: &str) -> Option<NodeRef> {
        self.index
            .get(resource_type, id)
            .and_then(|r| r.node_ref(self.account_id).ok())
    }
}

/// One parent→children decomposition.
#[async_trait]
pub trait ExpansionPattern: Send + Sync {
    /// Short name used in logs and failure reports.
    fn name(&self) -> &'static str;

    /// Resource types this pattern expands.
    fn parent_types(&self) -> &'static [&'static str];

    /// Expand one parent. Sub-steps that fail independently are recorded in
    /// the returned [`Expansion`]; an `Err` drops the whole parent.
    async fn expand(
        &self,
        parent: &ResourceRecord,
        parent_ref: &NodeRef,
        ctx: &ExpansionContext<'_>,
    ) -> Result<Expansion, ExpansionError>;

    /// Account-wide step, run once when at least one parent exists.
    async fn expand_account(
        &self,
        _region: &str,
        _ctx: &ExpansionContext<'_>,
    ) -> Result<Expansion, ExpansionError> {
        Ok(Expansion::default())
    }
}

/// Runs every registered pattern over a record set.
pub struct SubResourceExpander {
    patterns: Vec<Box<dyn ExpansionPattern>>,
}

impl Default for SubResourceExpander {
    fn default() -> Self {
        Self::standard()
    }
}

impl SubResourceExpander {
    /// The built-in patterns.
    pub fn standard() -> Self {
        Self::with_patterns(vec![
            Box::new(RouteTablePattern),
            Box::new(DatabasePattern),
            Box::new(CachePattern),
            Box::new(BrokerPattern),
            Box::new(ApiGatewayPattern),
            Box::new(TransitGatewayPattern),
        ])
    }

    pub fn with_patterns(patterns: Vec<Box<dyn ExpansionPattern>>) -> Self {
        Self { patterns }
    }

    pub fn pattern_names(&self) -> Vec<&'static str> {
        self.patterns.iter().map(|p| p.name()).collect()
    }

    /// Expand every matching parent in `records`.
    ///
    /// Parents are visited sequentially; nothing here runs concurrently.
    pub async fn expand_all(
        &self,
        records: &[ResourceRecord],
        account_id: &str,
        fetcher: &dyn DetailFetcher,
    ) -> Expansion {
        let index = TypeIdIndex::build(records);
        let ctx = ExpansionContext {
            account_id,
            fetcher,
            index: &index,
        };

        let mut out = Expansion::default();
        for pattern in &self.patterns {
            let parents: Vec<&ResourceRecord> = records
                .iter()
                .filter(|r| r.is_valid() && pattern.parent_types().contains(&r.resource_type.as_str()))
                .collect();
            if parents.is_empty() {
                continue;
            }

            for parent in &parents {
                let parent_ref = match parent.node_ref(account_id) {
                    Ok(r) => r,
                    Err(e) => {
                        out.fail(pattern.name(), &parent.id, e.into());
                        continue;
                    }
                };
                match pattern.expand(parent, &parent_ref, &ctx).await {
                    Ok(expansion) => out.merge(expansion),
                    Err(e) => out.fail(pattern.name(), &parent.id, e),
                }
            }

            match pattern.expand_account(&parents[0].region, &ctx).await {
                Ok(expansion) => out.merge(expansion),
                Err(e) => out.fail(pattern.name(), "account", e),
            }

            tracing::debug!(
                pattern = pattern.name(),
                parents = parents.len(),
                "Expanded sub-resources"
            );
        }

        tracing::info!(
            sub_resources = out.sub_resources.len(),
            edges = out.edges.len(),
            failures = out.failures.len(),
            "Sub-resource expansion complete"
        );
        out
    }
}

/// `arn:aws:{service}:{region}:{account}:{resource}`.
pub(crate) fn arn(service: &str, region: &str, account: &str, resource: &str) -> String {
    format!("arn:aws:{service}:{region}:{account}:{resource}")
}

/// Build a synthesized child.
pub(crate) fn child(
    label: &str,
    resource_type: &str,
    id: &str,
    global_ref: String,
    region: &str,
    properties: Map<String, Value>,
) -> Result<SyntheticSubResource, RecordError> {
    Ok(SyntheticSubResource {
        record: ResourceRecord::new(resource_type, id, region)
            .with_global_ref(global_ref)
            .with_properties(properties),
        label: Label::new(label)?,
    })
}

/// The entry of `items` whose `id_key` equals `id`. Entries describing
/// another parent are never used.
pub(crate) fn matching<'v>(items: &'v [Value], id_key: &str, id: &str) -> Option<&'v Value> {
    items
        .iter()
        .find(|item| item.get(id_key).and_then(Value::as_str) == Some(id))
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[tokio::test]
    async fn test_failure_in_one_pattern_does_not_block_others() {
        let records = vec![
            record("AWS::EC2::RouteTable", "rtb-1"),
            record("AWS::RDS::DBCluster", "aurora"),
            record("AWS::AmazonMQ::Broker", "b-1"),
        ];
        let fetcher = CannedFetcher::new()
            .with(
                "ec2",
                "RouteTables",
                "rtb-1",
                json!({"RouteTables": [{"RouteTableId": "rtb-1", "Routes": [
                    {"DestinationCidrBlock": "10.0.0.0/16", "GatewayId": "local"}
                ]}]}),
            )
            .with(
                "rds",
                "DBClusters",
                "aurora",
                json!({"DBClusters": [{"DBClusterIdentifier": "aurora", "DBClusterMembers": [
                    {"DBInstanceIdentifier": "aurora-1", "IsClusterWriter": true}
                ]}]}),
            )
            .with(
                "mq",
                "Broker",
                "b-1",
                json!({"BrokerInstances": [{"ConsoleURL": "https://b-1.mq.us-east-1.amazonaws.com"}]}),
            )
            .failing("mq", "BrokerUsers");

        let expansion = SubResourceExpander::standard()
            .expand_all(&records, "111", &fetcher)
            .await;

        let kinds = edge_kinds(&expansion);
        assert!(kinds.contains(&RelationshipKind::HasRoute));
        assert!(kinds.contains(&RelationshipKind::HasMember));
        assert!(kinds.contains(&RelationshipKind::HasInstance));
        assert!(!kinds.contains(&RelationshipKind::HasUser));

        let patterns: Vec<&str> = expansion.failures.iter().map(|f| f.pattern).collect();
        assert!(patterns.contains(&"broker"));
        assert!(!patterns.contains(&"route-table"));
    }

    #[tokio::test]
    async fn test_parent_failure_is_isolated_per_parent() {
        let records = vec![
            record("AWS::EC2::RouteTable", "rtb-missing"),
            record("AWS::EC2::RouteTable", "rtb-ok"),
        ];
        let fetcher = CannedFetcher::new().with(
            "ec2",
            "RouteTables",
            "rtb-ok",
            json!({"RouteTables": [{"RouteTableId": "rtb-ok", "Routes": [
                {"DestinationCidrBlock": "0.0.0.0/0", "GatewayId": "igw-1"}
            ]}]}),
        );

        let expansion = SubResourceExpander::standard()
            .expand_all(&records, "111", &fetcher)
            .await;

        assert_eq!(expansion.sub_resources.len(), 1);
        assert_eq!(expansion.failures.len(), 1);
        assert_eq!(expansion.failures[0].parent, "rtb-missing");
    }

    #[tokio::test]
    async fn test_no_parents_no_calls() {
        let records = vec![record("AWS::SNS::Topic", "alerts")];
        let fetcher = CannedFetcher::new();

        let expansion = SubResourceExpander::standard()
            .expand_all(&records, "111", &fetcher)
            .await;

        assert!(expansion.is_empty());
        assert!(fetcher.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_standard_patterns() {
        assert_eq!(
            SubResourceExpander::standard().pattern_names(),
            vec![
                "route-table",
                "database",
                "cache",
                "broker",
                "api-gateway",
                "transit-gateway"
            ]
        );
    }

    #[test]
    fn test_matching_requires_id() {
        let items = vec![json!({"Id": "a"}), json!({"Id": "b"})];
        assert_eq!(matching(&items, "Id", "b"), Some(&items[1]));
        assert_eq!(matching(&items, "Id", "z"), None);
        assert_eq!(matching(&[json!({"Name": "a"})], "Id", "a"), None);
        assert_eq!(matching(&[], "Id", "z"), None);
    }
}
