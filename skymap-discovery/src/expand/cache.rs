//! In-memory cache clusters and replication groups.

use super::{Expansion, ExpansionContext, ExpansionError, ExpansionPattern, arn, child, matching};
use crate::props::{FieldMap, array_at, nested_str, str_at};
use crate::record::ResourceRecord;
use async_trait::async_trait;
use skymap_graph::{NodeRef, RelationshipKind};

const CACHE_CLUSTER: &str = "AWS::ElastiCache::CacheCluster";
const REPLICATION_GROUP: &str = "AWS::ElastiCache::ReplicationGroup";

/// Expands cache clusters into nodes and groups, and replication groups
/// into node groups and their members.
pub struct CachePattern;

impl CachePattern {
    async fn expand_cluster(
        &self,
        parent: &ResourceRecord,
        parent_ref: &NodeRef,
        ctx: &ExpansionContext<'_>,
    ) -> Result<Expansion, ExpansionError> {
        let response = ctx
            .fetcher
            .describe("elasticache", "CacheClusters", &parent.id)
            .await?;
        let Some(cluster) = matching(
            array_at(&response, "CacheClusters"),
            "CacheClusterId",
            &parent.id,
        ) else {
            return Ok(Expansion::default());
        };

        let region = parent.region.as_str();
        let mut out = Expansion::default();

        for node in array_at(cluster, "CacheNodes") {
            let node_id = str_at(node, "CacheNodeId");
            if node_id.is_empty() {
                continue;
            }
            let id = format!("{}:{node_id}", parent.id);
            let properties = FieldMap::new()
                .set("cache_node_id", node_id)
                .set("cache_cluster_id", parent.id.as_str())
                .copy("status", node, "CacheNodeStatus")
                .copy("availability_zone", node, "CustomerAvailabilityZone")
                .copy_nested("endpoint_address", node, &["Endpoint", "Address"])
                .copy_nested("endpoint_port", node, &["Endpoint", "Port"])
                .copy("created_at", node, "CacheNodeCreateTime")
                .build();
            let synthetic = child(
                "ElastiCacheNode",
                "AWS::ElastiCache::CacheNode",
                &id,
                arn("elasticache", region, ctx.account_id, &format!("cachenode:{id}")),
                region,
                properties,
            )?;
            out.contain(parent_ref, synthetic, RelationshipKind::HasNode)?;
        }

        let parameter_group = nested_str(
            cluster,
            &["CacheParameterGroup", "CacheParameterGroupName"],
        );
        if !parameter_group.is_empty() {
            let properties = FieldMap::new()
                .set("name", parameter_group)
                .copy_nested(
                    "status",
                    cluster,
                    &["CacheParameterGroup", "ParameterApplyStatus"],
                )
                .build();
            let synthetic = child(
                "ElastiCacheParameterGroup",
                "AWS::ElastiCache::ParameterGroup",
                parameter_group,
                arn(
                    "elasticache",
                    region,
                    ctx.account_id,
                    &format!("parametergroup:{parameter_group}"),
                ),
                region,
                properties,
            )?;
            out.contain(parent_ref, synthetic, RelationshipKind::UsesParameterGroup)?;
        }

        let subnet_group = str_at(cluster, "CacheSubnetGroupName");
        if !subnet_group.is_empty() {
            let synthetic = child(
                "ElastiCacheSubnetGroup",
                "AWS::ElastiCache::SubnetGroup",
                subnet_group,
                arn(
                    "elasticache",
                    region,
                    ctx.account_id,
                    &format!("subnetgroup:{subnet_group}"),
                ),
                region,
                FieldMap::new().set("name", subnet_group).build(),
            )?;
            out.contain(parent_ref, synthetic, RelationshipKind::UsesSubnetGroup)?;
        }

        Ok(out)
    }

    async fn expand_replication_group(
        &self,
        parent: &ResourceRecord,
        parent_ref: &NodeRef,
        ctx: &ExpansionContext<'_>,
    ) -> Result<Expansion, ExpansionError> {
        let response = ctx
            .fetcher
            .describe("elasticache", "ReplicationGroups", &parent.id)
            .await?;
        let Some(group) = matching(
            array_at(&response, "ReplicationGroups"),
            "ReplicationGroupId",
            &parent.id,
        ) else {
            return Ok(Expansion::default());
        };

        let region = parent.region.as_str();
        let mut out = Expansion::default();

        for node_group in array_at(group, "NodeGroups") {
            let node_group_id = str_at(node_group, "NodeGroupId");
            if node_group_id.is_empty() {
                continue;
            }
            let id = format!("{}:{node_group_id}", parent.id);
            let properties = FieldMap::new()
                .set("node_group_id", node_group_id)
                .set("replication_group_id", parent.id.as_str())
                .copy("status", node_group, "Status")
                .copy("slots", node_group, "Slots")
                .copy_nested("primary_endpoint", node_group, &["PrimaryEndpoint", "Address"])
                .copy_nested("reader_endpoint", node_group, &["ReaderEndpoint", "Address"])
                .build();
            let synthetic = child(
                "ElastiCacheNodeGroup",
                "AWS::ElastiCache::NodeGroup",
                &id,
                arn("elasticache", region, ctx.account_id, &format!("nodegroup:{id}")),
                region,
                properties,
            )?;
            let group_ref = out.contain(parent_ref, synthetic, RelationshipKind::HasNodeGroup)?;

            for member in array_at(node_group, "NodeGroupMembers") {
                let cluster_id = str_at(member, "CacheClusterId");
                if cluster_id.is_empty() {
                    continue;
                }
                let properties = FieldMap::new()
                    .set("cache_cluster_id", cluster_id)
                    .copy("cache_node_id", member, "CacheNodeId")
                    .copy("role", member, "CurrentRole")
                    .copy("availability_zone", member, "PreferredAvailabilityZone")
                    .copy_nested("read_endpoint", member, &["ReadEndpoint", "Address"])
                    .build();
                let synthetic = child(
                    "ElastiCacheNodeGroupMember",
                    "AWS::ElastiCache::NodeGroupMember",
                    cluster_id,
                    arn("elasticache", region, ctx.account_id, &format!("member:{cluster_id}")),
                    region,
                    properties,
                )?;
                out.contain(&group_ref, synthetic, RelationshipKind::HasMember)?;
            }
        }

        Ok(out)
    }
}

#[async_trait]
impl ExpansionPattern for CachePattern {
    fn name(&self) -> &'static str {
        "cache"
    }

    fn parent_types(&self) -> &'static [&'static str] {
        &[CACHE_CLUSTER, REPLICATION_GROUP]
    }

    async fn expand(
        &self,
        parent: &ResourceRecord,
        parent_ref: &NodeRef,
        ctx: &ExpansionContext<'_>,
    ) -> Result<Expansion, ExpansionError> {
        if parent.resource_type == REPLICATION_GROUP {
            self.expand_replication_group(parent, parent_ref, ctx).await
        } else {
            self.expand_cluster(parent, parent_ref, ctx).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::SubResourceExpander;
    use super::super::test_support::*;
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn fetcher() -> CannedFetcher {
        CannedFetcher::new()
            .with(
                "elasticache",
                "CacheClusters",
                "sessions",
                json!({"CacheClusters": [{
                    "CacheClusterId": "sessions",
                    "CacheNodes": [
                        {"CacheNodeId": "0001", "CacheNodeStatus": "available",
                         "Endpoint": {"Address": "sessions.0001.cache.amazonaws.com", "Port": 6379}}
                    ],
                    "CacheParameterGroup": {"CacheParameterGroupName": "default.redis7", "ParameterApplyStatus": "in-sync"},
                    "CacheSubnetGroupName": "cache-private"
                }]}),
            )
            .with(
                "elasticache",
                "ReplicationGroups",
                "rg-1",
                json!({"ReplicationGroups": [{
                    "ReplicationGroupId": "rg-1",
                    "NodeGroups": [{
                        "NodeGroupId": "0001",
                        "Status": "available",
                        "NodeGroupMembers": [
                            {"CacheClusterId": "rg-1-001", "CurrentRole": "primary"},
                            {"CacheClusterId": "rg-1-002", "CurrentRole": "replica"}
                        ]
                    }]
                }]}),
            )
    }

    #[tokio::test]
    async fn test_cache_cluster_expansion() {
        let records = vec![record(CACHE_CLUSTER, "sessions")];
        let expansion = SubResourceExpander::with_patterns(vec![Box::new(CachePattern)])
            .expand_all(&records, "111", &fetcher())
            .await;

        assert_eq!(
            keys(&expansion),
            vec![
                "arn:aws:elasticache:us-east-1:111:cachenode:sessions:0001",
                "arn:aws:elasticache:us-east-1:111:parametergroup:default.redis7",
                "arn:aws:elasticache:us-east-1:111:subnetgroup:cache-private",
            ]
        );
        assert_eq!(
            edge_kinds(&expansion),
            vec![
                RelationshipKind::HasNode,
                RelationshipKind::UsesParameterGroup,
                RelationshipKind::UsesSubnetGroup,
            ]
        );
        let node = &expansion.sub_resources[0].record;
        assert_eq!(node.str_prop("endpoint_address"), "sessions.0001.cache.amazonaws.com");
        assert_eq!(expansion.sub_resources[1].record.str_prop("status"), "in-sync");
    }

    #[tokio::test]
    async fn test_replication_group_members_hang_off_node_group() {
        let records = vec![record(REPLICATION_GROUP, "rg-1")];
        let expansion = SubResourceExpander::with_patterns(vec![Box::new(CachePattern)])
            .expand_all(&records, "111", &fetcher())
            .await;

        assert_eq!(
            edge_kinds(&expansion),
            vec![
                RelationshipKind::HasNodeGroup,
                RelationshipKind::HasMember,
                RelationshipKind::HasMember,
            ]
        );
        let group_key = "arn:aws:elasticache:us-east-1:111:nodegroup:rg-1:0001";
        assert!(
            expansion.edges[1..]
                .iter()
                .all(|e| e.source.key.as_str() == group_key)
        );
        assert_eq!(
            expansion.edges[2].target.key.as_str(),
            "arn:aws:elasticache:us-east-1:111:member:rg-1-002"
        );
    }
}
