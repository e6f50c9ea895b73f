//! Relational database clusters, instances and snapshots.

use super::{Expansion, ExpansionContext, ExpansionError, ExpansionPattern, arn, child, matching};
use crate::props::{FieldMap, array_at, str_at};
use crate::record::ResourceRecord;
use async_trait::async_trait;
use skymap_graph::{NodeRef, RelationshipKind};

const CLUSTER: &str = "AWS::RDS::DBCluster";
const INSTANCE: &str = "AWS::RDS::DBInstance";

/// Expands RDS clusters and instances, plus the account's manual and
/// automated snapshots.
pub struct DatabasePattern;

impl DatabasePattern {
    async fn expand_cluster(
        &self,
        parent: &ResourceRecord,
        parent_ref: &NodeRef,
        ctx: &ExpansionContext<'_>,
    ) -> Result<Expansion, ExpansionError> {
        let response = ctx.fetcher.describe("rds", "DBClusters", &parent.id).await?;
        let Some(cluster) = matching(
            array_at(&response, "DBClusters"),
            "DBClusterIdentifier",
            &parent.id,
        ) else {
            return Ok(Expansion::default());
        };

        let region = parent.region.as_str();
        let mut out = Expansion::default();

        for member in array_at(cluster, "DBClusterMembers") {
            let instance_id = str_at(member, "DBInstanceIdentifier");
            if instance_id.is_empty() {
                continue;
            }
            let properties = FieldMap::new()
                .set("instance_identifier", instance_id)
                .set("cluster_identifier", parent.id.as_str())
                .copy("is_writer", member, "IsClusterWriter")
                .copy("promotion_tier", member, "PromotionTier")
                .copy("parameter_group_status", member, "DBClusterParameterGroupStatus")
                .build();
            let node = child(
                "RDSClusterMember",
                "AWS::RDS::DBClusterMember",
                instance_id,
                arn("rds", region, ctx.account_id, &format!("db:{instance_id}")),
                region,
                properties,
            )?;
            out.contain(parent_ref, node, RelationshipKind::HasMember)?;
        }

        let parameter_group = str_at(cluster, "DBClusterParameterGroup");
        if !parameter_group.is_empty() {
            let node = child(
                "RDSClusterParameterGroup",
                "AWS::RDS::DBClusterParameterGroup",
                parameter_group,
                arn("rds", region, ctx.account_id, &format!("cluster-pg:{parameter_group}")),
                region,
                FieldMap::new().set("name", parameter_group).build(),
            )?;
            out.contain(parent_ref, node, RelationshipKind::UsesParameterGroup)?;
        }

        let subnet_group = str_at(cluster, "DBSubnetGroup");
        if !subnet_group.is_empty() {
            let node = child(
                "RDSSubnetGroup",
                "AWS::RDS::DBSubnetGroup",
                subnet_group,
                arn("rds", region, ctx.account_id, &format!("subgrp:{subnet_group}")),
                region,
                FieldMap::new().set("name", subnet_group).build(),
            )?;
            out.contain(parent_ref, node, RelationshipKind::UsesSubnetGroup)?;
        }

        Ok(out)
    }

    async fn expand_instance(
        &self,
        parent: &ResourceRecord,
        parent_ref: &NodeRef,
        ctx: &ExpansionContext<'_>,
    ) -> Result<Expansion, ExpansionError> {
        let response = ctx.fetcher.describe("rds", "DBInstances", &parent.id).await?;
        let Some(instance) = matching(
            array_at(&response, "DBInstances"),
            "DBInstanceIdentifier",
            &parent.id,
        ) else {
            return Ok(Expansion::default());
        };

        let region = parent.region.as_str();
        let mut out = Expansion::default();

        for group in array_at(instance, "DBParameterGroups") {
            let name = str_at(group, "DBParameterGroupName");
            if name.is_empty() {
                continue;
            }
            let node = child(
                "RDSParameterGroup",
                "AWS::RDS::DBParameterGroup",
                name,
                arn("rds", region, ctx.account_id, &format!("pg:{name}")),
                region,
                FieldMap::new()
                    .set("name", name)
                    .copy("apply_status", group, "ParameterApplyStatus")
                    .build(),
            )?;
            out.contain(parent_ref, node, RelationshipKind::UsesParameterGroup)?;
        }

        for membership in array_at(instance, "OptionGroupMemberships") {
            let name = str_at(membership, "OptionGroupName");
            if name.is_empty() {
                continue;
            }
            let node = child(
                "RDSOptionGroup",
                "AWS::RDS::OptionGroup",
                name,
                arn("rds", region, ctx.account_id, &format!("og:{name}")),
                region,
                FieldMap::new()
                    .set("name", name)
                    .copy("status", membership, "Status")
                    .build(),
            )?;
            out.contain(parent_ref, node, RelationshipKind::UsesOptionGroup)?;
        }

        Ok(out)
    }
}

#[async_trait]
impl ExpansionPattern for DatabasePattern {
    fn name(&self) -> &'static str {
        "database"
    }

    fn parent_types(&self) -> &'static [&'static str] {
        &[CLUSTER, INSTANCE]
    }

    async fn expand(
        &self,
        parent: &ResourceRecord,
        parent_ref: &NodeRef,
        ctx: &ExpansionContext<'_>,
    ) -> Result<Expansion, ExpansionError> {
        if parent.resource_type == CLUSTER {
            self.expand_cluster(parent, parent_ref, ctx).await
        } else {
            self.expand_instance(parent, parent_ref, ctx).await
        }
    }

    /// Snapshots are listed account-wide and linked back to the instance
    /// they were taken from.
    async fn expand_account(
        &self,
        region: &str,
        ctx: &ExpansionContext<'_>,
    ) -> Result<Expansion, ExpansionError> {
        let response = ctx
            .fetcher
            .describe("rds", "DBSnapshots", ctx.account_id)
            .await?;

        let mut out = Expansion::default();
        for snapshot in array_at(&response, "DBSnapshots") {
            let snapshot_id = str_at(snapshot, "DBSnapshotIdentifier");
            if snapshot_id.is_empty() {
                continue;
            }
            let source_instance = str_at(snapshot, "DBInstanceIdentifier");
            let properties = FieldMap::new()
                .set("snapshot_identifier", snapshot_id)
                .set("source_instance", source_instance)
                .copy("snapshot_type", snapshot, "SnapshotType")
                .copy("status", snapshot, "Status")
                .copy("engine", snapshot, "Engine")
                .copy("allocated_storage", snapshot, "AllocatedStorage")
                .copy("encrypted", snapshot, "Encrypted")
                .copy("created_at", snapshot, "SnapshotCreateTime")
                .build();
            let node = child(
                "RDSSnapshot",
                "AWS::RDS::DBSnapshot",
                snapshot_id,
                arn("rds", region, ctx.account_id, &format!("snapshot:{snapshot_id}")),
                region,
                properties,
            )?;

            match ctx.resolve(INSTANCE, source_instance) {
                Some(instance_ref) => {
                    out.contain(&instance_ref, node, RelationshipKind::HasSnapshot)?;
                }
                None => {
                    out.add(node)?;
                }
            }
        }
        Ok(out)
    }
}
