//! Transit gateways: attachments, route tables and their routes.

use super::{Expansion, ExpansionContext, ExpansionError, ExpansionPattern, arn, child};
use crate::props::{FieldMap, array_at, str_at};
use crate::record::ResourceRecord;
use async_trait::async_trait;
use serde_json::Value;
use skymap_graph::{NodeRef, Properties, RelationshipKind};

/// Expands `AWS::EC2::TransitGateway`.
pub struct TransitGatewayPattern;

/// Attached resource kinds that map to a listed resource type.
fn attached_type(resource_type: &str) -> Option<&'static str> {
    match resource_type {
        "vpc" => Some("AWS::EC2::VPC"),
        "vpn" => Some("AWS::EC2::VPNConnection"),
        "direct-connect-gateway" => Some("AWS::DirectConnect::DirectConnectGateway"),
        "peering" => Some("AWS::EC2::TransitGatewayPeeringAttachment"),
        _ => None,
    }
}

impl TransitGatewayPattern {
    async fn attachments(
        &self,
        parent: &ResourceRecord,
        parent_ref: &NodeRef,
        ctx: &ExpansionContext<'_>,
    ) -> Result<Expansion, ExpansionError> {
        let response = ctx
            .fetcher
            .describe("ec2", "TransitGatewayAttachments", &parent.id)
            .await?;
        let region = parent.region.as_str();
        let mut out = Expansion::default();

        for attachment in array_at(&response, "TransitGatewayAttachments") {
            let attachment_id = str_at(attachment, "TransitGatewayAttachmentId");
            if attachment_id.is_empty() {
                continue;
            }
            let resource_type = str_at(attachment, "ResourceType");
            let resource_id = str_at(attachment, "ResourceId");
            let properties = FieldMap::new()
                .set("attachment_id", attachment_id)
                .set("transit_gateway_id", parent.id.as_str())
                .set("resource_type", resource_type)
                .set("resource_id", resource_id)
                .copy("resource_owner_id", attachment, "ResourceOwnerId")
                .copy("state", attachment, "State")
                .copy_nested("association_state", attachment, &["Association", "State"])
                .build();
            let node = child(
                "TransitGatewayAttachment",
                "AWS::EC2::TransitGatewayAttachment",
                attachment_id,
                arn(
                    "ec2",
                    region,
                    ctx.account_id,
                    &format!("transit-gateway-attachment/{attachment_id}"),
                ),
                region,
                properties,
            )?;
            let attachment_ref = out.contain(parent_ref, node, RelationshipKind::HasAttachment)?;

            let attached = attached_type(resource_type).and_then(|t| ctx.resolve(t, resource_id));
            if let Some(target) = attached {
                out.link(attachment_ref, target, RelationshipKind::ConnectsTo, Properties::new());
            }
        }
        Ok(out)
    }

    async fn route_tables(
        &self,
        parent: &ResourceRecord,
        parent_ref: &NodeRef,
        ctx: &ExpansionContext<'_>,
    ) -> Result<Expansion, ExpansionError> {
        let response = ctx
            .fetcher
            .describe("ec2", "TransitGatewayRouteTables", &parent.id)
            .await?;
        let region = parent.region.as_str();
        let mut out = Expansion::default();

        for table in array_at(&response, "TransitGatewayRouteTables") {
            let table_id = str_at(table, "TransitGatewayRouteTableId");
            if table_id.is_empty() {
                continue;
            }
            let properties = FieldMap::new()
                .set("route_table_id", table_id)
                .set("transit_gateway_id", parent.id.as_str())
                .copy("state", table, "State")
                .copy("default_association", table, "DefaultAssociationRouteTable")
                .copy("default_propagation", table, "DefaultPropagationRouteTable")
                .build();
            let node = child(
                "TransitGatewayRouteTable",
                "AWS::EC2::TransitGatewayRouteTable",
                table_id,
                arn(
                    "ec2",
                    region,
                    ctx.account_id,
                    &format!("transit-gateway-route-table/{table_id}"),
                ),
                region,
                properties,
            )?;
            let table_ref = out.contain(parent_ref, node, RelationshipKind::HasRouteTable)?;

            match ctx
                .fetcher
                .describe("ec2", "TransitGatewayRoutes", table_id)
                .await
            {
                Ok(routes) => self.routes(table_id, &table_ref, &routes, region, ctx, &mut out)?,
                Err(e) => out.fail(self.name(), table_id, e.into()),
            }
        }
        Ok(out)
    }

    fn routes(
        &self,
        table_id: &str,
        table_ref: &NodeRef,
        response: &Value,
        region: &str,
        ctx: &ExpansionContext<'_>,
        out: &mut Expansion,
    ) -> Result<(), ExpansionError> {
        for (index, route) in array_at(response, "Routes").iter().enumerate() {
            let id = format!("{table_id}_route_{index}");
            let attachment_ids: Vec<Value> = array_at(route, "TransitGatewayAttachments")
                .iter()
                .map(|a| str_at(a, "TransitGatewayAttachmentId"))
                .filter(|a| !a.is_empty())
                .map(Value::from)
                .collect();
            let properties = FieldMap::new()
                .set("route_table_id", table_id)
                .set("route_index", index as u64)
                .copy("destination_cidr_block", route, "DestinationCidrBlock")
                .copy("prefix_list_id", route, "PrefixListId")
                .copy("type", route, "Type")
                .copy("state", route, "State")
                .set("attachment_ids", attachment_ids)
                .build();
            let node = child(
                "TransitGatewayRoute",
                "AWS::EC2::TransitGatewayRoute",
                &id,
                arn(
                    "ec2",
                    region,
                    ctx.account_id,
                    &format!("transit-gateway-route/{id}"),
                ),
                region,
                properties,
            )?;
            out.contain(table_ref, node, RelationshipKind::HasRoute)?;
        }
        Ok(())
    }
}

#[async_trait]
impl ExpansionPattern for TransitGatewayPattern {
    fn name(&self) -> &'static str {
        "transit-gateway"
    }

    fn parent_types(&self) -> &'static [&'static str] {
        &["AWS::EC2::TransitGateway"]
    }

    async fn expand(
        &self,
        parent: &ResourceRecord,
        parent_ref: &NodeRef,
        ctx: &ExpansionContext<'_>,
    ) -> Result<Expansion, ExpansionError> {
        let mut out = Expansion::default();
        match self.attachments(parent, parent_ref, ctx).await {
            Ok(expansion) => out.merge(expansion),
            Err(e) => out.fail(self.name(), &parent.id, e),
        }
        match self.route_tables(parent, parent_ref, ctx).await {
            Ok(expansion) => out.merge(expansion),
            Err(e) => out.fail(self.name(), &parent.id, e),
        }
        Ok(out)
    }
}
