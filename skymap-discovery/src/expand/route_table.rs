//! Route tables → individual routes → route targets.

use super::{Expansion, ExpansionContext, ExpansionError, ExpansionPattern, arn, child, matching};
use crate::props::{FieldMap, array_at, str_at};
use crate::record::ResourceRecord;
use async_trait::async_trait;
use skymap_graph::{NodeRef, Properties, RelationshipKind};

/// Route fields naming a target, and the resource type each one points at.
const ROUTE_TARGETS: &[(&str, &str)] = &[
    ("GatewayId", "AWS::EC2::InternetGateway"),
    ("NatGatewayId", "AWS::EC2::NatGateway"),
    ("InstanceId", "AWS::EC2::Instance"),
    ("NetworkInterfaceId", "AWS::EC2::NetworkInterface"),
    ("TransitGatewayId", "AWS::EC2::TransitGateway"),
    ("VpcPeeringConnectionId", "AWS::EC2::VPCPeeringConnection"),
];

/// Expands `AWS::EC2::RouteTable` into `RouteRule` nodes.
pub struct RouteTablePattern;

/// Synthesized id of the `index`th route of a table.
pub fn route_id(route_table_id: &str, index: usize) -> String {
    format!("{route_table_id}_route_{index}")
}

fn target_type(key: &str, value: &str, default: &'static str) -> &'static str {
    // Virtual private gateways share the GatewayId field with internet gateways
    if key == "GatewayId" && value.starts_with("vgw-") {
        "AWS::EC2::VPNGateway"
    } else {
        default
    }
}

#[async_trait]
impl ExpansionPattern for RouteTablePattern {
    fn name(&self) -> &'static str {
        "route-table"
    }

    fn parent_types(&self) -> &'static [&'static str] {
        &["AWS::EC2::RouteTable"]
    }

    async fn expand(
        &self,
        parent: &ResourceRecord,
        parent_ref: &NodeRef,
        ctx: &ExpansionContext<'_>,
    ) -> Result<Expansion, ExpansionError> {
        let response = ctx
            .fetcher
            .describe("ec2", "RouteTables", &parent.id)
            .await?;
        let tables = array_at(&response, "RouteTables");
        let Some(table) = matching(tables, "RouteTableId", &parent.id) else {
            return Ok(Expansion::default());
        };

        let mut out = Expansion::default();
        for (index, route) in array_at(table, "Routes").iter().enumerate() {
            let id = route_id(&parent.id, index);
            let properties = FieldMap::new()
                .set("route_table_id", parent.id.as_str())
                .set("route_index", index as u64)
                .copy("destination_cidr_block", route, "DestinationCidrBlock")
                .copy("destination_ipv6_cidr_block", route, "DestinationIpv6CidrBlock")
                .copy("destination_prefix_list_id", route, "DestinationPrefixListId")
                .copy("gateway_id", route, "GatewayId")
                .copy("nat_gateway_id", route, "NatGatewayId")
                .copy("instance_id", route, "InstanceId")
                .copy("network_interface_id", route, "NetworkInterfaceId")
                .copy("transit_gateway_id", route, "TransitGatewayId")
                .copy("vpc_peering_connection_id", route, "VpcPeeringConnectionId")
                .copy("state", route, "State")
                .copy("origin", route, "Origin")
                .build();

            let rule = child(
                "RouteRule",
                "AWS::EC2::RouteRule",
                &id,
                arn("ec2", &parent.region, ctx.account_id, &format!("route/{id}")),
                &parent.region,
                properties,
            )?;
            let rule_ref = out.contain(parent_ref, rule, RelationshipKind::HasRoute)?;

            for (key, default_type) in ROUTE_TARGETS {
                let value = str_at(route, key);
                if value.is_empty() || value == "local" {
                    continue;
                }
                let resource_type = target_type(key, value, default_type);
                match ctx.resolve(resource_type, value) {
                    Some(target) => {
                        let mut props = Properties::new();
                        props.insert("via".into(), (*key).into());
                        out.link(rule_ref.clone(), target, RelationshipKind::RoutesTo, props);
                    }
                    None => tracing::debug!(
                        route = %id,
                        target = value,
                        "Route target not among discovered resources"
                    ),
                }
            }
        }
        Ok(out)
    }
}
