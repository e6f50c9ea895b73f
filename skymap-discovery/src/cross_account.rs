//! Account-to-account connectivity through shared network plumbing.
//!
//! A transit gateway attachment owned by another account, or a VPC peering
//! connection with a foreign side, means traffic can flow between the two
//! accounts. The detector turns each of those into a [`CrossAccountLink`]
//! directed from the current account to the remote one.

use crate::expand::ExpansionFailure;
use crate::fetch::DetailFetcher;
use crate::flatten::flatten_properties;
use crate::props::{FieldMap, array_at, nested_str, str_at};
use crate::record::ResourceRecord;
use skymap_graph::{NodeRef, Properties, RelationshipKind};
use std::fmt;

const TRANSIT_GATEWAY: &str = "AWS::EC2::TransitGateway";
const PEERING_CONNECTION: &str = "AWS::EC2::VPCPeeringConnection";

/// How two accounts are connected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ConnectionMechanism {
    TransitGateway,
    VpcPeering,
}

impl ConnectionMechanism {
    pub fn relationship(self) -> RelationshipKind {
        match self {
            ConnectionMechanism::TransitGateway => RelationshipKind::ConnectedViaTransitGateway,
            ConnectionMechanism::VpcPeering => RelationshipKind::ConnectedViaVpcPeering,
        }
    }

    /// Human-readable connection type stored on the edge.
    pub fn connection_type(self) -> &'static str {
        match self {
            ConnectionMechanism::TransitGateway => "Transit Gateway VPC Attachment",
            ConnectionMechanism::VpcPeering => "VPC Peering Connection",
        }
    }
}

impl fmt::Display for ConnectionMechanism {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionMechanism::TransitGateway => write!(f, "transit gateway"),
            ConnectionMechanism::VpcPeering => write!(f, "VPC peering"),
        }
    }
}

/// A directed connection from the current account to a remote one.
#[derive(Debug, Clone, PartialEq)]
pub struct CrossAccountLink {
    pub source_account: String,
    pub target_account: String,
    pub mechanism: ConnectionMechanism,
    pub properties: Properties,
}

/// Refreshed fields for a peering connection node.
#[derive(Debug, Clone, PartialEq)]
pub struct PeeringUpdate {
    pub node: NodeRef,
    pub properties: Properties,
}

/// Everything one detection pass found.
#[derive(Debug, Default)]
pub struct CrossAccountDetection {
    pub links: Vec<CrossAccountLink>,
    pub peering_updates: Vec<PeeringUpdate>,
    pub failures: Vec<ExpansionFailure>,
}

/// Finds cross-account links for one account.
pub struct CrossAccountDetector {
    account_id: String,
}

impl CrossAccountDetector {
    pub fn new(account_id: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
        }
    }

    /// Re-fetch every transit gateway and peering connection in `records`.
    /// Failed fetches are recorded and skipped.
    pub async fn detect(
        &self,
        records: &[ResourceRecord],
        fetcher: &dyn DetailFetcher,
    ) -> CrossAccountDetection {
        let mut out = CrossAccountDetection::default();

        for record in records.iter().filter(|r| r.is_valid()) {
            match record.resource_type.as_str() {
                TRANSIT_GATEWAY => self.transit_gateway(record, fetcher, &mut out).await,
                PEERING_CONNECTION => self.peering_connection(record, fetcher, &mut out).await,
                _ => {}
            }
        }

        tracing::info!(
            links = out.links.len(),
            failures = out.failures.len(),
            "Cross-account detection complete"
        );
        out
    }

    async fn transit_gateway(
        &self,
        record: &ResourceRecord,
        fetcher: &dyn DetailFetcher,
        out: &mut CrossAccountDetection,
    ) {
        let response = match fetcher
            .describe("ec2", "TransitGatewayVpcAttachments", &record.id)
            .await
        {
            Ok(response) => response,
            Err(e) => {
                fail(out, "transit-gateway-attachments", &record.id, e.to_string());
                return;
            }
        };

        for attachment in array_at(&response, "TransitGatewayVpcAttachments") {
            let owner = str_at(attachment, "VpcOwnerId");
            if owner.is_empty() || owner == self.account_id {
                continue;
            }
            tracing::info!(
                source = %self.account_id,
                target = owner,
                transit_gateway = %record.id,
                "Found cross-account transit gateway connection"
            );
            let properties = FieldMap::new()
                .set("transit_gateway_id", record.id.as_str())
                .copy("attachment_id", attachment, "TransitGatewayAttachmentId")
                .copy("vpc_id", attachment, "VpcId")
                .copy("state", attachment, "State")
                .set(
                    "connection_type",
                    ConnectionMechanism::TransitGateway.connection_type(),
                )
                .build();
            out.links.push(self.link(
                owner,
                ConnectionMechanism::TransitGateway,
                flatten_properties(&properties),
            ));
        }
    }

    async fn peering_connection(
        &self,
        record: &ResourceRecord,
        fetcher: &dyn DetailFetcher,
        out: &mut CrossAccountDetection,
    ) {
        let response = match fetcher
            .describe("ec2", "VpcPeeringConnections", &record.id)
            .await
        {
            Ok(response) => response,
            Err(e) => {
                fail(out, "vpc-peering", &record.id, e.to_string());
                return;
            }
        };

        for peering in array_at(&response, "VpcPeeringConnections") {
            let accepter_owner = nested_str(peering, &["AccepterVpcInfo", "OwnerId"]);
            let requester_owner = nested_str(peering, &["RequesterVpcInfo", "OwnerId"]);

            let refreshed = FieldMap::new()
                .set("peering_connection_id", record.id.as_str())
                .copy_nested("accepter_vpc_id", peering, &["AccepterVpcInfo", "VpcId"])
                .set("accepter_owner_id", accepter_owner)
                .copy_nested("accepter_region", peering, &["AccepterVpcInfo", "Region"])
                .copy_nested("requester_vpc_id", peering, &["RequesterVpcInfo", "VpcId"])
                .set("requester_owner_id", requester_owner)
                .copy_nested("requester_region", peering, &["RequesterVpcInfo", "Region"])
                .copy_nested("status_code", peering, &["Status", "Code"])
                .copy_nested("status_message", peering, &["Status", "Message"])
                .copy("expiration_time", peering, "ExpirationTime")
                .build();
            match record.node_ref(&self.account_id) {
                Ok(node) => out.peering_updates.push(PeeringUpdate {
                    node,
                    properties: flatten_properties(&refreshed),
                }),
                Err(e) => tracing::debug!(peering = %record.id, error = %e, "Peering node has no identity"),
            }

            // Each side is checked on its own; both may be foreign
            for owner in [accepter_owner, requester_owner] {
                if owner.is_empty() || owner == self.account_id {
                    continue;
                }
                tracing::info!(
                    source = %self.account_id,
                    target = owner,
                    peering = %record.id,
                    "Found cross-account VPC peering connection"
                );
                let properties = FieldMap::new()
                    .set("peering_connection_id", record.id.as_str())
                    .copy_nested("accepter_vpc_id", peering, &["AccepterVpcInfo", "VpcId"])
                    .copy_nested("requester_vpc_id", peering, &["RequesterVpcInfo", "VpcId"])
                    .copy_nested("status", peering, &["Status", "Code"])
                    .set(
                        "connection_type",
                        ConnectionMechanism::VpcPeering.connection_type(),
                    )
                    .build();
                out.links.push(self.link(
                    owner,
                    ConnectionMechanism::VpcPeering,
                    flatten_properties(&properties),
                ));
            }
        }
    }

    fn link(
        &self,
        remote: &str,
        mechanism: ConnectionMechanism,
        properties: Properties,
    ) -> CrossAccountLink {
        CrossAccountLink {
            source_account: self.account_id.clone(),
            target_account: remote.to_string(),
            mechanism,
            properties,
        }
    }
}

fn fail(out: &mut CrossAccountDetection, step: &'static str, parent: &str, error: String) {
    tracing::warn!(step, parent, error = %error, "Cross-account detection step failed");
    out.failures.push(ExpansionFailure {
        pattern: step,
        parent: parent.to_string(),
        error,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expand::test_support::{CannedFetcher, record};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use skymap_graph::PropertyValue;

    fn peering(accepter: &str, requester: &str) -> serde_json::Value {
        json!({"VpcPeeringConnections": [{
            "VpcPeeringConnectionId": "pcx-1",
            "AccepterVpcInfo": {"OwnerId": accepter, "VpcId": "vpc-a", "Region": "us-east-1"},
            "RequesterVpcInfo": {"OwnerId": requester, "VpcId": "vpc-r", "Region": "us-west-2"},
            "Status": {"Code": "active", "Message": "Active"}
        }]})
    }

    #[tokio::test]
    async fn test_both_foreign_sides_yield_two_links() {
        let records = vec![record(PEERING_CONNECTION, "pcx-1")];
        let fetcher =
            CannedFetcher::new().with("ec2", "VpcPeeringConnections", "pcx-1", peering("222", "333"));

        let detection = CrossAccountDetector::new("111").detect(&records, &fetcher).await;

        let pairs: Vec<(&str, &str)> = detection
            .links
            .iter()
            .map(|l| (l.source_account.as_str(), l.target_account.as_str()))
            .collect();
        assert_eq!(pairs, vec![("111", "222"), ("111", "333")]);
        assert!(
            detection
                .links
                .iter()
                .all(|l| l.mechanism == ConnectionMechanism::VpcPeering)
        );
        assert_eq!(
            detection.links[0].properties.get("status"),
            Some(&PropertyValue::from("active"))
        );
    }

    #[tokio::test]
    async fn test_same_account_peering_has_no_link_but_updates_node() {
        let records = vec![record(PEERING_CONNECTION, "pcx-1")];
        let fetcher =
            CannedFetcher::new().with("ec2", "VpcPeeringConnections", "pcx-1", peering("111", "111"));

        let detection = CrossAccountDetector::new("111").detect(&records, &fetcher).await;

        assert!(detection.links.is_empty());
        assert_eq!(detection.peering_updates.len(), 1);
        let update = &detection.peering_updates[0];
        assert_eq!(
            update.node.key.as_str(),
            "arn:aws:ec2:us-east-1:111:vpcpeeringconnection/pcx-1"
        );
        assert_eq!(
            update.properties.get("requester_region"),
            Some(&PropertyValue::from("us-west-2"))
        );
    }

    #[tokio::test]
    async fn test_transit_gateway_foreign_attachments() {
        let records = vec![record(TRANSIT_GATEWAY, "tgw-1")];
        let fetcher = CannedFetcher::new().with(
            "ec2",
            "TransitGatewayVpcAttachments",
            "tgw-1",
            json!({"TransitGatewayVpcAttachments": [
                {"TransitGatewayAttachmentId": "att-1", "VpcId": "vpc-1", "VpcOwnerId": "111", "State": "available"},
                {"TransitGatewayAttachmentId": "att-2", "VpcId": "vpc-2", "VpcOwnerId": "444", "State": "available"}
            ]}),
        );

        let detection = CrossAccountDetector::new("111").detect(&records, &fetcher).await;

        assert_eq!(detection.links.len(), 1);
        let link = &detection.links[0];
        assert_eq!(link.target_account, "444");
        assert_eq!(link.mechanism.relationship(), RelationshipKind::ConnectedViaTransitGateway);
        assert_eq!(
            link.properties.get("attachment_id"),
            Some(&PropertyValue::from("att-2"))
        );
        assert_eq!(
            link.properties.get("connection_type"),
            Some(&PropertyValue::from("Transit Gateway VPC Attachment"))
        );
    }

    #[tokio::test]
    async fn test_fetch_failure_is_isolated() {
        let records = vec![
            record(TRANSIT_GATEWAY, "tgw-1"),
            record(PEERING_CONNECTION, "pcx-1"),
        ];
        let fetcher = CannedFetcher::new()
            .with("ec2", "VpcPeeringConnections", "pcx-1", peering("222", "111"))
            .failing("ec2", "TransitGatewayVpcAttachments");

        let detection = CrossAccountDetector::new("111").detect(&records, &fetcher).await;

        assert_eq!(detection.links.len(), 1);
        assert_eq!(detection.failures.len(), 1);
        assert_eq!(detection.failures[0].parent, "tgw-1");
    }
}
