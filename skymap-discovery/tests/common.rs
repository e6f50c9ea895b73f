#![allow(dead_code)]

use chrono::{DateTime, Utc};
use skymap_discovery::{Enumerator, ResourceRecord, SnapshotSource};
use skymap_graph::{
    GraphQuery, GraphStore, Label, MemoryStore, NodeKey, NodeRef, Properties, QueryRecord,
    RelationshipKind, StoreError, UpsertOutcome,
};
use std::fs;
use std::path::Path;
use std::sync::Arc;

pub const ACCOUNT: &str = "111122223333";

/// A small account: one VPC with a subnet and route table, an IAM role,
/// a transit gateway shared with another account and a peering connection.
pub const SNAPSHOT: &str = r#"
account_id: "111122223333"
region: us-east-1
resources:
  AWS::EC2::VPC:
    - id: vpc-1
      properties: { VpcId: vpc-1, CidrBlock: 10.0.0.0/16 }
  AWS::EC2::Subnet:
    - id: subnet-1
      properties: { SubnetId: subnet-1, VpcId: vpc-1, CidrBlock: 10.0.1.0/24 }
  AWS::EC2::InternetGateway:
    - id: igw-1
      properties: { InternetGatewayId: igw-1 }
  AWS::EC2::RouteTable:
    - id: rtb-1
      properties: { RouteTableId: rtb-1, VpcId: vpc-1 }
  AWS::EC2::TransitGateway:
    - id: tgw-1
      properties: { TransitGatewayId: tgw-1 }
  AWS::EC2::VPCPeeringConnection:
    - id: pcx-1
      properties: { VpcPeeringConnectionId: pcx-1 }
  AWS::IAM::Role:
    - id: app-role
      properties:
        RoleName: app-role
        Arn: "arn:aws:iam::111122223333:role/app-role"
details:
  - service: ec2
    kind: RouteTables
    id: rtb-1
    response:
      RouteTables:
        - RouteTableId: rtb-1
          Routes:
            - { DestinationCidrBlock: 10.0.0.0/16, GatewayId: local, State: active }
            - { DestinationCidrBlock: 0.0.0.0/0, GatewayId: igw-1, State: active }
  - service: ec2
    kind: TransitGatewayVpcAttachments
    id: tgw-1
    response:
      TransitGatewayVpcAttachments:
        - { TransitGatewayAttachmentId: tgw-attach-9, VpcId: vpc-remote, VpcOwnerId: "444455556666", State: available }
  - service: ec2
    kind: VpcPeeringConnections
    id: pcx-1
    response:
      VpcPeeringConnections:
        - VpcPeeringConnectionId: pcx-1
          AccepterVpcInfo: { OwnerId: "777788889999", VpcId: vpc-a, Region: eu-west-1 }
          RequesterVpcInfo: { OwnerId: "111122223333", VpcId: vpc-1, Region: us-east-1 }
          Status: { Code: active, Message: Active }
failures:
  AWS::SNS::Topic: InternalFailure
"#;

pub fn snapshot() -> SnapshotSource {
    SnapshotSource::from_yaml(SNAPSHOT).unwrap()
}

/// Enumerate every type the snapshot knows about.
pub async fn enumerate(source: Arc<SnapshotSource>) -> Vec<ResourceRecord> {
    let types = source.resource_types();
    let enumerator = Enumerator::new(source);
    let account = enumerator.account().await.unwrap();
    enumerator.run(&account, &types).await.records
}

pub fn account_node(id: &str) -> NodeRef {
    NodeRef::new(Label::account(), NodeKey::new(id).unwrap())
}

pub fn node(resource_type: &str, key: &str) -> NodeRef {
    NodeRef::new(
        Label::for_resource_type(resource_type).unwrap(),
        NodeKey::new(key).unwrap(),
    )
}

pub fn edge_count(store: &MemoryStore, kind: RelationshipKind) -> usize {
    store.graph().edges_by_kind(kind).count()
}

pub fn write_file(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

/// A store whose connection drops after a fixed number of node writes.
pub struct FlakyStore {
    pub inner: MemoryStore,
    pub writes_before_loss: usize,
    pub writes: usize,
}

impl FlakyStore {
    pub fn new(writes_before_loss: usize) -> Self {
        Self {
            inner: MemoryStore::new(),
            writes_before_loss,
            writes: 0,
        }
    }
}

impl GraphStore for FlakyStore {
    fn upsert_node(
        &mut self,
        label: &Label,
        key: &NodeKey,
        properties: Properties,
    ) -> Result<UpsertOutcome, StoreError> {
        if self.writes >= self.writes_before_loss {
            return Err(StoreError::ConnectionLost("socket closed".into()));
        }
        self.writes += 1;
        self.inner.upsert_node(label, key, properties)
    }

    fn upsert_edge(
        &mut self,
        source: &NodeRef,
        target: &NodeRef,
        kind: RelationshipKind,
        properties: Properties,
    ) -> Result<UpsertOutcome, StoreError> {
        self.inner.upsert_edge(source, target, kind, properties)
    }

    fn run_query(&self, query: &GraphQuery) -> Result<Vec<QueryRecord>, StoreError> {
        self.inner.run_query(query)
    }

    fn reset(&mut self) -> Result<(), StoreError> {
        self.inner.reset()
    }

    fn create_constraints_and_indexes(&mut self) -> Result<(), StoreError> {
        self.inner.create_constraints_and_indexes()
    }

    fn prune_stale(&mut self, since: DateTime<Utc>) -> Result<usize, StoreError> {
        self.inner.prune_stale(since)
    }
}
