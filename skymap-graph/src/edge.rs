//! Relationship kinds and edge structures for the resource graph.

use crate::node::{NodeRef, Properties, PropertyValue};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Error returned when parsing an unknown relationship name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown relationship kind: {0}")]
pub struct UnknownRelationshipKind(pub String);

macro_rules! relationship_kinds {
    ($($(#[$doc:meta])* $variant:ident => $name:literal,)+) => {
        /// The kind of a directed relationship between two nodes.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(rename_all = "SCREAMING_SNAKE_CASE")]
        pub enum RelationshipKind {
            $($(#[$doc])* $variant,)+
        }

        impl RelationshipKind {
            /// Every kind, in declaration order.
            pub const ALL: &'static [RelationshipKind] = &[$(RelationshipKind::$variant,)+];

            /// The storage name, e.g. `HAS_ROUTE`.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(RelationshipKind::$variant => $name,)+
                }
            }
        }

        impl std::str::FromStr for RelationshipKind {
            type Err = UnknownRelationshipKind;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.to_ascii_uppercase().as_str() {
                    $($name => Ok(RelationshipKind::$variant),)+
                    _ => Err(UnknownRelationshipKind(s.to_string())),
                }
            }
        }
    };
}

relationship_kinds! {
    /// Account owns a resource or sub-resource.
    /// Direction: account → resource
    Owns => "OWNS",

    // Inferred from property references
    LogsTo => "LOGS_TO",
    DeployedIn => "DEPLOYED_IN",
    ProtectedBy => "PROTECTED_BY",
    Assumes => "ASSUMES",
    HasPolicy => "HAS_POLICY",
    UsesVolume => "USES_VOLUME",
    CreatedFrom => "CREATED_FROM",
    RoutesThrough => "ROUTES_THROUGH",
    LoadBalancedBy => "LOAD_BALANCED_BY",
    ConnectsTo => "CONNECTS_TO",
    References => "REFERENCES",
    Uses => "USES",

    // Containment of synthesized sub-resources
    HasRoute => "HAS_ROUTE",
    /// Route rule → the gateway, instance or interface it targets.
    RoutesTo => "ROUTES_TO",
    HasMember => "HAS_MEMBER",
    UsesParameterGroup => "USES_PARAMETER_GROUP",
    UsesSubnetGroup => "USES_SUBNET_GROUP",
    UsesOptionGroup => "USES_OPTION_GROUP",
    HasSnapshot => "HAS_SNAPSHOT",
    HasNode => "HAS_NODE",
    HasNodeGroup => "HAS_NODE_GROUP",
    HasInstance => "HAS_INSTANCE",
    UsesConfiguration => "USES_CONFIGURATION",
    HasUser => "HAS_USER",
    HasStage => "HAS_STAGE",
    HasResource => "HAS_RESOURCE",
    HasMethod => "HAS_METHOD",
    HasDeployment => "HAS_DEPLOYMENT",
    HasAttachment => "HAS_ATTACHMENT",
    HasRouteTable => "HAS_ROUTE_TABLE",

    /// Account → remote account over a transit gateway VPC attachment.
    ConnectedViaTransitGateway => "CONNECTED_VIA_TRANSIT_GATEWAY",
    /// Account → remote account over a VPC peering connection.
    ConnectedViaVpcPeering => "CONNECTED_VIA_VPC_PEERING",
}

impl RelationshipKind {
    /// Whether this kind links two accounts.
    pub fn is_cross_account(&self) -> bool {
        matches!(
            self,
            RelationshipKind::ConnectedViaTransitGateway | RelationshipKind::ConnectedViaVpcPeering
        )
    }
}

impl std::fmt::Display for RelationshipKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metadata about an edge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeMetadata {
    /// When this edge was first written
    pub discovered_at: DateTime<Utc>,

    /// When this edge was last written
    pub updated_at: DateTime<Utc>,
}

impl Default for EdgeMetadata {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            discovered_at: now,
            updated_at: now,
        }
    }
}

/// A directed, typed edge. Unique per (source, target, kind).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    pub source: NodeRef,

    pub target: NodeRef,

    pub kind: RelationshipKind,

    #[serde(default)]
    pub properties: Properties,

    pub metadata: EdgeMetadata,
}

impl Edge {
    pub fn new(source: NodeRef, target: NodeRef, kind: RelationshipKind) -> Self {
        Self {
            source,
            target,
            kind,
            properties: Properties::new(),
            metadata: EdgeMetadata::default(),
        }
    }

    pub fn with_properties(mut self, properties: Properties) -> Self {
        self.properties = properties;
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Whether this edge starts and ends at the same node.
    pub fn is_self_loop(&self) -> bool {
        self.source == self.target
    }
}
