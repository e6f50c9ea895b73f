//! The table of services and resource types to enumerate.

use crate::error::DiscoveryError;
use crate::record::service_of;
use glob::Pattern;

/// One service and the resource types listed for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDescriptor {
    /// Lower-cased service segment, e.g. `ec2`
    pub name: &'static str,
    pub resource_types: &'static [&'static str],
}

const STANDARD: &[ServiceDescriptor] = &[
    ServiceDescriptor {
        name: "ec2",
        resource_types: &[
            "AWS::EC2::VPC",
            "AWS::EC2::Subnet",
            "AWS::EC2::SecurityGroup",
            "AWS::EC2::RouteTable",
            "AWS::EC2::InternetGateway",
            "AWS::EC2::NatGateway",
            "AWS::EC2::VPNGateway",
            "AWS::EC2::TransitGateway",
            "AWS::EC2::TransitGatewayAttachment",
            "AWS::EC2::VPCPeeringConnection",
            "AWS::EC2::VPCEndpoint",
            "AWS::EC2::NetworkInterface",
            "AWS::EC2::NetworkAcl",
            "AWS::EC2::FlowLog",
            "AWS::EC2::Instance",
            "AWS::EC2::Volume",
            "AWS::EC2::EIP",
            "AWS::EC2::LaunchTemplate",
            "AWS::EC2::KeyPair",
        ],
    },
    ServiceDescriptor {
        name: "s3",
        resource_types: &["AWS::S3::Bucket"],
    },
    ServiceDescriptor {
        name: "iam",
        resource_types: &[
            "AWS::IAM::Role",
            "AWS::IAM::User",
            "AWS::IAM::Group",
            "AWS::IAM::ManagedPolicy",
            "AWS::IAM::InstanceProfile",
        ],
    },
    ServiceDescriptor {
        name: "lambda",
        resource_types: &["AWS::Lambda::Function", "AWS::Lambda::EventSourceMapping"],
    },
    ServiceDescriptor {
        name: "rds",
        resource_types: &[
            "AWS::RDS::DBCluster",
            "AWS::RDS::DBInstance",
            "AWS::RDS::DBSubnetGroup",
            "AWS::RDS::DBClusterParameterGroup",
            "AWS::RDS::DBParameterGroup",
        ],
    },
    ServiceDescriptor {
        name: "dynamodb",
        resource_types: &["AWS::DynamoDB::Table"],
    },
    ServiceDescriptor {
        name: "elasticache",
        resource_types: &[
            "AWS::ElastiCache::CacheCluster",
            "AWS::ElastiCache::ReplicationGroup",
            "AWS::ElastiCache::SubnetGroup",
        ],
    },
    ServiceDescriptor {
        name: "amazonmq",
        resource_types: &["AWS::AmazonMQ::Broker", "AWS::AmazonMQ::Configuration"],
    },
    ServiceDescriptor {
        name: "apigateway",
        resource_types: &["AWS::ApiGateway::RestApi"],
    },
    ServiceDescriptor {
        name: "apigatewayv2",
        resource_types: &["AWS::ApiGatewayV2::Api"],
    },
    ServiceDescriptor {
        name: "elasticloadbalancingv2",
        resource_types: &[
            "AWS::ElasticLoadBalancingV2::LoadBalancer",
            "AWS::ElasticLoadBalancingV2::TargetGroup",
            "AWS::ElasticLoadBalancingV2::Listener",
        ],
    },
    ServiceDescriptor {
        name: "ecs",
        resource_types: &["AWS::ECS::Cluster", "AWS::ECS::Service", "AWS::ECS::TaskDefinition"],
    },
    ServiceDescriptor {
        name: "eks",
        resource_types: &["AWS::EKS::Cluster", "AWS::EKS::Nodegroup"],
    },
    ServiceDescriptor {
        name: "sns",
        resource_types: &["AWS::SNS::Topic"],
    },
    ServiceDescriptor {
        name: "sqs",
        resource_types: &["AWS::SQS::Queue"],
    },
    ServiceDescriptor {
        name: "logs",
        resource_types: &["AWS::Logs::LogGroup"],
    },
    ServiceDescriptor {
        name: "cloudwatch",
        resource_types: &["AWS::CloudWatch::Alarm"],
    },
    ServiceDescriptor {
        name: "kms",
        resource_types: &["AWS::KMS::Key", "AWS::KMS::Alias"],
    },
    ServiceDescriptor {
        name: "secretsmanager",
        resource_types: &["AWS::SecretsManager::Secret"],
    },
    ServiceDescriptor {
        name: "cloudformation",
        resource_types: &["AWS::CloudFormation::Stack"],
    },
    ServiceDescriptor {
        name: "route53",
        resource_types: &["AWS::Route53::HostedZone"],
    },
    ServiceDescriptor {
        name: "wafv2",
        resource_types: &["AWS::WAFv2::IPSet"],
    },
];

/// Which services and resource types a run enumerates.
///
/// Built once at startup and passed by reference.
#[derive(Debug, Clone)]
pub struct ServiceRegistry {
    services: Vec<ServiceDescriptor>,
}

impl Default for ServiceRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

impl ServiceRegistry {
    pub fn standard() -> Self {
        Self::new(STANDARD.to_vec())
    }

    pub fn new(services: Vec<ServiceDescriptor>) -> Self {
        Self { services }
    }

    pub fn services(&self) -> &[ServiceDescriptor] {
        &self.services
    }

    pub fn service(&self, name: &str) -> Option<&ServiceDescriptor> {
        self.services
            .iter()
            .find(|s| s.name.eq_ignore_ascii_case(name))
    }

    /// Service owning `resource_type`, by its service segment.
    pub fn service_for_type(&self, resource_type: &str) -> Option<&ServiceDescriptor> {
        self.service(&service_of(resource_type))
    }

    /// Resource types to enumerate.
    ///
    /// An empty `services` selects every service. Types matching any glob in
    /// `exclude` are dropped. Order follows the table.
    pub fn resource_types(
        &self,
        services: &[String],
        exclude: &[String],
    ) -> Result<Vec<String>, DiscoveryError> {
        let selected: Vec<&ServiceDescriptor> = if services.is_empty() {
            self.services.iter().collect()
        } else {
            services
                .iter()
                .map(|name| {
                    self.service(name)
                        .ok_or_else(|| DiscoveryError::UnknownService(name.clone()))
                })
                .collect::<Result<_, _>>()?
        };

        let patterns = exclude
            .iter()
            .map(|p| {
                Pattern::new(p).map_err(|e| DiscoveryError::ExcludePattern {
                    pattern: p.clone(),
                    message: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut types = Vec::new();
        let mut excluded = 0usize;
        for service in selected {
            for resource_type in service.resource_types {
                if patterns.iter().any(|p| p.matches(resource_type)) {
                    excluded += 1;
                    continue;
                }
                if !types.iter().any(|t: &String| t.as_str() == *resource_type) {
                    types.push(resource_type.to_string());
                }
            }
        }

        if excluded > 0 {
            tracing::info!(excluded, "Excluded resource types by pattern");
        }
        Ok(types)
    }
}
