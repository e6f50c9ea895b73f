//! Message brokers: instances, configuration and users.

use super::{Expansion, ExpansionContext, ExpansionError, ExpansionPattern, arn, child};
use crate::props::{FieldMap, array_at, nested_str, str_at};
use crate::record::ResourceRecord;
use async_trait::async_trait;
use serde_json::Value;
use skymap_graph::{NodeRef, RelationshipKind};

/// Expands managed message brokers.
///
/// User listing needs its own permission and is often denied, so it runs as
/// an isolated step: a failure there keeps the instances and configuration.
pub struct BrokerPattern;

/// Last path segment of a console URL, which names the instance.
fn console_host(url: &str) -> &str {
    url.trim_end_matches('/').rsplit('/').next().unwrap_or("")
}

impl BrokerPattern {
    fn instances(
        &self,
        parent: &ResourceRecord,
        parent_ref: &NodeRef,
        broker: &Value,
        ctx: &ExpansionContext<'_>,
        out: &mut Expansion,
    ) -> Result<(), ExpansionError> {
        let region = parent.region.as_str();
        for (index, instance) in array_at(broker, "BrokerInstances").iter().enumerate() {
            let instance_id = match console_host(str_at(instance, "ConsoleURL")) {
                "" => format!("{}_instance_{index}", parent.id),
                host => host.to_string(),
            };
            let id = format!("{}:{instance_id}", parent.id);
            let properties = FieldMap::new()
                .set("broker_id", parent.id.as_str())
                .set("instance_index", index as u64)
                .copy("console_url", instance, "ConsoleURL")
                .copy("ip_address", instance, "IpAddress")
                .copy("endpoints", instance, "Endpoints")
                .build();
            let node = child(
                "MQBrokerInstance",
                "AWS::AmazonMQ::BrokerInstance",
                &id,
                arn("mq", region, ctx.account_id, &format!("broker-instance:{id}")),
                region,
                properties,
            )?;
            out.contain(parent_ref, node, RelationshipKind::HasInstance)?;
        }

        let configuration_id = nested_str(broker, &["Configurations", "Current", "Id"]);
        if !configuration_id.is_empty() {
            let properties = FieldMap::new()
                .set("configuration_id", configuration_id)
                .copy_nested("revision", broker, &["Configurations", "Current", "Revision"])
                .build();
            let node = child(
                "MQConfiguration",
                "AWS::AmazonMQ::Configuration",
                configuration_id,
                arn(
                    "mq",
                    region,
                    ctx.account_id,
                    &format!("configuration:{configuration_id}"),
                ),
                region,
                properties,
            )?;
            out.contain(parent_ref, node, RelationshipKind::UsesConfiguration)?;
        }
        Ok(())
    }

    async fn users(
        &self,
        parent: &ResourceRecord,
        parent_ref: &NodeRef,
        ctx: &ExpansionContext<'_>,
    ) -> Result<Expansion, ExpansionError> {
        let response = ctx
            .fetcher
            .describe("mq", "BrokerUsers", &parent.id)
            .await?;
        let region = parent.region.as_str();
        let mut out = Expansion::default();
        for user in array_at(&response, "Users") {
            let username = str_at(user, "Username");
            if username.is_empty() {
                continue;
            }
            let id = format!("{}:{username}", parent.id);
            let properties = FieldMap::new()
                .set("username", username)
                .set("broker_id", parent.id.as_str())
                .copy("pending_change", user, "PendingChange")
                .build();
            let node = child(
                "MQUser",
                "AWS::AmazonMQ::User",
                &id,
                arn("mq", region, ctx.account_id, &format!("user:{id}")),
                region,
                properties,
            )?;
            out.contain(parent_ref, node, RelationshipKind::HasUser)?;
        }
        Ok(out)
    }
}

#[async_trait]
impl ExpansionPattern for BrokerPattern {
    fn name(&self) -> &'static str {
        "broker"
    }

    fn parent_types(&self) -> &'static [&'static str] {
        &["AWS::AmazonMQ::Broker", "AWS::MQ::Broker"]
    }

    async fn expand(
        &self,
        parent: &ResourceRecord,
        parent_ref: &NodeRef,
        ctx: &ExpansionContext<'_>,
    ) -> Result<Expansion, ExpansionError> {
        let broker = ctx.fetcher.describe("mq", "Broker", &parent.id).await?;

        let mut out = Expansion::default();
        self.instances(parent, parent_ref, &broker, ctx, &mut out)?;

        match self.users(parent, parent_ref, ctx).await {
            Ok(users) => out.merge(users),
            Err(e) => out.fail(self.name(), &parent.id, e),
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::super::SubResourceExpander;
    use super::super::test_support::*;
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn broker() -> Value {
        json!({
            "BrokerId": "b-1",
            "BrokerInstances": [
                {"ConsoleURL": "https://b-1-1.mq.us-east-1.amazonaws.com", "IpAddress": "10.0.1.5"},
                {"ConsoleURL": "https://b-1-2.mq.us-east-1.amazonaws.com", "IpAddress": "10.0.2.5"},
                {"IpAddress": "10.0.3.5"}
            ],
            "Configurations": {"Current": {"Id": "c-9", "Revision": 3}}
        })
    }

    #[tokio::test]
    async fn test_broker_with_users() {
        let records = vec![record("AWS::AmazonMQ::Broker", "b-1")];
        let fetcher = CannedFetcher::new()
            .with("mq", "Broker", "b-1", broker())
            .with(
                "mq",
                "BrokerUsers",
                "b-1",
                json!({"Users": [{"Username": "admin"}, {"Username": "app"}]}),
            );

        let expansion = SubResourceExpander::with_patterns(vec![Box::new(BrokerPattern)])
            .expand_all(&records, "111", &fetcher)
            .await;

        assert!(expansion.failures.is_empty());
        assert_eq!(
            keys(&expansion),
            vec![
                "arn:aws:mq:us-east-1:111:broker-instance:b-1:b-1-1.mq.us-east-1.amazonaws.com",
                "arn:aws:mq:us-east-1:111:broker-instance:b-1:b-1-2.mq.us-east-1.amazonaws.com",
                "arn:aws:mq:us-east-1:111:broker-instance:b-1:b-1_instance_2",
                "arn:aws:mq:us-east-1:111:configuration:c-9",
                "arn:aws:mq:us-east-1:111:user:b-1:admin",
                "arn:aws:mq:us-east-1:111:user:b-1:app",
            ]
        );
        assert_eq!(
            edge_kinds(&expansion),
            vec![
                RelationshipKind::HasInstance,
                RelationshipKind::HasInstance,
                RelationshipKind::HasInstance,
                RelationshipKind::UsesConfiguration,
                RelationshipKind::HasUser,
                RelationshipKind::HasUser,
            ]
        );
    }

    #[test]
    fn test_console_host() {
        assert_eq!(console_host("https://b-1-1.mq.us-east-1.amazonaws.com/"), "b-1-1.mq.us-east-1.amazonaws.com");
        assert_eq!(console_host(""), "");
    }

    #[tokio::test]
    async fn test_denied_users_keep_instances() {
        let records = vec![record("AWS::MQ::Broker", "b-1")];
        let fetcher = CannedFetcher::new()
            .with("mq", "Broker", "b-1", broker())
            .failing("mq", "BrokerUsers");

        let expansion = SubResourceExpander::with_patterns(vec![Box::new(BrokerPattern)])
            .expand_all(&records, "111", &fetcher)
            .await;

        assert_eq!(expansion.sub_resources.len(), 4);
        assert_eq!(expansion.failures.len(), 1);
        assert_eq!(expansion.failures[0].parent, "b-1");
        assert!(expansion.failures[0].error.contains("AccessDeniedException"));
    }
}
