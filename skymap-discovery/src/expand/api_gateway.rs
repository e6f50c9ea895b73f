//! REST and HTTP APIs: stages, resources, methods, deployments and routes.

use super::{Expansion, ExpansionContext, ExpansionError, ExpansionPattern, child};
use crate::props::{FieldMap, array_at, str_at};
use crate::record::ResourceRecord;
use async_trait::async_trait;
use serde_json::Value;
use skymap_graph::{NodeRef, RelationshipKind};

const REST_API: &str = "AWS::ApiGateway::RestApi";
const HTTP_API: &str = "AWS::ApiGatewayV2::Api";

/// Expands REST APIs (v1) and HTTP/WebSocket APIs (v2).
///
/// Every collection is fetched separately and fails independently.
pub struct ApiGatewayPattern;

/// Key prefix shared by every child of a v1 API.
fn rest_api_base(region: &str, api_id: &str) -> String {
    format!("arn:aws:apigateway:{region}::/restapis/{api_id}")
}

fn http_api_base(region: &str, api_id: &str) -> String {
    format!("arn:aws:apigateway:{region}::/apis/{api_id}")
}

impl ApiGatewayPattern {
    async fn rest_stages(
        &self,
        parent: &ResourceRecord,
        parent_ref: &NodeRef,
        ctx: &ExpansionContext<'_>,
    ) -> Result<Expansion, ExpansionError> {
        let response = ctx
            .fetcher
            .describe("apigateway", "Stages", &parent.id)
            .await?;
        let base = rest_api_base(&parent.region, &parent.id);
        let mut out = Expansion::default();
        for stage in array_at(&response, "item") {
            let name = str_at(stage, "stageName");
            if name.is_empty() {
                continue;
            }
            let properties = FieldMap::new()
                .set("stage_name", name)
                .set("api_id", parent.id.as_str())
                .copy("deployment_id", stage, "deploymentId")
                .copy("description", stage, "description")
                .copy("tracing_enabled", stage, "tracingEnabled")
                .copy("cache_cluster_enabled", stage, "cacheClusterEnabled")
                .copy("web_acl_arn", stage, "webAclArn")
                .build();
            let node = child(
                "ApiGatewayStage",
                "AWS::ApiGateway::Stage",
                &format!("{}:{name}", parent.id),
                format!("{base}/stages/{name}"),
                &parent.region,
                properties,
            )?;
            out.contain(parent_ref, node, RelationshipKind::HasStage)?;
        }
        Ok(out)
    }

    async fn rest_resources(
        &self,
        parent: &ResourceRecord,
        parent_ref: &NodeRef,
        ctx: &ExpansionContext<'_>,
    ) -> Result<Expansion, ExpansionError> {
        let response = ctx
            .fetcher
            .describe("apigateway", "Resources", &parent.id)
            .await?;
        let base = rest_api_base(&parent.region, &parent.id);
        let mut out = Expansion::default();
        for resource in array_at(&response, "items") {
            let resource_id = str_at(resource, "id");
            if resource_id.is_empty() {
                continue;
            }
            let key = format!("{base}/resources/{resource_id}");
            let properties = FieldMap::new()
                .set("resource_id", resource_id)
                .set("api_id", parent.id.as_str())
                .copy("path", resource, "path")
                .copy("path_part", resource, "pathPart")
                .copy("parent_id", resource, "parentId")
                .build();
            let node = child(
                "ApiGatewayResource",
                "AWS::ApiGateway::Resource",
                &format!("{}:{resource_id}", parent.id),
                key.clone(),
                &parent.region,
                properties,
            )?;
            let resource_ref = out.contain(parent_ref, node, RelationshipKind::HasResource)?;

            let Some(methods) = resource.get("resourceMethods").and_then(Value::as_object) else {
                continue;
            };
            for (http_method, method) in methods {
                let properties = FieldMap::new()
                    .set("http_method", http_method.as_str())
                    .set("resource_id", resource_id)
                    .copy("authorization_type", method, "authorizationType")
                    .copy("api_key_required", method, "apiKeyRequired")
                    .copy("operation_name", method, "operationName")
                    .build();
                let node = child(
                    "ApiGatewayMethod",
                    "AWS::ApiGateway::Method",
                    &format!("{}:{resource_id}:{http_method}", parent.id),
                    format!("{key}/methods/{http_method}"),
                    &parent.region,
                    properties,
                )?;
                out.contain(&resource_ref, node, RelationshipKind::HasMethod)?;
            }
        }
        Ok(out)
    }

    async fn rest_deployments(
        &self,
        parent: &ResourceRecord,
        parent_ref: &NodeRef,
        ctx: &ExpansionContext<'_>,
    ) -> Result<Expansion, ExpansionError> {
        let response = ctx
            .fetcher
            .describe("apigateway", "Deployments", &parent.id)
            .await?;
        let base = rest_api_base(&parent.region, &parent.id);
        let mut out = Expansion::default();
        for deployment in array_at(&response, "items") {
            let deployment_id = str_at(deployment, "id");
            if deployment_id.is_empty() {
                continue;
            }
            let properties = FieldMap::new()
                .set("deployment_id", deployment_id)
                .set("api_id", parent.id.as_str())
                .copy("description", deployment, "description")
                .copy("created_date", deployment, "createdDate")
                .build();
            let node = child(
                "ApiGatewayDeployment",
                "AWS::ApiGateway::Deployment",
                &format!("{}:{deployment_id}", parent.id),
                format!("{base}/deployments/{deployment_id}"),
                &parent.region,
                properties,
            )?;
            out.contain(parent_ref, node, RelationshipKind::HasDeployment)?;
        }
        Ok(out)
    }

    async fn http_stages(
        &self,
        parent: &ResourceRecord,
        parent_ref: &NodeRef,
        ctx: &ExpansionContext<'_>,
    ) -> Result<Expansion, ExpansionError> {
        let response = ctx
            .fetcher
            .describe("apigatewayv2", "Stages", &parent.id)
            .await?;
        let base = http_api_base(&parent.region, &parent.id);
        let mut out = Expansion::default();
        for stage in array_at(&response, "Items") {
            let name = str_at(stage, "StageName");
            if name.is_empty() {
                continue;
            }
            let properties = FieldMap::new()
                .set("stage_name", name)
                .set("api_id", parent.id.as_str())
                .copy("deployment_id", stage, "DeploymentId")
                .copy("auto_deploy", stage, "AutoDeploy")
                .copy("description", stage, "Description")
                .build();
            let node = child(
                "ApiGatewayV2Stage",
                "AWS::ApiGatewayV2::Stage",
                &format!("{}:{name}", parent.id),
                format!("{base}/stages/{name}"),
                &parent.region,
                properties,
            )?;
            out.contain(parent_ref, node, RelationshipKind::HasStage)?;
        }
        Ok(out)
    }

    async fn http_routes(
        &self,
        parent: &ResourceRecord,
        parent_ref: &NodeRef,
        ctx: &ExpansionContext<'_>,
    ) -> Result<Expansion, ExpansionError> {
        let response = ctx
            .fetcher
            .describe("apigatewayv2", "Routes", &parent.id)
            .await?;
        let base = http_api_base(&parent.region, &parent.id);
        let mut out = Expansion::default();
        for route in array_at(&response, "Items") {
            let route_id = str_at(route, "RouteId");
            if route_id.is_empty() {
                continue;
            }
            let properties = FieldMap::new()
                .set("route_id", route_id)
                .set("api_id", parent.id.as_str())
                .copy("route_key", route, "RouteKey")
                .copy("target", route, "Target")
                .copy("authorization_type", route, "AuthorizationType")
                .build();
            let node = child(
                "ApiGatewayV2Route",
                "AWS::ApiGatewayV2::Route",
                &format!("{}:{route_id}", parent.id),
                format!("{base}/routes/{route_id}"),
                &parent.region,
                properties,
            )?;
            out.contain(parent_ref, node, RelationshipKind::HasRoute)?;
        }
        Ok(out)
    }
}

#[async_trait]
impl ExpansionPattern for ApiGatewayPattern {
    fn name(&self) -> &'static str {
        "api-gateway"
    }

    fn parent_types(&self) -> &'static [&'static str] {
        &[REST_API, HTTP_API]
    }

    async fn expand(
        &self,
        parent: &ResourceRecord,
        parent_ref: &NodeRef,
        ctx: &ExpansionContext<'_>,
    ) -> Result<Expansion, ExpansionError> {
        let steps = if parent.resource_type == HTTP_API {
            vec![
                ("stages", self.http_stages(parent, parent_ref, ctx).await),
                ("routes", self.http_routes(parent, parent_ref, ctx).await),
            ]
        } else {
            vec![
                ("stages", self.rest_stages(parent, parent_ref, ctx).await),
                ("resources", self.rest_resources(parent, parent_ref, ctx).await),
                ("deployments", self.rest_deployments(parent, parent_ref, ctx).await),
            ]
        };

        let mut out = Expansion::default();
        for (collection, result) in steps {
            match result {
                Ok(expansion) => out.merge(expansion),
                Err(e) => {
                    tracing::debug!(api = %parent.id, collection, "API collection unavailable");
                    out.fail(self.name(), &parent.id, e);
                }
            }
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

    async fn run(records: &[ResourceRecord], fetcher: &CannedFetcher) -> Expansion {
        SubResourceExpander::with_patterns(vec![Box::new(ApiGatewayPattern)])
            .expand_all(records, "111", fetcher)
            .await
    }

    #[tokio::test]
    async fn test_rest_api_children() {
        let records = vec![record(REST_API, "abc123")];
        let fetcher = CannedFetcher::new()
            .with(
                "apigateway",
                "Stages",
                "abc123",
                json!({"item": [{"stageName": "prod", "deploymentId": "d-1"}]}),
            )
            .with(
                "apigateway",
                "Resources",
                "abc123",
                json!({"items": [
                    {"id": "root", "path": "/"},
                    {"id": "r-users", "path": "/users", "parentId": "root",
                     "resourceMethods": {"GET": {"authorizationType": "NONE"}, "POST": {"authorizationType": "AWS_IAM"}}}
                ]}),
            )
            .with(
                "apigateway",
                "Deployments",
                "abc123",
                json!({"items": [{"id": "d-1", "description": "initial"}]}),
            );

        let expansion = run(&records, &fetcher).await;
        let base = "arn:aws:apigateway:us-east-1::/restapis/abc123";

        assert!(expansion.failures.is_empty());
        assert_eq!(
            keys(&expansion),
            vec![
                format!("{base}/stages/prod"),
                format!("{base}/resources/root"),
                format!("{base}/resources/r-users"),
                format!("{base}/resources/r-users/methods/GET"),
                format!("{base}/resources/r-users/methods/POST"),
                format!("{base}/deployments/d-1"),
            ]
        );

        let method_sources: Vec<&str> = expansion
            .edges
            .iter()
            .filter(|e| e.kind == RelationshipKind::HasMethod)
            .map(|e| e.source.key.as_str())
            .collect();
        assert_eq!(
            method_sources,
            vec![
                format!("{base}/resources/r-users"),
                format!("{base}/resources/r-users")
            ]
        );
    }

    #[tokio::test]
    async fn test_http_api_routes_with_missing_stages() {
        let records = vec![record(HTTP_API, "h1")];
        let fetcher = CannedFetcher::new().with(
            "apigatewayv2",
            "Routes",
            "h1",
            json!({"Items": [{"RouteId": "rt-1", "RouteKey": "GET /health"}]}),
        );

        let expansion = run(&records, &fetcher).await;

        assert_eq!(
            keys(&expansion),
            vec!["arn:aws:apigateway:us-east-1::/apis/h1/routes/rt-1"]
        );
        assert_eq!(edge_kinds(&expansion), vec![RelationshipKind::HasRoute]);
        assert_eq!(expansion.failures.len(), 1);
    }
}
