//! The detail-fetch collaborator seam.

use crate::error::FetchError;
use async_trait::async_trait;
use serde_json::Value;

/// Re-fetches the detailed structure behind a resource.
///
/// `service` is the lower-cased service (`ec2`, `rds`), `kind` names the
/// collection being described (`RouteTables`, `BrokerUsers`) and `id` scopes
/// the call to one parent. The response has the provider's own shape.
#[async_trait]
pub trait DetailFetcher: Send + Sync {
    async fn describe(&self, service: &str, kind: &str, id: &str) -> Result<Value, FetchError>;
}
