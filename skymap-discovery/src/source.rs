//! File-backed collaborator: replays a captured account snapshot.
//!
//! A snapshot holds listing results per resource type, canned detail
//! responses and, optionally, list failures to replay. It serves as both
//! the [`ResourceLister`] and the [`DetailFetcher`] of a run, which makes a
//! whole discovery reproducible offline.
//!
//! ```yaml
//! account_id: "111122223333"
//! region: us-east-1
//! resources:
//!   AWS::EC2::VPC:
//!     - id: vpc-0a1
//!       properties: { VpcId: vpc-0a1, CidrBlock: 10.0.0.0/16 }
//! details:
//!   - service: ec2
//!     kind: RouteTables
//!     id: rtb-1
//!     response: { RouteTables: [] }
//! failures:
//!   AWS::SNS::Topic: "InternalFailure"
//! ```

use crate::enumerate::ResourceLister;
use crate::error::{DiscoveryError, FetchError, ListError};
use crate::fetch::DetailFetcher;
use crate::record::RawResource;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

const DEFAULT_REGION: &str = "us-east-1";

#[derive(Debug, Deserialize)]
struct SnapshotFile {
    #[serde(default)]
    account_id: String,
    #[serde(default)]
    region: Option<String>,
    #[serde(default)]
    resources: BTreeMap<String, Vec<SnapshotResource>>,
    #[serde(default)]
    details: Vec<SnapshotDetail>,
    #[serde(default)]
    failures: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct SnapshotResource {
    id: String,
    #[serde(default)]
    properties: Option<Value>,
    /// Verbatim provider text; wins over `properties`
    #[serde(default)]
    raw_properties: Option<String>,
}

impl SnapshotResource {
    fn to_raw(&self) -> RawResource {
        let text = match (&self.raw_properties, &self.properties) {
            (Some(raw), _) => raw.clone(),
            (None, Some(properties)) => properties.to_string(),
            (None, None) => String::new(),
        };
        RawResource::new(self.id.clone(), text)
    }
}

#[derive(Debug, Deserialize)]
struct SnapshotDetail {
    service: String,
    kind: String,
    id: String,
    response: Value,
}

type DetailKey = (String, String, String);

/// A captured account, served back as lister and fetcher.
#[derive(Debug)]
pub struct SnapshotSource {
    account_id: String,
    /// Region named by the file, if any
    region: Option<String>,
    fallback_region: String,
    resources: BTreeMap<String, Vec<SnapshotResource>>,
    details: HashMap<DetailKey, Value>,
    failures: BTreeMap<String, String>,
}

impl SnapshotSource {
    /// Load a snapshot. `.json` files are read as JSON, anything else as YAML.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, DiscoveryError> {
        let path = path.as_ref();
        let display = path.display().to_string();
        let text = std::fs::read_to_string(path).map_err(|source| DiscoveryError::SnapshotRead {
            path: display.clone(),
            source,
        })?;

        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let source = if is_json {
            Self::from_json(&text)
        } else {
            Self::from_yaml(&text)
        };
        source.map_err(|message| DiscoveryError::SnapshotParse {
            path: display,
            message,
        })
    }

    pub fn from_yaml(text: &str) -> Result<Self, String> {
        serde_yaml::from_str::<SnapshotFile>(text)
            .map(Self::from_file)
            .map_err(|e| e.to_string())
    }

    pub fn from_json(text: &str) -> Result<Self, String> {
        serde_json::from_str::<SnapshotFile>(text)
            .map(Self::from_file)
            .map_err(|e| e.to_string())
    }

    fn from_file(file: SnapshotFile) -> Self {
        let details = file
            .details
            .into_iter()
            .map(|d| ((d.service, d.kind, d.id), d.response))
            .collect();
        Self {
            account_id: file.account_id,
            region: file.region,
            fallback_region: DEFAULT_REGION.to_string(),
            resources: file.resources,
            details,
            failures: file.failures,
        }
    }

    /// Make every list call for `resource_type` fail with `message`.
    pub fn with_list_failure(mut self, resource_type: &str, message: &str) -> Self {
        self.failures
            .insert(resource_type.to_string(), message.to_string());
        self
    }

    /// Region to report when the file does not name one.
    pub fn with_default_region(mut self, region: impl Into<String>) -> Self {
        self.fallback_region = region.into();
        self
    }

    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    /// Every resource type the snapshot holds results or failures for.
    pub fn resource_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.resources.keys().cloned().collect();
        for failed in self.failures.keys() {
            if !self.resources.contains_key(failed) {
                types.push(failed.clone());
            }
        }
        types
    }

    pub fn resource_count(&self) -> usize {
        self.resources.values().map(Vec::len).sum()
    }
}

#[async_trait]
impl ResourceLister for SnapshotSource {
    async fn caller_account(&self) -> Result<String, ListError> {
        if self.account_id.is_empty() {
            return Err(ListError::Credentials(
                "snapshot does not name an account_id".into(),
            ));
        }
        Ok(self.account_id.clone())
    }

    fn region(&self) -> &str {
        self.region.as_deref().unwrap_or(&self.fallback_region)
    }

    async fn list(&self, resource_type: &str) -> Result<Vec<RawResource>, ListError> {
        if let Some(message) = self.failures.get(resource_type) {
            return Err(ListError::Provider(message.clone()));
        }
        Ok(self
            .resources
            .get(resource_type)
            .map(|items| items.iter().map(SnapshotResource::to_raw).collect())
            .unwrap_or_default())
    }
}

#[async_trait]
impl DetailFetcher for SnapshotSource {
    async fn describe(&self, service: &str, kind: &str, id: &str) -> Result<Value, FetchError> {
        self.details
            .get(&(service.to_string(), kind.to_string(), id.to_string()))
            .cloned()
            .ok_or_else(|| FetchError::NotFound {
                service: service.to_string(),
                kind: kind.to_string(),
                id: id.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::fs;
    use tempfile::tempdir;

    const SNAPSHOT: &str = r#"
account_id: "111122223333"
region: eu-west-1
resources:
  AWS::EC2::VPC:
    - id: vpc-1
      properties:
        VpcId: vpc-1
        CidrBlock: 10.0.0.0/16
  AWS::SQS::Queue:
    - id: jobs
      raw_properties: "not json"
details:
  - service: ec2
    kind: RouteTables
    id: rtb-1
    response:
      RouteTables: []
failures:
  AWS::SNS::Topic: InternalFailure
"#;

    #[tokio::test]
    async fn test_yaml_snapshot_lists_and_describes() {
        let source = SnapshotSource::from_yaml(SNAPSHOT).unwrap();

        assert_eq!(source.caller_account().await.unwrap(), "111122223333");
        assert_eq!(source.region(), "eu-west-1");
        let source = source.with_default_region("ap-south-1");
        assert_eq!(source.region(), "eu-west-1");

        let vpcs = source.list("AWS::EC2::VPC").await.unwrap();
        assert_eq!(vpcs.len(), 1);
        let parsed: Value = serde_json::from_str(&vpcs[0].raw_properties).unwrap();
        assert_eq!(parsed["CidrBlock"], json!("10.0.0.0/16"));

        let queues = source.list("AWS::SQS::Queue").await.unwrap();
        assert_eq!(queues[0].raw_properties, "not json");

        assert!(source.list("AWS::S3::Bucket").await.unwrap().is_empty());
        assert!(matches!(
            source.list("AWS::SNS::Topic").await,
            Err(ListError::Provider(m)) if m == "InternalFailure"
        ));

        let tables = source.describe("ec2", "RouteTables", "rtb-1").await.unwrap();
        assert_eq!(tables, json!({"RouteTables": []}));
        assert!(source.describe("ec2", "RouteTables", "rtb-2").await.is_err());
    }

    #[test]
    fn test_resource_types_include_failures() {
        let source = SnapshotSource::from_yaml(SNAPSHOT)
            .unwrap()
            .with_list_failure("AWS::Lambda::Function", "ThrottlingException");

        assert_eq!(
            source.resource_types(),
            vec![
                "AWS::EC2::VPC",
                "AWS::SQS::Queue",
                "AWS::Lambda::Function",
                "AWS::SNS::Topic",
            ]
        );
        assert_eq!(source.resource_count(), 2);
    }

    #[test]
    fn test_load_by_extension() {
        let dir = tempdir().unwrap();
        let json_path = dir.path().join("snapshot.json");
        fs::write(
            &json_path,
            r#"{"account_id": "222", "resources": {"AWS::S3::Bucket": [{"id": "logs"}]}}"#,
        )
        .unwrap();

        let source = SnapshotSource::load(&json_path).unwrap();
        assert_eq!(source.account_id(), "222");
        assert_eq!(source.region(), "us-east-1");
        assert_eq!(source.resource_count(), 1);

        let source = SnapshotSource::load(&json_path)
            .unwrap()
            .with_default_region("eu-central-1");
        assert_eq!(source.region(), "eu-central-1");
    }

    #[test]
    fn test_load_errors() {
        let dir = tempdir().unwrap();
        let missing = SnapshotSource::load(dir.path().join("missing.yaml")).unwrap_err();
        assert!(matches!(missing, DiscoveryError::SnapshotRead { .. }));

        let bad = dir.path().join("bad.yaml");
        fs::write(&bad, "resources: [unclosed").unwrap();
        let parse = SnapshotSource::load(&bad).unwrap_err();
        assert!(matches!(parse, DiscoveryError::SnapshotParse { .. }));
    }

    #[tokio::test]
    async fn test_missing_account_is_a_credential_failure() {
        let source = SnapshotSource::from_yaml("resources: {}").unwrap();
        assert!(matches!(
            source.caller_account().await,
            Err(ListError::Credentials(_))
        ));
    }
}
