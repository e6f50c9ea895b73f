//! ResourceRecord - the normalized form of one discovered resource.

use crate::error::RecordError;
use crate::props;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use skymap_graph::{Label, NodeKey, NodeRef};

/// Services whose resources belong to the account rather than a region.
pub const GLOBAL_SERVICES: &[&str] = &[
    "iam",
    "organizations",
    "route53",
    "waf",
    "wafv2",
    "artifacts",
    "controltower",
];

/// Top-level property keys that may carry a resource's ARN.
const GLOBAL_REF_KEYS: &[&str] = &["Arn", "ARN", "arn", "ResourceArn"];

/// Whether a lower-cased service name is account-global.
pub fn is_global_service(service: &str) -> bool {
    GLOBAL_SERVICES.contains(&service)
}

/// Segments of `Provider::Service::Kind`, `service:Kind` or `Vendor.Service.Kind`.
fn type_segments(resource_type: &str) -> Vec<&str> {
    if resource_type.contains("::") {
        resource_type.split("::").collect()
    } else {
        resource_type.split([':', '.']).collect()
    }
}

/// Lower-cased service segment: the middle of three or more segments,
/// otherwise the first.
pub fn service_of(resource_type: &str) -> String {
    let segments = type_segments(resource_type);
    let service = if segments.len() >= 3 {
        segments[1]
    } else {
        segments[0]
    };
    service.to_ascii_lowercase()
}

/// Last segment of the resource type.
pub fn kind_of(resource_type: &str) -> &str {
    type_segments(resource_type)
        .last()
        .copied()
        .unwrap_or(resource_type)
}

/// One raw item returned by the enumeration collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawResource {
    pub id: String,

    /// The provider's description, as JSON text
    #[serde(default)]
    pub raw_properties: String,
}

impl RawResource {
    pub fn new(id: impl Into<String>, raw_properties: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            raw_properties: raw_properties.into(),
        }
    }
}

/// A normalized, immutable snapshot of one discovered resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceRecord {
    /// Namespaced type, e.g. `AWS::EC2::RouteTable`
    pub resource_type: String,

    /// Provider-assigned identifier, unique within (type, account, region)
    pub id: String,

    /// Canonical global reference (ARN); empty when unknown
    #[serde(default)]
    pub global_ref: String,

    /// Raw provider description, in the order the provider returned it
    #[serde(default)]
    pub properties: Map<String, Value>,

    /// Empty for account-global services
    #[serde(default)]
    pub region: String,

    /// Set when enumeration failed; such records are never projected
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ResourceRecord {
    pub fn new(
        resource_type: impl Into<String>,
        id: impl Into<String>,
        region: impl Into<String>,
    ) -> Self {
        Self {
            resource_type: resource_type.into(),
            id: id.into(),
            global_ref: String::new(),
            properties: Map::new(),
            region: region.into(),
            error: None,
        }
    }

    /// An error-tagged record for a resource type that failed to enumerate.
    pub fn failed(
        resource_type: impl Into<String>,
        region: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        let mut record = Self::new(resource_type, "", region);
        record.error = Some(error.into());
        record
    }

    /// Normalize a raw listing entry.
    ///
    /// The region is dropped for global services. Properties that are not
    /// valid JSON objects are kept as `{"raw_properties": text}`. When the
    /// properties carry no ARN one is synthesized deterministically.
    pub fn from_raw(resource_type: &str, raw: &RawResource, region: &str, account: &str) -> Self {
        let properties = match serde_json::from_str::<Value>(&raw.raw_properties) {
            Ok(Value::Object(map)) => map,
            _ if raw.raw_properties.is_empty() => Map::new(),
            _ => {
                let mut map = Map::new();
                map.insert(
                    "raw_properties".to_string(),
                    Value::String(raw.raw_properties.clone()),
                );
                map
            }
        };

        let service = service_of(resource_type);
        let region = if is_global_service(&service) { "" } else { region };
        let global_ref = extract_global_ref(&properties).unwrap_or_else(|| {
            synthesize_global_ref(resource_type, &raw.id, region, account)
        });

        Self {
            resource_type: resource_type.to_string(),
            id: raw.id.clone(),
            global_ref,
            properties,
            region: region.to_string(),
            error: None,
        }
    }

    pub fn with_global_ref(mut self, global_ref: impl Into<String>) -> Self {
        self.global_ref = global_ref.into();
        self
    }

    pub fn with_properties(mut self, properties: Map<String, Value>) -> Self {
        self.properties = properties;
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Whether the record may be projected into the graph.
    pub fn is_valid(&self) -> bool {
        self.error.is_none() && !self.id.is_empty() && !self.resource_type.is_empty()
    }

    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }

    pub fn service(&self) -> String {
        service_of(&self.resource_type)
    }

    pub fn kind(&self) -> &str {
        kind_of(&self.resource_type)
    }

    pub fn is_global_service(&self) -> bool {
        is_global_service(&self.service())
    }

    pub fn label(&self) -> Result<Label, RecordError> {
        Ok(Label::for_resource_type(&self.resource_type)?)
    }

    /// The upsert key: the global reference, else `id:account:region:type`.
    pub fn node_key(&self, account: &str) -> Result<NodeKey, RecordError> {
        if self.global_ref.is_empty() {
            Ok(NodeKey::composite(
                &self.id,
                account,
                &self.region,
                &self.resource_type,
            )?)
        } else {
            Ok(NodeKey::new(self.global_ref.clone())?)
        }
    }

    pub fn node_ref(&self, account: &str) -> Result<NodeRef, RecordError> {
        Ok(NodeRef::new(self.label()?, self.node_key(account)?))
    }

    pub fn prop(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    /// String property at `key`, or `""`.
    pub fn str_prop(&self, key: &str) -> &str {
        self.properties
            .get(key)
            .and_then(Value::as_str)
            .unwrap_or("")
    }

    /// String at a nested path, or `""`.
    pub fn nested_str_prop(&self, path: &[&str]) -> &str {
        let Some((first, rest)) = path.split_first() else {
            return "";
        };
        match self.properties.get(*first) {
            Some(value) if rest.is_empty() => value.as_str().unwrap_or(""),
            Some(value) => props::nested_str(value, rest),
            None => "",
        }
    }
}

/// Find an ARN among the well-known top-level keys.
pub fn extract_global_ref(properties: &Map<String, Value>) -> Option<String> {
    GLOBAL_REF_KEYS.iter().find_map(|key| {
        properties
            .get(*key)
            .and_then(Value::as_str)
            .filter(|s| s.starts_with("arn:"))
            .map(str::to_string)
    })
}

/// Build the ARN a resource would have when the provider did not report one.
pub fn synthesize_global_ref(resource_type: &str, id: &str, region: &str, account: &str) -> String {
    let service = service_of(resource_type);
    let kind = kind_of(resource_type);

    if resource_type == "AWS::S3::Bucket" {
        return format!("arn:aws:s3:::{id}");
    }
    if is_global_service(&service) {
        return format!("arn:aws:{service}::{account}:{}/{id}", kind.to_ascii_lowercase());
    }
    format!(
        "arn:aws:{service}:{region}:{account}:{}/{id}",
        kind.to_ascii_lowercase()
    )
}
