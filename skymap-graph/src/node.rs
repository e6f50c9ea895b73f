//! Node identity and property types for the resource graph.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Maximum length of a label.
const MAX_LABEL_LEN: usize = 128;

/// Maximum length of a node key.
const MAX_KEY_LEN: usize = 2048;

/// Region segment used in composite keys for account-global resources.
pub const GLOBAL_REGION: &str = "global";

/// Errors related to label validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LabelError {
    #[error("Label cannot be empty")]
    Empty,

    #[error("Label {label:?} contains invalid character {ch:?}")]
    InvalidCharacter { label: String, ch: char },

    #[error("Label {0:?} cannot start with a digit")]
    LeadingDigit(String),

    #[error("Label too long: {0} characters (max 128)")]
    TooLong(usize),
}

/// Errors related to node key validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum NodeKeyError {
    #[error("Node key cannot be empty")]
    Empty,

    #[error("Node key too long: {0} characters (max 2048)")]
    TooLong(usize),
}

/// A validated node label.
///
/// Labels end up as identifiers in the storage layer, so only ASCII letters,
/// digits and `_` are accepted and the first character may not be a digit.
/// Resource types such as `AWS::EC2::VPC` map to `AWS_EC2_VPC`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Label(String);

impl Label {
    /// Label of account nodes.
    pub const ACCOUNT: &'static str = "Account";

    /// Create a label, validating every character.
    pub fn new(s: impl Into<String>) -> Result<Self, LabelError> {
        let s = s.into();
        validate_label(&s)?;
        Ok(Self(s))
    }

    /// The label shared by all account nodes.
    pub fn account() -> Self {
        Self(Self::ACCOUNT.to_string())
    }

    /// Derive the label for a namespaced resource type.
    ///
    /// `::` and any other character outside `[A-Za-z0-9_]` become `_`, so
    /// `service:Kind` and `Vendor.Service.Kind` map to valid labels. A
    /// leading digit gets a `_` prefix.
    pub fn for_resource_type(resource_type: &str) -> Result<Self, LabelError> {
        let mut label: String = resource_type
            .replace("::", "_")
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        if label.starts_with(|c: char| c.is_ascii_digit()) {
            label.insert(0, '_');
        }
        Self::new(label)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Label {
    type Error = LabelError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<Label> for String {
    fn from(label: Label) -> Self {
        label.0
    }
}

fn validate_label(s: &str) -> Result<(), LabelError> {
    let Some(first) = s.chars().next() else {
        return Err(LabelError::Empty);
    };
    if s.len() > MAX_LABEL_LEN {
        return Err(LabelError::TooLong(s.len()));
    }
    if first.is_ascii_digit() {
        return Err(LabelError::LeadingDigit(s.to_string()));
    }
    if let Some(ch) = s.chars().find(|c| !(c.is_ascii_alphanumeric() || *c == '_')) {
        return Err(LabelError::InvalidCharacter {
            label: s.to_string(),
            ch,
        });
    }
    Ok(())
}

/// The upsert key of a node: a global reference (ARN) or a composite key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NodeKey(String);

impl NodeKey {
    pub fn new(s: impl Into<String>) -> Result<Self, NodeKeyError> {
        let s = s.into();
        if s.is_empty() {
            return Err(NodeKeyError::Empty);
        }
        if s.len() > MAX_KEY_LEN {
            return Err(NodeKeyError::TooLong(s.len()));
        }
        Ok(Self(s))
    }

    /// Build the composite key `id:account:region:type`.
    ///
    /// An empty region is written as [`GLOBAL_REGION`].
    pub fn composite(
        id: &str,
        account: &str,
        region: &str,
        resource_type: &str,
    ) -> Result<Self, NodeKeyError> {
        let region = if region.is_empty() {
            GLOBAL_REGION
        } else {
            region
        };
        Self::new(format!("{id}:{account}:{region}:{resource_type}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for NodeKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for NodeKey {
    type Error = NodeKeyError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<NodeKey> for String {
    fn from(key: NodeKey) -> Self {
        key.0
    }
}

/// Label plus key: everything needed to address a node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeRef {
    pub label: Label,
    pub key: NodeKey,
}

impl NodeRef {
    pub fn new(label: Label, key: NodeKey) -> Self {
        Self { label, key }
    }
}

impl std::fmt::Display for NodeRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.label, self.key)
    }
}

/// Flattened property value stored on nodes and edges.
///
/// Nested structures never reach the graph; they are flattened or
/// serialized to strings before upsert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    List(Vec<PropertyValue>),
}

impl PropertyValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            PropertyValue::Integer(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropertyValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Convert into a JSON value for query output.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            PropertyValue::String(s) => serde_json::Value::from(s.as_str()),
            PropertyValue::Integer(n) => serde_json::Value::from(*n),
            PropertyValue::Float(f) => serde_json::Value::from(*f),
            PropertyValue::Boolean(b) => serde_json::Value::from(*b),
            PropertyValue::List(items) => {
                serde_json::Value::Array(items.iter().map(PropertyValue::to_json).collect())
            }
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(s: &str) -> Self {
        PropertyValue::String(s.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(s: String) -> Self {
        PropertyValue::String(s)
    }
}

impl From<&String> for PropertyValue {
    fn from(s: &String) -> Self {
        PropertyValue::String(s.clone())
    }
}

impl From<i64> for PropertyValue {
    fn from(n: i64) -> Self {
        PropertyValue::Integer(n)
    }
}

impl From<i32> for PropertyValue {
    fn from(n: i32) -> Self {
        PropertyValue::Integer(n as i64)
    }
}

impl From<f64> for PropertyValue {
    fn from(n: f64) -> Self {
        PropertyValue::Float(n)
    }
}

impl From<bool> for PropertyValue {
    fn from(b: bool) -> Self {
        PropertyValue::Boolean(b)
    }
}

impl From<Vec<PropertyValue>> for PropertyValue {
    fn from(items: Vec<PropertyValue>) -> Self {
        PropertyValue::List(items)
    }
}

/// Property map of a node or edge. Ordered so snapshots are deterministic.
pub type Properties = BTreeMap<String, PropertyValue>;

/// Metadata tracking node creation and updates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeMetadata {
    /// When this node was first written
    pub created_at: DateTime<Utc>,

    /// When this node was last written by a projection run
    pub updated_at: DateTime<Utc>,
}

impl Default for NodeMetadata {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            created_at: now,
            updated_at: now,
        }
    }
}

/// A node in the resource graph: an account, a resource or a sub-resource.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub label: Label,

    pub key: NodeKey,

    /// Flattened properties
    #[serde(default)]
    pub properties: Properties,

    pub metadata: NodeMetadata,
}

impl Node {
    pub fn new(label: Label, key: NodeKey) -> Self {
        Self {
            label,
            key,
            properties: Properties::new(),
            metadata: NodeMetadata::default(),
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

    /// The address of this node.
    pub fn node_ref(&self) -> NodeRef {
        NodeRef::new(self.label.clone(), self.key.clone())
    }

    pub fn property(&self, key: &str) -> Option<&PropertyValue> {
        self.properties.get(key)
    }

    /// Get a string property, or `None` if missing or not a string.
    pub fn str_property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).and_then(PropertyValue::as_str)
    }
}
