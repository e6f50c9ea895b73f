//! IdentityResolver - lookup indices from raw string values to records.
//!
//! Built once per run over the complete record set. Inference depends on the
//! indices being complete, so the resolver is only constructed after
//! enumeration has fully drained.

use crate::record::ResourceRecord;
use serde_json::Value;
use std::collections::HashMap;

/// Property keys whose string values name another resource.
pub const NAME_KEYS: &[&str] = &[
    "Name",
    "BucketName",
    "VpcId",
    "SubnetId",
    "GroupId",
    "GroupName",
    "InstanceId",
    "VolumeId",
    "SnapshotId",
    "ImageId",
    "KeyName",
    "RoleName",
    "PolicyName",
    "UserName",
    "FunctionName",
    "TableName",
    "ClusterName",
    "DBName",
    "DBInstanceIdentifier",
    "TopicArn",
];

/// How deep property walks descend into nested maps and lists.
pub const MAX_WALK_DEPTH: usize = 8;

/// Which index produced a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchKind {
    /// The value equals the target's global reference.
    GlobalRef,
    /// The value equals the target's opaque id.
    OpaqueId,
    /// The value appeared under a name-like key of the target.
    Name,
}

/// A record a string value resolved to.
#[derive(Debug, Clone, Copy)]
pub struct Resolution<'a> {
    pub index: usize,
    pub record: &'a ResourceRecord,
    pub via: MatchKind,
}

/// Indices over one run's records.
///
/// Records are referred to by their position in the slice the resolver was
/// built from.
pub struct IdentityResolver<'a> {
    records: &'a [ResourceRecord],
    by_global_ref: HashMap<&'a str, usize>,
    by_opaque_id: HashMap<&'a str, Vec<usize>>,
    by_extracted_name: HashMap<String, Vec<usize>>,
}

impl<'a> IdentityResolver<'a> {
    /// Build all three indices in a single pass. Invalid records are skipped.
    pub fn build(records: &'a [ResourceRecord]) -> Self {
        let mut resolver = Self {
            records,
            by_global_ref: HashMap::new(),
            by_opaque_id: HashMap::new(),
            by_extracted_name: HashMap::new(),
        };

        for (index, record) in records.iter().enumerate() {
            if !record.is_valid() {
                continue;
            }
            if !record.global_ref.is_empty() {
                resolver
                    .by_global_ref
                    .insert(record.global_ref.as_str(), index);
            }
            resolver
                .by_opaque_id
                .entry(record.id.as_str())
                .or_default()
                .push(index);

            let mut names = Vec::new();
            for (key, value) in &record.properties {
                collect_names(key, value, 0, &mut names);
            }
            // Buckets are referenced by name far more often than by ARN
            if record.resource_type == "AWS::S3::Bucket" {
                let bucket_name = match record.str_prop("BucketName") {
                    "" => record.id.clone(),
                    name => name.to_string(),
                };
                names.push(bucket_name);
            }

            names.sort();
            names.dedup();
            for name in names {
                resolver.by_extracted_name.entry(name).or_default().push(index);
            }
        }

        resolver
    }

    pub fn records(&self) -> &'a [ResourceRecord] {
        self.records
    }

    pub fn by_global_ref(&self, value: &str) -> Option<&'a ResourceRecord> {
        self.by_global_ref.get(value).map(|&i| &self.records[i])
    }

    pub fn by_opaque_id(&self, value: &str) -> Vec<&'a ResourceRecord> {
        self.lookup(self.by_opaque_id.get(value))
    }

    pub fn by_name(&self, value: &str) -> Vec<&'a ResourceRecord> {
        self.lookup(self.by_extracted_name.get(value))
    }

    fn lookup(&self, hits: Option<&Vec<usize>>) -> Vec<&'a ResourceRecord> {
        hits.map(|hits| hits.iter().map(|&i| &self.records[i]).collect())
            .unwrap_or_default()
    }

    /// Resolve a raw string value to the records it refers to.
    ///
    /// Indices are consulted in order and the first non-empty one wins:
    /// global reference, opaque id, extracted name. An ARN with no direct hit
    /// falls back to its trailing resource name in the name index.
    pub fn resolve(&self, value: &str) -> Vec<Resolution<'a>> {
        if value.is_empty() {
            return Vec::new();
        }
        if let Some(&index) = self.by_global_ref.get(value) {
            return vec![self.resolution(index, MatchKind::GlobalRef)];
        }
        if let Some(hits) = self.by_opaque_id.get(value) {
            return self.resolutions(hits, MatchKind::OpaqueId);
        }
        if let Some(hits) = self.by_extracted_name.get(value) {
            return self.resolutions(hits, MatchKind::Name);
        }
        if value.starts_with("arn:") {
            let tail = arn_resource_name(value);
            if !tail.is_empty() && tail != value {
                if let Some(hits) = self.by_extracted_name.get(tail) {
                    return self.resolutions(hits, MatchKind::Name);
                }
            }
        }
        Vec::new()
    }

    fn resolution(&self, index: usize, via: MatchKind) -> Resolution<'a> {
        Resolution {
            index,
            record: &self.records[index],
            via,
        }
    }

    fn resolutions(&self, hits: &[usize], via: MatchKind) -> Vec<Resolution<'a>> {
        hits.iter().map(|&i| self.resolution(i, via)).collect()
    }

    /// Number of records indexed by global reference.
    pub fn global_ref_count(&self) -> usize {
        self.by_global_ref.len()
    }
}

fn collect_names(key: &str, value: &Value, depth: usize, out: &mut Vec<String>) {
    if depth > MAX_WALK_DEPTH {
        return;
    }
    match value {
        Value::String(s) if !s.is_empty() && NAME_KEYS.contains(&key) => out.push(s.clone()),
        Value::Object(map) => {
            for (k, v) in map {
                collect_names(k, v, depth + 1, out);
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_names(key, item, depth + 1, out);
            }
        }
        _ => {}
    }
}

/// Trailing resource name of an ARN: the part after the last `/`, else after the last `:`.
fn arn_resource_name(arn: &str) -> &str {
    match arn.rfind('/') {
        Some(pos) => &arn[pos + 1..],
        None => arn.rsplit(':').next().unwrap_or(""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn records() -> Vec<ResourceRecord> {
        vec![
            ResourceRecord::new("AWS::EC2::VPC", "vpc-1", "us-east-1")
                .with_global_ref("arn:aws:ec2:us-east-1:111:vpc/vpc-1"),
            ResourceRecord::new("AWS::EC2::Subnet", "subnet-1", "us-east-1")
                .with_global_ref("arn:aws:ec2:us-east-1:111:subnet/subnet-1")
                .with_property("VpcId", "vpc-1"),
            ResourceRecord::new("AWS::S3::Bucket", "logs-bucket", "us-east-1")
                .with_global_ref("arn:aws:s3:::logs-bucket"),
            ResourceRecord::new("AWS::IAM::Role", "AROA123", "")
                .with_global_ref("arn:aws:iam::111:role/service/deployer")
                .with_property("RoleName", "deployer")
                .with_property("Tags", json!([{"Key": "Name", "Value": "x"}])),
            ResourceRecord::failed("AWS::EC2::Fleet", "us-east-1", "boom"),
        ]
    }

    #[test]
    fn test_global_ref_wins() {
        let records = records();
        let resolver = IdentityResolver::build(&records);

        let hits = resolver.resolve("arn:aws:ec2:us-east-1:111:vpc/vpc-1");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].via, MatchKind::GlobalRef);
        assert_eq!(hits[0].record.id, "vpc-1");
    }

    #[test]
    fn test_opaque_id_preferred_over_name() {
        let records = records();
        let resolver = IdentityResolver::build(&records);

        // The subnet also carries "vpc-1" under VpcId, but the id index wins
        let hits = resolver.resolve("vpc-1");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].via, MatchKind::OpaqueId);
        assert_eq!(hits[0].record.resource_type, "AWS::EC2::VPC");

        assert_eq!(resolver.by_name("vpc-1").len(), 1);
    }

    #[test]
    fn test_bucket_indexed_by_name() {
        let records = records();
        let resolver = IdentityResolver::build(&records);

        let hits = resolver.by_name("logs-bucket");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].resource_type, "AWS::S3::Bucket");
    }

    #[test]
    fn test_names_found_in_nested_lists() {
        let records = records();
        let resolver = IdentityResolver::build(&records);

        // Tag values sit under "Value", which is not a name key
        assert!(resolver.by_name("x").is_empty());
        assert_eq!(resolver.by_name("deployer").len(), 1);
    }

    #[test]
    fn test_arn_falls_back_to_trailing_name() {
        let records = records();
        let resolver = IdentityResolver::build(&records);

        let hits = resolver.resolve("arn:aws:iam::111:role/deployer");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].via, MatchKind::Name);
        assert_eq!(hits[0].record.resource_type, "AWS::IAM::Role");
    }

    #[test]
    fn test_failed_records_not_indexed() {
        let records = records();
        let resolver = IdentityResolver::build(&records);
        assert_eq!(resolver.global_ref_count(), 4);
        assert!(resolver.by_opaque_id("").is_empty());
    }

    #[test]
    fn test_unresolvable_values() {
        let records = records();
        let resolver = IdentityResolver::build(&records);
        assert!(resolver.resolve("").is_empty());
        assert!(resolver.resolve("nothing-here").is_empty());
        assert!(resolver.by_global_ref("arn:aws:s3:::other").is_none());
    }

    #[test]
    fn test_depth_bound() {
        let mut deep = json!("deep-name");
        for _ in 0..20 {
            deep = json!({"Name": deep});
        }
        let records = vec![
            ResourceRecord::new("AWS::Test::Thing", "t-1", "us-east-1").with_property("Root", deep),
        ];
        let resolver = IdentityResolver::build(&records);
        assert!(resolver.by_name("deep-name").is_empty());
    }
}
