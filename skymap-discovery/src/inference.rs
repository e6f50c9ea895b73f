//! RelationshipInference - typed candidate edges from property references.
//!
//! For every valid record the engine walks the property tree, resolves each
//! string value through the [`IdentityResolver`] and classifies every hit
//! with the rule table in [`crate::classify`]. It never writes to storage.

use crate::classify::{ReferenceContext, classify};
use crate::identity::{IdentityResolver, MAX_WALK_DEPTH, MatchKind};
use crate::record::ResourceRecord;
use serde_json::Value;
use skymap_graph::RelationshipKind;

/// One inferred reference from a record to another record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateEdge {
    /// Position of the source record in the resolver's record slice
    pub source: usize,
    /// Position of the target record in the resolver's record slice
    pub target: usize,
    pub kind: RelationshipKind,
    /// Immediate property key that held the reference
    pub property: String,
    /// Dotted path from the property root
    pub path: String,
    pub via: MatchKind,
}

/// Walks records and emits candidate edges.
pub struct RelationshipInference<'r, 'a> {
    resolver: &'r IdentityResolver<'a>,
}

impl<'r, 'a> RelationshipInference<'r, 'a> {
    pub fn new(resolver: &'r IdentityResolver<'a>) -> Self {
        Self { resolver }
    }

    /// Infer edges for every valid record the resolver was built from.
    pub fn infer_all(&self) -> Vec<CandidateEdge> {
        let mut edges = Vec::new();
        for (index, record) in self.resolver.records().iter().enumerate() {
            if record.is_valid() {
                self.infer_into(index, record, &mut edges);
            }
        }
        tracing::debug!(count = edges.len(), "Inferred candidate edges");
        edges
    }

    /// Infer edges whose source is the record at `index`.
    pub fn infer(&self, index: usize) -> Vec<CandidateEdge> {
        let mut edges = Vec::new();
        if let Some(record) = self.resolver.records().get(index) {
            if record.is_valid() {
                self.infer_into(index, record, &mut edges);
            }
        }
        edges
    }

    fn infer_into(&self, index: usize, record: &ResourceRecord, edges: &mut Vec<CandidateEdge>) {
        let mut walker = Walker {
            resolver: self.resolver,
            source_index: index,
            source: record,
            edges,
        };
        for (key, value) in &record.properties {
            walker.walk(key, key, value, 0);
        }
    }
}

struct Walker<'w, 'r, 'a> {
    resolver: &'r IdentityResolver<'a>,
    source_index: usize,
    source: &'w ResourceRecord,
    edges: &'w mut Vec<CandidateEdge>,
}

impl Walker<'_, '_, '_> {
    fn walk(&mut self, path: &str, key: &str, value: &Value, depth: usize) {
        if depth > MAX_WALK_DEPTH {
            return;
        }
        match value {
            Value::String(s) => self.visit_string(path, key, s),
            Value::Object(map) => {
                for (k, v) in map {
                    self.walk(&format!("{path}.{k}"), k, v, depth + 1);
                }
            }
            Value::Array(items) => {
                // List elements inherit the key of the list
                for item in items {
                    self.walk(path, key, item, depth + 1);
                }
            }
            _ => {}
        }
    }

    fn visit_string(&mut self, path: &str, key: &str, value: &str) {
        for hit in self.resolver.resolve(value) {
            if self.is_self(hit.index, hit.record) {
                continue;
            }
            let kind = classify(&ReferenceContext {
                source_type: &self.source.resource_type,
                target_type: &hit.record.resource_type,
                path,
                key,
                via: hit.via,
            });
            self.edges.push(CandidateEdge {
                source: self.source_index,
                target: hit.index,
                kind,
                property: key.to_string(),
                path: path.to_string(),
                via: hit.via,
            });
        }
    }

    fn is_self(&self, index: usize, target: &ResourceRecord) -> bool {
        index == self.source_index
            || (!self.source.global_ref.is_empty() && self.source.global_ref == target.global_ref)
    }
}
