//! Relationship classification rule table.
//!
//! Rules are evaluated top to bottom and the first match wins. There is no
//! scoring; precedence is the order of [`RULES`].

use crate::identity::MatchKind;
use crate::record::kind_of;
use skymap_graph::RelationshipKind;

/// Everything a rule may look at when classifying one reference.
#[derive(Debug, Clone, Copy)]
pub struct ReferenceContext<'a> {
    pub source_type: &'a str,
    pub target_type: &'a str,
    /// Dotted path from the property root to the value
    pub path: &'a str,
    /// Immediate key holding the value
    pub key: &'a str,
    pub via: MatchKind,
}

/// A named classification rule.
pub struct Rule {
    pub name: &'static str,
    pub kind: RelationshipKind,
    matches: fn(&Normalized<'_>) -> bool,
}

impl Rule {
    pub fn matches(&self, ctx: &ReferenceContext<'_>) -> bool {
        (self.matches)(&Normalized::new(ctx))
    }
}

impl std::fmt::Debug for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rule")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .finish()
    }
}

/// Lower-cased views of the context, computed once per classification.
struct Normalized<'a> {
    key: String,
    path: String,
    target_type: &'a str,
    target_kind: &'a str,
    via: MatchKind,
}

impl<'a> Normalized<'a> {
    fn new(ctx: &ReferenceContext<'a>) -> Self {
        Self {
            key: ctx.key.to_ascii_lowercase(),
            path: ctx.path.to_ascii_lowercase(),
            target_type: ctx.target_type,
            target_kind: kind_of(ctx.target_type),
            via: ctx.via,
        }
    }

    fn key_has(&self, needle: &str) -> bool {
        self.key.contains(needle)
    }

    fn target_kind_has(&self, fragment: &str) -> bool {
        self.target_kind.contains(fragment)
    }

    fn target_is_database(&self) -> bool {
        ["DB", "Database", "RDS"]
            .iter()
            .any(|f| self.target_type.contains(f))
    }
}

/// The ordered rule table.
pub const RULES: &[Rule] = &[
    Rule {
        name: "logging",
        kind: RelationshipKind::LogsTo,
        matches: |c| c.key_has("log") || c.path.contains("logging"),
    },
    Rule {
        name: "vpc",
        kind: RelationshipKind::DeployedIn,
        matches: |c| c.key_has("vpc") && c.target_kind_has("VPC"),
    },
    Rule {
        name: "subnet",
        kind: RelationshipKind::DeployedIn,
        matches: |c| c.key_has("subnet") && c.target_kind_has("Subnet"),
    },
    Rule {
        name: "security-group",
        kind: RelationshipKind::ProtectedBy,
        matches: |c| c.key_has("securitygroup") || c.key_has("groupid"),
    },
    Rule {
        name: "role",
        kind: RelationshipKind::Assumes,
        matches: |c| c.key_has("role") && c.target_kind_has("Role"),
    },
    Rule {
        name: "policy",
        kind: RelationshipKind::HasPolicy,
        matches: |c| c.key_has("policy") && c.target_kind_has("Policy"),
    },
    Rule {
        name: "volume",
        kind: RelationshipKind::UsesVolume,
        matches: |c| c.key_has("volume") && c.target_kind_has("Volume"),
    },
    Rule {
        name: "snapshot",
        kind: RelationshipKind::CreatedFrom,
        matches: |c| c.key_has("snapshot") && c.target_kind_has("Snapshot"),
    },
    Rule {
        name: "routing",
        kind: RelationshipKind::RoutesThrough,
        matches: |c| c.key_has("route") || c.key_has("gateway"),
    },
    Rule {
        name: "load-balancing",
        kind: RelationshipKind::LoadBalancedBy,
        matches: |c| c.key_has("loadbalancer") || c.key_has("targetgroup"),
    },
    Rule {
        name: "database",
        kind: RelationshipKind::ConnectsTo,
        matches: |c| c.key_has("db") && c.target_is_database(),
    },
    Rule {
        name: "global-reference",
        kind: RelationshipKind::References,
        matches: |c| c.via == MatchKind::GlobalRef,
    },
];

/// Kind used when no rule matches.
pub const FALLBACK: RelationshipKind = RelationshipKind::Uses;

/// Classify one reference: the kind of the first matching rule, else [`FALLBACK`].
pub fn classify(ctx: &ReferenceContext<'_>) -> RelationshipKind {
    let normalized = Normalized::new(ctx);
    RULES
        .iter()
        .find(|rule| (rule.matches)(&normalized))
        .map(|rule| rule.kind)
        .unwrap_or(FALLBACK)
}

/// Name of the rule that decides `ctx`, or `"fallback"`.
pub fn deciding_rule(ctx: &ReferenceContext<'_>) -> &'static str {
    let normalized = Normalized::new(ctx);
    RULES
        .iter()
        .find(|rule| (rule.matches)(&normalized))
        .map(|rule| rule.name)
        .unwrap_or("fallback")
}
