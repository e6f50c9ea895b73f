//! Projection statistics.

use crate::expand::ExpansionFailure;
use chrono::{DateTime, Utc};
use serde_json::Value;
use skymap_graph::{QueryRecord, RelationshipKind, UpsertOutcome};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Cross-account connections currently in the graph.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CrossAccountSummary {
    pub by_mechanism: BTreeMap<RelationshipKind, usize>,
    pub by_account_pair: BTreeMap<(String, String), usize>,
    /// Every account taking part in at least one connection
    pub accounts: BTreeSet<String>,
    pub total: usize,
}

impl CrossAccountSummary {
    /// Build from `GraphQuery::CrossAccountConnections` rows.
    pub fn from_rows(rows: &[QueryRecord]) -> Self {
        let mut summary = Self::default();
        for row in rows {
            let text = |key: &str| row.get(key).and_then(Value::as_str).unwrap_or("").to_string();
            let Ok(kind) = text("kind").parse::<RelationshipKind>() else {
                continue;
            };
            let (source, target) = (text("source_account"), text("target_account"));

            *summary.by_mechanism.entry(kind).or_default() += 1;
            *summary
                .by_account_pair
                .entry((source.clone(), target.clone()))
                .or_default() += 1;
            summary.accounts.insert(source);
            summary.accounts.insert(target);
            summary.total += 1;
        }
        summary
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    pub fn log(&self) {
        if self.is_empty() {
            tracing::info!("No cross-account connections detected");
            return;
        }
        for (kind, count) in &self.by_mechanism {
            tracing::info!(mechanism = %kind, count, "Cross-account connections");
        }
        for ((source, target), count) in &self.by_account_pair {
            tracing::info!(source = %source, target = %target, count, "Connected accounts");
        }
        tracing::info!(
            total = self.total,
            accounts = self.accounts.len(),
            "Cross-account connectivity summary"
        );
    }
}

impl fmt::Display for CrossAccountSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "No cross-account connections");
        }
        writeln!(
            f,
            "{} cross-account connection(s) across {} account(s)",
            self.total,
            self.accounts.len()
        )?;
        for (kind, count) in &self.by_mechanism {
            writeln!(f, "  {kind}: {count}")?;
        }
        for ((source, target), count) in &self.by_account_pair {
            writeln!(f, "  {source} -> {target}: {count}")?;
        }
        Ok(())
    }
}

/// What one projection run did.
#[derive(Debug, Clone)]
pub struct ProjectionReport {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub nodes_created: usize,
    pub nodes_updated: usize,
    pub edges_created: usize,
    pub edges_updated: usize,
    /// Single writes the store refused
    pub failed_writes: usize,
    /// Records dropped because enumeration tagged them with an error
    pub skipped_records: usize,
    pub sub_resources: usize,
    pub inferred_edges: usize,
    pub cross_account_links: usize,
    /// Nodes removed by a sweep
    pub pruned: usize,
    pub failures: Vec<ExpansionFailure>,
    pub cross_account: CrossAccountSummary,
}

impl ProjectionReport {
    pub fn new(run_id: impl Into<String>, started_at: DateTime<Utc>) -> Self {
        Self {
            run_id: run_id.into(),
            started_at,
            finished_at: started_at,
            nodes_created: 0,
            nodes_updated: 0,
            edges_created: 0,
            edges_updated: 0,
            failed_writes: 0,
            skipped_records: 0,
            sub_resources: 0,
            inferred_edges: 0,
            cross_account_links: 0,
            pruned: 0,
            failures: Vec::new(),
            cross_account: CrossAccountSummary::default(),
        }
    }

    pub(crate) fn count_node(&mut self, outcome: UpsertOutcome) {
        match outcome {
            UpsertOutcome::Created => self.nodes_created += 1,
            UpsertOutcome::Updated => self.nodes_updated += 1,
        }
    }

    pub(crate) fn count_edge(&mut self, outcome: UpsertOutcome) {
        match outcome {
            UpsertOutcome::Created => self.edges_created += 1,
            UpsertOutcome::Updated => self.edges_updated += 1,
        }
    }

    pub fn duration(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn row(source: &str, target: &str, kind: &str) -> QueryRecord {
        let mut row = QueryRecord::new();
        row.insert("source_account".into(), source.into());
        row.insert("target_account".into(), target.into());
        row.insert("kind".into(), kind.into());
        row
    }

    #[test]
    fn test_summary_groups_by_mechanism_and_pair() {
        let rows = vec![
            row("111", "222", "CONNECTED_VIA_TRANSIT_GATEWAY"),
            row("111", "222", "CONNECTED_VIA_VPC_PEERING"),
            row("111", "333", "CONNECTED_VIA_VPC_PEERING"),
        ];

        let summary = CrossAccountSummary::from_rows(&rows);

        assert_eq!(summary.total, 3);
        assert_eq!(
            summary.by_mechanism[&RelationshipKind::ConnectedViaVpcPeering],
            2
        );
        assert_eq!(
            summary.by_account_pair[&("111".to_string(), "222".to_string())],
            2
        );
        assert_eq!(summary.accounts.len(), 3);
        assert!(summary.to_string().starts_with("3 cross-account connection(s)"));
    }

    #[test]
    fn test_empty_summary() {
        let summary = CrossAccountSummary::from_rows(&[]);
        assert!(summary.is_empty());
        assert_eq!(summary.to_string(), "No cross-account connections");
    }

    #[test]
    fn test_report_counts_outcomes() {
        let mut report = ProjectionReport::new("run-1", Utc::now());
        report.count_node(UpsertOutcome::Created);
        report.count_node(UpsertOutcome::Updated);
        report.count_edge(UpsertOutcome::Created);

        assert_eq!(report.nodes_created, 1);
        assert_eq!(report.nodes_updated, 1);
        assert_eq!(report.edges_created, 1);
        assert_eq!(report.edges_updated, 0);
    }
}
