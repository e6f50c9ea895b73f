//! GraphProjector - orchestrates one projection run.
//!
//! The projector writes, in order: the Account node, every valid record
//! with its `OWNS` edge, expanded sub-resources, inferred relationships and
//! cross-account links. Writes are create-or-merge, so running it twice over
//! the same records leaves the graph unchanged apart from timestamps.
//!
//! A single refused write is logged and counted. Losing the store aborts the
//! run with [`ProjectionError::StorageUnavailable`].

use crate::cross_account::CrossAccountDetector;
use crate::error::{ProjectionError, RecordError};
use crate::expand::SubResourceExpander;
use crate::fetch::DetailFetcher;
use crate::flatten::node_properties;
use crate::identity::IdentityResolver;
use crate::inference::RelationshipInference;
use crate::record::ResourceRecord;
use crate::report::{CrossAccountSummary, ProjectionReport};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use skymap_graph::{
    GraphQuery, GraphStore, Label, NodeKey, NodeRef, Properties, PropertyValue, RelationshipKind,
    StoreError, UpsertOutcome,
};

/// What to do with graph entities the current run did not touch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StalePolicy {
    /// Keep everything. Entities disappear only on reset.
    #[default]
    Retain,
    /// Remove nodes not written since the run started.
    Sweep,
}

#[derive(Debug, Clone)]
pub struct ProjectionOptions {
    pub account_id: String,
    /// Display name for the Account node; defaults to `Account-<id>`
    pub account_name: Option<String>,
    /// Clear the store before writing
    pub reset: bool,
    pub stale_policy: StalePolicy,
}

impl ProjectionOptions {
    pub fn new(account_id: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
            account_name: None,
            reset: false,
            stale_policy: StalePolicy::default(),
        }
    }

    pub fn account_name(&self) -> String {
        self.account_name
            .clone()
            .unwrap_or_else(|| format!("Account-{}", self.account_id))
    }
}

/// Projects records into a [`GraphStore`].
pub struct GraphProjector {
    options: ProjectionOptions,
    expander: SubResourceExpander,
}

impl GraphProjector {
    pub fn new(options: ProjectionOptions) -> Self {
        Self {
            options,
            expander: SubResourceExpander::standard(),
        }
    }

    pub fn with_expander(mut self, expander: SubResourceExpander) -> Self {
        self.expander = expander;
        self
    }

    pub fn options(&self) -> &ProjectionOptions {
        &self.options
    }

    /// Run a full projection of `records` into `store`.
    pub async fn project<S: GraphStore + ?Sized>(
        &self,
        records: &[ResourceRecord],
        store: &mut S,
        fetcher: &dyn DetailFetcher,
    ) -> Result<ProjectionReport, ProjectionError> {
        let account_id = self.options.account_id.as_str();
        let run_id = uuid::Uuid::new_v4().to_string();
        let started_at = Utc::now();
        let mut writer = Writer {
            store,
            report: ProjectionReport::new(run_id, started_at),
        };

        tracing::info!(
            account = account_id,
            records = records.len(),
            run_id = %writer.report.run_id,
            "Starting graph projection"
        );

        if self.options.reset {
            tracing::info!("Resetting graph store");
            writer.store.reset().map_err(ProjectionError::StorageUnavailable)?;
        }
        writer
            .store
            .create_constraints_and_indexes()
            .map_err(ProjectionError::StorageUnavailable)?;

        let account = account_ref(account_id)?;
        let mut account_props = Properties::new();
        account_props.insert("id".into(), account_id.into());
        account_props.insert("name".into(), self.options.account_name().into());
        writer.node(&account, account_props)?;

        // Resources
        for record in records {
            if !record.is_valid() {
                writer.report.skipped_records += 1;
                continue;
            }
            let node = match record.node_ref(account_id) {
                Ok(node) => node,
                Err(e) => {
                    tracing::warn!(
                        resource_type = %record.resource_type,
                        id = %record.id,
                        error = %e,
                        "Record has no graph identity"
                    );
                    writer.report.failed_writes += 1;
                    continue;
                }
            };
            if writer.node(&node, node_properties(record, account_id))? {
                writer.edge(&account, &node, RelationshipKind::Owns, Properties::new())?;
            }
        }
        tracing::info!(
            nodes = writer.report.nodes_created + writer.report.nodes_updated,
            skipped = writer.report.skipped_records,
            "Resource nodes written"
        );

        // Sub-resources
        let expansion = self
            .expander
            .expand_all(records, account_id, fetcher)
            .await;
        for sub in &expansion.sub_resources {
            let node = sub.node_ref()?;
            if writer.node(&node, node_properties(&sub.record, account_id))? {
                writer.edge(&account, &node, RelationshipKind::Owns, Properties::new())?;
                writer.report.sub_resources += 1;
            }
        }
        for edge in &expansion.edges {
            writer.edge(&edge.source, &edge.target, edge.kind, edge.properties.clone())?;
        }
        writer.report.failures.extend(expansion.failures);

        // Inferred relationships
        let resolver = IdentityResolver::build(records);
        let candidates = RelationshipInference::new(&resolver).infer_all();
        for candidate in &candidates {
            let (Some(source), Some(target)) = (
                records.get(candidate.source),
                records.get(candidate.target),
            ) else {
                continue;
            };
            let (Ok(source), Ok(target)) = (source.node_ref(account_id), target.node_ref(account_id))
            else {
                continue;
            };
            let mut props = Properties::new();
            props.insert("property".into(), PropertyValue::from(candidate.property.as_str()));
            writer.edge(&source, &target, candidate.kind, props)?;
        }
        writer.report.inferred_edges = candidates.len();
        tracing::info!(
            candidates = candidates.len(),
            global_refs = resolver.global_ref_count(),
            "Inferred relationships written"
        );

        // Cross-account connectivity
        let detection = CrossAccountDetector::new(account_id)
            .detect(records, fetcher)
            .await;
        for link in &detection.links {
            let remote = account_ref(&link.target_account)?;
            let mut props = Properties::new();
            props.insert("id".into(), link.target_account.as_str().into());
            writer.node(&remote, props)?;
            writer.edge(
                &account,
                &remote,
                link.mechanism.relationship(),
                link.properties.clone(),
            )?;
        }
        for update in &detection.peering_updates {
            writer.node(&update.node, update.properties.clone())?;
        }
        writer.report.cross_account_links = detection.links.len();
        writer.report.failures.extend(detection.failures);

        if self.options.stale_policy == StalePolicy::Sweep {
            let pruned = writer
                .store
                .prune_stale(started_at)
                .map_err(ProjectionError::StorageUnavailable)?;
            tracing::info!(pruned, "Swept stale graph entities");
            writer.report.pruned = pruned;
        }

        let rows = writer
            .store
            .run_query(&GraphQuery::CrossAccountConnections)
            .map_err(ProjectionError::StorageUnavailable)?;
        let summary = CrossAccountSummary::from_rows(&rows);
        summary.log();

        let mut report = writer.report;
        report.cross_account = summary;
        report.finished_at = Utc::now();

        tracing::info!(
            nodes_created = report.nodes_created,
            nodes_updated = report.nodes_updated,
            edges_created = report.edges_created,
            edges_updated = report.edges_updated,
            failed_writes = report.failed_writes,
            failures = report.failures.len(),
            elapsed_ms = report.duration().num_milliseconds(),
            "Graph projection complete"
        );
        Ok(report)
    }
}

fn account_ref(account_id: &str) -> Result<NodeRef, RecordError> {
    Ok(NodeRef::new(Label::account(), NodeKey::new(account_id)?))
}

/// Store writes with failure accounting.
struct Writer<'s, S: ?Sized> {
    store: &'s mut S,
    report: ProjectionReport,
}

impl<S: GraphStore + ?Sized> Writer<'_, S> {
    /// Upsert a node. `Ok(false)` means the write was refused and counted.
    fn node(&mut self, node: &NodeRef, properties: Properties) -> Result<bool, ProjectionError> {
        let result = self.store.upsert_node(&node.label, &node.key, properties);
        self.settle(result, || node.to_string())
            .map(|outcome| match outcome {
                Some(outcome) => {
                    self.report.count_node(outcome);
                    true
                }
                None => false,
            })
    }

    fn edge(
        &mut self,
        source: &NodeRef,
        target: &NodeRef,
        kind: RelationshipKind,
        properties: Properties,
    ) -> Result<bool, ProjectionError> {
        let result = self.store.upsert_edge(source, target, kind, properties);
        self.settle(result, || format!("{source} -[{kind}]-> {target}"))
            .map(|outcome| match outcome {
                Some(outcome) => {
                    self.report.count_edge(outcome);
                    true
                }
                None => false,
            })
    }

    fn settle(
        &mut self,
        result: Result<UpsertOutcome, StoreError>,
        describe: impl FnOnce() -> String,
    ) -> Result<Option<UpsertOutcome>, ProjectionError> {
        match result {
            Ok(outcome) => Ok(Some(outcome)),
            Err(e) if e.is_fatal() => {
                tracing::error!(error = %e, "Graph store unavailable, aborting projection");
                Err(ProjectionError::StorageUnavailable(e))
            }
            Err(e) => {
                tracing::warn!(target_entity = %describe(), error = %e, "Graph write failed");
                self.report.failed_writes += 1;
                Ok(None)
            }
        }
    }
}
