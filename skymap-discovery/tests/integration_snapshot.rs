//! End-to-end replay of a snapshot file into a persisted graph.

mod common;

use common::{ACCOUNT, SNAPSHOT, write_file};
use pretty_assertions::assert_eq;
use skymap_discovery::{
    Enumerator, GraphProjector, ProjectionOptions, SnapshotSource, TypeOutcome,
};
use skymap_graph::MemoryStore;
use std::sync::Arc;
use tempfile::tempdir;

#[tokio::test]
async fn test_replay_snapshot_file_and_reopen_graph() {
    let dir = tempdir().unwrap();
    let snapshot_path = dir.path().join("snapshots/account.yaml");
    let graph_path = dir.path().join("graph.json");
    write_file(&snapshot_path, SNAPSHOT);

    let source = Arc::new(
        SnapshotSource::load(&snapshot_path)
            .unwrap()
            .with_list_failure("AWS::Lambda::Function", "ThrottlingException: Rate exceeded"),
    );
    let types = source.resource_types();
    let enumerator = Enumerator::new(Arc::clone(&source) as _);
    let account = enumerator.account().await.unwrap();
    assert_eq!(account, ACCOUNT);

    let enumeration = enumerator.run(&account, &types).await;
    let stats = enumeration.stats();
    assert_eq!(stats.listed_types, 7);
    assert_eq!(stats.skipped_types, 1);
    assert_eq!(stats.failed_types, 1);
    assert_eq!(stats.resources, 7);

    let throttled = enumeration
        .reports
        .iter()
        .find(|r| r.resource_type == "AWS::Lambda::Function")
        .unwrap();
    assert!(matches!(throttled.outcome, TypeOutcome::Skipped(_)));

    let mut store = MemoryStore::open(&graph_path).unwrap();
    GraphProjector::new(ProjectionOptions::new(&account))
        .project(&enumeration.records, &mut store, source.as_ref())
        .await
        .unwrap();
    store.persist(&graph_path).unwrap();

    let reopened = MemoryStore::open(&graph_path).unwrap();
    assert_eq!(reopened.graph().node_count(), store.graph().node_count());
    assert_eq!(reopened.graph().edge_count(), store.graph().edge_count());
}
